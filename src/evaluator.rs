//! Evaluator contract and the two implementations.
//!
//! [`env_model`] and [`sub_model`] evaluate the same language and are expected
//! to agree on every value and every error message. [`evaluate_source`] is the
//! one-call entry point: read, optionally rewrite classes, evaluate.

pub mod env_model;
pub mod sub_model;
pub mod substitute;

use crate::Error;
use crate::ast::{Exp, Program};
use crate::environment::Env;
use crate::value::Value;
use std::fmt;
use std::str::FromStr;

pub use env_model::EnvEvaluator;
pub use sub_model::SubstitutionEvaluator;

/// Common interface of both evaluators
pub trait Evaluator {
    /// Evaluate one expression on its own; a lone `define` has no value
    fn evaluate(&mut self, exp: &Exp) -> Result<Value, Error>;

    /// Evaluate a program's expressions in order and return the last value
    fn evaluate_program(&mut self, program: &Program) -> Result<Value, Error>;

    /// Evaluate a program and return the frame of its top-level definitions
    fn definitions(&mut self, program: &Program) -> Result<Env, Error>;
}

/// Selects an evaluator implementation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum EvaluatorKind {
    #[default]
    Environment,
    Substitution,
}

impl EvaluatorKind {
    pub const ALL: [EvaluatorKind; 2] = [EvaluatorKind::Environment, EvaluatorKind::Substitution];

    pub fn create(self) -> Box<dyn Evaluator> {
        match self {
            EvaluatorKind::Environment => Box::new(EnvEvaluator::new()),
            EvaluatorKind::Substitution => Box::new(SubstitutionEvaluator::new()),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            EvaluatorKind::Environment => "env",
            EvaluatorKind::Substitution => "sub",
        }
    }
}

impl fmt::Display for EvaluatorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for EvaluatorKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "env" | "environment" => Ok(EvaluatorKind::Environment),
            "sub" | "substitution" => Ok(EvaluatorKind::Substitution),
            other => Err(Error::Parse(format!(
                "unknown evaluator '{other}', expected 'env' or 'sub'"
            ))),
        }
    }
}

/// Options for [`evaluate_source`]
#[cfg(feature = "scheme")]
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Config {
    pub evaluator: EvaluatorKind,
    /// Rewrite `class` forms into plain procedures before evaluating
    pub lex_transform: bool,
    pub parse: crate::scheme::ParseConfig,
}

/// Parse and evaluate `source`, either an `(L3 ...)` program or a single
/// expression.
#[cfg(feature = "scheme")]
pub fn evaluate_source(source: &str, config: &Config) -> Result<Value, Error> {
    use crate::scheme::{parse_l3_exp, parse_l3_program, parse_sexp_with_config};

    let datum = parse_sexp_with_config(source, config.parse)?;
    let is_program = matches!(
        &datum,
        Value::List(items) if matches!(items.first(), Some(Value::Symbol(head)) if head == "L3")
    );
    let mut program = if is_program {
        parse_l3_program(&datum)?
    } else {
        Program {
            exps: vec![parse_l3_exp(&datum)?],
        }
    };
    if config.lex_transform {
        program = crate::transform::lex_transform(&program);
    }
    tracing::debug!(evaluator = %config.evaluator, "evaluating {program}");
    config.evaluator.create().evaluate_program(&program)
}

#[cfg(all(test, feature = "scheme"))]
#[expect(clippy::unwrap_used)] // test code OK
mod tests {
    use super::*;
    use crate::value::{sym, val};

    /// Test result variants for comprehensive testing
    #[derive(Debug)]
    enum TestResult {
        EvalResult(Value),           // Evaluation should succeed with this value
        SpecificError(&'static str), // Evaluation should fail with exactly this message
        Error,                       // Evaluation should fail (any error)
    }
    use TestResult::*;

    fn success<T: Into<Value>>(value: T) -> TestResult {
        EvalResult(val(value))
    }

    fn execute_test_case(input: &str, expected: &TestResult, config: &Config, test_id: &str) {
        match (evaluate_source(input, config), expected) {
            (Ok(actual), EvalResult(expected_val)) => {
                assert_eq!(actual, *expected_val, "{test_id}: value mismatch for {input}");
            }
            (Err(_), Error) => {}
            (Err(e), SpecificError(expected_text)) => {
                assert_eq!(
                    e.to_string(),
                    *expected_text,
                    "{test_id}: wrong error for {input}"
                );
            }
            (Ok(actual), Error | SpecificError(_)) => {
                panic!("{test_id}: expected error for {input}, got {actual:?}");
            }
            (Err(err), EvalResult(expected_val)) => {
                panic!("{test_id}: expected {expected_val:?} for {input}, got error {err:?}");
            }
        }
    }

    /// Run every case under both evaluators
    fn run_comprehensive_tests(test_cases: Vec<(&str, TestResult)>) {
        for kind in EvaluatorKind::ALL {
            let config = Config {
                evaluator: kind,
                ..Config::default()
            };
            for (i, (input, expected)) in test_cases.iter().enumerate() {
                let test_id = format!("[{kind}] #{}", i + 1);
                execute_test_case(input, expected, &config, &test_id);
            }
        }
    }

    #[test]
    fn test_comprehensive_operations_data_driven() {
        let test_cases = vec![
            // === SELF-EVALUATING FORMS ===
            ("42", success(42)),
            ("-2.5", success(-2.5)),
            ("#t", success(true)),
            ("\"hi\"", success("hi")),
            ("'sym", EvalResult(sym("sym"))),
            ("'(1 (2) a)", success(vec![val(1), val([2]), sym("a")])),
            ("'()", success(Value::List(vec![]))),
            // === PRIMITIVES ===
            ("(+ 1 2 3)", success(6)),
            ("(- 10 4 1)", success(5)),
            ("(* 2 3.5)", success(7)),
            ("(/ 7 2)", success(3.5)),
            ("(< 1 2)", success(true)),
            ("(eq? 'a 'a)", success(true)),
            ("(eq? 'a 'b)", success(false)),
            ("(string=? \"x\" \"x\")", success(true)),
            ("(car (cons 1 '(2)))", success(1)),
            ("(cdr '(1 2))", success([2])),
            ("(not #f)", success(true)),
            ("(/ 1 0)", SpecificError("Division by zero")),
            // === CONDITIONALS AND TRUTHINESS ===
            ("(if #f 1 2)", success(2)),
            ("(if 0 1 2)", success(1)),
            ("(if '() 1 2)", success(1)),
            ("(if \"\" 1 2)", success(1)),
            ("(if #t 1 undefined-name)", success(1)),
            // === LAMBDA AND LET ===
            ("((lambda (x) (* x x)) 7)", success(49)),
            ("((lambda () 1 2 3))", success(3)),
            ("((lambda (f) (f 3)) (lambda (y) (+ y 1)))", success(4)),
            ("(((lambda (x) (lambda (y) (- x y))) 10) 3)", success(7)),
            ("(let ((x 2) (y 3)) (* x y))", success(6)),
            ("(let ((x 1)) (let ((x 2) (y x)) (+ x y)))", success(3)),
            ("((lambda (x y) x) 1)", SpecificError("ArityError: expected 2 arguments, got 1")),
            ("((lambda (x) x) 1 2)", SpecificError("ArityError: expected 1 arguments, got 2")),
            // === DEFINE AND SEQUENCES ===
            ("(L3 (define x 5) (define y (+ x 1)) (* x y))", success(30)),
            ("(L3 (define x 1) (define x 2) x)", success(2)),
            ("(L3 1 2 3)", success(3)),
            ("(L3 (define x 5))", SpecificError("Empty sequence")),
            ("(L3)", SpecificError("Empty sequence")),
            ("(define x 5)", SpecificError("Empty sequence")),
            // === ERRORS ===
            ("undefined-name", SpecificError("var not found: undefined-name")),
            ("(1 2)", SpecificError("Bad procedure 1")),
            ("('a 2)", SpecificError("Bad procedure a")),
            ("(\"s\")", SpecificError("Bad procedure \"s\"")),
            ("(+ 1 #t)", Error),
            ("(lambda (x) (define y 1))", Error),
            ("(1 2", Error),
        ];

        run_comprehensive_tests(test_cases);
    }

    #[test]
    fn test_class_cases() {
        let pair = "(define pair (class (a b) \
                      ((first (lambda () a)) \
                       (second (lambda () b)) \
                       (sum (lambda () (+ a b))) \
                       (scale (lambda (k) (pair (* k a) (* k b)))))))";
        let program = |body: &str| format!("(L3 {pair} (define p34 (pair 3 4)) {body})");

        let cases = vec![
            (program("(p34 'first)"), success(3)),
            (program("(p34 'second)"), success(4)),
            (program("(p34 'sum)"), success(7)),
            (program("((p34 'scale 2) 'first)"), success(6)),
            (program("((p34 'scale 2) 'second)"), success(8)),
            (program("(p34 'power)"), SpecificError("Unrecognized method: power")),
            (program("(p34)"), SpecificError("Empty method name")),
            (program("(p34 1)"), SpecificError("Invalid method name")),
            (program("(p34 \"first\")"), SpecificError("Invalid method name")),
            (program("(pair 1)"), SpecificError("ArityError: expected 2 arguments, got 1")),
            (program("(pair 1 2 3)"), SpecificError("ArityError: expected 2 arguments, got 3")),
            (program("(p34 'scale)"), SpecificError("ArityError: expected 1 arguments, got 0")),
            (
                "(L3 (define c1 (class (a b) ((f (lambda () c))))) (define o (c1 1 2)) (o 'f))"
                    .to_owned(),
                SpecificError("var not found: c"),
            ),
            (
                "(((class (a) ((get (lambda () a)))) 3) 'get)".to_owned(),
                success(3),
            ),
        ];

        for kind in EvaluatorKind::ALL {
            let config = Config {
                evaluator: kind,
                ..Config::default()
            };
            for (i, (input, expected)) in cases.iter().enumerate() {
                execute_test_case(input, expected, &config, &format!("[{kind}] class #{}", i + 1));
            }
        }
    }

    #[test]
    fn test_definitions_frame() {
        use crate::scheme::parse_l3;

        let program = parse_l3(
            "(L3 (define x 1) (define pair (class (a b) ())) (define x (+ x 1)) (pair x x))",
        )
        .unwrap();
        for kind in EvaluatorKind::ALL {
            let env = kind.create().definitions(&program).unwrap();
            let names: Vec<String> = env.bindings().into_iter().map(|(name, _)| name).collect();
            assert_eq!(names, ["pair", "x"], "[{kind}]");
            assert_eq!(env.lookup("x"), Ok(val(2)), "[{kind}]");
        }

        let failing = parse_l3("(L3 (define x 1) (car '()))").unwrap();
        for kind in EvaluatorKind::ALL {
            assert!(kind.create().definitions(&failing).is_err(), "[{kind}]");
        }
    }

    #[test]
    fn test_evaluator_kind_parsing() {
        assert_eq!("env".parse::<EvaluatorKind>(), Ok(EvaluatorKind::Environment));
        assert_eq!("substitution".parse::<EvaluatorKind>(), Ok(EvaluatorKind::Substitution));
        assert!("lazy".parse::<EvaluatorKind>().is_err());
        assert_eq!(EvaluatorKind::default().to_string(), "env");
    }
}
