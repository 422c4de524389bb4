//! Lexical transformation of `class` forms into plain procedures.
//!
//! A class with fields `f ...` and methods `(m_i (lambda () body_i))` becomes
//!
//! ```scheme
//! (lambda (f ...)
//!   (lambda (msg)
//!     (if (eq? msg 'm_1) ((lambda () body_1))
//!         (if (eq? msg 'm_2) ((lambda () body_2))
//!             #f))))
//! ```
//!
//! Methods are tested in declaration order and an unmatched message yields
//! `#f`. Methods are invoked with no arguments, so the rewrite is faithful for
//! zero-parameter methods only; a method with parameters is applied to nothing
//! and fails with an ArityError when selected.

use crate::ast::{Binding, CExp, ClassExp, DefineExp, Exp, Method, ProcExp, Program};
use crate::builtinops::EQ;
use crate::value::Value;

/// Name of the dispatcher parameter in generated code
pub const MESSAGE_PARAM: &str = "msg";

/// Rewrite one class into its dispatcher procedure.
///
/// Method bodies are taken as they are; use [`lex_transform_cexp`] to also
/// rewrite classes nested inside them.
pub fn class_to_proc(class: &ClassExp) -> ProcExp {
    let dispatch = class
        .methods
        .iter()
        .rev()
        .fold(CExp::Bool(false), |otherwise, Method { name, proc }| {
            CExp::if_exp(
                CExp::app(
                    CExp::PrimOp(&EQ),
                    vec![
                        CExp::var_ref(MESSAGE_PARAM),
                        CExp::Lit(Value::Symbol(name.clone())),
                    ],
                ),
                CExp::app(CExp::Proc(proc.clone()), vec![]),
                otherwise,
            )
        });

    ProcExp {
        params: class.fields.clone(),
        body: vec![CExp::proc_exp(vec![MESSAGE_PARAM.into()], vec![dispatch])],
    }
}

/// Rewrite every class in a compound expression, innermost first
pub fn lex_transform_cexp(exp: &CExp) -> CExp {
    match exp {
        CExp::Num(_)
        | CExp::Bool(_)
        | CExp::Str(_)
        | CExp::PrimOp(_)
        | CExp::VarRef(_)
        | CExp::Lit(_) => exp.clone(),
        CExp::If { test, then, alt } => CExp::if_exp(
            lex_transform_cexp(test),
            lex_transform_cexp(then),
            lex_transform_cexp(alt),
        ),
        CExp::Proc(proc) => CExp::Proc(transform_proc(proc)),
        CExp::App { rator, rands } => CExp::app(lex_transform_cexp(rator), transform_all(rands)),
        CExp::Let { bindings, body } => CExp::Let {
            bindings: bindings
                .iter()
                .map(|Binding { var, val }| Binding {
                    var: var.clone(),
                    val: lex_transform_cexp(val),
                })
                .collect(),
            body: transform_all(body),
        },
        CExp::Class(class) => {
            let methods = class
                .methods
                .iter()
                .map(|Method { name, proc }| Method {
                    name: name.clone(),
                    proc: transform_proc(proc),
                })
                .collect();
            let rewritten = class_to_proc(&ClassExp {
                fields: class.fields.clone(),
                methods,
            });
            tracing::debug!(fields = ?class.fields, "rewrote class as {rewritten}");
            CExp::Proc(rewritten)
        }
    }
}

fn transform_proc(proc: &ProcExp) -> ProcExp {
    ProcExp {
        params: proc.params.clone(),
        body: transform_all(&proc.body),
    }
}

fn transform_all(exps: &[CExp]) -> Vec<CExp> {
    exps.iter().map(lex_transform_cexp).collect()
}

pub fn lex_transform_exp(exp: &Exp) -> Exp {
    match exp {
        Exp::Define(DefineExp { var, val }) => Exp::Define(DefineExp {
            var: var.clone(),
            val: lex_transform_cexp(val),
        }),
        Exp::CExp(cexp) => Exp::CExp(lex_transform_cexp(cexp)),
    }
}

/// Rewrite a whole program so that it contains no `class` expression
pub fn lex_transform(program: &Program) -> Program {
    Program {
        exps: program.exps.iter().map(lex_transform_exp).collect(),
    }
}

/// True when no `class` form remains anywhere in `exp`
pub fn is_class_free(exp: &CExp) -> bool {
    match exp {
        CExp::Class(_) => false,
        CExp::If { test, then, alt } => {
            is_class_free(test) && is_class_free(then) && is_class_free(alt)
        }
        CExp::Proc(proc) => proc.body.iter().all(is_class_free),
        CExp::App { rator, rands } => is_class_free(rator) && rands.iter().all(is_class_free),
        CExp::Let { bindings, body } => {
            bindings.iter().all(|b| is_class_free(&b.val)) && body.iter().all(is_class_free)
        }
        CExp::Num(_)
        | CExp::Bool(_)
        | CExp::Str(_)
        | CExp::PrimOp(_)
        | CExp::VarRef(_)
        | CExp::Lit(_) => true,
    }
}

#[cfg(all(test, feature = "scheme"))]
#[expect(clippy::unwrap_used)] // test code OK
mod tests {
    use super::*;
    use crate::scheme::{parse_l3, parse_l3_exp_str};

    fn transform_str(source: &str) -> String {
        let Exp::CExp(exp) = parse_l3_exp_str(source).unwrap() else {
            panic!("expected an expression: {source}");
        };
        lex_transform_cexp(&exp).to_string()
    }

    #[test]
    fn test_pair_class() {
        assert_eq!(
            transform_str("(class (a b) ((first (lambda () a)) (second (lambda () b))))"),
            "(lambda (a b) (lambda (msg) \
             (if (eq? msg 'first) ((lambda () a)) \
             (if (eq? msg 'second) ((lambda () b)) #f))))"
        );
    }

    #[test]
    fn test_no_methods() {
        assert_eq!(
            transform_str("(class (x) ())"),
            "(lambda (x) (lambda (msg) #f))"
        );
    }

    #[test]
    fn test_method_order_preserved() {
        let out =
            transform_str("(class () ((b (lambda () 1)) (a (lambda () 2)) (b (lambda () 3))))");
        assert_eq!(
            out,
            "(lambda () (lambda (msg) \
             (if (eq? msg 'b) ((lambda () 1)) \
             (if (eq? msg 'a) ((lambda () 2)) \
             (if (eq? msg 'b) ((lambda () 3)) #f)))))"
        );
    }

    #[test]
    fn test_nested_classes_rewritten() {
        let cases = [
            // Class inside a method body
            "(class (a) ((inner (lambda () (class (b) ((get (lambda () b))))))))",
            // Class as an operand, inside let and if
            "(let ((c (class (x) ((x (lambda () x)))))) (if #t (c 1) (f (class () ()))))",
            // Class in a lambda body
            "(lambda (y) ((class (v) ((v (lambda () v)))) y))",
        ];
        for source in cases {
            let Exp::CExp(exp) = parse_l3_exp_str(source).unwrap() else {
                panic!("expected an expression");
            };
            assert!(!is_class_free(&exp), "{source} has classes to rewrite");
            let out = lex_transform_cexp(&exp);
            assert!(is_class_free(&out), "{source} still contains a class: {out}");
        }
    }

    #[test]
    fn test_program_and_idempotence() {
        let program = parse_l3(
            "(L3 (define pair (class (a b) ((first (lambda () a))))) \
             (define p (pair 1 2)) (p 'first))",
        )
        .unwrap();
        let once = lex_transform(&program);
        assert_eq!(
            once.to_string(),
            "(L3 (define pair (lambda (a b) (lambda (msg) \
             (if (eq? msg 'first) ((lambda () a)) #f)))) \
             (define p (pair 1 2)) (p 'first))"
        );
        assert_eq!(lex_transform(&once), once);
    }

    #[test]
    fn test_output_reparses() {
        let program = parse_l3("(L3 (class (a b) ((sum (lambda () (+ a b))))))").unwrap();
        let out = lex_transform(&program);
        assert_eq!(parse_l3(&out.to_string()).unwrap(), out);
    }
}
