//! Built-in primitive operations.
//!
//! Primitives are resolved by name at parse time: a symbol such as `+` or
//! `eq?` in operator or operand position becomes a [`CExp::PrimOp`] node that
//! evaluates to itself. Both evaluators hand primitive applications to
//! [`apply_primitive`] and return its errors untouched.
//!
//! ```scheme
//! (+ 1 2 3)          ; 6
//! (eq? 'first msg)   ; symbol comparison used by desugared classes
//! (cons 1 '(2 3))    ; (1 2 3)
//! ```
//!
//! ## Adding New Operations
//!
//! 1. **Implement the function** with the signature
//!    `fn(args: &[Value]) -> Result<Value, Error>`
//! 2. **Add to BUILTIN_OPS** with its identifier and arity
//! 3. **Add test cases** to the table in this module
//!
//! [`CExp::PrimOp`]: crate::ast::CExp::PrimOp

use crate::Error;
use crate::ast::NumberType;
use crate::value::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::LazyLock;

/// Number of arguments accepted by a primitive
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    Exact(usize),
    AtLeast(usize),
    Any,
}

impl Arity {
    pub fn validate(&self, arg_count: usize) -> Result<(), Error> {
        match *self {
            Arity::Exact(n) if arg_count != n => Err(Error::arity_error(n, arg_count)),
            Arity::AtLeast(n) if arg_count < n => Err(Error::arity_error(n, arg_count)),
            _ => Ok(()),
        }
    }
}

/// Definition of a primitive operation
pub struct PrimOp {
    pub name: &'static str,
    pub arity: Arity,
    func: fn(&[Value]) -> Result<Value, Error>,
}

impl PrimOp {
    /// Apply the primitive after checking arity
    pub fn apply(&self, args: &[Value]) -> Result<Value, Error> {
        self.arity.validate(args.len())?;
        (self.func)(args)
    }
}

impl fmt::Debug for PrimOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PrimOp({})", self.name)
    }
}

impl PartialEq for PrimOp {
    fn eq(&self, other: &Self) -> bool {
        // Names uniquely identify primitives
        self.name == other.name
    }
}

/// Apply a primitive to already evaluated arguments
pub fn apply_primitive(op: &PrimOp, args: &[Value]) -> Result<Value, Error> {
    tracing::trace!(primitive = op.name, argc = args.len(), "apply primitive");
    op.apply(args)
}

fn type_error(message: impl fmt::Display) -> Error {
    Error::Primitive(format!("Type error: {message}"))
}

fn numbers(name: &str, args: &[Value]) -> Result<Vec<NumberType>, Error> {
    args.iter()
        .map(|arg| match arg {
            Value::Number(n) => Ok(*n),
            other => Err(type_error(format!("{name} expects numbers, got {other}"))),
        })
        .collect()
}

fn booleans(name: &str, args: &[Value]) -> Result<Vec<bool>, Error> {
    args.iter()
        .map(|arg| match arg {
            Value::Bool(b) => Ok(*b),
            other => Err(type_error(format!("{name} expects booleans, got {other}"))),
        })
        .collect()
}

//
// Builtin Function Implementations
//

fn builtin_add(args: &[Value]) -> Result<Value, Error> {
    Ok(Value::Number(numbers("+", args)?.into_iter().sum()))
}

fn builtin_mul(args: &[Value]) -> Result<Value, Error> {
    Ok(Value::Number(numbers("*", args)?.into_iter().product()))
}

fn builtin_sub(args: &[Value]) -> Result<Value, Error> {
    match numbers("-", args)?.as_slice() {
        [only] => Ok(Value::Number(-only)),
        [first, rest @ ..] => Ok(Value::Number(rest.iter().fold(*first, |acc, n| acc - n))),
        [] => Err(Error::arity_error(1, 0)),
    }
}

fn builtin_div(args: &[Value]) -> Result<Value, Error> {
    let nums = numbers("/", args)?;
    let (first, rest) = match nums.as_slice() {
        [only] => (1.0, std::slice::from_ref(only)),
        [first, rest @ ..] => (*first, rest),
        [] => return Err(Error::arity_error(1, 0)),
    };
    let mut result = first;
    for n in rest {
        if *n == 0.0 {
            return Err(Error::Primitive("Division by zero".into()));
        }
        result /= n;
    }
    Ok(Value::Number(result))
}

// Macro to generate chained numeric comparison functions
macro_rules! numeric_comparison {
    ($name:ident, $op:tt, $op_str:expr) => {
        fn $name(args: &[Value]) -> Result<Value, Error> {
            let nums = numbers($op_str, args)?;
            Ok(Value::Bool(nums.windows(2).all(|pair| pair[0] $op pair[1])))
        }
    };
}

numeric_comparison!(builtin_num_eq, ==, "=");
numeric_comparison!(builtin_lt, <, "<");
numeric_comparison!(builtin_gt, >, ">");
numeric_comparison!(builtin_le, <=, "<=");
numeric_comparison!(builtin_ge, >=, ">=");

fn builtin_not(args: &[Value]) -> Result<Value, Error> {
    Ok(Value::Bool(!args[0].is_true()))
}

fn builtin_and(args: &[Value]) -> Result<Value, Error> {
    Ok(Value::Bool(booleans("and", args)?.into_iter().all(|b| b)))
}

fn builtin_or(args: &[Value]) -> Result<Value, Error> {
    Ok(Value::Bool(booleans("or", args)?.into_iter().any(|b| b)))
}

/// Identity on atoms and `()`. Procedures, classes and objects are the same
/// when their code and captured environment are, so a value compares equal to
/// itself after being re-expressed as a term.
fn builtin_eq(args: &[Value]) -> Result<Value, Error> {
    let same = match (&args[0], &args[1]) {
        (Value::Number(a), Value::Number(b)) => a == b,
        (Value::Bool(a), Value::Bool(b)) => a == b,
        (Value::String(a), Value::String(b)) => a == b,
        (Value::Symbol(a), Value::Symbol(b)) => a == b,
        (Value::List(a), Value::List(b)) => a.is_empty() && b.is_empty(),
        (Value::PrimOp(a), Value::PrimOp(b)) => a.name == b.name,
        (Value::Closure(_), Value::Closure(_))
        | (Value::Class(_), Value::Class(_))
        | (Value::Object(_), Value::Object(_)) => args[0] == args[1],
        _ => false,
    };
    Ok(Value::Bool(same))
}

fn builtin_string_eq(args: &[Value]) -> Result<Value, Error> {
    match (&args[0], &args[1]) {
        (Value::String(a), Value::String(b)) => Ok(Value::Bool(a == b)),
        _ => Err(type_error("string=? expects strings")),
    }
}

fn builtin_car(args: &[Value]) -> Result<Value, Error> {
    match &args[0] {
        Value::List(list) => list
            .first()
            .cloned()
            .ok_or_else(|| Error::Primitive("car of empty list".into())),
        other => Err(type_error(format!("car expects a list, got {other}"))),
    }
}

fn builtin_cdr(args: &[Value]) -> Result<Value, Error> {
    match &args[0] {
        Value::List(list) if list.is_empty() => Err(Error::Primitive("cdr of empty list".into())),
        Value::List(list) => Ok(Value::List(list[1..].to_vec())),
        other => Err(type_error(format!("cdr expects a list, got {other}"))),
    }
}

fn builtin_cons(args: &[Value]) -> Result<Value, Error> {
    match &args[1] {
        Value::List(tail) => {
            let mut new_list = Vec::with_capacity(tail.len() + 1);
            new_list.push(args[0].clone());
            new_list.extend_from_slice(tail);
            Ok(Value::List(new_list))
        }
        // Improper lists are not representable
        _ => Err(type_error("cons requires a list as second argument")),
    }
}

fn builtin_list(args: &[Value]) -> Result<Value, Error> {
    Ok(Value::List(args.to_vec()))
}

macro_rules! type_predicate {
    ($name:ident, $pattern:pat) => {
        fn $name(args: &[Value]) -> Result<Value, Error> {
            Ok(Value::Bool(matches!(&args[0], $pattern)))
        }
    };
}

type_predicate!(builtin_is_number, Value::Number(_));
type_predicate!(builtin_is_boolean, Value::Bool(_));
type_predicate!(builtin_is_string, Value::String(_));
type_predicate!(builtin_is_symbol, Value::Symbol(_));
type_predicate!(builtin_is_list, Value::List(_));

fn builtin_is_pair(args: &[Value]) -> Result<Value, Error> {
    Ok(Value::Bool(
        matches!(&args[0], Value::List(list) if !list.is_empty()),
    ))
}

fn builtin_is_null(args: &[Value]) -> Result<Value, Error> {
    Ok(Value::Bool(args[0].is_nil()))
}

const EQ_OP: PrimOp = PrimOp {
    name: "eq?",
    arity: Arity::Exact(2),
    func: builtin_eq,
};

/// `eq?`, referenced directly by generated dispatch code
pub static EQ: PrimOp = EQ_OP;

/// Global registry of all primitive operations.
static BUILTIN_OPS: &[PrimOp] = &[
    // Arithmetic operations
    PrimOp {
        name: "+",
        arity: Arity::Any,
        func: builtin_add,
    },
    PrimOp {
        name: "-",
        arity: Arity::AtLeast(1),
        func: builtin_sub,
    },
    PrimOp {
        name: "*",
        arity: Arity::Any,
        func: builtin_mul,
    },
    PrimOp {
        name: "/",
        arity: Arity::AtLeast(1),
        func: builtin_div,
    },
    // Comparison operations
    PrimOp {
        name: "=",
        arity: Arity::AtLeast(2),
        func: builtin_num_eq,
    },
    PrimOp {
        name: "<",
        arity: Arity::AtLeast(2),
        func: builtin_lt,
    },
    PrimOp {
        name: ">",
        arity: Arity::AtLeast(2),
        func: builtin_gt,
    },
    PrimOp {
        name: "<=",
        arity: Arity::AtLeast(2),
        func: builtin_le,
    },
    PrimOp {
        name: ">=",
        arity: Arity::AtLeast(2),
        func: builtin_ge,
    },
    EQ_OP,
    PrimOp {
        name: "string=?",
        arity: Arity::Exact(2),
        func: builtin_string_eq,
    },
    // Logical operations
    PrimOp {
        name: "not",
        arity: Arity::Exact(1),
        func: builtin_not,
    },
    PrimOp {
        name: "and",
        arity: Arity::Any,
        func: builtin_and,
    },
    PrimOp {
        name: "or",
        arity: Arity::Any,
        func: builtin_or,
    },
    // List operations
    PrimOp {
        name: "cons",
        arity: Arity::Exact(2),
        func: builtin_cons,
    },
    PrimOp {
        name: "car",
        arity: Arity::Exact(1),
        func: builtin_car,
    },
    PrimOp {
        name: "cdr",
        arity: Arity::Exact(1),
        func: builtin_cdr,
    },
    PrimOp {
        name: "list",
        arity: Arity::Any,
        func: builtin_list,
    },
    // Type predicates
    PrimOp {
        name: "number?",
        arity: Arity::Exact(1),
        func: builtin_is_number,
    },
    PrimOp {
        name: "boolean?",
        arity: Arity::Exact(1),
        func: builtin_is_boolean,
    },
    PrimOp {
        name: "string?",
        arity: Arity::Exact(1),
        func: builtin_is_string,
    },
    PrimOp {
        name: "symbol?",
        arity: Arity::Exact(1),
        func: builtin_is_symbol,
    },
    PrimOp {
        name: "list?",
        arity: Arity::Exact(1),
        func: builtin_is_list,
    },
    PrimOp {
        name: "pair?",
        arity: Arity::Exact(1),
        func: builtin_is_pair,
    },
    PrimOp {
        name: "null?",
        arity: Arity::Exact(1),
        func: builtin_is_null,
    },
];

/// Lazy static map from name to PrimOp (private - use find_primitive)
static BUILTIN_BY_NAME: LazyLock<HashMap<&'static str, &'static PrimOp>> =
    LazyLock::new(|| BUILTIN_OPS.iter().map(|op| (op.name, op)).collect());

/// Get all primitive operations
pub fn get_builtin_ops() -> &'static [PrimOp] {
    BUILTIN_OPS
}

/// Find a primitive operation by name
pub fn find_primitive(name: &str) -> Option<&'static PrimOp> {
    BUILTIN_BY_NAME.get(name).copied()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::{sym, val};

    fn call_builtin(name: &str, args: &[Value]) -> Result<Value, Error> {
        let Some(op) = find_primitive(name) else {
            panic!("builtin not found: {name}");
        };
        apply_primitive(op, args)
    }

    #[test]
    fn test_registry() {
        let Some(not_op) = find_primitive("not") else {
            panic!("not must be registered");
        };
        assert_eq!(not_op.arity, Arity::Exact(1));
        assert!(find_primitive("unknown").is_none());
        assert!(find_primitive("lambda").is_none());

        // Names are unique
        let mut names: Vec<_> = get_builtin_ops().iter().map(|op| op.name).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), get_builtin_ops().len());
    }

    #[test]
    fn test_builtins_data_driven() {
        let nil = Value::List(vec![]);
        let test_cases: Vec<(&str, Vec<Value>, Option<Value>)> = vec![
            // Arithmetic
            ("+", vec![val(1), val(2), val(3)], Some(val(6))),
            ("+", vec![], Some(val(0))),
            ("+", vec![val(1), val("x")], None),
            ("-", vec![val(10), val(3), val(2)], Some(val(5))),
            ("-", vec![val(4)], Some(val(-4))),
            ("-", vec![], None),
            ("*", vec![val(2), val(3), val(4)], Some(val(24))),
            ("*", vec![], Some(val(1))),
            ("/", vec![val(8), val(2)], Some(val(4))),
            ("/", vec![val(4)], Some(val(0.25))),
            ("/", vec![val(1), val(0)], None),
            // Comparison
            ("=", vec![val(3), val(3)], Some(val(true))),
            ("<", vec![val(1), val(2), val(3)], Some(val(true))),
            ("<", vec![val(1), val(3), val(2)], Some(val(false))),
            (">", vec![val(4), val(3)], Some(val(true))),
            ("<=", vec![val(3), val(3)], Some(val(true))),
            (">=", vec![val(2), val(3)], Some(val(false))),
            ("=", vec![val(1)], None),
            ("<", vec![val("a"), val(1)], None),
            // eq?
            ("eq?", vec![sym("first"), sym("first")], Some(val(true))),
            ("eq?", vec![sym("first"), sym("second")], Some(val(false))),
            ("eq?", vec![sym("a"), val("a")], Some(val(false))),
            ("eq?", vec![val(2), val(2)], Some(val(true))),
            ("eq?", vec![nil.clone(), nil.clone()], Some(val(true))),
            ("eq?", vec![val([1]), val([1])], Some(val(false))),
            ("string=?", vec![val("ab"), val("ab")], Some(val(true))),
            ("string=?", vec![val("ab"), sym("ab")], None),
            // Logic
            ("not", vec![val(false)], Some(val(true))),
            ("not", vec![val(0)], Some(val(false))),
            ("and", vec![val(true), val(false)], Some(val(false))),
            ("or", vec![val(false), val(true)], Some(val(true))),
            ("and", vec![val(1)], None),
            // Lists
            ("cons", vec![val(1), val([2, 3])], Some(val([1, 2, 3]))),
            ("cons", vec![val(1), val(2)], None),
            ("car", vec![val([1, 2])], Some(val(1))),
            ("car", vec![nil.clone()], None),
            ("cdr", vec![val([1, 2])], Some(val([2]))),
            ("cdr", vec![val(1)], None),
            ("list", vec![], Some(nil.clone())),
            // Predicates
            ("number?", vec![val(1)], Some(val(true))),
            ("boolean?", vec![val(1)], Some(val(false))),
            ("string?", vec![val("s")], Some(val(true))),
            ("symbol?", vec![sym("s")], Some(val(true))),
            ("list?", vec![nil.clone()], Some(val(true))),
            ("pair?", vec![nil.clone()], Some(val(false))),
            ("pair?", vec![val([1])], Some(val(true))),
            ("null?", vec![nil], Some(val(true))),
            // Arity
            ("not", vec![], None),
            ("eq?", vec![val(1)], None),
        ];

        for (i, (name, args, expected)) in test_cases.into_iter().enumerate() {
            let result = call_builtin(name, &args);
            match (result, expected) {
                (Ok(actual), Some(expected)) => {
                    assert_eq!(actual, expected, "case #{} ({name})", i + 1)
                }
                (Err(_), None) => {}
                (Ok(actual), None) => {
                    panic!("case #{} ({name}): expected error, got {actual}", i + 1)
                }
                (Err(err), Some(expected)) => {
                    panic!("case #{} ({name}): expected {expected}, got error {err}", i + 1)
                }
            }
        }
    }

    #[test]
    fn test_eq_on_procedures() {
        use crate::ast::CExp;
        use crate::environment::Env;

        let identity = |param: &str, env: Option<Env>| {
            Value::closure(vec![param.into()], vec![CExp::var_ref(param)], env)
        };
        let env = Env::empty().bind("x", val(1));
        let cases = [
            (identity("x", None), identity("x", None), true),
            (identity("x", None), identity("y", None), false),
            (identity("x", Some(env.clone())), identity("x", Some(env)), true),
            (
                identity("x", Some(Env::empty().bind("x", val(1)))),
                identity("x", Some(Env::empty().bind("x", val(1)))),
                false,
            ),
            (
                Value::class(vec!["a".into()], vec![], None),
                Value::class(vec!["a".into()], vec![], None),
                true,
            ),
            (Value::class(vec![], vec![], None), identity("x", None), false),
        ];
        for (i, (a, b, expected)) in cases.into_iter().enumerate() {
            assert_eq!(
                call_builtin("eq?", &[a, b]),
                Ok(val(expected)),
                "case #{}",
                i + 1
            );
        }
    }

    #[test]
    fn test_error_messages() {
        assert_eq!(
            call_builtin("+", &[val(1), val(true)]),
            Err(Error::Primitive("Type error: + expects numbers, got #t".into()))
        );
        assert_eq!(
            call_builtin("eq?", &[val(1)]),
            Err(Error::arity_error(2, 1))
        );
        assert_eq!(
            call_builtin("/", &[val(1), val(0)]),
            Err(Error::Primitive("Division by zero".into()))
        );
    }
}
