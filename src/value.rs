//! Runtime values shared by both evaluators.
//!
//! Procedures come in two shapes depending on who created them: the
//! environment evaluator stores the defining [`Env`] in closures, classes and
//! objects, the substitution evaluator leaves it empty because free variables
//! have already been replaced by terms. Compound values are reference counted so
//! cloning a `Value` never copies a body or an environment chain.

use crate::ast::{CExp, Method, NumberType};
use crate::builtinops::PrimOp;
use crate::environment::Env;
use std::fmt;
use std::sync::Arc;

/// Core runtime value type
#[derive(Clone)]
pub enum Value {
    Number(NumberType),
    Bool(bool),
    String(String),
    Symbol(String),
    /// Quoted compound data; the empty list is `List(vec![])`
    List(Vec<Value>),
    PrimOp(&'static PrimOp),
    Closure(Arc<Closure>),
    Class(Arc<Class>),
    Object(Arc<Object>),
}

/// A user procedure
pub struct Closure {
    pub params: Vec<String>,
    pub body: Vec<CExp>,
    /// Captured environment (environment model only)
    pub env: Option<Env>,
}

/// Result of evaluating a `class` expression
pub struct Class {
    pub fields: Vec<String>,
    pub methods: Vec<Method>,
    /// Defining environment (environment model only)
    pub env: Option<Env>,
}

/// Instance of a [`Class`]
pub struct Object {
    pub class: Arc<Class>,
    /// Field values, positionally aligned with `class.fields`
    pub fields: Vec<Value>,
    /// `fields` bound on top of the class's environment (environment model only)
    pub env: Option<Env>,
}

impl Value {
    pub fn closure(params: Vec<String>, body: Vec<CExp>, env: Option<Env>) -> Self {
        Value::Closure(Arc::new(Closure { params, body, env }))
    }

    pub fn class(fields: Vec<String>, methods: Vec<Method>, env: Option<Env>) -> Self {
        Value::Class(Arc::new(Class {
            fields,
            methods,
            env,
        }))
    }

    pub fn object(class: Arc<Class>, fields: Vec<Value>, env: Option<Env>) -> Self {
        Value::Object(Arc::new(Object { class, fields, env }))
    }

    /// Every value except `#f` counts as true
    pub fn is_true(&self) -> bool {
        !matches!(self, Value::Bool(false))
    }

    /// Check if a value represents nil (empty list)
    pub fn is_nil(&self) -> bool {
        matches!(self, Value::List(list) if list.is_empty())
    }
}

impl Class {
    /// First method named `name`, in declaration order
    pub fn find_method(&self, name: &str) -> Option<&Method> {
        self.methods.iter().find(|method| method.name == name)
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Number(n) => write!(f, "Number({n})"),
            Value::Bool(b) => write!(f, "Bool({b})"),
            Value::String(s) => write!(f, "String({s:?})"),
            Value::Symbol(s) => write!(f, "Symbol({s})"),
            Value::List(list) => f.debug_tuple("List").field(list).finish(),
            Value::PrimOp(op) => write!(f, "PrimOp({})", op.name),
            Value::Closure(closure) => write!(
                f,
                "Closure(params={:?}, body={}, env={})",
                closure.params,
                BodyDisplay(&closure.body),
                closure.env.is_some()
            ),
            Value::Class(class) => write!(f, "Class(fields={:?})", class.fields),
            Value::Object(object) => write!(
                f,
                "Object(fields={:?}, values={:?})",
                object.class.fields, object.fields
            ),
        }
    }
}

struct BodyDisplay<'a>(&'a [CExp]);

impl fmt::Display for BodyDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, exp) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, " ")?;
            }
            write!(f, "{exp}")?;
        }
        Ok(())
    }
}

/// Write `s` as a double-quoted literal with escapes
pub(crate) fn write_string_literal(f: &mut fmt::Formatter<'_>, s: &str) -> fmt::Result {
    write!(f, "\"")?;
    for ch in s.chars() {
        match ch {
            '"' => write!(f, "\\\"")?,
            '\\' => write!(f, "\\\\")?,
            '\n' => write!(f, "\\n")?,
            '\t' => write!(f, "\\t")?,
            '\r' => write!(f, "\\r")?,
            c => write!(f, "{c}")?,
        }
    }
    write!(f, "\"")
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Number(n) => write!(f, "{n}"),
            Value::Bool(b) => write!(f, "{}", if *b { "#t" } else { "#f" }),
            Value::String(s) => write_string_literal(f, s),
            Value::Symbol(s) => write!(f, "{s}"),
            Value::List(elements) => {
                write!(f, "(")?;
                for (i, elem) in elements.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{elem}")?;
                }
                write!(f, ")")
            }
            Value::PrimOp(op) => write!(f, "{}", op.name),
            Value::Closure(closure) => {
                write!(f, "<Closure (")?;
                for (i, param) in closure.params.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{param}")?;
                }
                write!(f, ") {}>", BodyDisplay(&closure.body))
            }
            Value::Class(_) => write!(f, "Class"),
            Value::Object(_) => write!(f, "Object"),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Symbol(a), Value::Symbol(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            (Value::PrimOp(a), Value::PrimOp(b)) => a.name == b.name,
            (Value::Closure(a), Value::Closure(b)) => {
                Arc::ptr_eq(a, b)
                    || (a.params == b.params && a.body == b.body && same_env(&a.env, &b.env))
            }
            (Value::Class(a), Value::Class(b)) => Arc::ptr_eq(a, b) || a == b,
            (Value::Object(a), Value::Object(b)) => {
                Arc::ptr_eq(a, b) || (a.class == b.class && a.fields == b.fields)
            }
            _ => false,
        }
    }
}

/// Procedures are equal when their code matches and they captured the very
/// same environment
impl PartialEq for Class {
    fn eq(&self, other: &Self) -> bool {
        self.fields == other.fields
            && self.methods == other.methods
            && same_env(&self.env, &other.env)
    }
}

fn same_env(a: &Option<Env>, b: &Option<Env>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => a.ptr_eq(b),
        (None, None) => true,
        _ => false,
    }
}

// From trait implementations for Value - enables .into() conversion
impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<NumberType> for Value {
    fn from(n: NumberType) -> Self {
        Value::Number(n)
    }
}

macro_rules! impl_from_integer {
    ($int_type:ty) => {
        impl From<$int_type> for Value {
            fn from(n: $int_type) -> Self {
                Value::Number(NumberType::from(n))
            }
        }
    };
}

impl_from_integer!(i8);
impl_from_integer!(i16);
impl_from_integer!(i32);
impl_from_integer!(u8);
impl_from_integer!(u16);
impl_from_integer!(u32);

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self {
        Value::List(v.into_iter().map(|x| x.into()).collect())
    }
}

impl<T: Into<Value>, const N: usize> From<[T; N]> for Value {
    fn from(arr: [T; N]) -> Self {
        Value::List(arr.into_iter().map(|x| x.into()).collect())
    }
}

/// Helper function for creating symbols in tests
#[cfg(test)]
pub(crate) fn sym<S: AsRef<str>>(name: S) -> Value {
    Value::Symbol(name.as_ref().to_owned())
}

/// Helper function for creating Values in tests
#[cfg(test)]
pub(crate) fn val<T: Into<Value>>(value: T) -> Value {
    value.into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::ProcExp;

    #[test]
    fn test_helper_functions_data_driven() {
        let test_cases = vec![
            (val(42), Value::Number(42.0)),
            (val(-17), Value::Number(-17.0)),
            (val(2.5), Value::Number(2.5)),
            (val(255u8), Value::Number(255.0)),
            (val(true), Value::Bool(true)),
            (val("hello"), Value::String("hello".to_owned())),
            (sym("first"), Value::Symbol("first".to_owned())),
            (
                val([1, 2, 3]),
                Value::List(vec![
                    Value::Number(1.0),
                    Value::Number(2.0),
                    Value::Number(3.0),
                ]),
            ),
            (
                val(vec![sym("op"), val(1)]),
                Value::List(vec![Value::Symbol("op".into()), Value::Number(1.0)]),
            ),
        ];

        for (i, (actual, expected)) in test_cases.iter().enumerate() {
            assert_eq!(actual, expected, "Test case {} failed", i + 1);
        }
    }

    #[test]
    fn test_display() {
        let cases = vec![
            (val(3), "3"),
            (val(3.5), "3.5"),
            (val(-2), "-2"),
            (val(true), "#t"),
            (val(false), "#f"),
            (val("a\"b"), "\"a\\\"b\""),
            (sym("first"), "first"),
            (val(vec![sym("a"), val(1)]), "(a 1)"),
            (Value::List(vec![]), "()"),
            (Value::class(vec!["a".into()], vec![], None), "Class"),
            (
                Value::closure(vec!["x".into()], vec![CExp::var_ref("x")], None),
                "<Closure (x) x>",
            ),
        ];
        for (value, expected) in cases {
            assert_eq!(value.to_string(), expected);
        }
    }

    #[test]
    fn test_truthiness() {
        assert!(!val(false).is_true());
        assert!(val(true).is_true());
        assert!(val(0).is_true());
        assert!(Value::List(vec![]).is_true());
        assert!(val("").is_true());
    }

    #[test]
    fn test_find_method_first_match_wins() {
        let method = |name: &str, n: i32| Method {
            name: name.into(),
            proc: ProcExp {
                params: vec![],
                body: vec![CExp::Num(n.into())],
            },
        };
        let class = Class {
            fields: vec![],
            methods: vec![method("get", 1), method("other", 2), method("get", 3)],
            env: None,
        };
        let Some(found) = class.find_method("get") else {
            panic!("get must be found");
        };
        assert_eq!(found.proc.body, vec![CExp::Num(1.0)]);
        assert!(class.find_method("missing").is_none());
    }

    #[test]
    fn test_object_equality() {
        let class = Arc::new(Class {
            fields: vec!["a".into()],
            methods: vec![],
            env: None,
        });
        let o1 = Value::object(class.clone(), vec![val(1)], None);
        let o2 = Value::object(class.clone(), vec![val(1)], None);
        let o3 = Value::object(class, vec![val(2)], None);
        assert_eq!(o1, o2);
        assert_ne!(o1, o3);
        assert_eq!(o1.to_string(), "Object");
    }
}
