//! This module defines the Abstract Syntax Tree of L3 programs and its unparser.
//! A [`Program`] is a sequence of [`Exp`]s; only the top level may contain
//! `define`, everything else is a compound expression ([`CExp`]). Literal values
//! that have to be put back into term position (quoted data, or values produced
//! by the substitution evaluator) are carried by [`CExp::Lit`].
//!
//! `Display` renders every node as re-parseable L3 text, which is how the
//! output of the lexical transformer is shown to users.

use crate::builtinops::PrimOp;
use crate::value::{Value, write_string_literal};
use std::fmt;

/// Type alias for number values in interpreter
pub type NumberType = f64;

/// Allowed non-alphanumeric characters in symbol names
pub(crate) const SYMBOL_SPECIAL_CHARS: &str = "+-*/<>=!?_$.";

/// Check if a string is a valid symbol name
/// Valid: non-empty, no leading digit, no "-digit" prefix, alphanumeric + SYMBOL_SPECIAL_CHARS
pub(crate) fn is_valid_symbol(name: &str) -> bool {
    let mut chars = name.chars();

    match chars.next() {
        None => false,
        Some(first_char) => {
            if first_char.is_ascii_digit() {
                return false;
            }

            if first_char == '-'
                && let Some(second_char) = chars.next()
                && second_char.is_ascii_digit()
            {
                return false;
            }

            name.chars()
                .all(|c| c.is_alphanumeric() || SYMBOL_SPECIAL_CHARS.contains(c))
        }
    }
}

/// A whole program: `(L3 exp ...)`
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    pub exps: Vec<Exp>,
}

/// A top-level expression
#[derive(Debug, Clone, PartialEq)]
pub enum Exp {
    Define(DefineExp),
    CExp(CExp),
}

/// `(define var val)`
#[derive(Debug, Clone, PartialEq)]
pub struct DefineExp {
    pub var: String,
    pub val: CExp,
}

/// Compound (non-definition) expressions
#[derive(Debug, Clone, PartialEq)]
pub enum CExp {
    Num(NumberType),
    Bool(bool),
    Str(String),
    PrimOp(&'static PrimOp),
    VarRef(String),
    /// Quoted datum, or a runtime value re-expressed as a term
    Lit(Value),
    If {
        test: Box<CExp>,
        then: Box<CExp>,
        alt: Box<CExp>,
    },
    Proc(ProcExp),
    App {
        rator: Box<CExp>,
        rands: Vec<CExp>,
    },
    Let {
        bindings: Vec<Binding>,
        body: Vec<CExp>,
    },
    Class(ClassExp),
}

/// `(lambda (params ...) body ...)`, body is never empty once parsed
#[derive(Debug, Clone, PartialEq)]
pub struct ProcExp {
    pub params: Vec<String>,
    pub body: Vec<CExp>,
}

/// A `let` binding `(var val)`
#[derive(Debug, Clone, PartialEq)]
pub struct Binding {
    pub var: String,
    pub val: CExp,
}

/// A class method `(name (lambda ...))`
#[derive(Debug, Clone, PartialEq)]
pub struct Method {
    pub name: String,
    pub proc: ProcExp,
}

/// `(class (fields ...) ((method (lambda ...)) ...))`
#[derive(Debug, Clone, PartialEq)]
pub struct ClassExp {
    pub fields: Vec<String>,
    pub methods: Vec<Method>,
}

impl CExp {
    pub fn var_ref(name: impl Into<String>) -> Self {
        CExp::VarRef(name.into())
    }

    pub fn app(rator: CExp, rands: Vec<CExp>) -> Self {
        CExp::App {
            rator: Box::new(rator),
            rands,
        }
    }

    pub fn if_exp(test: CExp, then: CExp, alt: CExp) -> Self {
        CExp::If {
            test: Box::new(test),
            then: Box::new(then),
            alt: Box::new(alt),
        }
    }

    pub fn proc_exp(params: Vec<String>, body: Vec<CExp>) -> Self {
        CExp::Proc(ProcExp { params, body })
    }
}

impl From<CExp> for Exp {
    fn from(exp: CExp) -> Self {
        Exp::CExp(exp)
    }
}

fn write_separated<T: fmt::Display>(f: &mut fmt::Formatter<'_>, items: &[T]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            write!(f, " ")?;
        }
        write!(f, "{item}")?;
    }
    Ok(())
}

impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(L3")?;
        for exp in &self.exps {
            write!(f, " {exp}")?;
        }
        write!(f, ")")
    }
}

impl fmt::Display for Exp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Exp::Define(DefineExp { var, val }) => write!(f, "(define {var} {val})"),
            Exp::CExp(exp) => write!(f, "{exp}"),
        }
    }
}

impl fmt::Display for ProcExp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(lambda (")?;
        write_separated(f, &self.params)?;
        write!(f, ") ")?;
        write_separated(f, &self.body)?;
        write!(f, ")")
    }
}

impl fmt::Display for ClassExp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(class (")?;
        write_separated(f, &self.fields)?;
        write!(f, ") (")?;
        for (i, method) in self.methods.iter().enumerate() {
            if i > 0 {
                write!(f, " ")?;
            }
            write!(f, "({} {})", method.name, method.proc)?;
        }
        write!(f, "))")
    }
}

impl fmt::Display for CExp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CExp::Num(n) => write!(f, "{n}"),
            CExp::Bool(b) => write!(f, "{}", if *b { "#t" } else { "#f" }),
            CExp::Str(s) => write_string_literal(f, s),
            CExp::PrimOp(op) => write!(f, "{}", op.name),
            CExp::VarRef(name) => write!(f, "{name}"),
            CExp::Lit(value @ (Value::Symbol(_) | Value::List(_))) => write!(f, "'{value}"),
            CExp::Lit(value) => write!(f, "{value}"),
            CExp::If { test, then, alt } => write!(f, "(if {test} {then} {alt})"),
            CExp::Proc(proc) => write!(f, "{proc}"),
            CExp::App { rator, rands } => {
                write!(f, "({rator}")?;
                for rand in rands {
                    write!(f, " {rand}")?;
                }
                write!(f, ")")
            }
            CExp::Let { bindings, body } => {
                write!(f, "(let (")?;
                for (i, Binding { var, val }) in bindings.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "({var} {val})")?;
                }
                write!(f, ") ")?;
                write_separated(f, body)?;
                write!(f, ")")
            }
            CExp::Class(class) => write!(f, "{class}"),
        }
    }
}
