//! Term-level operations for the substitution evaluator.
//!
//! [`rename_proc`] gives every binder of a procedure a fresh name so that a
//! later [`substitute`] cannot capture free variables of the inserted terms.
//! [`value_to_lit_exp`] turns a runtime value back into a term that evaluates
//! to it.

use crate::ast::{Binding, CExp, ClassExp, Method, ProcExp};
use crate::value::Value;

/// Separator between a name and its renaming counter. The reader never accepts
/// it inside a symbol, so a renamed binder cannot collide with a source name.
pub const RENAME_MARK: char = '#';

/// Source of fresh variable names, owned by one evaluator
#[derive(Debug, Default)]
pub struct NameGenerator {
    counter: usize,
}

impl NameGenerator {
    pub fn new() -> Self {
        NameGenerator { counter: 0 }
    }

    /// `base#N` with a counter that never repeats within this generator.
    /// A previous `#N` suffix on `base` is replaced rather than extended.
    pub fn fresh(&mut self, base: &str) -> String {
        self.counter += 1;
        let stem = base.split_once(RENAME_MARK).map_or(base, |(stem, _)| stem);
        format!("{stem}{RENAME_MARK}{}", self.counter)
    }
}

/// Innermost-last list of (old name, new name) pairs
type Scope = Vec<(String, String)>;

fn fresh_binders(
    names: &[String],
    scope: &mut Scope,
    gen_names: &mut NameGenerator,
) -> Vec<String> {
    names
        .iter()
        .map(|name| {
            let fresh = gen_names.fresh(name);
            scope.push((name.clone(), fresh.clone()));
            fresh
        })
        .collect()
}

/// Rename the parameters of `proc` and every binder nested in its body
pub fn rename_proc(proc: &ProcExp, gen_names: &mut NameGenerator) -> ProcExp {
    rename_proc_in(proc, &mut Scope::new(), gen_names)
}

fn rename_proc_in(proc: &ProcExp, scope: &mut Scope, gen_names: &mut NameGenerator) -> ProcExp {
    let mark = scope.len();
    let params = fresh_binders(&proc.params, scope, gen_names);
    let body = rename_all(&proc.body, scope, gen_names);
    scope.truncate(mark);
    ProcExp { params, body }
}

fn rename_all(exps: &[CExp], scope: &mut Scope, gen_names: &mut NameGenerator) -> Vec<CExp> {
    exps.iter()
        .map(|exp| rename_cexp(exp, scope, gen_names))
        .collect()
}

fn rename_cexp(exp: &CExp, scope: &mut Scope, gen_names: &mut NameGenerator) -> CExp {
    match exp {
        CExp::VarRef(name) => match scope.iter().rev().find(|(old, _)| old == name) {
            Some((_, new)) => CExp::VarRef(new.clone()),
            None => exp.clone(),
        },
        CExp::Num(_) | CExp::Bool(_) | CExp::Str(_) | CExp::PrimOp(_) | CExp::Lit(_) => {
            exp.clone()
        }
        CExp::If { test, then, alt } => CExp::if_exp(
            rename_cexp(test, scope, gen_names),
            rename_cexp(then, scope, gen_names),
            rename_cexp(alt, scope, gen_names),
        ),
        CExp::Proc(proc) => CExp::Proc(rename_proc_in(proc, scope, gen_names)),
        CExp::App { rator, rands } => CExp::app(
            rename_cexp(rator, scope, gen_names),
            rename_all(rands, scope, gen_names),
        ),
        CExp::Let { bindings, body } => {
            // Values are outside the scope of the let variables
            let vals: Vec<CExp> = bindings
                .iter()
                .map(|b| rename_cexp(&b.val, scope, gen_names))
                .collect();
            let mark = scope.len();
            let vars: Vec<String> = bindings.iter().map(|b| b.var.clone()).collect();
            let vars = fresh_binders(&vars, scope, gen_names);
            let body = rename_all(body, scope, gen_names);
            scope.truncate(mark);
            CExp::Let {
                bindings: vars
                    .into_iter()
                    .zip(vals)
                    .map(|(var, val)| Binding { var, val })
                    .collect(),
                body,
            }
        }
        CExp::Class(class) => {
            let mark = scope.len();
            let fields = fresh_binders(&class.fields, scope, gen_names);
            let methods = class
                .methods
                .iter()
                .map(|Method { name, proc }| Method {
                    name: name.clone(),
                    proc: rename_proc_in(proc, scope, gen_names),
                })
                .collect();
            scope.truncate(mark);
            CExp::Class(ClassExp { fields, methods })
        }
    }
}

/// Replace free occurrences of `vars[i]` in `exps` with `terms[i]`.
///
/// Occurrences shadowed by a lambda parameter, `let` variable or class field
/// of the same name are left alone. Inserted terms are not renamed; callers
/// rename the target first when capture is possible.
pub fn substitute(exps: &[CExp], vars: &[String], terms: &[CExp]) -> Vec<CExp> {
    let subst: Vec<(&str, &CExp)> = vars.iter().map(String::as_str).zip(terms).collect();
    substitute_all(exps, &subst)
}

pub fn substitute_proc(proc: &ProcExp, vars: &[String], terms: &[CExp]) -> ProcExp {
    let subst: Vec<(&str, &CExp)> = vars.iter().map(String::as_str).zip(terms).collect();
    substitute_proc_in(proc, &subst)
}

fn without<'a>(subst: &[(&'a str, &'a CExp)], bound: &[String]) -> Vec<(&'a str, &'a CExp)> {
    subst
        .iter()
        .filter(|(var, _)| !bound.iter().any(|b| b == var))
        .copied()
        .collect()
}

fn substitute_all(exps: &[CExp], subst: &[(&str, &CExp)]) -> Vec<CExp> {
    exps.iter().map(|exp| substitute_cexp(exp, subst)).collect()
}

fn substitute_proc_in(proc: &ProcExp, subst: &[(&str, &CExp)]) -> ProcExp {
    ProcExp {
        params: proc.params.clone(),
        body: substitute_all(&proc.body, &without(subst, &proc.params)),
    }
}

fn substitute_cexp(exp: &CExp, subst: &[(&str, &CExp)]) -> CExp {
    if subst.is_empty() {
        return exp.clone();
    }
    match exp {
        CExp::VarRef(name) => match subst.iter().find(|(var, _)| var == name) {
            Some((_, term)) => (*term).clone(),
            None => exp.clone(),
        },
        CExp::Num(_) | CExp::Bool(_) | CExp::Str(_) | CExp::PrimOp(_) | CExp::Lit(_) => {
            exp.clone()
        }
        CExp::If { test, then, alt } => CExp::if_exp(
            substitute_cexp(test, subst),
            substitute_cexp(then, subst),
            substitute_cexp(alt, subst),
        ),
        CExp::Proc(proc) => CExp::Proc(substitute_proc_in(proc, subst)),
        CExp::App { rator, rands } => {
            CExp::app(substitute_cexp(rator, subst), substitute_all(rands, subst))
        }
        CExp::Let { bindings, body } => {
            let vars: Vec<String> = bindings.iter().map(|b| b.var.clone()).collect();
            CExp::Let {
                bindings: bindings
                    .iter()
                    .map(|Binding { var, val }| Binding {
                        var: var.clone(),
                        val: substitute_cexp(val, subst),
                    })
                    .collect(),
                body: substitute_all(body, &without(subst, &vars)),
            }
        }
        CExp::Class(class) => {
            let inner = without(subst, &class.fields);
            CExp::Class(ClassExp {
                fields: class.fields.clone(),
                methods: class
                    .methods
                    .iter()
                    .map(|Method { name, proc }| Method {
                        name: name.clone(),
                        proc: substitute_proc_in(proc, &inner),
                    })
                    .collect(),
            })
        }
    }
}

/// A term that evaluates to `value` without needing any environment
pub fn value_to_lit_exp(value: &Value) -> CExp {
    match value {
        Value::Number(n) => CExp::Num(*n),
        Value::Bool(b) => CExp::Bool(*b),
        Value::String(s) => CExp::Str(s.clone()),
        Value::PrimOp(op) => CExp::PrimOp(*op),
        Value::Closure(closure) => CExp::proc_exp(closure.params.clone(), closure.body.clone()),
        Value::Class(class) => CExp::Class(ClassExp {
            fields: class.fields.clone(),
            methods: class.methods.clone(),
        }),
        Value::Symbol(_) | Value::List(_) | Value::Object(_) => CExp::Lit(value.clone()),
    }
}
