//! Substitution-model evaluator.
//!
//! Procedures carry no environment. Applying one renames all of its binders,
//! converts the argument values back into terms and substitutes them for the
//! parameters before evaluating the body. The only environment in play is the
//! frame of top-level `define`s, which is where free names in a body are looked
//! up.

use crate::Error;
use crate::ast::{CExp, Exp, ProcExp, Program};
use crate::builtinops::apply_primitive;
use crate::environment::Env;
use crate::evaluator::Evaluator;
use crate::evaluator::substitute::{
    NameGenerator, rename_proc, substitute, substitute_proc, value_to_lit_exp,
};
use crate::value::{Class, Closure, Object, Value};
use std::sync::Arc;

#[derive(Debug, Default)]
pub struct SubstitutionEvaluator {
    names: NameGenerator,
}

impl SubstitutionEvaluator {
    pub fn new() -> Self {
        SubstitutionEvaluator {
            names: NameGenerator::new(),
        }
    }

    /// Evaluate a compound expression; `env` holds the top-level definitions
    pub fn eval(&mut self, exp: &CExp, env: &Env) -> Result<Value, Error> {
        match exp {
            CExp::Num(n) => Ok(Value::Number(*n)),
            CExp::Bool(b) => Ok(Value::Bool(*b)),
            CExp::Str(s) => Ok(Value::String(s.clone())),
            CExp::PrimOp(op) => Ok(Value::PrimOp(*op)),
            CExp::VarRef(name) => env.lookup(name),
            CExp::Lit(value) => Ok(value.clone()),
            CExp::If { test, then, alt } => {
                if self.eval(test, env)?.is_true() {
                    self.eval(then, env)
                } else {
                    self.eval(alt, env)
                }
            }
            CExp::Proc(proc) => Ok(Value::closure(
                proc.params.clone(),
                proc.body.clone(),
                None,
            )),
            CExp::App { rator, rands } => {
                let proc = self.eval(rator, env)?;
                let args = rands
                    .iter()
                    .map(|rand| self.eval(rand, env))
                    .collect::<Result<Vec<_>, _>>()?;
                self.apply_procedure(&proc, args, env)
            }
            CExp::Let { bindings, body } => {
                // A let is the application of an anonymous procedure
                let vals = bindings
                    .iter()
                    .map(|b| self.eval(&b.val, env))
                    .collect::<Result<Vec<_>, _>>()?;
                let proc = ProcExp {
                    params: bindings.iter().map(|b| b.var.clone()).collect(),
                    body: body.clone(),
                };
                self.apply_proc(&proc, vals, env)
            }
            CExp::Class(class) => Ok(Value::class(
                class.fields.clone(),
                class.methods.clone(),
                None,
            )),
        }
    }

    pub fn apply_procedure(
        &mut self,
        proc: &Value,
        args: Vec<Value>,
        env: &Env,
    ) -> Result<Value, Error> {
        match proc {
            Value::PrimOp(op) => apply_primitive(op, &args),
            Value::Closure(closure) => self.apply_closure(closure, args, env),
            Value::Class(class) => apply_class(class, args),
            Value::Object(object) => self.apply_object(object, args, env),
            other => Err(Error::BadProcedure(other.to_string())),
        }
    }

    fn apply_closure(
        &mut self,
        closure: &Closure,
        args: Vec<Value>,
        env: &Env,
    ) -> Result<Value, Error> {
        let proc = ProcExp {
            params: closure.params.clone(),
            body: closure.body.clone(),
        };
        self.apply_proc(&proc, args, env)
    }

    /// Rename, substitute the arguments, then run the body
    fn apply_proc(&mut self, proc: &ProcExp, args: Vec<Value>, env: &Env) -> Result<Value, Error> {
        if proc.params.len() != args.len() {
            return Err(Error::arity_error(proc.params.len(), args.len()));
        }
        let renamed = rename_proc(proc, &mut self.names);
        let terms: Vec<CExp> = args.iter().map(value_to_lit_exp).collect();
        let body = substitute(&renamed.body, &renamed.params, &terms);
        tracing::trace!(params = ?renamed.params, "applying procedure");
        self.eval_body(&body, env)
    }

    fn apply_object(
        &mut self,
        object: &Object,
        args: Vec<Value>,
        env: &Env,
    ) -> Result<Value, Error> {
        let (selector, rest) = args.split_first().ok_or(Error::EmptyMethodName)?;
        let Value::Symbol(name) = selector else {
            return Err(Error::InvalidMethodName);
        };
        let method = object
            .class
            .find_method(name)
            .ok_or_else(|| Error::UnrecognizedMethod(name.clone()))?;
        tracing::debug!(method = %name, "dispatching message");

        // Rename first so field values cannot be captured by method binders
        let renamed = rename_proc(&method.proc, &mut self.names);
        let field_terms: Vec<CExp> = object.fields.iter().map(value_to_lit_exp).collect();
        let proc = substitute_proc(&renamed, &object.class.fields, &field_terms);
        self.apply_proc(&proc, rest.to_vec(), env)
    }

    /// Evaluate a lambda or `let` body; the last value is the result
    pub fn eval_body(&mut self, body: &[CExp], env: &Env) -> Result<Value, Error> {
        let (last, init) = body.split_last().ok_or(Error::EmptySequence)?;
        for exp in init {
            self.eval(exp, env)?;
        }
        self.eval(last, env)
    }

    /// Evaluate a top-level sequence, threading `define` bindings through it
    pub fn eval_sequence(&mut self, exps: &[Exp], env: &Env) -> Result<Value, Error> {
        self.run_sequence(exps, env)?.0.ok_or(Error::EmptySequence)
    }

    /// Evaluate a top-level sequence for its definitions
    pub fn eval_definitions(&mut self, exps: &[Exp], env: &Env) -> Result<Env, Error> {
        Ok(self.run_sequence(exps, env)?.1)
    }

    fn run_sequence(&mut self, exps: &[Exp], env: &Env) -> Result<(Option<Value>, Env), Error> {
        let mut env = env.clone();
        let mut result = None;
        for exp in exps {
            match exp {
                Exp::Define(def) => {
                    let value = self.eval(&def.val, &env)?;
                    tracing::debug!(var = %def.var, "define");
                    env = env.bind(def.var.clone(), value);
                    result = None;
                }
                Exp::CExp(exp) => result = Some(self.eval(exp, &env)?),
            }
        }
        Ok((result, env))
    }
}

fn apply_class(class: &Arc<Class>, args: Vec<Value>) -> Result<Value, Error> {
    if class.fields.len() != args.len() {
        return Err(Error::arity_error(class.fields.len(), args.len()));
    }
    Ok(Value::object(Arc::clone(class), args, None))
}

impl Evaluator for SubstitutionEvaluator {
    fn evaluate(&mut self, exp: &Exp) -> Result<Value, Error> {
        self.eval_sequence(std::slice::from_ref(exp), &Env::empty())
    }

    fn evaluate_program(&mut self, program: &Program) -> Result<Value, Error> {
        self.eval_sequence(&program.exps, &Env::empty())
    }

    fn definitions(&mut self, program: &Program) -> Result<Env, Error> {
        self.eval_definitions(&program.exps, &Env::empty())
    }
}
