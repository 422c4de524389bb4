//! Environment-model evaluator.
//!
//! Closures and classes capture the environment in which they were evaluated.
//! A closure runs its body in that environment extended with the parameters;
//! an object binds its fields on top of its class's environment, and methods
//! run there. Local names are therefore lexical. Top-level names are looked up
//! in the definitions current at the call site (see [`Env::with_globals`]), so
//! a procedure can call itself and a method can build new instances of a class
//! defined after it.

use crate::Error;
use crate::ast::{CExp, Exp, Program};
use crate::builtinops::apply_primitive;
use crate::environment::Env;
use crate::evaluator::Evaluator;
use crate::value::{Class, Closure, Object, Value};
use std::sync::Arc;

/// Stateless evaluator; every call starts from the empty environment
#[derive(Debug, Default, Clone, Copy)]
pub struct EnvEvaluator;

impl EnvEvaluator {
    pub fn new() -> Self {
        EnvEvaluator
    }
}

impl Evaluator for EnvEvaluator {
    fn evaluate(&mut self, exp: &Exp) -> Result<Value, Error> {
        eval_sequence(std::slice::from_ref(exp), &Env::empty())
    }

    fn evaluate_program(&mut self, program: &Program) -> Result<Value, Error> {
        eval_sequence(&program.exps, &Env::empty())
    }

    fn definitions(&mut self, program: &Program) -> Result<Env, Error> {
        eval_definitions(&program.exps, &Env::empty())
    }
}

/// Evaluate a compound expression in `env`
pub fn eval(exp: &CExp, env: &Env) -> Result<Value, Error> {
    match exp {
        CExp::Num(n) => Ok(Value::Number(*n)),
        CExp::Bool(b) => Ok(Value::Bool(*b)),
        CExp::Str(s) => Ok(Value::String(s.clone())),
        CExp::PrimOp(op) => Ok(Value::PrimOp(*op)),
        CExp::VarRef(name) => env.lookup(name),
        CExp::Lit(value) => Ok(value.clone()),
        CExp::If { test, then, alt } => {
            if eval(test, env)?.is_true() {
                eval(then, env)
            } else {
                eval(alt, env)
            }
        }
        CExp::Proc(proc) => Ok(Value::closure(
            proc.params.clone(),
            proc.body.clone(),
            Some(env.clone()),
        )),
        CExp::App { rator, rands } => {
            let proc = eval(rator, env)?;
            let args = rands
                .iter()
                .map(|rand| eval(rand, env))
                .collect::<Result<Vec<_>, _>>()?;
            apply_procedure(&proc, args, env)
        }
        CExp::Let { bindings, body } => {
            let vars: Vec<String> = bindings.iter().map(|b| b.var.clone()).collect();
            let vals = bindings
                .iter()
                .map(|b| eval(&b.val, env))
                .collect::<Result<Vec<_>, _>>()?;
            eval_body(body, &env.extend(&vars, vals)?)
        }
        CExp::Class(class) => Ok(Value::class(
            class.fields.clone(),
            class.methods.clone(),
            Some(env.clone()),
        )),
    }
}

/// Apply an evaluated operator; `env` is the environment of the application
pub fn apply_procedure(proc: &Value, args: Vec<Value>, env: &Env) -> Result<Value, Error> {
    match proc {
        Value::PrimOp(op) => apply_primitive(op, &args),
        Value::Closure(closure) => apply_closure(closure, args, env),
        Value::Class(class) => apply_class(class, args),
        Value::Object(object) => apply_object(object, args, env),
        other => Err(Error::BadProcedure(other.to_string())),
    }
}

fn apply_closure(closure: &Closure, args: Vec<Value>, env: &Env) -> Result<Value, Error> {
    tracing::trace!(params = ?closure.params, "applying closure");
    let captured = closure.env.clone().unwrap_or_default();
    let body_env = captured
        .with_globals(env.globals())
        .extend(&closure.params, args)?;
    eval_body(&closure.body, &body_env)
}

fn apply_class(class: &Arc<Class>, args: Vec<Value>) -> Result<Value, Error> {
    let class_env = class.env.clone().unwrap_or_default();
    let object_env = class_env.extend(&class.fields, args.clone())?;
    Ok(Value::object(Arc::clone(class), args, Some(object_env)))
}

fn apply_object(object: &Object, args: Vec<Value>, env: &Env) -> Result<Value, Error> {
    let (selector, rest) = args.split_first().ok_or(Error::EmptyMethodName)?;
    let Value::Symbol(name) = selector else {
        return Err(Error::InvalidMethodName);
    };
    let method = object
        .class
        .find_method(name)
        .ok_or_else(|| Error::UnrecognizedMethod(name.clone()))?;
    tracing::debug!(method = %name, "dispatching message");

    // Objects built elsewhere carry no environment; their fields still bind
    let object_env = match &object.env {
        Some(object_env) => object_env.clone(),
        None => Env::empty().extend(&object.class.fields, object.fields.clone())?,
    };
    let closure = Closure {
        params: method.proc.params.clone(),
        body: method.proc.body.clone(),
        env: Some(object_env),
    };
    apply_closure(&closure, rest.to_vec(), env)
}

/// Evaluate a lambda or `let` body; the last value is the result
pub fn eval_body(body: &[CExp], env: &Env) -> Result<Value, Error> {
    let (last, init) = body.split_last().ok_or(Error::EmptySequence)?;
    for exp in init {
        eval(exp, env)?;
    }
    eval(last, env)
}

/// Evaluate a top-level sequence, threading `define` bindings through it
pub fn eval_sequence(exps: &[Exp], env: &Env) -> Result<Value, Error> {
    // A trailing define leaves nothing to return
    run_sequence(exps, env)?.0.ok_or(Error::EmptySequence)
}

/// Evaluate a top-level sequence for its definitions
pub fn eval_definitions(exps: &[Exp], env: &Env) -> Result<Env, Error> {
    Ok(run_sequence(exps, env)?.1)
}

fn run_sequence(exps: &[Exp], env: &Env) -> Result<(Option<Value>, Env), Error> {
    let mut env = env.clone();
    let mut result = None;
    for exp in exps {
        match exp {
            Exp::Define(def) => {
                let value = eval(&def.val, &env)?;
                tracing::debug!(var = %def.var, "define");
                env = env.bind(def.var.clone(), value);
                result = None;
            }
            Exp::CExp(exp) => result = Some(eval(exp, &env)?),
        }
    }
    Ok((result, env))
}
