//! Persistent environments for the environment evaluator.
//!
//! An [`Env`] is a chain of frames linked through `Arc`. Frames are never
//! modified after construction: extending an environment allocates a new frame
//! pointing at its parent, so every closure or object holding an `Env` keeps
//! seeing exactly the local bindings that existed when it was created.
//!
//! Top-level `define` frames are the exception to lexical capture. A procedure
//! body runs under a [`Env::with_globals`] marker carrying the definitions of
//! its call site; when a lookup walks past the local frames and reaches a
//! `define` frame, it continues in those definitions instead. Top-level names
//! are therefore resolved when they are used, which is what lets a procedure
//! or method refer to itself and to anything defined after it.

use crate::Error;
use crate::value::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Environment for variable bindings
#[derive(Clone, Default)]
pub struct Env {
    frame: Option<Arc<Frame>>,
}

struct Frame {
    names: Vec<String>,
    values: Vec<Value>,
    kind: FrameKind,
    parent: Env,
}

enum FrameKind {
    /// Parameters, `let` variables and class fields
    Local,
    /// One top-level `define`
    TopLevel,
    /// No bindings; top-level lookups below this point use these definitions
    Globals(Env),
}

impl Env {
    /// The root environment, with no bindings
    pub fn empty() -> Self {
        Env { frame: None }
    }

    fn push(&self, names: Vec<String>, values: Vec<Value>, kind: FrameKind) -> Env {
        Env {
            frame: Some(Arc::new(Frame {
                names,
                values,
                kind,
                parent: self.clone(),
            })),
        }
    }

    /// New environment whose innermost frame binds `names` to `values`.
    ///
    /// Fails with an ArityError when the two sequences differ in length.
    pub fn extend(&self, names: &[String], values: Vec<Value>) -> Result<Env, Error> {
        if names.len() != values.len() {
            return Err(Error::arity_error(names.len(), values.len()));
        }
        Ok(self.push(names.to_vec(), values, FrameKind::Local))
    }

    /// Single-binding extension, used for top-level `define`
    pub fn bind(&self, name: impl Into<String>, value: Value) -> Env {
        self.push(vec![name.into()], vec![value], FrameKind::TopLevel)
    }

    /// Resolve top-level names below this point in `globals`
    pub fn with_globals(&self, globals: Env) -> Env {
        if self.globals().ptr_eq(&globals) {
            return self.clone();
        }
        self.push(Vec::new(), Vec::new(), FrameKind::Globals(globals))
    }

    /// The top-level definitions seen from here: those of the innermost
    /// [`Env::with_globals`] marker, else the innermost `define` frame
    pub fn globals(&self) -> Env {
        let mut current = self;
        while let Some(frame) = &current.frame {
            match &frame.kind {
                FrameKind::Globals(globals) => return globals.clone(),
                FrameKind::TopLevel => return current.clone(),
                FrameKind::Local => current = &frame.parent,
            }
        }
        Env::empty()
    }

    fn frames(&self) -> Frames<'_> {
        Frames {
            current: self,
            late: None,
        }
    }

    /// Look `name` up, innermost frame first
    pub fn lookup(&self, name: &str) -> Result<Value, Error> {
        self.frames()
            .find_map(|frame| {
                let index = frame.names.iter().position(|n| n == name)?;
                Some(frame.values[index].clone())
            })
            .ok_or_else(|| Error::NotFound(name.to_owned()))
    }

    /// True when both handles point at the same frame
    pub fn ptr_eq(&self, other: &Env) -> bool {
        match (&self.frame, &other.frame) {
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            (None, None) => true,
            _ => false,
        }
    }

    /// Get all visible bindings
    /// Returns a Vec of (name, value) pairs sorted by name; shadowed bindings are omitted
    pub fn bindings(&self) -> Vec<(String, Value)> {
        let mut visible: HashMap<&str, &Value> = HashMap::new();
        for frame in self.frames() {
            for (name, value) in frame.names.iter().zip(&frame.values) {
                visible.entry(name.as_str()).or_insert(value);
            }
        }

        let mut result: Vec<_> = visible
            .into_iter()
            .map(|(name, value)| (name.to_owned(), value.clone()))
            .collect();
        result.sort_by(|a, b| a.0.cmp(&b.0));
        result
    }
}

/// Binding frames in lookup order
struct Frames<'a> {
    current: &'a Env,
    /// Definitions that replace the next `define` frame reached
    late: Option<&'a Env>,
}

impl<'a> Iterator for Frames<'a> {
    type Item = &'a Frame;

    fn next(&mut self) -> Option<&'a Frame> {
        loop {
            let current: &'a Env = self.current;
            let Some(frame) = &current.frame else {
                self.current = self.late.take()?;
                continue;
            };
            let frame: &'a Frame = frame;
            match &frame.kind {
                FrameKind::TopLevel if self.late.is_some() => {
                    self.current = self.late.take()?;
                }
                FrameKind::Globals(globals) => {
                    if self.late.is_none() {
                        self.late = Some(globals);
                    }
                    self.current = &frame.parent;
                }
                FrameKind::Local | FrameKind::TopLevel => {
                    self.current = &frame.parent;
                    return Some(frame);
                }
            }
        }
    }
}

impl fmt::Debug for Env {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let frames: Vec<&Vec<String>> = self.frames().map(|frame| &frame.names).collect();
        f.debug_struct("Env").field("frames", &frames).finish()
    }
}
