use std::fmt;
use std::sync::Arc;

use dataweave_error::{DbError, ErrorKind, Result};
use parking_lot::Mutex;

use super::ValueStream;
use crate::values::Value;

/// Where the input of an evaluation comes from.
pub enum RootSource {
    Stream(ValueStream),
    /// Opened on first use. Never called if nothing reads the input.
    Lazy(Box<dyn FnOnce() -> Result<ValueStream> + Send>),
}

impl RootSource {
    fn open(self) -> Result<ValueStream> {
        match self {
            Self::Stream(stream) => Ok(stream),
            Self::Lazy(open) => open(),
        }
    }
}

impl fmt::Debug for RootSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stream(_) => write!(f, "Stream"),
            Self::Lazy(_) => write!(f, "Lazy"),
        }
    }
}

#[derive(Debug)]
enum RootState {
    Pending(RootSource),
    Materialized(Arc<Vec<Value>>),
    Consumed,
}

/// The input sequence of an evaluation.
///
/// Streamed through once, unless the tree reads it more than once (or per
/// element of some other sequence) in which case it's collected on first
/// read and shared after that.
#[derive(Debug)]
pub struct RootInput {
    materialize: bool,
    state: Mutex<RootState>,
}

impl RootInput {
    pub fn new(source: RootSource, materialize: bool) -> Self {
        RootInput {
            materialize,
            state: Mutex::new(RootState::Pending(source)),
        }
    }

    pub fn stream(&self) -> Result<ValueStream> {
        let mut state = self.state.lock();
        match std::mem::replace(&mut *state, RootState::Consumed) {
            RootState::Pending(source) => {
                let stream = source.open()?;
                if !self.materialize {
                    return Ok(stream);
                }
                let values = Arc::new(stream.collect::<Result<Vec<_>>>()?);
                *state = RootState::Materialized(values.clone());
                Ok(shared_stream(values))
            }
            RootState::Materialized(values) => {
                *state = RootState::Materialized(values.clone());
                Ok(shared_stream(values))
            }
            RootState::Consumed => Err(DbError::new("Input sequence already consumed")),
        }
    }
}

fn shared_stream(values: Arc<Vec<Value>>) -> ValueStream {
    Box::new((0..values.len()).map(move |idx| Ok(values[idx].clone())))
}

#[derive(Debug, Clone)]
pub enum Binding {
    Value(Value),
    Root(Arc<RootInput>),
}

/// Persistent list of bindings, innermost first.
///
/// Cheap to clone so that lazy operators can hold on to the scope they were
/// created in.
#[derive(Debug, Clone, Default)]
pub struct Scope {
    head: Option<Arc<ScopeNode>>,
}

#[derive(Debug)]
struct ScopeNode {
    binding: Binding,
    parent: Scope,
}

impl Scope {
    pub fn new(binding: Binding) -> Self {
        Scope::default().push_binding(binding)
    }

    /// Create a new scope with `value` as the innermost binding.
    pub fn push(&self, value: Value) -> Scope {
        self.push_binding(Binding::Value(value))
    }

    fn push_binding(&self, binding: Binding) -> Scope {
        Scope {
            head: Some(Arc::new(ScopeNode {
                binding,
                parent: self.clone(),
            })),
        }
    }

    /// Get the binding `depth` levels out from the innermost one.
    pub fn lookup(&self, depth: usize) -> Result<&Binding> {
        let mut current = self;
        for _ in 0..depth {
            match &current.head {
                Some(node) => current = &node.parent,
                None => break,
            }
        }
        match &current.head {
            Some(node) => Ok(&node.binding),
            None => Err(DbError::with_kind(
                ErrorKind::InvalidExpression,
                format!("Context refers to scope {depth}, past the outermost binding"),
            )),
        }
    }
}
