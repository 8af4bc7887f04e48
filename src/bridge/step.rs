//! Execution steps of an asynchronous command callback flow.
//!
//! `ExecutionStep` is the bare tag, `Step<T>` carries the step-specific
//! payload (start handle, converted value, failure cause).

use std::fmt;
use std::sync::Arc;

use super::error::FailureCause;

/// Lifecycle marker of a single callback invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExecutionStep {
    /// Callback registration begun; carries a disposable handle
    Start,
    /// A streamed partial result arrived
    Next,
    /// The command failed
    Error,
    /// The stream finished normally
    Complete,
    /// Resources released
    Close,
}

impl ExecutionStep {
    /// All variants in lifecycle order.
    pub const fn variants() -> &'static [ExecutionStep] {
        &[
            ExecutionStep::Start,
            ExecutionStep::Next,
            ExecutionStep::Error,
            ExecutionStep::Complete,
            ExecutionStep::Close,
        ]
    }

    /// `Complete` and `Error` end the value stream.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ExecutionStep::Complete | ExecutionStep::Error)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionStep::Start => "START",
            ExecutionStep::Next => "NEXT",
            ExecutionStep::Error => "ERROR",
            ExecutionStep::Complete => "COMPLETE",
            ExecutionStep::Close => "CLOSE",
        }
    }
}

impl fmt::Display for ExecutionStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A resource the command hands out on start so callers can cancel it.
pub trait Disposable: Send + Sync {
    fn dispose(&self);
}

/// Cloneable handle delivered with [`Step::Start`].
#[derive(Clone)]
pub struct StartHandle {
    inner: Arc<dyn Disposable>,
}

impl StartHandle {
    pub fn new(resource: impl Disposable + 'static) -> Self {
        Self {
            inner: Arc::new(resource),
        }
    }

    pub fn from_arc(resource: Arc<dyn Disposable>) -> Self {
        Self { inner: resource }
    }

    /// Ask the command to stop. Safe to call more than once.
    pub fn dispose(&self) {
        self.inner.dispose();
    }
}

impl fmt::Debug for StartHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("StartHandle(..)")
    }
}

/// A lifecycle event together with its payload.
#[derive(Debug, Clone)]
pub enum Step<T> {
    Start(StartHandle),
    /// Value already passed through the converter
    Next(T),
    Error(FailureCause),
    Complete,
    Close,
}

impl<T> Step<T> {
    pub fn kind(&self) -> ExecutionStep {
        match self {
            Step::Start(_) => ExecutionStep::Start,
            Step::Next(_) => ExecutionStep::Next,
            Step::Error(_) => ExecutionStep::Error,
            Step::Complete => ExecutionStep::Complete,
            Step::Close => ExecutionStep::Close,
        }
    }

    pub fn value(&self) -> Option<&T> {
        match self {
            Step::Next(v) => Some(v),
            _ => None,
        }
    }

    pub fn cause(&self) -> Option<&FailureCause> {
        match self {
            Step::Error(cause) => Some(cause),
            _ => None,
        }
    }

    pub fn handle(&self) -> Option<&StartHandle> {
        match self {
            Step::Start(handle) => Some(handle),
            _ => None,
        }
    }
}
