//! Error taxonomy of a bridged invocation.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use super::step::ExecutionStep;

/// Shared failure cause carried by `Error` steps and failed results.
pub type FailureCause = Arc<dyn std::error::Error + Send + Sync + 'static>;

/// Wrap any error as a [`FailureCause`].
pub fn cause<E>(err: E) -> FailureCause
where
    E: std::error::Error + Send + Sync + 'static,
{
    Arc::new(err)
}

/// Convert an `anyhow::Error` returned by a strategy into a [`FailureCause`].
pub(crate) fn cause_from_anyhow(err: anyhow::Error) -> FailureCause {
    let boxed: Box<dyn std::error::Error + Send + Sync + 'static> = err.into();
    Arc::from(boxed)
}

/// Errors surfaced by [`crate::bridge::Bridge::run`].
#[derive(Error, Debug, Clone)]
pub enum BridgeError {
    #[error("command did not resolve within {0:?}")]
    Timeout(Duration),

    #[error("command execution failed: {0}")]
    Execution(#[source] FailureCause),

    #[error("strategy failed on {step} step: {cause}")]
    Strategy {
        step: ExecutionStep,
        #[source]
        cause: FailureCause,
    },

    #[error("wait for command result was interrupted")]
    Interrupted,
}

impl BridgeError {
    /// Stable, machine-readable kind.
    pub fn kind(&self) -> &'static str {
        match self {
            BridgeError::Timeout(_) => "timeout",
            BridgeError::Execution(_) => "execution",
            BridgeError::Strategy { .. } => "strategy",
            BridgeError::Interrupted => "interrupted",
        }
    }

    /// The underlying failure, if any.
    pub fn cause(&self) -> Option<&FailureCause> {
        match self {
            BridgeError::Execution(cause) | BridgeError::Strategy { cause, .. } => Some(cause),
            _ => None,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, BridgeError::Timeout(_))
    }
}

/// Failures raised by the built-in strategies.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StrategyError {
    #[error("command completed without producing a value")]
    EmptyStream,

    #[error("strategy panicked: {0}")]
    Panicked(String),
}
