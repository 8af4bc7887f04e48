//! Remote command API: the callback protocol asynchronous commands speak,
//! plus the local process implementation used by the CLI and server.
//!
//! A command receives a [`CallbackSink`] and reports, on threads it manages:
//!   on_start(handle) -> on_next(value)* -> on_error(cause) | on_complete() -> close()

pub mod process;
#[cfg(test)]
pub(crate) mod scripted;
pub mod target;

use crate::bridge::{FailureCause, StartHandle};

pub use process::{ProcessCommand, ProcessError};
pub use target::{CommandSpec, parse_target};

/// Receiver of lifecycle notifications for one command execution.
pub trait ResultCallback<M>: Send {
    fn on_start(&mut self, handle: StartHandle);
    fn on_next(&mut self, value: M);
    fn on_error(&mut self, cause: FailureCause);
    fn on_complete(&mut self);
    fn close(&mut self);
}

/// Boxed sink handed to [`AsyncCommand::execute`].
pub type CallbackSink<M> = Box<dyn ResultCallback<M> + Send>;

/// An asynchronous command that streams results through callbacks.
///
/// Implementations must call `on_start` first, then any number of
/// `on_next`, exactly one of `on_error` / `on_complete`, and `close` last.
pub trait AsyncCommand {
    type Output: Send + 'static;

    /// Start the command. Must not block until completion.
    fn execute(self, sink: CallbackSink<Self::Output>);
}
