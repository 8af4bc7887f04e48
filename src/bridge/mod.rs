//! Async bridge: run one callback-driven command to completion and hand its
//! result back as a single blocking call with a bounded wait.
//!
//! Flow per invocation:
//!   1. fresh `PendingResult`
//!   2. sink: converter on every NEXT, then strategy(step, pending)
//!   3. `command.execute(sink)`
//!   4. block until resolved / ceiling elapsed / interrupted
//!
//! The bridge never resolves the result itself. A strategy that ignores
//! COMPLETE and ERROR leaves the caller waiting for the full ceiling.

mod error;
mod pending;
mod step;
mod strategy;

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

use crate::command::{AsyncCommand, ResultCallback};

pub use error::{BridgeError, FailureCause, StrategyError, cause};
pub use pending::{Interrupt, PendingResult};
pub use step::{Disposable, ExecutionStep, StartHandle, Step};
pub use strategy::{
    Reaction, Strategy, first_value, fold, keep_last, keep_last_or, propagate_errors,
    trace_steps,
};

use error::cause_from_anyhow;
use pending::{Resolution, WaitError};

/// Default wait ceiling (10 minutes).
pub const DEFAULT_CEILING: Duration = Duration::from_secs(600);
/// Default interval at which a blocked wait re-checks its interrupt.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Wait limits of a [`Bridge`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BridgeConfig {
    pub ceiling: Duration,
    pub poll_interval: Duration,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            ceiling: DEFAULT_CEILING,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

/// Converts callback-driven commands into blocking calls.
///
/// Holds no per-invocation state; one `Bridge` can serve concurrent calls
/// from different threads.
#[derive(Debug, Clone, Default)]
pub struct Bridge {
    config: BridgeConfig,
}

impl Bridge {
    pub fn new(config: BridgeConfig) -> Self {
        Self { config }
    }

    pub fn with_ceiling(ceiling: Duration) -> Self {
        Self::new(BridgeConfig {
            ceiling,
            ..BridgeConfig::default()
        })
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// Run `command` with the identity converter.
    pub fn run<C>(&self, command: C, strategy: Strategy<C::Output>) -> Result<C::Output, BridgeError>
    where
        C: AsyncCommand,
    {
        self.run_with(command, |raw| raw, strategy)
    }

    /// Run `command`, passing every streamed value through `converter`.
    ///
    /// The pending result only ever holds converted values, so the returned
    /// value is not converted again.
    pub fn run_with<C, T, F>(
        &self,
        command: C,
        converter: F,
        strategy: Strategy<T>,
    ) -> Result<T, BridgeError>
    where
        C: AsyncCommand,
        T: Send + 'static,
        F: Fn(C::Output) -> T + Send + Sync + 'static,
    {
        self.run_interruptible(command, converter, strategy, &Interrupt::new())
    }

    /// Like [`Bridge::run_with`], returning `Interrupted` once `interrupt`
    /// fires (within one poll interval).
    pub fn run_interruptible<C, T, F>(
        &self,
        command: C,
        converter: F,
        strategy: Strategy<T>,
        interrupt: &Interrupt,
    ) -> Result<T, BridgeError>
    where
        C: AsyncCommand,
        T: Send + 'static,
        F: Fn(C::Output) -> T + Send + Sync + 'static,
    {
        let pending = PendingResult::new();
        let sink = StrategySink {
            converter: Arc::new(converter),
            reaction: strategy.start(),
            pending: pending.clone(),
        };
        command.execute(Box::new(sink));

        match pending.wait(self.config.ceiling, self.config.poll_interval, interrupt) {
            Ok(Resolution::Value(value)) => Ok(value),
            Ok(Resolution::Failed(cause)) => Err(BridgeError::Execution(cause)),
            Ok(Resolution::StrategyFailed { step, cause }) => {
                Err(BridgeError::Strategy { step, cause })
            }
            Err(WaitError::TimedOut) => {
                tracing::warn!(ceiling = ?self.config.ceiling, "command did not resolve in time");
                Err(BridgeError::Timeout(self.config.ceiling))
            }
            Err(WaitError::Interrupted) => Err(BridgeError::Interrupted),
        }
    }
}

/// Run `command` on a default [`Bridge`] (10 minute ceiling).
pub fn run<C>(command: C, strategy: Strategy<C::Output>) -> Result<C::Output, BridgeError>
where
    C: AsyncCommand,
{
    Bridge::default().run(command, strategy)
}

/// Callback sink handed to the command: converts and dispatches every event.
struct StrategySink<M, T> {
    converter: Arc<dyn Fn(M) -> T + Send + Sync>,
    reaction: Reaction<T>,
    pending: PendingResult<T>,
}

impl<M, T: 'static> StrategySink<M, T> {
    fn dispatch(&mut self, step: Step<T>) {
        let kind = step.kind();
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            self.reaction.accept(&step, &self.pending)
        }));
        let failure = match outcome {
            Ok(Ok(())) => None,
            Ok(Err(e)) => Some(cause_from_anyhow(e)),
            Err(payload) => Some(cause(StrategyError::Panicked(panic_message(payload.as_ref())))),
        };
        if let Some(cause) = failure {
            tracing::warn!(step = %kind, error = %cause, "strategy failed");
            self.pending.resolve(Resolution::StrategyFailed { step: kind, cause });
        }
        if kind.is_terminal() && !self.pending.is_resolved() {
            tracing::debug!(
                step = %kind,
                "terminal step left the result unresolved; caller waits for the ceiling"
            );
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

impl<M, T> ResultCallback<M> for StrategySink<M, T>
where
    M: Send,
    T: Send + 'static,
{
    fn on_start(&mut self, handle: StartHandle) {
        self.dispatch(Step::Start(handle));
    }

    fn on_next(&mut self, value: M) {
        let converted = (self.converter)(value);
        self.dispatch(Step::Next(converted));
    }

    fn on_error(&mut self, cause: FailureCause) {
        self.dispatch(Step::Error(cause));
    }

    fn on_complete(&mut self) {
        self.dispatch(Step::Complete);
    }

    fn close(&mut self) {
        self.dispatch(Step::Close);
    }
}
