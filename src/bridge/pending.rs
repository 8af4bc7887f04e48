//! Single-assignment rendezvous between the callback thread and the caller.
//!
//! `PendingResult` is written at most once (first writer wins) and read once
//! by the blocked caller. `Interrupt` lets another thread abort the wait
//! without touching the slot.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use super::error::FailureCause;
use super::step::ExecutionStep;

/// Final state of a resolved slot.
#[derive(Debug)]
pub(crate) enum Resolution<T> {
    Value(T),
    Failed(FailureCause),
    StrategyFailed {
        step: ExecutionStep,
        cause: FailureCause,
    },
}

#[derive(Debug)]
enum Slot<T> {
    Unresolved,
    Resolved(Resolution<T>),
    /// The caller already consumed the resolution
    Taken,
}

struct Shared<T> {
    slot: Mutex<Slot<T>>,
    ready: Condvar,
}

/// Why a wait ended without a resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum WaitError {
    TimedOut,
    Interrupted,
}

/// Resolve-once result slot shared by the callback sink and the caller.
pub struct PendingResult<T> {
    inner: Arc<Shared<T>>,
}

impl<T> Clone for PendingResult<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> Default for PendingResult<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> std::fmt::Debug for PendingResult<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingResult")
            .field("resolved", &self.is_resolved())
            .finish()
    }
}

impl<T> PendingResult<T> {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Shared {
                slot: Mutex::new(Slot::Unresolved),
                ready: Condvar::new(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Slot<T>> {
        self.inner
            .slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Resolve with a value. Returns `false` if already resolved.
    pub fn complete(&self, value: T) -> bool {
        self.resolve(Resolution::Value(value))
    }

    /// Resolve with a failure. Returns `false` if already resolved.
    pub fn fail(&self, cause: FailureCause) -> bool {
        self.resolve(Resolution::Failed(cause))
    }

    /// Resolve with any error type.
    pub fn fail_with<E>(&self, err: E) -> bool
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        self.fail(Arc::new(err))
    }

    pub fn is_resolved(&self) -> bool {
        !matches!(*self.lock(), Slot::Unresolved)
    }

    pub(crate) fn resolve(&self, resolution: Resolution<T>) -> bool {
        let mut slot = self.lock();
        if !matches!(*slot, Slot::Unresolved) {
            tracing::trace!("ignoring resolution of an already resolved result");
            return false;
        }
        *slot = Slot::Resolved(resolution);
        drop(slot);
        self.inner.ready.notify_all();
        true
    }

    /// Block until resolved, `ceiling` elapses, or `interrupt` fires.
    ///
    /// The interrupt flag is sampled at least every `poll` while waiting.
    pub(crate) fn wait(
        &self,
        ceiling: Duration,
        poll: Duration,
        interrupt: &Interrupt,
    ) -> Result<Resolution<T>, WaitError> {
        let deadline = Instant::now().checked_add(ceiling);
        let poll = poll.max(Duration::from_millis(1));
        let mut slot = self.lock();
        loop {
            if matches!(*slot, Slot::Resolved(_)) {
                if let Slot::Resolved(resolution) = std::mem::replace(&mut *slot, Slot::Taken) {
                    return Ok(resolution);
                }
            }
            if interrupt.is_triggered() {
                return Err(WaitError::Interrupted);
            }
            let slice = match deadline {
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return Err(WaitError::TimedOut);
                    }
                    (deadline - now).min(poll)
                }
                None => poll,
            };
            slot = match self.inner.ready.wait_timeout(slot, slice) {
                Ok((guard, _)) => guard,
                Err(poisoned) => poisoned.into_inner().0,
            };
        }
    }
}

/// Cooperative interruption of a blocked bridge call.
#[derive(Debug, Clone, Default)]
pub struct Interrupt {
    flag: Arc<AtomicBool>,
}

impl Interrupt {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trigger(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_triggered(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}
