//! Composable per-step reaction logic.
//!
//! A [`Strategy`] is a reusable recipe over `(step, pending result)`. Every
//! bridged invocation calls [`Strategy::start`] once and feeds its steps to
//! the returned [`Reaction`]; accumulated state (last value, accumulator,
//! start handle) lives in that reaction only, so clones and reruns of one
//! strategy never see each other's values.
//!
//! Strategies are chained with [`Strategy::and_then`]; the built-in ones
//! below cover the usual accumulation patterns (last value, first value,
//! fold) plus error propagation and step tracing.

use std::fmt;
use std::sync::Arc;

use super::error::StrategyError;
use super::pending::PendingResult;
use super::step::{StartHandle, Step};

type ReactionFn<T> = dyn FnMut(&Step<T>, &PendingResult<T>) -> anyhow::Result<()> + Send;
type MakeFn<T> = dyn Fn() -> Reaction<T> + Send + Sync;

/// One invocation's instance of a [`Strategy`].
pub struct Reaction<T> {
    f: Box<ReactionFn<T>>,
}

impl<T: 'static> Reaction<T> {
    pub fn new<F>(f: F) -> Self
    where
        F: FnMut(&Step<T>, &PendingResult<T>) -> anyhow::Result<()> + Send + 'static,
    {
        Self { f: Box::new(f) }
    }

    pub fn accept(&mut self, step: &Step<T>, pending: &PendingResult<T>) -> anyhow::Result<()> {
        (self.f)(step, pending)
    }
}

impl<T> fmt::Debug for Reaction<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Reaction(..)")
    }
}

/// Caller-supplied reaction logic, instantiated once per invocation.
pub struct Strategy<T> {
    make: Arc<MakeFn<T>>,
}

impl<T> Clone for Strategy<T> {
    fn clone(&self) -> Self {
        Self {
            make: Arc::clone(&self.make),
        }
    }
}

impl<T> fmt::Debug for Strategy<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Strategy(..)")
    }
}

impl<T: 'static> Strategy<T> {
    /// A stateless strategy; every invocation calls the same `f`.
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&Step<T>, &PendingResult<T>) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let f = Arc::new(f);
        Self::per_run(move || {
            let f = Arc::clone(&f);
            Reaction::new(move |step: &Step<T>, pending: &PendingResult<T>| (*f)(step, pending))
        })
    }

    /// A stateful strategy; `make` builds fresh state for each invocation.
    pub fn per_run<M>(make: M) -> Self
    where
        M: Fn() -> Reaction<T> + Send + Sync + 'static,
    {
        Self {
            make: Arc::new(make),
        }
    }

    /// A strategy that does nothing.
    pub fn noop() -> Self {
        Self::new(|_, _| Ok(()))
    }

    /// Instantiate for one invocation.
    pub fn start(&self) -> Reaction<T> {
        (self.make)()
    }

    /// Run `self`, then `after`, with identical arguments.
    ///
    /// If `self` fails, `after` is skipped and the error is returned.
    pub fn and_then(self, after: Strategy<T>) -> Strategy<T> {
        Strategy::per_run(move || {
            let mut first = self.start();
            let mut second = after.start();
            Reaction::new(move |step: &Step<T>, pending: &PendingResult<T>| {
                first.accept(step, pending)?;
                second.accept(step, pending)
            })
        })
    }
}

/// On `Error`, fail the pending result with the original cause.
pub fn propagate_errors<T: 'static>() -> Strategy<T> {
    Strategy::new(|step: &Step<T>, pending: &PendingResult<T>| {
        if let Step::Error(cause) = step {
            pending.fail(cause.clone());
        }
        Ok(())
    })
}

/// Log every step at trace level (errors at debug).
pub fn trace_steps<T: fmt::Debug + 'static>(label: impl Into<String>) -> Strategy<T> {
    let label = label.into();
    Strategy::new(move |step: &Step<T>, _: &PendingResult<T>| {
        match step {
            Step::Next(v) => tracing::trace!(command = %label, value = ?v, "NEXT"),
            Step::Error(cause) => tracing::debug!(command = %label, error = %cause, "ERROR"),
            other => tracing::trace!(command = %label, "{}", other.kind()),
        }
        Ok(())
    })
}

/// Keep the most recent value; resolve with it on `Complete`.
///
/// Completing without any value fails with [`StrategyError::EmptyStream`].
pub fn keep_last<T: Clone + Send + Sync + 'static>() -> Strategy<T> {
    last_value(None)
}

/// Like [`keep_last`], resolving with `fallback` when no value arrived.
pub fn keep_last_or<T: Clone + Send + Sync + 'static>(fallback: T) -> Strategy<T> {
    last_value(Some(fallback))
}

fn last_value<T: Clone + Send + Sync + 'static>(fallback: Option<T>) -> Strategy<T> {
    Strategy::per_run(move || {
        let fallback = fallback.clone();
        let mut last: Option<T> = None;
        Reaction::new(move |step: &Step<T>, pending: &PendingResult<T>| {
            match step {
                Step::Next(v) => last = Some(v.clone()),
                Step::Complete => match last.take().or_else(|| fallback.clone()) {
                    Some(v) => {
                        pending.complete(v);
                    }
                    None => {
                        pending.fail_with(StrategyError::EmptyStream);
                    }
                },
                _ => {}
            }
            Ok(())
        })
    })
}

/// Resolve on the first value and dispose the command's start handle.
pub fn first_value<T: Clone + Send + 'static>() -> Strategy<T> {
    Strategy::per_run(|| {
        let mut handle: Option<StartHandle> = None;
        Reaction::new(move |step: &Step<T>, pending: &PendingResult<T>| {
            match step {
                Step::Start(h) => handle = Some(h.clone()),
                Step::Next(v) if !pending.is_resolved() => {
                    if let Some(h) = handle.take() {
                        tracing::debug!("first value received; disposing command");
                        h.dispose();
                    }
                    pending.complete(v.clone());
                }
                Step::Complete => {
                    pending.fail_with(StrategyError::EmptyStream);
                }
                _ => {}
            }
            Ok(())
        })
    })
}

/// Fold every value into an accumulator; resolve with it on `Complete`.
pub fn fold<T, F>(init: T, f: F) -> Strategy<T>
where
    T: Clone + Send + Sync + 'static,
    F: Fn(T, &T) -> T + Send + Sync + 'static,
{
    let f = Arc::new(f);
    Strategy::per_run(move || {
        let f = Arc::clone(&f);
        let mut acc = Some(init.clone());
        Reaction::new(move |step: &Step<T>, pending: &PendingResult<T>| {
            match step {
                Step::Next(v) => {
                    if let Some(current) = acc.take() {
                        acc = Some((*f)(current, v));
                    }
                }
                Step::Complete => {
                    if let Some(total) = acc.take() {
                        pending.complete(total);
                    }
                }
                _ => {}
            }
            Ok(())
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::error::cause;
    use crate::bridge::pending::{Interrupt, Resolution};
    use crate::bridge::step::{Disposable, ExecutionStep};
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    fn drive<T: 'static>(strategy: &Strategy<T>, steps: Vec<Step<T>>) -> PendingResult<T> {
        let pending = PendingResult::new();
        let mut reaction = strategy.start();
        for step in steps {
            reaction.accept(&step, &pending).unwrap();
        }
        pending
    }

    fn resolved<T>(pending: &PendingResult<T>) -> Option<Resolution<T>> {
        pending
            .wait(Duration::from_millis(5), Duration::from_millis(1), &Interrupt::new())
            .ok()
    }

    fn recorder(tag: &'static str, log: Arc<Mutex<Vec<String>>>) -> Strategy<i32> {
        Strategy::new(move |step, _| {
            log.lock().unwrap().push(format!("{tag}:{}", step.kind()));
            Ok(())
        })
    }

    #[test]
    fn and_then_runs_each_once_in_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let chained = recorder("a", log.clone())
            .and_then(recorder("b", log.clone()))
            .and_then(recorder("c", log.clone()));
        let pending = PendingResult::new();
        let mut reaction = chained.start();
        for step in [Step::Next(1), Step::Complete] {
            reaction.accept(&step, &pending).unwrap();
        }
        assert_eq!(
            *log.lock().unwrap(),
            vec!["a:NEXT", "b:NEXT", "c:NEXT", "a:COMPLETE", "b:COMPLETE", "c:COMPLETE"]
        );
    }

    #[test]
    fn failing_first_skips_second() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let failing: Strategy<i32> = Strategy::new(|_, _| anyhow::bail!("nope"));
        let chained = failing.and_then(recorder("after", log.clone()));
        let err = chained
            .start()
            .accept(&Step::Next(1), &PendingResult::new())
            .unwrap_err();
        assert_eq!(err.to_string(), "nope");
        assert!(log.lock().unwrap().is_empty());
    }

    #[test]
    fn keep_last_resolves_on_complete_only() {
        let mut reaction = keep_last().start();
        let pending = PendingResult::new();
        for v in [1, 2, 3] {
            reaction.accept(&Step::Next(v), &pending).unwrap();
        }
        assert!(!pending.is_resolved());
        reaction.accept(&Step::Complete, &pending).unwrap();
        assert!(matches!(resolved(&pending), Some(Resolution::Value(3))));
    }

    #[test]
    fn keep_last_empty_stream() {
        let pending = drive(&keep_last::<i32>(), vec![Step::Complete]);
        match resolved(&pending) {
            Some(Resolution::Failed(c)) => {
                assert_eq!(c.to_string(), StrategyError::EmptyStream.to_string())
            }
            _ => panic!("expected empty stream failure"),
        }
        let pending = drive(&keep_last_or(0), vec![Step::Complete]);
        assert!(matches!(resolved(&pending), Some(Resolution::Value(0))));
    }

    #[test]
    fn first_value_disposes_handle() {
        struct Flag(Arc<AtomicBool>);
        impl Disposable for Flag {
            fn dispose(&self) {
                self.0.store(true, Ordering::SeqCst);
            }
        }
        let disposed = Arc::new(AtomicBool::new(false));
        let pending = drive(
            &first_value(),
            vec![
                Step::Start(StartHandle::new(Flag(disposed.clone()))),
                Step::Next(10),
                Step::Next(20),
                Step::Complete,
            ],
        );
        assert!(disposed.load(Ordering::SeqCst));
        assert!(matches!(resolved(&pending), Some(Resolution::Value(10))));
    }

    #[test]
    fn fold_accumulates() {
        let s = fold(String::new(), |acc, next: &String| {
            if acc.is_empty() {
                next.clone()
            } else {
                format!("{acc}\n{next}")
            }
        });
        let pending = drive(
            &s,
            vec![Step::Next("a".into()), Step::Next("b".into()), Step::Complete],
        );
        match resolved(&pending) {
            Some(Resolution::Value(v)) => assert_eq!(v, "a\nb"),
            _ => panic!("expected folded value"),
        }
    }

    #[test]
    fn propagate_errors_fails_with_cause() {
        let s = propagate_errors::<i32>().and_then(keep_last());
        let pending = drive(
            &s,
            vec![
                Step::Next(1),
                Step::Error(cause(std::io::Error::other("exit 2"))),
                Step::Complete,
            ],
        );
        match resolved(&pending) {
            Some(Resolution::Failed(c)) => assert_eq!(c.to_string(), "exit 2"),
            _ => panic!("expected failure"),
        }
    }

    #[test]
    fn trace_steps_never_touches_result() {
        let mut reaction = trace_steps::<i32>("t").start();
        let pending = PendingResult::new();
        for kind in ExecutionStep::variants() {
            let step = match kind {
                ExecutionStep::Start => Step::Start(StartHandle::new(Noop)),
                ExecutionStep::Next => Step::Next(1),
                ExecutionStep::Error => Step::Error(cause(std::io::Error::other("x"))),
                ExecutionStep::Complete => Step::Complete,
                ExecutionStep::Close => Step::Close,
            };
            reaction.accept(&step, &pending).unwrap();
        }
        assert!(!pending.is_resolved());
    }

    #[test]
    fn each_start_gets_fresh_state() {
        let sum = propagate_errors::<i32>().and_then(fold(0, |acc, v: &i32| acc + v));
        for _ in 0..2 {
            let pending = drive(&sum, vec![Step::Next(1), Step::Next(2), Step::Complete]);
            assert!(matches!(resolved(&pending), Some(Resolution::Value(3))));
        }

        let last = keep_last_or(-1);
        let copy = last.clone();
        for s in [&last, &copy, &last] {
            let pending = drive(s, vec![Step::Complete]);
            assert!(matches!(resolved(&pending), Some(Resolution::Value(-1))));
        }

        // interleaved reactions from one strategy keep separate values
        let pending_a = PendingResult::new();
        let pending_b = PendingResult::new();
        let mut a = last.start();
        let mut b = copy.start();
        a.accept(&Step::Next(1), &pending_a).unwrap();
        b.accept(&Step::Next(2), &pending_b).unwrap();
        a.accept(&Step::Complete, &pending_a).unwrap();
        b.accept(&Step::Complete, &pending_b).unwrap();
        assert!(matches!(resolved(&pending_a), Some(Resolution::Value(1))));
        assert!(matches!(resolved(&pending_b), Some(Resolution::Value(2))));
    }

    struct Noop;
    impl Disposable for Noop {
        fn dispose(&self) {}
    }
}
