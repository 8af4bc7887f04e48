//! Scripted command for tests: replays a fixed callback sequence from a
//! background thread, with optional pauses between events.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use super::{AsyncCommand, CallbackSink};
use crate::bridge::{Disposable, StartHandle};

#[derive(Debug, Clone)]
pub(crate) enum Event<M> {
    Start,
    Next(M),
    Error(&'static str),
    Complete,
    Close,
    Pause(Duration),
}

struct Flag(Arc<AtomicBool>);

impl Disposable for Flag {
    fn dispose(&self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

pub(crate) struct ScriptedCommand<M> {
    events: Vec<Event<M>>,
    disposed: Arc<AtomicBool>,
}

impl<M> ScriptedCommand<M> {
    pub(crate) fn new(events: Vec<Event<M>>) -> Self {
        Self {
            events,
            disposed: Arc::new(AtomicBool::new(false)),
        }
    }

    /// The usual well-formed sequence: start, values, complete, close.
    pub(crate) fn values(values: Vec<M>) -> Self {
        let mut events = vec![Event::Start];
        events.extend(values.into_iter().map(Event::Next));
        events.push(Event::Complete);
        events.push(Event::Close);
        Self::new(events)
    }

    pub(crate) fn disposed_flag(&self) -> Arc<AtomicBool> {
        self.disposed.clone()
    }
}

impl<M: Send + 'static> AsyncCommand for ScriptedCommand<M> {
    type Output = M;

    fn execute(self, mut sink: CallbackSink<M>) {
        let disposed = self.disposed;
        let events = self.events;
        thread::spawn(move || {
            for event in events {
                // once disposed only the closing bracket is still delivered
                if disposed.load(Ordering::SeqCst) && !matches!(event, Event::Close) {
                    continue;
                }
                match event {
                    Event::Start => sink.on_start(StartHandle::new(Flag(disposed.clone()))),
                    Event::Next(v) => sink.on_next(v),
                    Event::Error(msg) => sink.on_error(Arc::new(std::io::Error::other(msg))),
                    Event::Complete => sink.on_complete(),
                    Event::Close => sink.close(),
                    Event::Pause(d) => thread::sleep(d),
                }
            }
        });
    }
}
