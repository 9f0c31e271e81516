//! Completion events for enqueued device work.

use crate::device::DeviceError;
use std::sync::{Arc, Condvar, Mutex, PoisonError};

#[derive(Debug, Default)]
struct EventState {
    status: Mutex<Option<Result<(), DeviceError>>>,
    ready: Condvar,
}

/// Completion handle of enqueued work: one command, or a join of several.
///
/// A joined event completes once every part has, and reports the first
/// failure among its parts in submission order.
#[derive(Debug, Clone)]
pub struct Event {
    state: Arc<EventState>,
    after: Vec<Event>,
}

impl Event {
    /// A pending event and the signal that completes it.
    pub fn pending() -> (Event, EventSignal) {
        let state = Arc::new(EventState::default());
        (
            Event {
                state: Arc::clone(&state),
                after: Vec::new(),
            },
            EventSignal { state: Some(state) },
        )
    }

    /// An event that has already completed successfully.
    pub fn complete() -> Event {
        let (event, signal) = Event::pending();
        signal.finish(Ok(()));
        event
    }

    /// An event over all of `events`.
    pub fn join(events: Vec<Event>) -> Event {
        let mut joined = Event::complete();
        joined.after = events;
        joined
    }

    pub fn is_complete(&self) -> bool {
        self.after.iter().all(Event::is_complete)
            && self
                .state
                .status
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .is_some()
    }

    /// Block until the work completes and return its status.
    pub fn wait(&self) -> Result<(), DeviceError> {
        let parts = Event::wait_all(&self.after);
        parts.and(self.wait_own())
    }

    /// Wait for every event, then return the first failure in order.
    pub fn wait_all(events: &[Event]) -> Result<(), DeviceError> {
        events.iter().fold(Ok(()), |first, event| {
            let status = event.wait();
            first.and(status)
        })
    }

    fn wait_own(&self) -> Result<(), DeviceError> {
        let mut status = self
            .state
            .status
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        loop {
            if let Some(result) = status.as_ref() {
                return result.clone();
            }
            status = self
                .state
                .ready
                .wait(status)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }
}

/// Events of the commands one routine invocation has enqueued, in
/// submission order. Each new command is enqueued behind the whole chain, so
/// a failed stage fails every stage after it.
#[derive(Debug, Default)]
pub struct EventChain {
    events: Mutex<Vec<Event>>,
}

impl EventChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Events a new command must wait for.
    pub fn wait_list(&self) -> Vec<Event> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn push(&self, event: Event) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
    }

    pub fn len(&self) -> usize {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// One event over every command enqueued so far.
    pub fn joined(&self) -> Event {
        Event::join(self.wait_list())
    }
}

/// Producer side of an [`Event`]. Dropping it unfinished fails the event with
/// [`DeviceError::QueueClosed`].
#[derive(Debug)]
pub struct EventSignal {
    state: Option<Arc<EventState>>,
}

impl EventSignal {
    pub fn finish(mut self, result: Result<(), DeviceError>) {
        if let Some(state) = self.state.take() {
            Self::publish(&state, result);
        }
    }

    fn publish(state: &EventState, result: Result<(), DeviceError>) {
        let mut status = state.status.lock().unwrap_or_else(PoisonError::into_inner);
        *status = Some(result);
        state.ready.notify_all();
    }
}

impl Drop for EventSignal {
    fn drop(&mut self) {
        if let Some(state) = self.state.take() {
            Self::publish(&state, Err(DeviceError::QueueClosed));
        }
    }
}
