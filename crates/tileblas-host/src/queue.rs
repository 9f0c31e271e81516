//! In-order command queue running on a dedicated worker thread.

use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{self, Sender};
use std::sync::{Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use tileblas::device::DeviceError;
use tileblas::event::{Event, EventSignal};
use tracing::{debug, trace, warn};

/// A unit of queued work.
pub(crate) type Job = Box<dyn FnOnce() -> Result<(), DeviceError> + Send>;

struct Command {
    label: String,
    wait_for: Vec<Event>,
    job: Job,
    signal: EventSignal,
}

/// Commands run one at a time in submission order. Dropping the queue lets
/// already submitted commands finish before the worker exits.
pub(crate) struct CommandQueue {
    sender: Mutex<Option<Sender<Command>>>,
    worker: Option<JoinHandle<()>>,
}

impl CommandQueue {
    pub(crate) fn new(name: &str) -> Self {
        let (sender, receiver) = mpsc::channel::<Command>();
        let worker = thread::Builder::new()
            .name(format!("{}-queue", name))
            .spawn(move || {
                for command in receiver {
                    let Command {
                        label,
                        wait_for,
                        job,
                        signal,
                    } = command;
                    if let Err(err) = Event::wait_all(&wait_for) {
                        debug!(command = %label, error = %err, "skipped after failed dependency");
                        signal.finish(Err(err));
                        continue;
                    }
                    trace!(command = %label, "executing");
                    let result = panic::catch_unwind(AssertUnwindSafe(job)).unwrap_or_else(|payload| {
                        let message = payload
                            .downcast_ref::<&str>()
                            .map(|s| s.to_string())
                            .or_else(|| payload.downcast_ref::<String>().cloned())
                            .unwrap_or_else(|| "unknown panic".to_string());
                        Err(DeviceError::Execution(format!("{} panicked: {}", label, message)))
                    });
                    if let Err(err) = &result {
                        warn!(command = %label, error = %err, "command failed");
                    }
                    signal.finish(result);
                }
            });

        match worker {
            Ok(handle) => Self {
                sender: Mutex::new(Some(sender)),
                worker: Some(handle),
            },
            // every submit on this queue reports QueueClosed
            Err(err) => {
                warn!(error = %err, "failed to start queue worker");
                Self {
                    sender: Mutex::new(None),
                    worker: None,
                }
            }
        }
    }

    /// Enqueue a job behind everything submitted before it. The job is
    /// skipped, and its event fails, when an event of `wait_for` failed.
    pub(crate) fn submit(
        &self,
        label: impl Into<String>,
        wait_for: &[Event],
        job: Job,
    ) -> Result<Event, DeviceError> {
        let (event, signal) = Event::pending();
        let command = Command {
            label: label.into(),
            wait_for: wait_for.to_vec(),
            job,
            signal,
        };
        let sender = self.sender.lock().unwrap_or_else(PoisonError::into_inner);
        match sender.as_ref() {
            Some(sender) => sender.send(command).map_err(|_| DeviceError::QueueClosed)?,
            None => return Err(DeviceError::QueueClosed),
        }
        Ok(event)
    }

    /// Block until everything submitted so far has run.
    pub(crate) fn finish(&self) -> Result<(), DeviceError> {
        // a failed command does not fail the barrier
        self.submit("finish", &[], Box::new(|| Ok(())))?.wait()
    }
}

impl Drop for CommandQueue {
    fn drop(&mut self) {
        self.sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}
