use crate::error::{PipelineError, Result};
use crate::item::Item;
use crate::queue::BoundedQueue;
use log::error;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle, ThreadId};

/// Trait for a processing step in the pipeline.
///
/// A transform receives one owned line of bytes and returns one owned line
/// of bytes. It may return its input unchanged, build a fresh buffer, or
/// fail; ownership of the input always moves into the call, so the worker
/// never has to reason about which of two buffers it still holds. Side
/// effects (printing, delays) belong *inside* the transform; the worker
/// stays pure plumbing.
///
/// Transforms never see the end-of-stream marker; the worker filters it out
/// before calling [`apply`](Transform::apply).
pub trait Transform: Send + 'static {
    /// Stable stage name used for wiring and diagnostics
    fn name(&self) -> &str;

    /// Process one line
    fn apply(&mut self, input: Vec<u8>) -> Result<Vec<u8>>;
}

/// A transform built from a closure, for tests and ad-hoc pipelines
pub struct FnTransform<F>
where
    F: FnMut(Vec<u8>) -> Result<Vec<u8>> + Send + 'static,
{
    name: String,
    func: F,
}

impl<F> FnTransform<F>
where
    F: FnMut(Vec<u8>) -> Result<Vec<u8>> + Send + 'static,
{
    /// Create a named transform from a closure
    pub fn new(name: impl Into<String>, func: F) -> Self {
        Self {
            name: name.into(),
            func,
        }
    }
}

impl<F> Transform for FnTransform<F>
where
    F: FnMut(Vec<u8>) -> Result<Vec<u8>> + Send + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn apply(&mut self, input: Vec<u8>) -> Result<Vec<u8>> {
        (self.func)(input)
    }
}

/// The place-work hook of one stage, handed to its upstream neighbour.
///
/// Cloneable and cheap; a call touches only the owning stage's queue mutex,
/// so forwarding across a stage boundary never takes a global lock.
#[derive(Clone)]
pub struct WorkSender {
    queue: Arc<BoundedQueue<Item>>,
}

impl WorkSender {
    /// Offer an item to the stage, blocking while its queue is full.
    ///
    /// Ownership moves into the stage on success; a refused item (the stage
    /// already saw end-of-stream) is released by the drop and reported as
    /// [`PipelineError::QueueFinished`].
    pub fn place(&self, item: Item) -> Result<()> {
        self.queue
            .push(item)
            .map_err(|_| PipelineError::QueueFinished)
    }
}

/// State shared between a stage façade and its worker thread
struct Shared {
    downstream: Mutex<Option<WorkSender>>,
    finished: AtomicBool,
}

/// A running pipeline stage: one bounded input queue plus one worker thread
/// driving a [`Transform`].
///
/// Lifecycle: construction starts the worker; [`attach`](Stage::attach)
/// wires the downstream hook exactly once; the worker flips the stage to
/// finished when it consumes the end-of-stream marker; [`fini`](Stage::fini)
/// drains, joins the worker and retires the stage.
pub struct Stage {
    name: String,
    queue: Arc<BoundedQueue<Item>>,
    shared: Arc<Shared>,
    attached: bool,
    worker: Option<JoinHandle<()>>,
    worker_id: ThreadId,
}

impl Stage {
    /// Build the stage's queue and start its worker thread.
    ///
    /// Fails with [`PipelineError::InvalidName`] for an empty transform
    /// name, [`PipelineError::InvalidCapacity`] for a zero capacity, or
    /// [`PipelineError::ThreadStartFailed`] if the OS refuses the thread.
    pub fn new(transform: Box<dyn Transform>, queue_capacity: usize) -> Result<Self> {
        let name = transform.name().trim().to_owned();
        if name.is_empty() {
            return Err(PipelineError::InvalidName);
        }

        let queue = Arc::new(BoundedQueue::with_capacity(queue_capacity)?);
        let shared = Arc::new(Shared {
            downstream: Mutex::new(None),
            finished: AtomicBool::new(false),
        });

        let worker = thread::Builder::new().name(format!("stage-{name}")).spawn({
            let name = name.clone();
            let queue = Arc::clone(&queue);
            let shared = Arc::clone(&shared);
            move || worker_loop(name, transform, queue, shared)
        })?;
        let worker_id = worker.thread().id();

        Ok(Self {
            name,
            queue,
            shared,
            attached: false,
            worker: Some(worker),
            worker_id,
        })
    }

    /// The stage's name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// A cloneable handle to this stage's place-work operation
    pub fn sender(&self) -> WorkSender {
        WorkSender {
            queue: Arc::clone(&self.queue),
        }
    }

    /// Offer an item to this stage's input queue (blocking while full)
    pub fn place_work(&self, item: Item) -> Result<()> {
        if self.worker.is_none() {
            return Err(PipelineError::NotRunning(self.name.clone()));
        }
        self.queue
            .push(item)
            .map_err(|_| PipelineError::QueueFinished)
    }

    /// Wire the downstream hook. `None` marks this stage as terminal.
    ///
    /// Allowed exactly once, and only while the stage has not yet consumed
    /// the end-of-stream marker.
    pub fn attach(&mut self, downstream: Option<WorkSender>) -> Result<()> {
        if self.worker.is_none() {
            return Err(PipelineError::NotRunning(self.name.clone()));
        }
        if self.shared.finished.load(Ordering::Acquire) {
            return Err(PipelineError::AlreadyFinished(self.name.clone()));
        }
        if self.attached {
            return Err(PipelineError::AlreadyAttached(self.name.clone()));
        }
        *self.shared.downstream.lock() = downstream;
        self.attached = true;
        Ok(())
    }

    /// Whether the worker has consumed the end-of-stream marker
    pub fn is_finished(&self) -> bool {
        self.shared.finished.load(Ordering::Acquire)
    }

    /// Block until this stage's queue is finished and drained. Idempotent.
    pub fn wait_finished(&self) -> Result<()> {
        if self.worker.is_none() {
            return Err(PipelineError::NotRunning(self.name.clone()));
        }
        self.queue.wait_finished();
        Ok(())
    }

    /// Drain the stage, join its worker and retire it.
    ///
    /// A second call returns [`PipelineError::NotRunning`]; calling from the
    /// stage's own worker thread returns [`PipelineError::CannotJoinSelf`]
    /// instead of deadlocking.
    pub fn fini(&mut self) -> Result<()> {
        if self.worker.is_none() {
            return Err(PipelineError::NotRunning(self.name.clone()));
        }
        if thread::current().id() == self.worker_id {
            return Err(PipelineError::CannotJoinSelf(self.name.clone()));
        }
        self.queue.wait_finished();
        if let Some(worker) = self.worker.take() {
            worker
                .join()
                .map_err(|_| PipelineError::WorkerPanicked(self.name.clone()))?;
        }
        Ok(())
    }
}

impl Drop for Stage {
    fn drop(&mut self) {
        // Safety net for stages abandoned before fini (e.g. a failed build):
        // inject the end-of-stream marker so the worker can drain and exit,
        // then join it. A stage that already ran fini has no worker left.
        if let Some(worker) = self.worker.take() {
            if thread::current().id() == self.worker_id {
                return;
            }
            let _ = self.queue.push(Item::End);
            let _ = worker.join();
        }
    }
}

/// The per-stage consumer loop (one OS thread per stage)
fn worker_loop(
    name: String,
    mut transform: Box<dyn Transform>,
    queue: Arc<BoundedQueue<Item>>,
    shared: Arc<Shared>,
) {
    loop {
        let item = match queue.pop() {
            Some(item) => item,
            // End-of-stream without a sentinel: the queue was finished
            // externally. Nothing left to drain.
            None => break,
        };

        match item {
            Item::End => {
                if let Some(next) = shared.downstream.lock().clone() {
                    // Ownership of the marker passes downstream on success.
                    if let Err(err) = next.place(Item::End) {
                        error!(target: name.as_str(), "failed to forward end-of-stream: {err}");
                    }
                }
                shared.finished.store(true, Ordering::Release);
                queue.signal_finished();
                break;
            }
            Item::Data(line) => {
                let output = match transform.apply(line) {
                    Ok(output) => output,
                    Err(err) => {
                        // The item is dropped; the pipeline stays up.
                        error!(target: name.as_str(), "transform failed: {err}");
                        continue;
                    }
                };
                match shared.downstream.lock().clone() {
                    Some(next) => {
                        if let Err(err) = next.place(Item::Data(output)) {
                            // Downstream refused; the result is released
                            // here and the loop continues.
                            error!(target: name.as_str(), "failed to forward item: {err}");
                        }
                    }
                    // Terminal stage: the transform already performed its
                    // side effect; dropping the buffer releases it.
                    None => {}
                }
            }
        }
    }
}
