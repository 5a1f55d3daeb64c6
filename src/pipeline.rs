use crate::error::{PipelineError, Result};
use crate::item::Item;
use crate::stage::{Stage, Transform};
use crate::transforms;
use log::error;
use std::io::BufRead;

/// Maximum payload bytes per input line; longer lines are truncated to
/// their first this-many bytes
pub const MAX_LINE_BYTES: usize = 1024;

enum StageEntry {
    Named(String),
    Custom(Box<dyn Transform>),
}

/// Builder for a chain of stages sharing one queue capacity
pub struct PipelineBuilder {
    queue_capacity: usize,
    entries: Vec<StageEntry>,
}

impl PipelineBuilder {
    /// Start a builder; `queue_capacity` applies to every stage's queue
    pub fn new(queue_capacity: usize) -> Self {
        Self {
            queue_capacity,
            entries: Vec::new(),
        }
    }

    /// Append a built-in stage by name (resolved at build time)
    pub fn stage(mut self, name: impl Into<String>) -> Self {
        self.entries.push(StageEntry::Named(name.into()));
        self
    }

    /// Append a custom transform
    pub fn stage_transform(mut self, transform: Box<dyn Transform>) -> Self {
        self.entries.push(StageEntry::Custom(transform));
        self
    }

    /// Resolve names, start every stage's worker, and wire the chain.
    ///
    /// All names are resolved before any worker starts, so an unknown stage
    /// ([`PipelineError::UnknownStage`]) performs no pipeline work at all.
    /// If a stage fails to start part-way through, or a stage rejects its
    /// wiring, the already-started stages are drained and finalized in
    /// reverse order before the error is returned.
    pub fn build(self) -> Result<Pipeline> {
        if self.entries.is_empty() {
            return Err(PipelineError::NoStages);
        }

        let mut resolved = Vec::with_capacity(self.entries.len());
        for entry in self.entries {
            match entry {
                StageEntry::Named(name) => match transforms::resolve(&name) {
                    Some(transform) => resolved.push(transform),
                    None => return Err(PipelineError::UnknownStage(name)),
                },
                StageEntry::Custom(transform) => resolved.push(transform),
            }
        }

        let mut stages: Vec<Stage> = Vec::with_capacity(resolved.len());
        for transform in resolved {
            match Stage::new(transform, self.queue_capacity) {
                Ok(stage) => stages.push(stage),
                Err(err) => {
                    teardown_in_reverse(&mut stages, "failed init");
                    return Err(err);
                }
            }
        }

        // Wire S[i] to S[i+1]'s place-work; the last stage stays terminal.
        let senders: Vec<_> = stages.iter().map(Stage::sender).collect();
        for i in 0..stages.len() {
            let downstream = senders.get(i + 1).cloned();
            if let Err(err) = stages[i].attach(downstream) {
                teardown_in_reverse(&mut stages, "failed attach");
                return Err(err);
            }
        }

        Ok(Pipeline { stages })
    }
}

/// Drain and finalize already-built stages in reverse chain order, for the
/// build failure paths. Each stage gets the end-of-stream marker injected
/// directly so its worker can exit without a full pipeline drain.
fn teardown_in_reverse(stages: &mut Vec<Stage>, context: &str) {
    while let Some(mut built) = stages.pop() {
        let _ = built.place_work(Item::End);
        if let Err(err) = built.fini() {
            error!(target: built.name(), "teardown after {context}: {err}");
        }
    }
}

/// An ordered chain of running stages.
///
/// Lifecycle: [`feed`](Pipeline::feed) pumps input lines into the head
/// stage until the `<END>` line (or end of input); [`wait`](Pipeline::wait)
/// blocks until every stage has drained; [`shutdown`](Pipeline::shutdown)
/// finalizes the stages. [`run`](Pipeline::run) strings the three together.
pub struct Pipeline {
    stages: Vec<Stage>,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("stages", &self.stages.len())
            .finish()
    }
}

impl Pipeline {
    /// Number of stages in the chain
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    /// Whether the chain is empty (never true for a built pipeline)
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// The head stage's place-work hook, for callers that pump items
    /// themselves instead of using [`feed`](Pipeline::feed)
    pub fn input(&self) -> Result<crate::stage::WorkSender> {
        match self.stages.first() {
            Some(stage) => Ok(stage.sender()),
            None => Err(PipelineError::NoStages),
        }
    }

    /// Read lines from `input` and place each into the head stage.
    ///
    /// A trailing `\n` is stripped, along with one preceding `\r`. A line
    /// that is exactly `<END>` is forwarded once and ends the loop without
    /// consuming any further bytes. At end of input the marker is injected
    /// if it never appeared, so the pipeline always drains. Place-work
    /// errors are logged and the loop continues; the pipeline stays up.
    pub fn feed<R: BufRead>(&self, mut input: R) -> Result<()> {
        let first = match self.stages.first() {
            Some(stage) => stage,
            None => return Err(PipelineError::NoStages),
        };

        let mut buf = Vec::new();
        loop {
            buf.clear();
            let read = match input.read_until(b'\n', &mut buf) {
                Ok(read) => read,
                Err(err) => {
                    error!(target: first.name(), "reading input failed: {err}");
                    0
                }
            };
            if read == 0 {
                // Input ended without the sentinel; inject it so every
                // stage still drains and the run terminates.
                if let Err(err) = first.place_work(Item::End) {
                    error!(target: first.name(), "place_work failed: {err}");
                }
                return Ok(());
            }

            if buf.last() == Some(&b'\n') {
                buf.pop();
                if buf.last() == Some(&b'\r') {
                    buf.pop();
                }
            }

            // Lines pass through as raw bytes; no encoding validation.
            let item = match Item::from_line(&buf) {
                Item::Data(mut data) => {
                    data.truncate(MAX_LINE_BYTES);
                    Item::Data(data)
                }
                Item::End => Item::End,
            };
            let stop = item.is_end();

            if let Err(err) = first.place_work(item) {
                error!(target: first.name(), "place_work failed: {err}");
            }
            if stop {
                return Ok(());
            }
        }
    }

    /// Block until every stage has drained, in chain order.
    ///
    /// Ascending order is required for correctness: a later stage cannot
    /// finish before its predecessor has forwarded the end-of-stream marker.
    pub fn wait(&self) -> Result<()> {
        for stage in &self.stages {
            stage.wait_finished()?;
        }
        Ok(())
    }

    /// Finalize every stage, in reverse chain order. Fini errors are logged
    /// and never escalate.
    pub fn shutdown(mut self) {
        while let Some(mut stage) = self.stages.pop() {
            if let Err(err) = stage.fini() {
                error!(target: stage.name(), "fini failed: {err}");
            }
        }
    }

    /// Feed, wait for quiescence, then shut down
    pub fn run<R: BufRead>(self, input: R) -> Result<()> {
        self.feed(input)?;
        self.wait()?;
        self.shutdown();
        Ok(())
    }
}
