//! A multi-stage string-processing pipeline driven by line-oriented input.
//!
//! Stages are composed by name into a chain; each stage owns a bounded
//! blocking queue and a worker thread that pops items, applies the stage's
//! transform, and forwards the result downstream. A distinguished
//! end-of-stream marker flows through the chain exactly once and drains
//! every stage before the process exits.
//!
//! # Features
//!
//! - Bounded blocking queues with a terminal "finished" phase: backpressure
//!   without busy-waiting
//! - Level-triggered monitors (condition + remembered signal bit) immune to
//!   missed wake-ups
//! - One worker thread per stage; items move by value so every buffer has
//!   exactly one owner
//! - Cooperative shutdown: the `<END>` line propagates stage to stage and
//!   each queue drains fully before teardown
//! - Built-in stage library (uppercaser, rotator, flipper, expander, logger,
//!   typewriter) behind a name registry
//!
//! # Example
//!
//! ```no_run
//! use std::io;
//! use text_pipeline::PipelineBuilder;
//!
//! # fn main() -> text_pipeline::Result<()> {
//! let pipeline = PipelineBuilder::new(20)
//!     .stage("uppercaser")
//!     .stage("rotator")
//!     .stage("logger")
//!     .build()?;
//!
//! pipeline.run(io::stdin().lock())?;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod item;
pub mod logfmt;
pub mod monitor;
pub mod pipeline;
pub mod queue;
pub mod stage;
pub mod transforms;

// Re-exports for convenience
pub use error::{PipelineError, Result};
pub use item::{Item, END_TOKEN};
pub use monitor::Monitor;
pub use pipeline::{Pipeline, PipelineBuilder, MAX_LINE_BYTES};
pub use queue::{BoundedQueue, PushError};
pub use stage::{FnTransform, Stage, Transform, WorkSender};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
