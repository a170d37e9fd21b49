//! Segment pipeline: sample stream → chirp transform → chunked encoder.
//!
//! Each output segment is produced by its own [`SegmentWorker`] on a fixed
//! pool of threads. Workers report progress over an unbounded crossbeam
//! channel to the [`Orchestrator`], which stops the run on the first failure.

pub mod chirp;
pub mod chunked;
pub mod clock;
pub mod orchestrator;
pub mod plan;
pub mod progress;
pub mod sample_stream;
pub mod worker;

pub use chirp::{ChirpTransform, SilenceState};
pub use chunked::ChunkedEncoder;
pub use clock::{Clock, MockClock, SystemClock};
pub use orchestrator::{Orchestrator, RunOverview, RunReport};
pub use plan::SegmentPlan;
pub use progress::{
    BarReporter, CollectingReporter, NullReporter, ProgressEvent, ProgressReporter,
};
pub use sample_stream::SampleStream;
pub use worker::{SegmentReport, SegmentWorker, WorkerStage};
