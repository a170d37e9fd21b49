//! Produces one output segment: decode, transform, encode, write.

use crate::audio::source::AudioOpener;
use crate::config::ChirpConfig;
use crate::encode::EncoderFactory;
use crate::error::{ChirpError, Result};
use crate::pipeline::chirp::ChirpTransform;
use crate::pipeline::chunked::ChunkedEncoder;
use crate::pipeline::clock::Clock;
use crate::pipeline::plan::SegmentPlan;
use crate::pipeline::progress::ProgressEvent;
use crate::pipeline::sample_stream::SampleStream;
use crossbeam_channel::Sender;
use rand::Rng;
use std::fmt;
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// Samples between looks at the clock and the cancellation flag.
const CHECK_INTERVAL: u64 = 4096;

/// Where a segment worker is in its life.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerStage {
    Initializing,
    Decoding,
    Finalizing,
    Done,
    Failed,
}

impl fmt::Display for WorkerStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            WorkerStage::Initializing => "initializing",
            WorkerStage::Decoding => "decoding",
            WorkerStage::Finalizing => "finalizing",
            WorkerStage::Done => "done",
            WorkerStage::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Outcome of a completed segment.
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentReport {
    pub segment_index: usize,
    pub output_path: PathBuf,
    /// Samples actually written; less than planned if the input ran short.
    pub sample_count: u64,
    pub duration_sec: f64,
    pub encoded_bytes: u64,
}

/// Per-run settings every worker shares.
#[derive(Debug, Clone, Copy)]
pub struct WorkerSettings {
    pub chirp: ChirpConfig,
    pub chunk_duration_sec: f64,
    pub progress_interval: Duration,
}

/// Collaborators borrowed from the orchestrator for the length of a run.
#[derive(Clone, Copy)]
pub struct WorkerContext<'a> {
    pub opener: &'a dyn AudioOpener,
    pub encoders: &'a dyn EncoderFactory,
    pub clock: &'a dyn Clock,
    pub cancel: &'a AtomicBool,
}

/// Worker for a single [`SegmentPlan`].
pub struct SegmentWorker<'a> {
    plan: SegmentPlan,
    input_path: &'a Path,
    output_path: PathBuf,
    settings: WorkerSettings,
    context: WorkerContext<'a>,
    stage: WorkerStage,
    created_output: bool,
}

impl<'a> SegmentWorker<'a> {
    pub fn new(
        plan: SegmentPlan,
        input_path: &'a Path,
        output_path: PathBuf,
        settings: WorkerSettings,
        context: WorkerContext<'a>,
    ) -> Self {
        Self {
            plan,
            input_path,
            output_path,
            settings,
            context,
            stage: WorkerStage::Initializing,
            created_output: false,
        }
    }

    pub fn stage(&self) -> WorkerStage {
        self.stage
    }

    /// Run the segment to completion.
    ///
    /// Failures come back as [`ChirpError::Worker`] naming the stage. A worker
    /// that sees the cancellation flag returns [`ChirpError::Cancelled`]. In
    /// both cases its own partial output file is removed.
    pub fn run<R: Rng>(
        &mut self,
        rng: R,
        progress: &Sender<ProgressEvent>,
    ) -> Result<SegmentReport> {
        match self.execute(rng, progress) {
            Ok(report) => {
                self.set_stage(WorkerStage::Done);
                Ok(report)
            }
            Err(ChirpError::Cancelled) => {
                log::debug!("Segment {} cancelled", self.plan.segment_index);
                self.remove_partial_output();
                Err(ChirpError::Cancelled)
            }
            Err(source) => {
                let stage = self.stage;
                self.set_stage(WorkerStage::Failed);
                self.remove_partial_output();
                Err(ChirpError::Worker {
                    segment_index: self.plan.segment_index,
                    stage,
                    source: Box::new(source),
                })
            }
        }
    }

    fn execute<R: Rng>(
        &mut self,
        rng: R,
        progress: &Sender<ProgressEvent>,
    ) -> Result<SegmentReport> {
        let source = self.context.opener.open(self.input_path)?;
        let params = source.params();
        params.validate(self.input_path)?;
        let sample_rate_hz = params.sample_rate_hz;
        let stream = SampleStream::new(source, self.plan.sample_offset, self.plan.sample_count)?
            .with_cancel(self.context.cancel);

        let file = File::create(&self.output_path).map_err(|e| self.write_error(e))?;
        self.created_output = true;
        let encoder = self.context.encoders.create(sample_rate_hz)?;
        let mut chunked = ChunkedEncoder::new(
            encoder,
            BufWriter::new(file),
            sample_rate_hz,
            self.settings.chunk_duration_sec,
        );
        let mut transform = ChirpTransform::new(self.settings.chirp, sample_rate_hz, rng);

        self.check_cancelled()?;
        self.set_stage(WorkerStage::Decoding);

        let mut completed = 0u64;
        let mut last_report: Option<Instant> = None;
        for sample in stream {
            let sample = sample?;
            chunked
                .push(transform.apply(sample))
                .map_err(|e| self.output_error(e))?;
            completed += 1;

            if completed == 1 || completed % CHECK_INTERVAL == 0 {
                self.check_cancelled()?;
                let now = self.context.clock.now();
                let due = last_report.is_none_or(|last| {
                    now.duration_since(last) >= self.settings.progress_interval
                });
                if due {
                    last_report = Some(now);
                    self.report(progress, completed, sample_rate_hz);
                }
            }
        }

        self.check_cancelled()?;
        self.set_stage(WorkerStage::Finalizing);
        let output = chunked.finish().map_err(|e| self.output_error(e))?;
        output
            .sink
            .into_inner()
            .map_err(|e| self.write_error(e.into_error()))?;
        self.report(progress, completed, sample_rate_hz);

        Ok(SegmentReport {
            segment_index: self.plan.segment_index,
            output_path: self.output_path.clone(),
            sample_count: completed,
            duration_sec: completed as f64 / f64::from(sample_rate_hz),
            encoded_bytes: output.bytes_written,
        })
    }

    fn report(&self, progress: &Sender<ProgressEvent>, completed: u64, sample_rate_hz: u32) {
        let event = ProgressEvent {
            segment_index: self.plan.segment_index,
            output_path: self.output_path.clone(),
            completed_fraction: (completed as f64 / self.plan.sample_count as f64).min(1.0),
            completed_sec: completed as f64 / f64::from(sample_rate_hz),
        };
        if progress.send(event).is_err() {
            log::debug!(
                "Segment {}: progress receiver gone",
                self.plan.segment_index
            );
        }
    }

    fn check_cancelled(&self) -> Result<()> {
        if self.context.cancel.load(Ordering::Relaxed) {
            return Err(ChirpError::Cancelled);
        }
        Ok(())
    }

    fn set_stage(&mut self, stage: WorkerStage) {
        log::debug!(
            "Segment {}: {} -> {}",
            self.plan.segment_index,
            self.stage,
            stage
        );
        self.stage = stage;
    }

    fn write_error(&self, source: std::io::Error) -> ChirpError {
        ChirpError::OutputWrite {
            path: self.output_path.display().to_string(),
            source,
        }
    }

    fn output_error(&self, error: ChirpError) -> ChirpError {
        match error {
            ChirpError::Io(source) => self.write_error(source),
            other => other,
        }
    }

    fn remove_partial_output(&mut self) {
        if !self.created_output {
            return;
        }
        if let Err(e) = std::fs::remove_file(&self.output_path) {
            log::warn!(
                "Failed to remove partial output {}: {e}",
                self.output_path.display()
            );
        }
        self.created_output = false;
    }
}
