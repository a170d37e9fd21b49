//! Plans the output segments and runs them on a pool of worker threads.

use crate::audio::source::{AudioOpener, AudioParams};
use crate::config::Config;
use crate::encode::EncoderFactory;
use crate::error::{ChirpError, Result};
use crate::pipeline::clock::{Clock, SystemClock};
use crate::pipeline::plan::{SegmentPlan, capped_total, file_sample_count};
use crate::pipeline::progress::{ProgressEvent, ProgressReporter, format_hms};
use crate::pipeline::worker::{SegmentReport, SegmentWorker, WorkerContext, WorkerSettings};
use crossbeam_channel::{Receiver, never, select, unbounded};
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

/// Everything decided before the first worker starts.
#[derive(Debug, Clone, PartialEq)]
pub struct RunOverview {
    pub input_path: PathBuf,
    pub params: AudioParams,
    /// Mono samples that will be processed (after any duration cap).
    pub total_sample_count: u64,
    pub file_sample_count: u64,
    /// Extension of the produced files, without the dot.
    pub extension: String,
    pub plans: Vec<SegmentPlan>,
}

impl RunOverview {
    pub fn new(
        input_path: &Path,
        params: AudioParams,
        total_sample_count: u64,
        file_sample_count: u64,
        extension: &str,
    ) -> Self {
        Self {
            input_path: input_path.to_path_buf(),
            params,
            total_sample_count,
            file_sample_count,
            extension: extension.to_string(),
            plans: SegmentPlan::tile(total_sample_count, file_sample_count),
        }
    }

    pub fn segment_count(&self) -> usize {
        self.plans.len()
    }

    pub fn output_paths(&self) -> Vec<PathBuf> {
        self.plans
            .iter()
            .map(|plan| plan.output_path(&self.input_path, &self.extension))
            .collect()
    }

    /// Human-readable description of the input and the planned output.
    pub fn summary_lines(&self) -> Vec<String> {
        let rate = self.params.sample_rate_hz;
        let total_sec = self.total_sample_count as f64 / f64::from(rate);
        let file_sec = self.file_sample_count as f64 / f64::from(rate);

        vec![
            "Input:".to_string(),
            format!("  Path:                {}", self.input_path.display()),
            format!("  Duration:            {}", format_hms(total_sec)),
            format!("  Channels:            {}", self.params.channel_count),
            format!("  Sample rate:         {} Hz", group_thousands(u64::from(rate))),
            format!(
                "  Samples:             {}",
                group_thousands(self.total_sample_count)
            ),
            String::new(),
            "Output:".to_string(),
            format!(
                "  Files:               {}",
                group_thousands(self.segment_count() as u64)
            ),
            format!("  Duration:            {}", format_hms(file_sec)),
            "  Channels:            1".to_string(),
            format!("  Sample rate:         {} Hz", group_thousands(u64::from(rate))),
            format!(
                "  Samples per file:    {}",
                group_thousands(self.file_sample_count)
            ),
            String::new(),
        ]
    }
}

/// `1234567` as `1,234,567`.
fn group_thousands(value: u64) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

/// Result of a successful run, one report per segment in index order.
#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    pub segments: Vec<SegmentReport>,
}

impl RunReport {
    pub fn output_paths(&self) -> Vec<&Path> {
        self.segments
            .iter()
            .map(|segment| segment.output_path.as_path())
            .collect()
    }

    pub fn total_bytes(&self) -> u64 {
        self.segments.iter().map(|s| s.encoded_bytes).sum()
    }

    pub fn total_duration_sec(&self) -> f64 {
        self.segments.iter().map(|s| s.duration_sec).sum()
    }
}

/// Runs one input through the segment workers.
pub struct Orchestrator {
    config: Config,
    opener: Arc<dyn AudioOpener>,
    encoders: Arc<dyn EncoderFactory>,
    clock: Arc<dyn Clock>,
    seed: Option<u64>,
}

impl Orchestrator {
    pub fn new(
        config: Config,
        opener: Arc<dyn AudioOpener>,
        encoders: Arc<dyn EncoderFactory>,
    ) -> Self {
        Self {
            config,
            opener,
            encoders,
            clock: Arc::new(SystemClock),
            seed: None,
        }
    }

    /// Sets a custom clock (for deterministic testing).
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Seed chirp noise so runs are reproducible. Segment `n` uses `seed + n`.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Read the input's format and split it into segments.
    ///
    /// Nothing is written; errors here mean no output file was created.
    pub fn plan(&self, input: &Path) -> Result<RunOverview> {
        let params = self.opener.open(input)?.params();
        params.validate(input)?;

        let rate = params.sample_rate_hz;
        let total = capped_total(
            params.total_sample_count(),
            self.config.split.max_encode_duration_sec,
            rate,
        );
        if total == 0 {
            return Err(ChirpError::UnreadableAudio {
                path: input.display().to_string(),
                message: "no samples to encode".to_string(),
            });
        }
        let per_file = file_sample_count(self.config.split.file_duration_sec, rate, total);

        Ok(RunOverview::new(
            input,
            params,
            total,
            per_file,
            self.encoders.extension(),
        ))
    }

    /// Process `input`, writing one file per segment next to it.
    ///
    /// The first segment failure cancels the others and is returned; cancelled
    /// segments remove their partial files.
    pub fn run(&self, input: &Path, reporter: &mut dyn ProgressReporter) -> Result<RunReport> {
        let overview = self.plan(input)?;
        let segment_count = overview.segment_count();
        let worker_count = self.config.split.worker_count.clamp(1, segment_count);
        log::info!(
            "Splitting {} into {} segment(s) of up to {} on {} worker(s)",
            input.display(),
            segment_count,
            format_hms(overview.file_sample_count as f64 / f64::from(overview.params.sample_rate_hz)),
            worker_count
        );
        reporter.begin(&overview);

        let (job_tx, job_rx) = unbounded::<SegmentPlan>();
        for plan in &overview.plans {
            job_tx
                .send(*plan)
                .map_err(|_| ChirpError::Other("segment queue closed".to_string()))?;
        }
        drop(job_tx);

        let (result_tx, result_rx) = unbounded::<Result<SegmentReport>>();
        let (progress_tx, progress_rx) = unbounded::<ProgressEvent>();
        let cancel = AtomicBool::new(false);
        let settings = WorkerSettings {
            chirp: self.config.chirp,
            chunk_duration_sec: self.config.encoder.chunk_duration_sec,
            progress_interval: Duration::try_from_secs_f64(
                self.config.progress.update_interval_sec.max(0.0),
            )
            .unwrap_or(Duration::MAX),
        };
        let context = WorkerContext {
            opener: &*self.opener,
            encoders: &*self.encoders,
            clock: &*self.clock,
            cancel: &cancel,
        };
        let extension = overview.extension.as_str();

        let outcome = thread::scope(|scope| {
            let handles: Vec<_> = (0..worker_count)
                .map(|_| {
                    let job_rx = job_rx.clone();
                    let result_tx = result_tx.clone();
                    let progress_tx = progress_tx.clone();
                    scope.spawn(move || {
                        for plan in job_rx.iter() {
                            if context.cancel.load(Ordering::Relaxed) {
                                break;
                            }
                            let output = plan.output_path(input, extension);
                            let result = self.run_segment(
                                plan,
                                input,
                                output,
                                settings,
                                context,
                                &progress_tx,
                            );
                            if matches!(&result, Err(e) if !matches!(e, ChirpError::Cancelled)) {
                                context.cancel.store(true, Ordering::SeqCst);
                            }
                            if result_tx.send(result).is_err() {
                                break;
                            }
                        }
                    })
                })
                .collect();
            // Workers hold the only senders from here on
            drop(result_tx);
            drop(progress_tx);

            let outcome = supervise(
                segment_count,
                &result_rx,
                &progress_rx,
                &cancel,
                &mut *reporter,
            );

            for handle in handles {
                if let Err(panic_info) = handle.join() {
                    log::error!(
                        "Segment worker thread panicked: {}",
                        panic_message(panic_info.as_ref())
                    );
                }
            }
            outcome
        });

        let mut segments = match outcome {
            Ok(segments) => segments,
            Err(e) => {
                reporter.abort();
                return Err(e);
            }
        };
        for event in progress_rx.try_iter() {
            reporter.update(&event);
        }
        segments.sort_by_key(|segment| segment.segment_index);
        reporter.finish();

        log::info!(
            "Wrote {} segment(s), {} bytes",
            segments.len(),
            segments.iter().map(|s| s.encoded_bytes).sum::<u64>()
        );
        Ok(RunReport { segments })
    }

    /// Run one worker, turning a panic into a worker failure.
    fn run_segment(
        &self,
        plan: SegmentPlan,
        input: &Path,
        output: PathBuf,
        settings: WorkerSettings,
        context: WorkerContext<'_>,
        progress: &crossbeam_channel::Sender<ProgressEvent>,
    ) -> Result<SegmentReport> {
        let mut worker = SegmentWorker::new(plan, input, output, settings, context);
        let rng = self.rng_for(plan.segment_index);

        match panic::catch_unwind(AssertUnwindSafe(|| worker.run(rng, progress))) {
            Ok(result) => result,
            Err(panic_info) => Err(ChirpError::Worker {
                segment_index: plan.segment_index,
                stage: worker.stage(),
                source: Box::new(ChirpError::Other(format!(
                    "worker panicked: {}",
                    panic_message(panic_info.as_ref())
                ))),
            }),
        }
    }

    fn rng_for(&self, segment_index: usize) -> StdRng {
        match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed.wrapping_add(segment_index as u64)),
            None => StdRng::from_entropy(),
        }
    }
}

/// Wait for every segment, forwarding progress as it arrives.
///
/// Returns on the first failure after raising the cancellation flag.
fn supervise(
    segment_count: usize,
    results: &Receiver<Result<SegmentReport>>,
    progress: &Receiver<ProgressEvent>,
    cancel: &AtomicBool,
    reporter: &mut dyn ProgressReporter,
) -> Result<Vec<SegmentReport>> {
    let mut reports = Vec::with_capacity(segment_count);
    let idle = never();
    let mut progress_open = true;

    while reports.len() < segment_count {
        let progress_source = if progress_open { progress } else { &idle };
        select! {
            recv(results) -> msg => match msg {
                Ok(Ok(report)) => {
                    log::debug!(
                        "Segment {} done: {}",
                        report.segment_index,
                        report.output_path.display()
                    );
                    reports.push(report);
                }
                Ok(Err(ChirpError::Cancelled)) => {}
                Ok(Err(e)) => {
                    cancel.store(true, Ordering::SeqCst);
                    return Err(e);
                }
                Err(_) => {
                    cancel.store(true, Ordering::SeqCst);
                    return Err(ChirpError::Other(format!(
                        "workers stopped after {} of {} segment(s)",
                        reports.len(),
                        segment_count
                    )));
                }
            },
            recv(progress_source) -> msg => match msg {
                Ok(event) => reporter.update(&event),
                Err(_) => progress_open = false,
            },
        }
    }

    Ok(reports)
}

fn panic_message(panic_info: &(dyn Any + Send)) -> &str {
    panic_info
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| panic_info.downcast_ref::<String>().map(|s| s.as_str()))
        .unwrap_or("unknown panic")
}
