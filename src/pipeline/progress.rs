//! Progress events and the reporters that render them.

use crate::pipeline::orchestrator::RunOverview;
use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};

/// Bar resolution: positions are tenths of a percent.
const BAR_LENGTH: u64 = 1000;

/// Snapshot of one segment's progress.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressEvent {
    pub segment_index: usize,
    pub output_path: PathBuf,
    /// In `[0, 1]`.
    pub completed_fraction: f64,
    pub completed_sec: f64,
}

/// Receives progress for a run. Called only from the supervising thread.
pub trait ProgressReporter {
    /// Called once after planning, before any worker starts.
    fn begin(&mut self, overview: &RunOverview);

    fn update(&mut self, event: &ProgressEvent);

    /// Called once after every segment completed successfully.
    fn finish(&mut self);

    /// Called instead of [`finish`](Self::finish) when the run fails.
    fn abort(&mut self) {}
}

/// Format seconds as `1h 02m 03s`.
pub fn format_hms(total_sec: f64) -> String {
    let total = total_sec.max(0.0).round() as u64;
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let seconds = total % 60;
    format!("{hours}h {minutes:02}m {seconds:02}s")
}

/// Terminal dashboard with one bar per output segment.
pub struct BarReporter {
    multi: MultiProgress,
    bars: Vec<ProgressBar>,
    planned_sec: Vec<f64>,
}

impl BarReporter {
    pub fn new() -> Self {
        Self::with_target(ProgressDrawTarget::stderr())
    }

    /// Draw nowhere; for tests and quiet runs that still want the bookkeeping.
    pub fn hidden() -> Self {
        Self::with_target(ProgressDrawTarget::hidden())
    }

    fn with_target(target: ProgressDrawTarget) -> Self {
        Self {
            multi: MultiProgress::with_draw_target(target),
            bars: Vec::new(),
            planned_sec: Vec::new(),
        }
    }

    fn style() -> ProgressStyle {
        // SAFETY: hardcoded template string, always valid
        #[allow(clippy::expect_used)]
        ProgressStyle::default_bar()
            .template("{prefix} [{bar:40.cyan/blue}] {percent:>3}% {msg} ({elapsed} / eta {eta})")
            .expect("hardcoded progress bar template")
            .progress_chars("#>-")
    }

    /// Position of the bar for `index`, for tests.
    pub fn position(&self, index: usize) -> Option<u64> {
        self.bars.get(index).map(|bar| bar.position())
    }
}

impl Default for BarReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressReporter for BarReporter {
    fn begin(&mut self, overview: &RunOverview) {
        for line in overview.summary_lines() {
            if let Err(e) = self.multi.println(&line) {
                log::warn!("Failed to print run overview: {e}");
                break;
            }
        }

        let style = Self::style();
        for plan in &overview.plans {
            let bar = self.multi.add(ProgressBar::new(BAR_LENGTH));
            bar.set_style(style.clone());
            let name = plan
                .output_path(&overview.input_path, &overview.extension)
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default();
            bar.set_prefix(name);
            self.bars.push(bar);
            self.planned_sec
                .push(plan.duration_sec(overview.params.sample_rate_hz));
        }
    }

    fn update(&mut self, event: &ProgressEvent) {
        let Some(bar) = self.bars.get(event.segment_index) else {
            log::debug!("Progress for unknown segment {}", event.segment_index);
            return;
        };
        let fraction = event.completed_fraction.clamp(0.0, 1.0);
        bar.set_position((fraction * BAR_LENGTH as f64).round() as u64);

        let planned = self
            .planned_sec
            .get(event.segment_index)
            .copied()
            .unwrap_or_default();
        bar.set_message(format!(
            "{} of {}",
            format_hms(event.completed_sec),
            format_hms(planned)
        ));
    }

    fn finish(&mut self) {
        for bar in &self.bars {
            bar.finish();
        }
    }

    /// Leave bars where they stopped and clear them so the error prints cleanly.
    fn abort(&mut self) {
        for bar in &self.bars {
            bar.abandon();
        }
        if let Err(e) = self.multi.clear() {
            log::debug!("Failed to clear progress bars: {e}");
        }
    }
}

/// Reporter that records everything it is given.
///
/// Clones share storage, so a test can keep one and give another to the
/// orchestrator.
#[derive(Debug, Clone, Default)]
pub struct CollectingReporter {
    state: Arc<Mutex<Collected>>,
}

#[derive(Debug, Default)]
struct Collected {
    overview: Option<RunOverview>,
    events: Vec<ProgressEvent>,
    finished: bool,
    aborted: bool,
}

impl CollectingReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn overview(&self) -> Option<RunOverview> {
        self.lock().overview.clone()
    }

    pub fn events(&self) -> Vec<ProgressEvent> {
        self.lock().events.clone()
    }

    /// Events for one segment, in arrival order.
    pub fn events_for(&self, segment_index: usize) -> Vec<ProgressEvent> {
        self.lock()
            .events
            .iter()
            .filter(|event| event.segment_index == segment_index)
            .cloned()
            .collect()
    }

    pub fn is_finished(&self) -> bool {
        self.lock().finished
    }

    pub fn is_aborted(&self) -> bool {
        self.lock().aborted
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Collected> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl ProgressReporter for CollectingReporter {
    fn begin(&mut self, overview: &RunOverview) {
        self.lock().overview = Some(overview.clone());
    }

    fn update(&mut self, event: &ProgressEvent) {
        self.lock().events.push(event.clone());
    }

    fn finish(&mut self) {
        self.lock().finished = true;
    }

    fn abort(&mut self) {
        self.lock().aborted = true;
    }
}

/// Reporter that ignores everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullReporter;

impl ProgressReporter for NullReporter {
    fn begin(&mut self, _overview: &RunOverview) {}

    fn update(&mut self, _event: &ProgressEvent) {}

    fn finish(&mut self) {}
}
