use std::collections::BTreeMap;
use std::time::Instant;

/// Observer for the detection loop: progress, stage timings and metrics.
///
/// The loop reports to this instead of printing, so the CLI can keep a
/// timing summary while the desktop app stays quiet.
pub trait PipelineLogger: Send {
    /// Report frame-level progress. `total` is 0 for live sources.
    fn progress(&mut self, current: usize, total: usize);

    /// Record how long a named pipeline stage took for one frame.
    fn timing(&mut self, stage: &str, duration_ms: f64);

    /// Record a point-in-time metric (e.g. faces per frame).
    fn metric(&mut self, name: &str, value: f64);

    /// Log a human-readable status message.
    fn info(&mut self, message: &str);

    /// Emit an end-of-run summary. Default: no-op.
    fn summary(&self) {}
}

/// Silent logger that discards all events.
///
/// Used by the desktop app (which shows frames instead) and by tests.
pub struct NullPipelineLogger;

impl PipelineLogger for NullPipelineLogger {
    fn progress(&mut self, _current: usize, _total: usize) {}
    fn timing(&mut self, _stage: &str, _duration_ms: f64) {}
    fn metric(&mut self, _name: &str, _value: f64) {}
    fn info(&mut self, _message: &str) {}
}

/// Per-stage timings (milliseconds) or per-frame metric samples, by name.
type Samples = BTreeMap<String, Vec<f64>>;

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

/// CLI logger: throttled progress lines, plus a closing report of where
/// the time went.
pub struct StdoutPipelineLogger {
    throttle_frames: usize,
    started: Instant,
    frames_seen: usize,
    timings: Samples,
    metrics: Samples,
    notes: Vec<String>,
}

impl StdoutPipelineLogger {
    /// Logs progress once every `throttle_frames` frames (at least 1).
    pub fn new(throttle_frames: usize) -> Self {
        Self {
            throttle_frames: throttle_frames.max(1),
            started: Instant::now(),
            frames_seen: 0,
            timings: Samples::new(),
            metrics: Samples::new(),
            notes: Vec::new(),
        }
    }

    /// The end-of-run report, or `None` when nothing was measured.
    pub fn summary_string(&self) -> Option<String> {
        if self.timings.is_empty() && self.metrics.is_empty() {
            return None;
        }

        let elapsed = self.started.elapsed().as_secs_f64();
        let mut report = vec![format!(
            "Run summary ({} frames, {elapsed:.1}s total):",
            self.frames_seen
        )];

        for (stage, durations) in &self.timings {
            let spent_ms: f64 = durations.iter().sum();
            let share = if elapsed > 0.0 {
                spent_ms / (elapsed * 10.0)
            } else {
                0.0
            };
            report.push(format!(
                "  {stage:10} {:7.1} ms/frame {spent_ms:9.0} ms {share:5.1}%",
                mean(durations)
            ));
        }
        for (name, values) in &self.metrics {
            report.push(format!("  {name}: avg {:.1}", mean(values)));
        }
        if self.frames_seen > 0 && elapsed > 0.0 {
            report.push(format!(
                "  Throughput: {:.1} fps",
                self.frames_seen as f64 / elapsed
            ));
        }

        Some(report.join("\n"))
    }

    pub fn timings_for(&self, stage: &str) -> Option<&[f64]> {
        self.timings.get(stage).map(Vec::as_slice)
    }

    pub fn metrics_for(&self, name: &str) -> Option<&[f64]> {
        self.metrics.get(name).map(Vec::as_slice)
    }
}

impl Default for StdoutPipelineLogger {
    fn default() -> Self {
        Self::new(10)
    }
}

impl PipelineLogger for StdoutPipelineLogger {
    fn progress(&mut self, current: usize, total: usize) {
        self.frames_seen = current;
        let due = current % self.throttle_frames == 0;
        match total {
            0 if due => log::info!("Processing: {current} frames"),
            0 => {}
            _ if due || current == total => log::info!(
                "Processing: {current}/{total} frames ({:.1}%)",
                current as f64 / total as f64 * 100.0
            ),
            _ => {}
        }
    }

    fn timing(&mut self, stage: &str, duration_ms: f64) {
        self.timings
            .entry(stage.to_owned())
            .or_default()
            .push(duration_ms);
    }

    fn metric(&mut self, name: &str, value: f64) {
        self.metrics.entry(name.to_owned()).or_default().push(value);
    }

    fn info(&mut self, message: &str) {
        log::info!("{message}");
        self.notes.push(message.to_owned());
    }

    fn summary(&self) {
        if let Some(report) = self.summary_string() {
            log::info!("\n{report}");
        }
    }
}
