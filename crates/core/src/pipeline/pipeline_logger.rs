use std::collections::BTreeMap;
use std::time::Instant;

/// Observer for detection-loop timings and metrics.
///
/// Keeps the loop free of any particular output mechanism: the CLI logs
/// summaries, the desktop app and tests discard everything.
pub trait PipelineLogger: Send {
    /// Called once per completed loop iteration.
    fn tick(&mut self, index: u64);

    /// Record how long a named stage took for one frame.
    fn timing(&mut self, stage: &str, duration_ms: f64);

    /// Record a point-in-time metric (e.g. faces in the frame).
    fn metric(&mut self, name: &str, value: f64);

    fn info(&mut self, message: &str);

    /// Emit a final summary. Default: no-op.
    fn summary(&self) {}
}

/// Discards all events.
pub struct NullPipelineLogger;

impl PipelineLogger for NullPipelineLogger {
    fn tick(&mut self, _index: u64) {}
    fn timing(&mut self, _stage: &str, _duration_ms: f64) {}
    fn metric(&mut self, _name: &str, _value: f64) {}
    fn info(&mut self, _message: &str) {}
}

/// Running total and count; the loop is unbounded so raw samples are not
/// kept.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Accumulator {
    pub total: f64,
    pub count: u64,
}

impl Accumulator {
    fn add(&mut self, value: f64) {
        self.total += value;
        self.count += 1;
    }

    pub fn average(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.total / self.count as f64
        }
    }
}

/// `log`-backed logger. Every `every_ticks` iterations it logs the averages
/// of the window just finished; `summary` reports the whole run.
pub struct LogPipelineLogger {
    every_ticks: u64,
    window: BTreeMap<String, Accumulator>,
    overall: BTreeMap<String, Accumulator>,
    window_started: Instant,
    started: Instant,
    ticks: u64,
}

impl LogPipelineLogger {
    pub fn new(every_ticks: u64) -> Self {
        let now = Instant::now();
        Self {
            every_ticks: every_ticks.max(1),
            window: BTreeMap::new(),
            overall: BTreeMap::new(),
            window_started: now,
            started: now,
            ticks: 0,
        }
    }

    fn record(&mut self, key: String, value: f64) {
        self.window.entry(key.clone()).or_default().add(value);
        self.overall.entry(key).or_default().add(value);
    }

    pub fn overall(&self, key: &str) -> Option<Accumulator> {
        self.overall.get(key).copied()
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    fn format(entries: &BTreeMap<String, Accumulator>) -> String {
        entries
            .iter()
            .map(|(key, acc)| format!("{key} {:.1}", acc.average()))
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Whole-run summary, or `None` if nothing was recorded.
    pub fn summary_string(&self) -> Option<String> {
        if self.overall.is_empty() {
            return None;
        }
        let secs = self.started.elapsed().as_secs_f64();
        let mut text = format!(
            "Detection loop: {} frames in {secs:.1}s; avg {}",
            self.ticks,
            Self::format(&self.overall)
        );
        if secs > 0.0 && self.ticks > 0 {
            text.push_str(&format!("; {:.1} fps", self.ticks as f64 / secs));
        }
        Some(text)
    }
}

impl Default for LogPipelineLogger {
    fn default() -> Self {
        Self::new(120)
    }
}

impl PipelineLogger for LogPipelineLogger {
    fn tick(&mut self, index: u64) {
        self.ticks = index;
        if index % self.every_ticks != 0 || self.window.is_empty() {
            return;
        }
        let secs = self.window_started.elapsed().as_secs_f64();
        let fps = if secs > 0.0 {
            self.every_ticks as f64 / secs
        } else {
            0.0
        };
        log::info!(
            "frames {index}: {fps:.1} fps; avg {}",
            Self::format(&self.window)
        );
        self.window.clear();
        self.window_started = Instant::now();
    }

    fn timing(&mut self, stage: &str, duration_ms: f64) {
        self.record(format!("{stage}_ms"), duration_ms);
    }

    fn metric(&mut self, name: &str, value: f64) {
        self.record(name.to_string(), value);
    }

    fn info(&mut self, message: &str) {
        log::info!("{message}");
    }

    fn summary(&self) {
        if let Some(text) = self.summary_string() {
            log::info!("{text}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_null_logger_all_methods_are_noop() {
        let mut logger = NullPipelineLogger;
        logger.tick(1);
        logger.timing("detect", 5.0);
        logger.metric("faces", 3.0);
        logger.info("hello");
        logger.summary();
    }

    #[test]
    fn test_timings_and_metrics_accumulate() {
        let mut logger = LogPipelineLogger::new(100);
        logger.timing("detect", 20.0);
        logger.timing("detect", 30.0);
        logger.metric("faces", 1.0);
        logger.metric("faces", 2.0);

        let detect = logger.overall("detect_ms").unwrap();
        assert_eq!(detect.count, 2);
        assert_relative_eq!(detect.average(), 25.0);
        assert_relative_eq!(logger.overall("faces").unwrap().average(), 1.5);
    }

    #[test]
    fn test_window_resets_on_throttle_boundary() {
        let mut logger = LogPipelineLogger::new(2);
        logger.timing("draw", 1.0);
        logger.tick(1);
        assert!(!logger.window.is_empty());
        logger.tick(2);
        assert!(logger.window.is_empty());
        assert_eq!(logger.overall("draw_ms").unwrap().count, 1);
    }

    #[test]
    fn test_summary_lists_stages() {
        let mut logger = LogPipelineLogger::new(10);
        logger.timing("detect", 12.0);
        logger.timing("annotate", 1.0);
        logger.metric("faces", 1.0);
        logger.tick(1);
        let summary = logger.summary_string().unwrap();
        assert!(summary.contains("detect_ms 12.0"));
        assert!(summary.contains("annotate_ms"));
        assert!(summary.contains("faces 1.0"));
        assert!(summary.contains("1 frames"));
    }

    #[test]
    fn test_empty_summary_returns_none() {
        assert!(LogPipelineLogger::default().summary_string().is_none());
    }

    #[test]
    fn test_accumulator_empty_average() {
        assert_eq!(Accumulator::default().average(), 0.0);
    }
}
