use std::fs::File;
use std::io::Write;
use std::path::Path;

use serde::Serialize;
use tracing::info;

use crate::data_structure::{GlobalStats, WindowStats};
use crate::error::Result;
use crate::warning::SlowSample;

/// Receives the observable output of the dispatch loop.
pub trait StatsSink {
    fn on_slow_sample(&mut self, _sample: &SlowSample) -> Result<()> {
        Ok(())
    }

    fn on_window(&mut self, window: &WindowStats, global: &GlobalStats) -> Result<()>;
}

impl<S: StatsSink + ?Sized> StatsSink for Box<S> {
    fn on_slow_sample(&mut self, sample: &SlowSample) -> Result<()> {
        (**self).on_slow_sample(sample)
    }

    fn on_window(&mut self, window: &WindowStats, global: &GlobalStats) -> Result<()> {
        (**self).on_window(window, global)
    }
}

impl<A: StatsSink, B: StatsSink> StatsSink for (A, B) {
    fn on_slow_sample(&mut self, sample: &SlowSample) -> Result<()> {
        self.0.on_slow_sample(sample)?;
        self.1.on_slow_sample(sample)
    }

    fn on_window(&mut self, window: &WindowStats, global: &GlobalStats) -> Result<()> {
        self.0.on_window(window, global)?;
        self.1.on_window(window, global)
    }
}

/// Logs each window report. Slow samples are already logged by the monitor.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl StatsSink for TracingSink {
    fn on_window(&mut self, window: &WindowStats, global: &GlobalStats) -> Result<()> {
        info!(
            samples = window.samples,
            "max: {}, min: {}, avg: {}",
            window.max,
            window.min,
            window.mean
        );
        info!(
            windows = global.window_count,
            "global max: {}, min: {}, avg: {}",
            global.max,
            global.min,
            global.mean
        );
        Ok(())
    }
}

#[derive(Debug, Serialize)]
struct WindowRow {
    window: u64,
    window_max_ms: f64,
    window_min_ms: f64,
    window_mean_ms: f64,
    global_max_ms: f64,
    global_min_ms: f64,
    global_mean_ms: f64,
}

/// Appends one CSV row per closed window, flushed as it is written.
pub struct CsvSink<W: Write> {
    writer: csv::Writer<W>,
}

impl CsvSink<File> {
    pub fn create(path: &Path) -> Result<Self> {
        Ok(Self {
            writer: csv::Writer::from_path(path)?,
        })
    }
}

impl<W: Write> CsvSink<W> {
    pub fn from_writer(w: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(w),
        }
    }

    pub fn into_inner(self) -> Option<W> {
        self.writer.into_inner().ok()
    }
}

impl<W: Write> StatsSink for CsvSink<W> {
    fn on_window(&mut self, window: &WindowStats, global: &GlobalStats) -> Result<()> {
        self.writer.serialize(WindowRow {
            window: global.window_count,
            window_max_ms: window.max,
            window_min_ms: window.min,
            window_mean_ms: window.mean,
            global_max_ms: global.max,
            global_min_ms: global.min,
            global_mean_ms: global.mean,
        })?;
        self.writer.flush().map_err(csv::Error::from)?;
        Ok(())
    }
}
