use std::time::Duration;

use tracing::{debug, error, warn};

use crate::aggregate::AggregateCombiner;
use crate::clock::Clock;
use crate::data_structure::GlobalStats;
use crate::error::{Error, Result};
use crate::report::StatsSink;
use crate::rpc::ControllerRpc;
use crate::sample_buffer::SampleBuffer;
use crate::shm_region::StateRegion;
use crate::state_exchange::StateExchange;
use crate::warning::{WarningMonitor, DEFAULT_WARN_THRESHOLD_MS};

pub const DEFAULT_WINDOW_SIZE: usize = 3000;
pub const DEFAULT_PERIOD: Duration = Duration::from_millis(1);

#[derive(Debug, Clone, Copy)]
pub struct DispatchSettings {
    pub window_size: usize,
    pub period: Duration,
    pub warn_threshold_ms: f64,
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self {
            window_size: DEFAULT_WINDOW_SIZE,
            period: DEFAULT_PERIOD,
            warn_threshold_ms: DEFAULT_WARN_THRESHOLD_MS,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunSummary {
    pub iterations: u64,
    pub windows: u64,
    pub slow_samples: u64,
    pub report_errors: u64,
    pub global: GlobalStats,
}

/// Fixed-period control update loop that times every round trip.
pub struct DispatchLoop<C, R, K, S> {
    rpc: C,
    exchange: StateExchange<R>,
    clock: K,
    sink: S,
    buffer: SampleBuffer,
    combiner: AggregateCombiner,
    monitor: WarningMonitor,
    period: Duration,
    slow_samples: u64,
    report_errors: u64,
}

impl<C, R, K, S> DispatchLoop<C, R, K, S>
where
    C: ControllerRpc,
    R: StateRegion,
    K: Clock,
    S: StatsSink,
{
    pub fn new(
        rpc: C,
        exchange: StateExchange<R>,
        clock: K,
        sink: S,
        settings: DispatchSettings,
    ) -> Self {
        Self {
            rpc,
            exchange,
            clock,
            sink,
            buffer: SampleBuffer::new(settings.window_size),
            combiner: AggregateCombiner::new(),
            monitor: WarningMonitor::new(settings.warn_threshold_ms),
            period: settings.period,
            slow_samples: 0,
            report_errors: 0,
        }
    }

    /// Runs `num_iterations` rounds. A failed control update ends the run at
    /// once; windows already reported stay reported, the partial one is dropped.
    /// A failing stats sink is logged and counted but never stops the run.
    pub fn run(&mut self, num_iterations: u64) -> Result<RunSummary> {
        for _ in 0..num_iterations {
            self.step()?;
        }
        Ok(self.summary())
    }

    fn step(&mut self) -> Result<()> {
        let start = self.clock.now();

        let state = self.exchange.refresh();
        if let Err(source) = self.rpc.control_update(&state) {
            let iteration = self.buffer.iteration();
            error!(iteration, %source, "SendCommand failed.");
            return Err(Error::ControlUpdate { iteration, source });
        }

        let end = self.clock.now();
        let elapsed_ms = end.duration_since(start).as_nanos() as f64 / 1_000_000.0;

        let i = self.buffer.record(elapsed_ms);
        if let Some(slow) = self.monitor.check(i, elapsed_ms) {
            self.slow_samples += 1;
            let reported = self.sink.on_slow_sample(&slow);
            self.note_report_error(i, reported);
        }

        if self.buffer.is_window_boundary(i) {
            if let Some(window) = self.buffer.snapshot_window() {
                let global = *self.combiner.combine(&window);
                debug!(iteration = i, window = global.window_count, "window closed");
                let reported = self.sink.on_window(&window, &global);
                self.note_report_error(i, reported);
            }
        }

        self.clock.sleep_until(start + self.period);
        Ok(())
    }

    fn note_report_error(&mut self, iteration: u64, reported: Result<()>) {
        if let Err(err) = reported {
            self.report_errors += 1;
            warn!(iteration, %err, "stats report failed; continuing run");
        }
    }

    pub fn summary(&self) -> RunSummary {
        let global = *self.combiner.global();
        RunSummary {
            iterations: self.buffer.iteration(),
            windows: global.window_count,
            slow_samples: self.slow_samples,
            report_errors: self.report_errors,
            global,
        }
    }

    pub fn buffer(&self) -> &SampleBuffer {
        &self.buffer
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn rpc(&self) -> &C {
        &self.rpc
    }

    pub fn into_sink(self) -> S {
        self.sink
    }
}
