use crate::data_structure::{GlobalStats, WindowStats};

/// Folds closed windows into a running [`GlobalStats`].
///
/// The running mean averages per-window means with equal weight:
/// `mean' = ((k - 1) * mean + window_mean) / k` for the k-th window. Windows
/// are fixed-size, so this matches the sample-weighted mean; it would not if
/// window sizes ever varied. Combination must follow window-closure order.
#[derive(Debug, Clone, Default)]
pub struct AggregateCombiner {
    global: GlobalStats,
}

impl AggregateCombiner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn combine(&mut self, window: &WindowStats) -> &GlobalStats {
        let g = &mut self.global;

        if window.max > g.max {
            g.max = window.max;
        }
        if window.min < g.min {
            g.min = window.min;
        }

        g.window_count += 1;
        let k = g.window_count as f64;
        g.mean = ((k - 1.0) * g.mean + window.mean) / k;

        &self.global
    }

    pub fn global(&self) -> &GlobalStats {
        &self.global
    }
}
