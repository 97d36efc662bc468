use crate::data_structure::WindowStats;

/// Fixed-capacity circular store. Writes land at `index` and overwrite the
/// oldest entry once `count` reaches capacity.
#[derive(Debug, Clone)]
pub struct TimingRing {
    buffer: Vec<f64>,
    index: usize,
    count: usize,
}

impl TimingRing {
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "ring capacity must be non-zero");
        Self {
            buffer: vec![0.0; capacity],
            index: 0,
            count: 0,
        }
    }

    pub fn push(&mut self, val: f64) {
        if self.count < self.buffer.len() {
            self.count += 1;
        }
        self.buffer[self.index] = val;
        self.index = (self.index + 1) % self.buffer.len();
    }

    /// Number of slots holding a real sample.
    pub fn valid_count(&self) -> usize {
        self.count
    }

    pub fn capacity(&self) -> usize {
        self.buffer.len()
    }

    /// Valid samples in slot order (not insertion order once wrapped).
    pub fn samples(&self) -> &[f64] {
        &self.buffer[..self.count]
    }
}

/// Per-iteration latency samples, addressed by `iteration mod window_size`.
#[derive(Debug, Clone)]
pub struct SampleBuffer {
    ring: TimingRing,
    iteration: u64,
}

impl SampleBuffer {
    pub fn new(window_size: usize) -> Self {
        Self {
            ring: TimingRing::new(window_size),
            iteration: 0,
        }
    }

    /// Stores the sample for the current iteration and returns that iteration's index.
    pub fn record(&mut self, sample_ms: f64) -> u64 {
        let i = self.iteration;
        self.ring.push(sample_ms);
        self.iteration += 1;
        i
    }

    /// Number of samples recorded so far.
    pub fn iteration(&self) -> u64 {
        self.iteration
    }

    pub fn window_size(&self) -> usize {
        self.ring.capacity()
    }

    pub fn valid_count(&self) -> usize {
        self.ring.valid_count()
    }

    /// True when iteration `i` closes a window: `i > 0 && i % window_size == 0`.
    pub fn is_window_boundary(&self, i: u64) -> bool {
        i > 0 && i % self.ring.capacity() as u64 == 0
    }

    /// Stats over every valid sample; `None` before the first record.
    pub fn snapshot_window(&self) -> Option<WindowStats> {
        let samples = self.ring.samples();
        let (&first, rest) = samples.split_first()?;

        let (mut max, mut min, mut sum) = (first, first, first);
        for &s in rest {
            max = max.max(s);
            min = min.min(s);
            sum += s;
        }

        Some(WindowStats {
            max,
            min,
            mean: sum / samples.len() as f64,
            samples: samples.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ring_counts_up_to_capacity_then_wraps() {
        let mut ring = TimingRing::new(3);
        assert_eq!(ring.valid_count(), 0);
        ring.push(1.0);
        ring.push(2.0);
        assert_eq!(ring.valid_count(), 2);
        assert_eq!(ring.samples(), &[1.0, 2.0]);

        ring.push(3.0);
        ring.push(4.0);
        assert_eq!(ring.valid_count(), 3);
        assert_eq!(ring.samples(), &[4.0, 2.0, 3.0]);
    }

    #[test]
    fn empty_buffer_has_no_window() {
        let buf = SampleBuffer::new(4);
        assert!(buf.snapshot_window().is_none());
    }

    #[test]
    fn single_sample_window_is_degenerate() {
        let mut buf = SampleBuffer::new(4);
        buf.record(0.42);
        let w = buf.snapshot_window().unwrap();
        assert_eq!(w.samples, 1);
        assert_eq!(w.max, 0.42);
        assert_eq!(w.min, 0.42);
        assert_eq!(w.mean, 0.42);
    }

    #[test]
    fn partial_fill_ignores_unwritten_slots() {
        let mut buf = SampleBuffer::new(10);
        buf.record(2.0);
        buf.record(4.0);
        let w = buf.snapshot_window().unwrap();
        // unwritten slots are zero and would drag min and mean down
        assert_eq!(w.samples, 2);
        assert_eq!(w.min, 2.0);
        assert_eq!(w.mean, 3.0);
    }

    #[test]
    fn overwritten_samples_drop_out_of_window() {
        let mut buf = SampleBuffer::new(3);
        for s in [9.0, 1.0, 1.0, 2.0] {
            buf.record(s);
        }
        let w = buf.snapshot_window().unwrap();
        assert_eq!(w.samples, 3);
        assert_eq!(w.max, 2.0);
        assert_eq!(w.min, 1.0);
    }

    #[test]
    fn record_returns_iteration_index() {
        let mut buf = SampleBuffer::new(2);
        assert_eq!(buf.record(0.1), 0);
        assert_eq!(buf.record(0.1), 1);
        assert_eq!(buf.record(0.1), 2);
        assert_eq!(buf.iteration(), 3);
    }

    #[test]
    fn window_boundary_skips_iteration_zero() {
        let buf = SampleBuffer::new(3000);
        assert!(!buf.is_window_boundary(0));
        assert!(!buf.is_window_boundary(2999));
        assert!(buf.is_window_boundary(3000));
        assert!(!buf.is_window_boundary(3001));
        assert!(buf.is_window_boundary(6000));
    }

    #[test]
    fn window_ordering_holds_for_random_samples() {
        let mut rng = fastrand::Rng::with_seed(7);
        let mut buf = SampleBuffer::new(64);
        for n in 1..=500usize {
            buf.record(rng.f64() * 3.0);
            let w = buf.snapshot_window().unwrap();
            assert_eq!(w.samples, n.min(64));
            assert!(w.max >= w.mean && w.mean >= w.min);
        }
    }
}
