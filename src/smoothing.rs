use std::collections::VecDeque;

/// Trailing moving average over the last `window_size` samples.
///
/// Missing samples occupy a slot in the window but do not contribute to the
/// mean, so a window with at least one present value always yields a value.
/// Never looks ahead: the output at row `i` depends on rows `i-window+1..=i`.
pub struct MovingAverage {
    window: VecDeque<Option<f64>>,
    window_size: usize,
}

impl MovingAverage {
    /// Create a new smoother with given window size (typically 3). A zero
    /// window is treated as 1.
    pub fn new(window_size: usize) -> Self {
        let window_size = window_size.max(1);
        MovingAverage {
            window: VecDeque::with_capacity(window_size),
            window_size,
        }
    }

    /// Push a value and return the mean of the present values in the window.
    pub fn apply(&mut self, value: Option<f64>) -> Option<f64> {
        self.window.push_back(value);
        while self.window.len() > self.window_size {
            self.window.pop_front();
        }

        let (sum, count) = self
            .window
            .iter()
            .flatten()
            .fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));

        if count == 0 {
            None
        } else {
            Some(sum / count as f64)
        }
    }

    /// Smooth a whole sequence in one pass.
    pub fn smooth_all(window_size: usize, values: &[Option<f64>]) -> Vec<Option<f64>> {
        let mut smoother = Self::new(window_size);
        values.iter().map(|v| smoother.apply(*v)).collect()
    }

    /// Current number of slots filled (actual, not max)
    pub fn len(&self) -> usize {
        self.window.len()
    }

    pub fn is_empty(&self) -> bool {
        self.window.is_empty()
    }
}
