use crate::config::WindowConfig;
use ndarray::{s, Array2, ArrayView2};

/// One window cut from a recording.
#[derive(Debug, Clone, PartialEq)]
pub struct Window {
    /// Row index of the first sample; always a multiple of the step size.
    pub start: usize,
    /// Owned copy of the rows `[start, start + window_size)`, shape `(window_size, 6)`.
    pub features: Array2<f64>,
}

/// Cuts fixed-size, overlapping windows. A trailing partial window is never
/// produced.
#[derive(Debug, Clone, Copy)]
pub struct WindowSegmenter {
    window_size: usize,
    step_size: usize,
}

impl WindowSegmenter {
    pub fn new(config: &WindowConfig) -> Self {
        Self {
            window_size: config.window_size,
            step_size: config.step_size.max(1),
        }
    }

    pub fn window_size(&self) -> usize {
        self.window_size
    }

    pub fn step_size(&self) -> usize {
        self.step_size
    }

    /// `floor((n - window) / step) + 1` for `n >= window`, otherwise 0.
    pub fn window_count(&self, n: usize) -> usize {
        if n < self.window_size {
            0
        } else {
            (n - self.window_size) / self.step_size + 1
        }
    }

    /// Start index of every full window in a series of `n` rows.
    pub fn starts(&self, n: usize) -> impl Iterator<Item = usize> {
        let step = self.step_size;
        (0..self.window_count(n)).map(move |i| i * step)
    }

    /// Lazily cut `data` into windows. Each window owns its rows.
    pub fn segment<'a>(&self, data: ArrayView2<'a, f64>) -> impl Iterator<Item = Window> + 'a {
        let window_size = self.window_size;
        self.starts(data.nrows()).map(move |start| Window {
            start,
            features: data.slice(s![start..start + window_size, ..]).to_owned(),
        })
    }
}
