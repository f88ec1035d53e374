//! Circular sample buffer with least-squares trend
//!
//! Keeps the most recent `capacity` samples of a series and, once the window
//! has been filled, fits the line `y = slope * i + intercept` over the
//! samples in chronological order (`i = 1..=capacity`, oldest first). The
//! immune solver feeds it the best cut capacity of every generation and uses
//! the slope to decide whether the search has stalled.
//!
//! Copyright (c) 2025 Mohammad Atashi <mohammadaliatashi@icloud.com>

use serde::{Deserialize, Serialize};

/// Default window size
pub const DEFAULT_TREND_WINDOW: usize = 20;

/// Fixed-capacity circular buffer with mean and linear regression
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrendBuffer {
    samples: Vec<f64>,
    /// Next write position; also the position of the oldest sample once full
    cursor: usize,
    full: bool,
    slope: f64,
    intercept: f64,
}

impl Default for TrendBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_TREND_WINDOW)
    }
}

impl TrendBuffer {
    /// Create an empty buffer holding `capacity` samples (at least one)
    pub fn new(capacity: usize) -> Self {
        Self {
            samples: vec![0.0; capacity.max(1)],
            cursor: 0,
            full: false,
            slope: 0.0,
            intercept: 0.0,
        }
    }

    /// Discard all samples and change the window size
    pub fn resize(&mut self, capacity: usize) {
        *self = Self::new(capacity);
    }

    /// Discard all samples, keeping the window size
    pub fn clear(&mut self) {
        self.samples.iter_mut().for_each(|s| *s = 0.0);
        self.cursor = 0;
        self.full = false;
        self.slope = 0.0;
        self.intercept = 0.0;
    }

    /// Push a sample, overwriting the oldest once full, and refit the trend
    pub fn insert(&mut self, sample: f64) {
        let n = self.samples.len();
        self.samples[self.cursor] = sample;
        self.cursor = (self.cursor + 1) % n;
        self.full = self.full || self.cursor == 0;
        self.calculate();
    }

    /// Window size
    #[inline]
    pub fn capacity(&self) -> usize {
        self.samples.len()
    }

    /// Number of samples currently held
    #[inline]
    pub fn count(&self) -> usize {
        if self.full {
            self.samples.len()
        } else {
            self.cursor
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        !self.full && self.cursor == 0
    }

    /// Whether the window has been filled and the trend is valid
    #[inline]
    pub fn is_full(&self) -> bool {
        self.full
    }

    /// Mean of the held samples, 0 when empty
    pub fn mean(&self) -> f64 {
        match self.count() {
            0 => 0.0,
            n => self.samples[..n].iter().sum::<f64>() / n as f64,
        }
    }

    /// Fitted slope, 0 until the window is full
    pub fn slope(&self) -> f64 {
        if self.full {
            self.slope
        } else {
            0.0
        }
    }

    /// Fitted intercept
    pub fn intercept(&self) -> f64 {
        self.intercept
    }

    /// Forecast `delta` samples past the newest one; 0 until full
    pub fn estimate(&self, delta: usize) -> f64 {
        if self.full {
            self.slope * (delta + self.samples.len()) as f64 + self.intercept
        } else {
            0.0
        }
    }

    /// Sum of squared residuals of the fit; 0 until full
    pub fn loss(&self) -> f64 {
        if !self.full {
            return 0.0;
        }
        self.chronological()
            .map(|(x, y)| {
                let residual = y - (self.slope * x + self.intercept);
                residual * residual
            })
            .sum()
    }

    /// Samples oldest first, paired with their abscissa `1..=capacity`
    fn chronological(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        let n = self.samples.len();
        (0..n).map(move |k| ((k + 1) as f64, self.samples[(self.cursor + k) % n]))
    }

    fn calculate(&mut self) {
        if !self.full {
            return;
        }
        let n = self.samples.len();
        let mean_y = self.samples.iter().sum::<f64>() / n as f64;
        let mean_x = (n as f64 + 1.0) / 2.0;

        let (num, den) = self
            .chronological()
            .fold((0.0, 0.0), |(num, den), (x, y)| {
                let dx = x - mean_x;
                (num + dx * (y - mean_y), den + dx * dx)
            });

        self.slope = if den > 0.0 { num / den } else { 0.0 };
        self.intercept = mean_y - self.slope * mean_x;
    }
}
