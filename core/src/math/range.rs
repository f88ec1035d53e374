//! Closed numeric intervals
//!
//! Solver and generator options describe sampling ranges such as node
//! out-degree, edge capacity or candidate life span as closed intervals
//! `[min, max]`. On the configuration surface they are written `min:max`.
//!
//! Copyright (c) 2025 Mohammad Atashi <mohammadaliatashi@icloud.com>

use std::fmt::{self, Display};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Interval construction and parsing errors
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum IntervalError {
    #[error("Invalid interval: min {min} is greater than max {max}")]
    Inverted { min: String, max: String },

    #[error("Malformed interval '{0}', expected 'min:max'")]
    Malformed(String),
}

/// Closed interval `[min, max]` with `min <= max`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Interval<T> {
    min: T,
    max: T,
}

impl<T> Interval<T>
where
    T: PartialOrd + Copy + Display,
{
    /// Create an interval, rejecting `min > max`
    pub fn new(min: T, max: T) -> Result<Self, IntervalError> {
        if min > max {
            return Err(IntervalError::Inverted {
                min: min.to_string(),
                max: max.to_string(),
            });
        }
        Ok(Self { min, max })
    }

    /// Interval spanning two bounds given in either order
    pub fn ordered(a: T, b: T) -> Self {
        if a <= b {
            Self { min: a, max: b }
        } else {
            Self { min: b, max: a }
        }
    }

    #[inline]
    pub fn min(&self) -> T {
        self.min
    }

    #[inline]
    pub fn max(&self) -> T {
        self.max
    }

    /// Inclusive membership test
    #[inline]
    pub fn contains(&self, value: T) -> bool {
        value >= self.min && value <= self.max
    }
}

impl Interval<f64> {
    /// Midpoint of the interval
    pub fn mean(&self) -> f64 {
        (self.min + self.max) / 2.0
    }
}

impl<T: Display> Display for Interval<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{},{}]", self.min, self.max)
    }
}

impl<T> FromStr for Interval<T>
where
    T: PartialOrd + Copy + Display + FromStr,
{
    type Err = IntervalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (min, max) = s
            .split_once(':')
            .ok_or_else(|| IntervalError::Malformed(s.to_string()))?;
        let min = min
            .trim()
            .parse::<T>()
            .map_err(|_| IntervalError::Malformed(s.to_string()))?;
        let max = max
            .trim()
            .parse::<T>()
            .map_err(|_| IntervalError::Malformed(s.to_string()))?;
        Self::new(min, max)
    }
}
