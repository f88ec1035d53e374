//! Numeric support for the stochastic solvers
//! Copyright (c) 2025 Mohammad Atashi <mohammadaliatashi@icloud.com>

pub mod parse;
pub mod random;
pub mod range;
pub mod trend;

pub use self::parse::ParseValueError;
pub use self::random::RandomSource;
pub use self::range::{Interval, IntervalError};
pub use self::trend::TrendBuffer;
