//! Parsing of textual option values
//!
//! Solvers and the network generator are configured through flat
//! string-to-string maps. These helpers turn the raw values into typed ones;
//! callers attach the option name when reporting a failure.
//!
//! Copyright (c) 2025 Mohammad Atashi <mohammadaliatashi@icloud.com>

use std::fmt::Display;
use std::str::FromStr;

use crate::math::range::Interval;

/// A value that could not be parsed into the expected type
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("cannot parse '{value}' as {expected}")]
pub struct ParseValueError {
    pub value: String,
    pub expected: &'static str,
}

impl ParseValueError {
    fn new(value: &str, expected: &'static str) -> Self {
        Self {
            value: value.to_string(),
            expected,
        }
    }
}

/// Parse a scalar value
pub fn parse_number<T: FromStr>(value: &str) -> Result<T, ParseValueError> {
    value
        .trim()
        .parse::<T>()
        .map_err(|_| ParseValueError::new(value, std::any::type_name::<T>()))
}

/// Parse a boolean flag; an empty value means the flag is present
pub fn parse_flag(value: &str) -> Result<bool, ParseValueError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "" | "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(ParseValueError::new(value, "boolean")),
    }
}

/// Parse `min:max`, or a single scalar expanded by `from_scalar`
pub fn parse_interval<T, F>(value: &str, from_scalar: F) -> Result<Interval<T>, ParseValueError>
where
    T: PartialOrd + Copy + Display + FromStr,
    F: FnOnce(T) -> Interval<T>,
{
    if value.contains(':') {
        value
            .parse::<Interval<T>>()
            .map_err(|_| ParseValueError::new(value, "interval 'min:max'"))
    } else {
        parse_number::<T>(value).map(from_scalar)
    }
}
