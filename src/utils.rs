//! Utility functions and helpers for the imagesim service

use std::str::FromStr;

use crate::error::{AppError, Result};

/// Parse an optional raw value, falling back to `default` when unset or blank
pub(crate) fn parse_or<T>(key: &str, raw: Option<String>, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match raw {
        Some(value) if !value.trim().is_empty() => value
            .trim()
            .parse()
            .map_err(|e| AppError::Config(format!("{}={:?}: {}", key, value, e))),
        _ => Ok(default),
    }
}

/// Split a comma separated list, dropping empty entries
pub(crate) fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}
