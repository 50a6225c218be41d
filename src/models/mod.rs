//! Request and response data types

/// The result of comparing two images.
pub mod comparison;
