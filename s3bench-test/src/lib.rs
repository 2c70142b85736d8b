//! Test utilities for the s3bench crates.
//!
//! See the modules for all available utilities.

pub mod tracing;
