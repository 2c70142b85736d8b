//! The benchmark binary built on top of [`s3bench_core`].
//!
//! This crate wires configuration, logging and startup diagnostics around the
//! [`BenchmarkDriver`](s3bench_core::BenchmarkDriver) and prints one line per completed batch.

pub mod cli;
pub mod config;
pub mod console;
pub mod diagnostics;
pub mod observability;
pub mod run;
