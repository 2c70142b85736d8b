//! Core of the object-storage latency benchmark.
//!
//! A [`BenchmarkDriver`] executes a [`SweepPlan`]: for every combination of worker count, payload
//! size and repetition it issues a batch of concurrent writes and/or reads against a single
//! [`ObjectTarget`], waits for the whole batch, and reports its latency as a [`BatchReport`].
//!
//! The storage client is abstracted behind the [`Storage`](storage::Storage) trait, with an
//! S3-compatible implementation for real runs and an in-memory implementation for dry runs and
//! tests. Timing goes through the [`Clock`](clock::Clock) trait.
#![warn(missing_debug_implementations)]

mod batch;
pub mod clock;
pub mod driver;
pub mod error;
pub mod payload;
pub mod storage;
pub mod sweep;
pub mod target;

pub use driver::{BatchReport, BenchmarkDriver, FailurePolicy, Operation, SweepSummary};
pub use error::{Error, Result};
pub use sweep::{BatchParams, Mode, PayloadSizing, Preset, SweepPlan};
pub use target::ObjectTarget;
