//! Sweep plans: which batches to run, in which order.
//!
//! A [`SweepPlan`] iterates worker counts outermost, then payload sizes, then repetitions. Each
//! combination yields one [`BatchParams`], which the driver turns into a write batch, a read
//! batch, or both, depending on the [`Mode`].

use std::fmt;

use bytesize::ByteSize;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

const KIB: u64 = 1024;
const MIB: u64 = 1024 * KIB;
const GIB: u64 = 1024 * MIB;

/// Which operations a sweep performs for every combination.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Mode {
    /// Only read batches are issued.
    Read,
    /// A write batch followed by a read batch.
    ReadWrite,
}

impl Mode {
    pub fn includes_write(self) -> bool {
        matches!(self, Mode::ReadWrite)
    }

    pub fn includes_read(self) -> bool {
        true
    }
}

/// How the configured payload size maps to the buffer each worker sends.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum PayloadSizing {
    /// Every worker sends the full configured size.
    Total,
    /// The configured size is split across the workers, rounded to the nearest byte.
    Divided,
}

impl PayloadSizing {
    /// Computes the per-worker payload size for a batch of `workers` operations.
    ///
    /// `workers` must be positive. Halves round up.
    pub fn effective_size(self, size: u64, workers: usize) -> u64 {
        match self {
            PayloadSizing::Total => size,
            PayloadSizing::Divided => {
                let workers = workers as u64;
                size / workers + u64::from(size % workers >= workers - workers / 2)
            }
        }
    }
}

/// The named sweep configurations.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Preset {
    /// Writes then reads a payload split across 1 to 128 workers.
    ReadWriteScaling,
    /// Reads a 1 MB object with 1000 concurrent requests.
    ReadFanout,
    /// One request at a time, writing then reading 1 KiB and 1 MiB objects.
    ///
    /// Every repetition writes and then reads, so writes and reads alternate. A read therefore
    /// always follows a fresh write instead of running as a separate block of reads after all
    /// writes of a size.
    Sequential,
}

impl Preset {
    pub const ALL: [Preset; 3] = [
        Preset::ReadWriteScaling,
        Preset::ReadFanout,
        Preset::Sequential,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Preset::ReadWriteScaling => "read-write-scaling",
            Preset::ReadFanout => "read-fanout",
            Preset::Sequential => "sequential",
        }
    }

    pub fn plan(self) -> SweepPlan {
        match self {
            Preset::ReadWriteScaling => SweepPlan {
                workers: vec![1, 2, 4, 8, 16, 32, 64, 128],
                sizes: vec![KIB, MIB, GIB],
                repetitions: 10,
                sizing: PayloadSizing::Divided,
                mode: Mode::ReadWrite,
            },
            Preset::ReadFanout => SweepPlan {
                workers: vec![1000],
                sizes: vec![1_000_000],
                repetitions: 3,
                sizing: PayloadSizing::Total,
                mode: Mode::Read,
            },
            Preset::Sequential => SweepPlan {
                workers: vec![1],
                sizes: vec![KIB, MIB],
                repetitions: 10,
                sizing: PayloadSizing::Total,
                mode: Mode::ReadWrite,
            },
        }
    }
}

impl fmt::Display for Preset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for Preset {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Preset::ALL
            .into_iter()
            .find(|preset| preset.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| {
                let names: Vec<_> = Preset::ALL.iter().map(|p| p.name()).collect();
                format!("unknown preset `{s}`, expected one of: {}", names.join(", "))
            })
    }
}

/// The parameters of a full sweep.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SweepPlan {
    /// Worker counts, iterated outermost.
    pub workers: Vec<usize>,
    /// Configured payload sizes in bytes.
    pub sizes: Vec<u64>,
    /// How often every (workers, size) combination is repeated.
    pub repetitions: usize,
    pub sizing: PayloadSizing,
    pub mode: Mode,
}

impl SweepPlan {
    /// Checks that the plan issues at least one batch and that every batch has workers.
    pub fn validate(&self) -> Result<()> {
        if self.workers.is_empty() {
            return Err(Error::InvalidPlan("no worker counts configured"));
        }
        if self.workers.contains(&0) {
            return Err(Error::InvalidPlan("worker counts must be positive"));
        }
        if self.sizes.is_empty() {
            return Err(Error::InvalidPlan("no payload sizes configured"));
        }
        if self.repetitions == 0 {
            return Err(Error::InvalidPlan("repetitions must be positive"));
        }
        Ok(())
    }

    /// Iterates all combinations: worker count outermost, then size, then repetition.
    pub fn batches(&self) -> impl Iterator<Item = BatchParams> + '_ {
        self.workers.iter().flat_map(move |&workers| {
            self.sizes.iter().flat_map(move |&size| {
                (0..self.repetitions).map(move |repetition| BatchParams {
                    workers,
                    size,
                    effective_size: self.sizing.effective_size(size, workers),
                    repetition,
                })
            })
        })
    }

    /// The number of combinations [`batches`](Self::batches) yields.
    pub fn len(&self) -> usize {
        self.workers.len() * self.sizes.len() * self.repetitions
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Display for SweepPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sizes: Vec<_> = self
            .sizes
            .iter()
            .map(|size| ByteSize::b(*size).to_string())
            .collect();
        write!(
            f,
            "workers {:?}, sizes [{}], {} repetitions, sizing {:?}, mode {:?}",
            self.workers,
            sizes.join(", "),
            self.repetitions,
            self.sizing,
            self.mode,
        )
    }
}

/// One combination of a sweep.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct BatchParams {
    /// Number of concurrent operations in the batch.
    pub workers: usize,
    /// The configured payload size.
    pub size: u64,
    /// The size of the buffer each worker sends.
    pub effective_size: u64,
    /// Zero-based repetition index.
    pub repetition: usize,
}
