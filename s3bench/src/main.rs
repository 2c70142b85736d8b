//! Latency and throughput benchmark for S3-compatible object storage.
//!
//! See [`s3bench::cli`] for the available commands and [`s3bench::config`] for configuration.
#![warn(missing_docs)]
#![warn(missing_debug_implementations)]

fn main() -> anyhow::Result<()> {
    s3bench::cli::execute()
}
