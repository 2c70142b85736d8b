//! Runs a sweep as configured.

use std::sync::Arc;

use anyhow::{Context, Result};
use s3bench_core::storage::{InMemoryStorage, S3Storage, S3StorageConfig, SharedStorage};
use s3bench_core::{BenchmarkDriver, ObjectTarget, SweepPlan, payload};
use secrecy::ExposeSecret;

use crate::config::{Config, Storage};
use crate::{console, diagnostics};

/// Runs `plan` against the configured storage and prints every batch.
///
/// Fails if the sweep was aborted, or if any batch failed under the `skip` policy.
pub async fn run(config: Config, plan: SweepPlan) -> Result<()> {
    diagnostics::report_credentials(&config).await;

    let target = config.target.object();
    let storage = create_storage(config.storage, &target).await?;
    tracing::info!(storage = storage.name(), %target, "storage ready");

    let driver = BenchmarkDriver::new(storage, target).with_failure_policy(config.on_failure);
    let summary = driver
        .run_sweep(&plan, console::print_batch)
        .await
        .context("sweep aborted")?;

    console::print_summary(&summary);
    if summary.failures > 0 {
        anyhow::bail!("{} batches failed", summary.failures);
    }

    Ok(())
}

async fn create_storage(storage: Storage, target: &ObjectTarget) -> Result<SharedStorage> {
    match storage {
        Storage::S3Compatible {
            region,
            endpoint,
            path_style,
            request_timeout,
            access_key,
            secret_key,
        } => {
            let config = S3StorageConfig {
                bucket: target.bucket.clone(),
                region,
                endpoint,
                request_timeout,
                path_style,
                access_key: access_key.map(|key| key.expose_secret().as_str().to_owned()),
                secret_key: secret_key.map(|key| key.expose_secret().as_str().to_owned()),
            };

            // Credential resolution may block on instance metadata.
            let storage = tokio::task::spawn_blocking(move || S3Storage::new(config))
                .await?
                .context("failed to create S3 storage")?;
            Ok(Arc::new(storage))
        }
        Storage::Memory { preload } => {
            let storage = InMemoryStorage::new();
            if let Some(size) = preload {
                storage.insert(target.clone(), payload::filler(size.as_u64()));
            }
            Ok(Arc::new(storage))
        }
    }
}
