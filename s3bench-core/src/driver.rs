//! The benchmark driver executing a [`SweepPlan`] against a [`Storage`](crate::storage::Storage).
//!
//! For every combination of the plan, the driver issues a batch of concurrent writes (if the mode
//! includes writes), waits for all of them, and then issues a batch of concurrent reads. Each batch
//! is timed from the first issued request to the last completed one and reported as a
//! [`BatchReport`]. Batches never overlap.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::batch;
use crate::clock::{Clock, MonotonicClock};
use crate::error::Result;
use crate::payload;
use crate::storage::{SharedStorage, StorageError};
use crate::sweep::{BatchParams, SweepPlan};
use crate::target::ObjectTarget;

/// The operation performed by all workers of a batch.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum Operation {
    Write,
    Read,
}

impl Operation {
    pub fn label(self) -> &'static str {
        match self {
            Operation::Write => "WRITE",
            Operation::Read => "READ",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// What the driver does after a batch failed.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailurePolicy {
    /// Stop the sweep and return the error.
    #[default]
    Abort,
    /// Log the error, skip the rest of the combination and continue with the next one.
    Skip,
}

/// Timing of one completed batch.
#[derive(Clone, Debug, PartialEq)]
pub struct BatchReport {
    pub operation: Operation,
    pub target: ObjectTarget,
    pub elapsed_ms: f64,
    pub workers: usize,
    /// The configured payload size.
    pub size: u64,
    /// The payload size each worker transferred.
    pub effective_size: u64,
    pub repetition: usize,
    /// Total bytes transferred by all workers of the batch.
    pub bytes: u64,
}

impl BatchReport {
    /// Bytes per second transferred by this batch, if any time elapsed.
    pub fn throughput(&self) -> Option<f64> {
        (self.elapsed_ms > 0.0).then(|| self.bytes as f64 * 1000.0 / self.elapsed_ms)
    }
}

impl fmt::Display for BatchReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} from {} in {:.3} ms {} workers {} size",
            self.operation, self.target, self.elapsed_ms, self.workers, self.size
        )
    }
}

/// Outcome of a sweep that was not aborted.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct SweepSummary {
    /// Number of batches that completed successfully.
    pub batches: usize,
    /// Number of batches that failed and were skipped.
    pub failures: usize,
}

/// Runs sweeps against a fixed target object.
#[derive(Debug)]
pub struct BenchmarkDriver {
    storage: SharedStorage,
    target: Arc<ObjectTarget>,
    clock: Arc<dyn Clock>,
    failure_policy: FailurePolicy,
}

impl BenchmarkDriver {
    /// Creates a driver using a [`MonotonicClock`] and the [`FailurePolicy::Abort`] policy.
    pub fn new(storage: SharedStorage, target: ObjectTarget) -> Self {
        Self {
            storage,
            target: Arc::new(target),
            clock: Arc::new(MonotonicClock::new()),
            failure_policy: FailurePolicy::default(),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_failure_policy(mut self, failure_policy: FailurePolicy) -> Self {
        self.failure_policy = failure_policy;
        self
    }

    /// Executes every combination of `plan` in order, calling `on_batch` for each completed batch.
    ///
    /// Failed batches are logged. Depending on the [`FailurePolicy`], the first failure is either
    /// returned or counted in the returned [`SweepSummary`].
    #[tracing::instrument(
        name = "sweep",
        skip_all,
        fields(run_id = %uuid::Uuid::now_v7(), storage = self.storage.name())
    )]
    pub async fn run_sweep(
        &self,
        plan: &SweepPlan,
        mut on_batch: impl FnMut(&BatchReport),
    ) -> Result<SweepSummary> {
        plan.validate()?;
        tracing::info!(%plan, target = %self.target, "starting sweep");

        let mut summary = SweepSummary::default();
        for params in plan.batches() {
            if plan.mode.includes_write() {
                match self.write_batch(&params).await {
                    Ok(report) => {
                        summary.batches += 1;
                        on_batch(&report);
                    }
                    Err(err) => {
                        self.handle_failure(err, &params, &mut summary)?;
                        continue;
                    }
                }
            }

            if plan.mode.includes_read() {
                match self.read_batch(&params).await {
                    Ok(report) => {
                        summary.batches += 1;
                        on_batch(&report);
                    }
                    Err(err) => self.handle_failure(err, &params, &mut summary)?,
                }
            }
        }

        tracing::info!(
            batches = summary.batches,
            failures = summary.failures,
            "sweep finished"
        );
        Ok(summary)
    }

    /// Writes a fresh payload of the effective size with `params.workers` concurrent puts.
    pub async fn write_batch(&self, params: &BatchParams) -> Result<BatchReport> {
        let body = payload::filler(params.effective_size);
        let len = body.len() as u64;

        let start = self.clock.now_ms();
        let bytes = batch::run(Operation::Write, params, || {
            let storage = Arc::clone(&self.storage);
            let target = Arc::clone(&self.target);
            let body = body.clone();
            async move {
                storage.put_object(&target, body).await?;
                Ok::<_, StorageError>(len)
            }
        })
        .await?;
        let end = self.clock.now_ms();

        Ok(self.report(Operation::Write, params, end - start, bytes))
    }

    /// Reads the target object with `params.workers` concurrent gets.
    pub async fn read_batch(&self, params: &BatchParams) -> Result<BatchReport> {
        let start = self.clock.now_ms();
        let bytes = batch::run(Operation::Read, params, || {
            let storage = Arc::clone(&self.storage);
            let target = Arc::clone(&self.target);
            async move { storage.get_object(&target).await }
        })
        .await?;
        let end = self.clock.now_ms();

        Ok(self.report(Operation::Read, params, end - start, bytes))
    }

    fn report(
        &self,
        operation: Operation,
        params: &BatchParams,
        elapsed_ms: f64,
        bytes: u64,
    ) -> BatchReport {
        tracing::info!(
            %operation,
            target = %self.target,
            elapsed_ms,
            workers = params.workers,
            size = params.size,
            effective_size = params.effective_size,
            repetition = params.repetition,
            bytes,
            "batch completed"
        );

        BatchReport {
            operation,
            target: (*self.target).clone(),
            elapsed_ms,
            workers: params.workers,
            size: params.size,
            effective_size: params.effective_size,
            repetition: params.repetition,
            bytes,
        }
    }

    fn handle_failure(
        &self,
        err: crate::Error,
        params: &BatchParams,
        summary: &mut SweepSummary,
    ) -> Result<()> {
        tracing::error!(
            error = &err as &dyn std::error::Error,
            workers = params.workers,
            size = params.size,
            repetition = params.repetition,
            "batch failed"
        );

        match self.failure_policy {
            FailurePolicy::Abort => Err(err),
            FailurePolicy::Skip => {
                summary.failures += 1;
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::time::Duration;

    use super::*;
    use crate::Error;
    use crate::storage::{InMemoryStorage, StorageEvent};
    use crate::sweep::{Mode, PayloadSizing, Preset};

    /// Advances by a fixed step on every reading.
    #[derive(Debug)]
    struct StepClock {
        ticks: AtomicU64,
        step_ms: f64,
    }

    impl Clock for StepClock {
        fn now_ms(&self) -> f64 {
            self.ticks.fetch_add(1, Ordering::SeqCst) as f64 * self.step_ms
        }
    }

    fn target() -> ObjectTarget {
        ObjectTarget::new("latency-throughput-test", "test-file.txt")
    }

    fn driver(storage: &InMemoryStorage) -> BenchmarkDriver {
        s3bench_test::tracing::init();
        BenchmarkDriver::new(Arc::new(storage.clone()), target())
    }

    fn plan(workers: Vec<usize>, sizes: Vec<u64>, repetitions: usize) -> SweepPlan {
        SweepPlan {
            workers,
            sizes,
            repetitions,
            sizing: PayloadSizing::Divided,
            mode: Mode::ReadWrite,
        }
    }

    #[tokio::test]
    async fn write_batch_splits_payload_across_workers() {
        let storage = InMemoryStorage::new();
        let driver = driver(&storage);

        let mut reports = Vec::new();
        let plan = plan(vec![4], vec![1024], 1);
        let summary = driver
            .run_sweep(&plan, |report| reports.push(report.clone()))
            .await
            .unwrap();

        assert_eq!(
            summary,
            SweepSummary {
                batches: 2,
                failures: 0,
            }
        );
        assert_eq!(storage.put_calls(), 4);

        let put_sizes: Vec<_> = storage
            .events()
            .into_iter()
            .filter_map(|event| match event {
                StorageEvent::PutFinished { len } => Some(len),
                _ => None,
            })
            .collect();
        assert_eq!(put_sizes, [256, 256, 256, 256]);

        let writes: Vec<_> = reports
            .iter()
            .filter(|r| r.operation == Operation::Write)
            .collect();
        assert_eq!(writes.len(), 1);
        assert_eq!(writes[0].workers, 4);
        assert_eq!(writes[0].size, 1024);
        assert_eq!(writes[0].effective_size, 256);
        assert_eq!(writes[0].bytes, 1024);
    }

    #[tokio::test]
    async fn read_fanout_only_reads() {
        let storage = InMemoryStorage::new();
        storage.insert(target(), payload::filler(1_000_000));
        let driver = driver(&storage);

        let mut reports = Vec::new();
        driver
            .run_sweep(&Preset::ReadFanout.plan(), |report| {
                reports.push((report.operation, report.workers, report.size));
            })
            .await
            .unwrap();

        assert_eq!(reports, [(Operation::Read, 1000, 1_000_000); 3]);
        assert_eq!(storage.get_calls(), 3000);
        assert_eq!(storage.put_calls(), 0);
        assert_eq!(storage.targets().into_iter().collect::<Vec<_>>(), [target()]);
    }

    #[tokio::test]
    async fn read_batch_waits_for_write_batch() {
        let storage = InMemoryStorage::new().with_latency(Duration::from_millis(2));
        let driver = driver(&storage);

        driver
            .run_sweep(&plan(vec![1, 8], vec![64], 3), |_| {})
            .await
            .unwrap();

        let mut puts_in_flight = 0usize;
        let mut gets_in_flight = 0usize;
        for event in storage.events() {
            match event {
                StorageEvent::PutStarted => {
                    assert_eq!(gets_in_flight, 0, "write started during a read batch");
                    puts_in_flight += 1;
                }
                StorageEvent::PutFinished { .. } => puts_in_flight -= 1,
                StorageEvent::GetStarted => {
                    assert_eq!(puts_in_flight, 0, "read started during a write batch");
                    gets_in_flight += 1;
                }
                StorageEvent::GetFinished { .. } => gets_in_flight -= 1,
            }
        }
        assert_eq!(storage.put_calls(), (1 + 8) * 3);
        assert_eq!(storage.get_calls(), (1 + 8) * 3);
    }

    #[tokio::test]
    async fn elapsed_spans_the_whole_batch() {
        let storage = InMemoryStorage::new();
        let driver = driver(&storage).with_clock(Arc::new(StepClock {
            ticks: AtomicU64::new(0),
            step_ms: 5.0,
        }));

        let params = BatchParams {
            workers: 2,
            size: 10,
            effective_size: 10,
            repetition: 0,
        };
        let report = driver.write_batch(&params).await.unwrap();

        assert_eq!(report.elapsed_ms, 5.0);
        assert_eq!(report.throughput(), Some(4000.0));
        assert_eq!(
            report.to_string(),
            "WRITE from latency-throughput-test/test-file.txt in 5.000 ms 2 workers 10 size"
        );
    }

    #[tokio::test]
    async fn failed_write_aborts_sweep() {
        let storage = InMemoryStorage::new();
        storage.fail_put(2);
        let driver = driver(&storage);

        let mut reports = 0;
        let err = driver
            .run_sweep(&plan(vec![4], vec![1024], 3), |_| reports += 1)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            Error::Batch {
                operation: Operation::Write,
                workers: 4,
                ..
            }
        ));
        assert_eq!(reports, 0);
        assert_eq!(storage.get_calls(), 0);
    }

    #[tokio::test]
    async fn failed_read_is_skipped() {
        let storage = InMemoryStorage::new();
        storage.fail_get(5);
        let driver = driver(&storage).with_failure_policy(FailurePolicy::Skip);

        let mut labels = Vec::new();
        let summary = driver
            .run_sweep(&plan(vec![4], vec![1024], 3), |report| {
                labels.push((report.operation, report.repetition));
            })
            .await
            .unwrap();

        assert_eq!(
            summary,
            SweepSummary {
                batches: 5,
                failures: 1,
            }
        );
        assert_eq!(
            labels,
            [
                (Operation::Write, 0),
                (Operation::Read, 0),
                (Operation::Write, 1),
                (Operation::Write, 2),
                (Operation::Read, 2),
            ]
        );
    }

    #[tokio::test]
    async fn failed_write_skips_its_read() {
        let storage = InMemoryStorage::new();
        storage.fail_put(0);
        let driver = driver(&storage).with_failure_policy(FailurePolicy::Skip);

        let mut labels = Vec::new();
        let summary = driver
            .run_sweep(&plan(vec![1], vec![16], 2), |report| {
                labels.push((report.operation, report.repetition));
            })
            .await
            .unwrap();

        assert_eq!(summary.failures, 1);
        assert_eq!(labels, [(Operation::Write, 1), (Operation::Read, 1)]);
        assert_eq!(storage.get_calls(), 1);
    }

    #[tokio::test]
    async fn rejects_invalid_plan_before_any_request() {
        let storage = InMemoryStorage::new();
        let driver = driver(&storage);

        let err = driver
            .run_sweep(&plan(vec![0], vec![1024], 1), |_| {})
            .await
            .unwrap_err();

        assert!(matches!(err, Error::InvalidPlan(_)));
        assert!(storage.events().is_empty());
    }
}
