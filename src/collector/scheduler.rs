//! Fixed-period collection loop.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use thiserror::Error;
use tokio::time::Instant;

use crate::sensor::SensorSet;
use crate::storage::{Batch, Sink};

use super::measure::Collector;

/// Errors that keep the loop from starting.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// Run parameters are unusable.
    #[error("config error: {0}")]
    Config(String),
}

/// Counters reported when the loop stops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunStats {
    /// Completed cycles.
    pub cycles: u64,
    /// Batches accepted by the sink.
    pub batches_written: u64,
    /// Batches the sink rejected (dropped, not retried).
    pub batches_dropped: u64,
    /// Cycles in which no sensor produced a record.
    pub empty_cycles: u64,
}

/// Result of a single cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Batch accepted by the sink, with its record count.
    Written(usize),
    /// Sink failed; the batch was dropped.
    Dropped(usize),
    /// No records to write.
    Empty,
}

/// Runs the collector at a fixed period and hands each batch to the sink.
///
/// The period is measured between cycle starts: time spent collecting and
/// writing is subtracted from the sleep, and an overrunning cycle is followed
/// immediately by the next one.
pub struct Scheduler {
    collector: Collector,
    sink: Arc<dyn Sink>,
    sensors: SensorSet,
    measurement: String,
    interval: Duration,
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("sensors", &self.sensors.len())
            .field("measurement", &self.measurement)
            .field("interval", &self.interval)
            .finish_non_exhaustive()
    }
}

impl Scheduler {
    /// Create a scheduler.
    ///
    /// # Errors
    /// Returns `SchedulerError::Config` for a zero interval or an empty
    /// measurement name; the loop is never entered in that case.
    pub fn new(
        collector: Collector,
        sink: Arc<dyn Sink>,
        sensors: SensorSet,
        measurement: impl Into<String>,
        interval: Duration,
    ) -> Result<Self, SchedulerError> {
        let measurement = measurement.into();
        if interval.is_zero() {
            return Err(SchedulerError::Config(
                "interval must be non-zero".to_string(),
            ));
        }
        if measurement.trim().is_empty() {
            return Err(SchedulerError::Config(
                "measurement name cannot be empty".to_string(),
            ));
        }
        Ok(Self {
            collector,
            sink,
            sensors,
            measurement,
            interval,
        })
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Collect one batch stamped with the current time, without writing it.
    pub async fn collect_once(&self) -> Batch {
        self.collector
            .collect(&self.sensors, &self.measurement, Utc::now())
            .await
    }

    /// Run one cycle: collect, then write.
    ///
    /// Sink errors are logged and the batch is dropped; they never propagate.
    pub async fn run_cycle(&self) -> CycleOutcome {
        let batch = self.collect_once().await;
        let records = batch.len();

        if batch.is_empty() {
            tracing::warn!("No sensor produced a reading this cycle, nothing to write");
            return CycleOutcome::Empty;
        }

        match self.sink.write_batch(&batch).await {
            Ok(0) => {
                tracing::warn!(records, "No record had a writable field, nothing written");
                CycleOutcome::Empty
            }
            Ok(sent) => {
                tracing::debug!(records = sent, "Batch written");
                CycleOutcome::Written(sent)
            }
            Err(e) => {
                tracing::warn!(records, error = %e, "Failed to write batch, dropping it");
                CycleOutcome::Dropped(records)
            }
        }
    }

    /// Run cycles until `shutdown` resolves.
    ///
    /// Shutdown is observed both while a cycle is in flight (the cycle is
    /// abandoned) and while sleeping.
    pub async fn run(&self, shutdown: impl Future<Output = ()>) -> RunStats {
        tokio::pin!(shutdown);
        let mut stats = RunStats::default();

        tracing::info!(
            sensors = self.sensors.len(),
            measurement = %self.measurement,
            interval = ?self.interval,
            "Collection loop started"
        );

        loop {
            let started = Instant::now();

            let outcome = tokio::select! {
                biased;
                _ = &mut shutdown => break,
                outcome = self.run_cycle() => outcome,
            };
            stats.cycles += 1;
            match outcome {
                CycleOutcome::Written(_) => stats.batches_written += 1,
                CycleOutcome::Dropped(_) => stats.batches_dropped += 1,
                CycleOutcome::Empty => stats.empty_cycles += 1,
            }

            let elapsed = started.elapsed();
            let idle = self.interval.saturating_sub(elapsed);
            if idle.is_zero() {
                tracing::debug!(?elapsed, interval = ?self.interval, "Cycle overran interval, starting next cycle immediately");
            }

            tokio::select! {
                biased;
                _ = &mut shutdown => break,
                _ = tokio::time::sleep(idle) => {}
            }
        }

        tracing::info!(
            cycles = stats.cycles,
            written = stats.batches_written,
            dropped = stats.batches_dropped,
            empty = stats.empty_cycles,
            "Collection loop stopped"
        );
        stats
    }
}
