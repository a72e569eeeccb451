//! The sink boundary between the measurement loop and the database.

use crate::storage::{Batch, StorageError};

/// A durable destination for batches.
///
/// The scheduler calls [`Sink::write_batch`] once per cycle and treats any
/// error as "drop this batch": there is no retry and no local buffering, so
/// implementations should not retry internally either.
#[async_trait::async_trait]
pub trait Sink: Send + Sync {
    /// Make sure the target database exists, creating it if needed.
    async fn ensure_database(&self) -> Result<(), StorageError>;

    /// Write every record of `batch`, returning how many were sent.
    ///
    /// `Ok(0)` means nothing in the batch could be written and no request
    /// was made.
    async fn write_batch(&self, batch: &Batch) -> Result<usize, StorageError>;
}
