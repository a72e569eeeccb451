//! Influx sink builder.
//!
//! Provides a builder pattern for constructing an [`InfluxSink`] from
//! connection settings.

use std::time::Duration;

use reqwest::Client;

use crate::storage::StorageError;
use crate::storage::influx::InfluxSink;

/// Default request timeout for writes and queries.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Builder for constructing the Influx sink.
#[derive(Debug, Clone)]
pub struct InfluxSinkBuilder {
    url: String,
    database: String,
    username: Option<String>,
    password: Option<String>,
    timeout: Duration,
}

impl InfluxSinkBuilder {
    /// Create a new builder for the server at `url` and the target `database`.
    pub fn new(url: impl Into<String>, database: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            database: database.into(),
            username: None,
            password: None,
            timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    /// Set basic credentials. Empty strings are treated as absent.
    pub fn credentials(mut self, username: Option<String>, password: Option<String>) -> Self {
        self.username = username.filter(|u| !u.is_empty());
        self.password = password.filter(|p| !p.is_empty());
        self
    }

    /// Set the request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Build the sink.
    ///
    /// # Errors
    /// Returns `StorageError::Config` if the URL is invalid, the database name
    /// is empty or the HTTP client cannot be built.
    pub fn build(self) -> Result<InfluxSink, StorageError> {
        let base = url::Url::parse(&self.url)
            .map_err(|e| StorageError::Config(format!("invalid influx url '{}': {}", self.url, e)))?;
        if base.cannot_be_a_base() {
            return Err(StorageError::Config(format!(
                "influx url '{}' cannot be used as a base url",
                self.url
            )));
        }
        if self.database.trim().is_empty() {
            return Err(StorageError::Config(
                "influx database name cannot be empty".to_string(),
            ));
        }

        let client = Client::builder()
            .timeout(self.timeout)
            .build()
            .map_err(|e| StorageError::Config(format!("failed to build HTTP client: {}", e)))?;

        Ok(InfluxSink::new(
            client,
            base,
            self.database,
            self.username,
            self.password,
        ))
    }
}
