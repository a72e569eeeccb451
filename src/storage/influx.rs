//! InfluxDB 1.x HTTP sink.
//!
//! Writes batches with `POST /write` in line protocol and manages the target
//! database through `/query`.

use reqwest::{Client, Response};
use url::Url;

use crate::storage::line_protocol::encode_batch;
use crate::storage::{Batch, Sink, StorageError};

/// Maximum number of response body bytes kept in error messages.
const MAX_ERROR_BODY: usize = 512;

/// Sink writing to an InfluxDB 1.x compatible HTTP endpoint.
#[derive(Clone)]
pub struct InfluxSink {
    client: Client,
    base: Url,
    database: String,
    username: Option<String>,
    password: Option<String>,
}

impl std::fmt::Debug for InfluxSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InfluxSink")
            .field("base", &self.base.as_str())
            .field("database", &self.database)
            .finish_non_exhaustive()
    }
}

impl InfluxSink {
    pub(crate) fn new(
        client: Client,
        base: Url,
        database: String,
        username: Option<String>,
        password: Option<String>,
    ) -> Self {
        Self {
            client,
            base,
            database,
            username,
            password,
        }
    }

    /// Target database name.
    pub fn database(&self) -> &str {
        &self.database
    }

    /// Build `<base>/<endpoint>?<params>&u=..&p=..`.
    fn endpoint(&self, endpoint: &str, params: &[(&str, &str)]) -> Result<Url, StorageError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|()| StorageError::Config(format!("invalid base url '{}'", self.base)))?
            .pop_if_empty()
            .push(endpoint);
        {
            let mut query = url.query_pairs_mut();
            for (key, value) in params {
                query.append_pair(key, value);
            }
            if let Some(user) = &self.username {
                query.append_pair("u", user);
            }
            if let Some(pass) = &self.password {
                query.append_pair("p", pass);
            }
        }
        Ok(url)
    }

    async fn list_databases(&self) -> Result<Vec<String>, StorageError> {
        let url = self.endpoint("query", &[("q", "SHOW DATABASES")])?;
        let response = check_status(self.client.get(url).send().await?).await?;
        let body: serde_json::Value = serde_json::from_str(&response.text().await?)?;

        let names = body["results"][0]["series"][0]["values"]
            .as_array()
            .map(|rows| {
                rows.iter()
                    .filter_map(|row| row[0].as_str().map(str::to_owned))
                    .collect()
            })
            .unwrap_or_default();
        Ok(names)
    }
}

#[async_trait::async_trait]
impl Sink for InfluxSink {
    async fn ensure_database(&self) -> Result<(), StorageError> {
        let existing = self.list_databases().await?;
        if existing.iter().any(|name| name == &self.database) {
            tracing::info!(database = %self.database, "Database already exists");
            return Ok(());
        }

        let statement = format!("CREATE DATABASE \"{}\"", self.database.replace('"', "\\\""));
        let url = self.endpoint("query", &[("q", &statement)])?;
        check_status(self.client.post(url).send().await?).await?;
        tracing::info!(database = %self.database, "Database created");
        Ok(())
    }

    async fn write_batch(&self, batch: &Batch) -> Result<usize, StorageError> {
        let body = encode_batch(batch);
        let lines = body.lines().count();
        if lines == 0 {
            tracing::debug!(records = batch.len(), "Batch has no encodable records, skipping write");
            return Ok(0);
        }

        let url = self.endpoint("write", &[("db", &self.database), ("precision", "ns")])?;
        check_status(self.client.post(url).body(body).send().await?).await?;
        tracing::debug!(
            database = %self.database,
            records = lines,
            "Batch written"
        );
        Ok(lines)
    }
}

/// Turn a non-2xx response into `StorageError::Rejected`.
async fn check_status(response: Response) -> Result<Response, StorageError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let mut body = response.text().await.unwrap_or_default();
    if body.len() > MAX_ERROR_BODY {
        let mut cut = MAX_ERROR_BODY;
        while !body.is_char_boundary(cut) {
            cut -= 1;
        }
        body.truncate(cut);
    }
    Err(StorageError::Rejected {
        status: status.as_u16(),
        body: body.trim().to_string(),
    })
}
