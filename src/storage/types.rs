//! Core data types for the storage layer.
//!
//! - [`FieldMap`]: numeric readings produced by one driver call
//! - [`Tags`]: identity tags attached to every record
//! - [`Record`]: one sensor's contribution to a batch
//! - [`Batch`]: all records of one collector pass, sharing a timestamp

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Field name to numeric value, as returned by a driver.
pub type FieldMap = BTreeMap<String, f64>;

/// Identity tags of a record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Tags {
    /// Configured sensor name.
    pub sensor: String,
    /// Free-text comment from the sensor configuration.
    pub comment: Option<String>,
}

/// A single sensor measurement inside a [`Batch`].
///
/// Records are only created through [`Batch::push`], which stamps them with
/// the batch's measurement name and timestamp.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Record {
    measurement: Arc<str>,
    tags: Tags,
    fields: FieldMap,
    timestamp: DateTime<Utc>,
}

impl Record {
    fn new(measurement: Arc<str>, tags: Tags, fields: FieldMap, timestamp: DateTime<Utc>) -> Self {
        Self {
            measurement,
            tags,
            fields,
            timestamp,
        }
    }

    /// Measurement name shared by the whole batch.
    pub fn measurement(&self) -> &str {
        &self.measurement
    }

    /// Identity tags.
    pub fn tags(&self) -> &Tags {
        &self.tags
    }

    /// Numeric fields.
    pub fn fields(&self) -> &FieldMap {
        &self.fields
    }

    /// Cycle timestamp.
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

/// Records gathered by one collector pass.
#[derive(Debug, Clone, Serialize)]
pub struct Batch {
    measurement: Arc<str>,
    timestamp: DateTime<Utc>,
    records: Vec<Record>,
}

impl Batch {
    /// Create an empty batch for a cycle.
    pub fn new(measurement: impl AsRef<str>, timestamp: DateTime<Utc>) -> Self {
        Self {
            measurement: Arc::from(measurement.as_ref()),
            timestamp,
            records: Vec::new(),
        }
    }

    /// Append one sensor's fields, tagged with the batch measurement and timestamp.
    pub fn push(&mut self, sensor: impl Into<String>, comment: Option<String>, fields: FieldMap) {
        let tags = Tags {
            sensor: sensor.into(),
            comment,
        };
        self.records.push(Record::new(
            Arc::clone(&self.measurement),
            tags,
            fields,
            self.timestamp,
        ));
    }

    pub fn measurement(&self) -> &str {
        &self.measurement
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_push_shares_timestamp_and_measurement() {
        let ts = Utc::now();
        let mut batch = Batch::new("env", ts);
        batch.push("t1", None, FieldMap::from([("temperature".to_string(), 21.5)]));
        batch.push(
            "b1",
            Some("north wall".to_string()),
            FieldMap::from([("pressure".to_string(), 1013.2)]),
        );

        assert_eq!(batch.len(), 2);
        for record in batch.records() {
            assert_eq!(record.measurement(), "env");
            assert_eq!(record.timestamp(), ts);
        }
        assert_eq!(batch.records()[0].tags().sensor, "t1");
        assert_eq!(
            batch.records()[1].tags().comment.as_deref(),
            Some("north wall")
        );
    }

    #[test]
    fn test_batch_serializes_to_json() {
        let ts = DateTime::parse_from_rfc3339("2024-05-01T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let mut batch = Batch::new("env", ts);
        batch.push("t1", None, FieldMap::from([("temperature".to_string(), 21.5)]));

        let json = serde_json::to_value(&batch).unwrap();
        assert_eq!(json["measurement"], "env");
        assert_eq!(json["records"][0]["tags"]["sensor"], "t1");
        assert!(json["records"][0]["tags"]["comment"].is_null());
        assert_eq!(json["records"][0]["fields"]["temperature"], 21.5);
        assert_eq!(json["records"][0]["timestamp"], "2024-05-01T12:00:00Z");
    }
}
