//! InfluxDB line protocol encoding.
//!
//! `measurement,tag=value field=1.5 1714564800000000000`

use std::fmt::Write;

use crate::storage::types::{Batch, Record};

/// Encode a batch, one line per record.
///
/// Records without any finite field value are skipped.
pub fn encode_batch(batch: &Batch) -> String {
    let mut body = String::new();
    for record in batch.records() {
        if let Some(line) = encode_record(record) {
            body.push_str(&line);
            body.push('\n');
        }
    }
    body
}

/// Encode one record, or `None` if it has nothing to write.
pub fn encode_record(record: &Record) -> Option<String> {
    let mut fields = String::new();
    for (key, value) in record.fields() {
        if !value.is_finite() {
            tracing::warn!(
                sensor = %record.tags().sensor,
                field = %key,
                value = %value,
                "Dropping non-finite field value"
            );
            continue;
        }
        if !fields.is_empty() {
            fields.push(',');
        }
        let _ = write!(fields, "{}={}", escape_key(key), value);
    }
    if fields.is_empty() {
        return None;
    }

    let mut line = escape_measurement(record.measurement());
    let tags = record.tags();
    // Tag keys in lexical order, as InfluxDB prefers.
    if let Some(comment) = tags.comment.as_deref().filter(|c| !c.is_empty()) {
        let _ = write!(line, ",comment={}", escape_key(comment));
    }
    if !tags.sensor.is_empty() {
        let _ = write!(line, ",sensor={}", escape_key(&tags.sensor));
    }

    let ts = record
        .timestamp()
        .timestamp_nanos_opt()
        .unwrap_or_else(|| record.timestamp().timestamp_micros() * 1_000);
    let _ = write!(line, " {} {}", fields, ts);
    Some(line)
}

fn escape_measurement(s: &str) -> String {
    escape(s, &[',', ' '])
}

/// Escaping shared by tag keys, tag values and field keys.
fn escape_key(s: &str) -> String {
    escape(s, &[',', '=', ' '])
}

fn escape(s: &str, special: &[char]) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if special.contains(&c) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}
