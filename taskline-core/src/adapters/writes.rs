//! Applying document writes and resolving server timestamps

use chrono::{DateTime, Duration, Utc};
use serde_json::{json, Value as JsonValue};

use crate::ports::{DocumentData, DocumentWrite, FieldWrite};

/// Store-side clock for `FieldWrite::ServerTimestamp`.
///
/// Strictly increasing within one store so two writes committed in the same
/// instant still order by commit.
#[derive(Debug, Default)]
pub(crate) struct ServerClock {
    last: Option<DateTime<Utc>>,
}

impl ServerClock {
    pub(crate) fn tick(&mut self) -> DateTime<Utc> {
        let mut now = Utc::now();
        if let Some(last) = self.last {
            if now <= last {
                now = last + Duration::microseconds(1);
            }
        }
        self.last = Some(now);
        now
    }
}

/// Timestamp as `{ "seconds", "nanos" }`, the hosted store's native shape
pub(crate) fn timestamp_object(at: DateTime<Utc>) -> JsonValue {
    json!({
        "seconds": at.timestamp(),
        "nanos": at.timestamp_subsec_nanos(),
    })
}

/// Timestamp as an RFC 3339 string
pub(crate) fn timestamp_string(at: DateTime<Utc>) -> JsonValue {
    JsonValue::String(at.to_rfc3339())
}

/// Merge `write` into `data`, replacing server-timestamp sentinels with
/// `server_time` (use `JsonValue::Null` for a not-yet-resolved write)
pub(crate) fn apply_write(data: &mut DocumentData, write: &DocumentWrite, server_time: &JsonValue) {
    for (field, value) in write {
        match value {
            FieldWrite::Value(v) => {
                data.insert(field.clone(), v.clone());
            }
            FieldWrite::ServerTimestamp => {
                data.insert(field.clone(), server_time.clone());
            }
            FieldWrite::Delete => {
                data.remove(field);
            }
        }
    }
}

/// Whether a write carries any server-timestamp sentinel
pub(crate) fn has_server_timestamp(write: &DocumentWrite) -> bool {
    write.values().any(|v| matches!(v, FieldWrite::ServerTimestamp))
}
