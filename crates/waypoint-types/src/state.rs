use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One stored state record as returned by a `StateStore`.
///
/// A record can hold a string value, a numeric value, or both; the
/// persistence gateway decides which column a caller reads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateRecord {
    pub key: String,
    pub string_value: Option<String>,
    pub numeric_value: Option<f64>,
    /// Expiry as unix milliseconds. `None` means the record never expires.
    pub expire_at: Option<i64>,
    pub updated_at: DateTime<Utc>,
}

impl StateRecord {
    /// Whether the record is expired at `now_ms` (expiry at or before now).
    pub fn is_expired_at(&self, now_ms: i64) -> bool {
        self.expire_at.is_some_and(|at| at <= now_ms)
    }
}

/// Current wall-clock time as unix milliseconds.
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}
