use chrono::Utc;
use uuid::Uuid;

/// Header carrying the per-call correlation id.
pub const TRACE_ID_HEADER: &str = "requestTraceId";

/// Header carrying the call's epoch-millisecond timestamp.
pub const TIMESTAMP_HEADER: &str = "timestamp";

/// Correlation metadata for exactly one outbound call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestContext {
    trace_id: Uuid,
    timestamp_millis: i64,
}

impl RequestContext {
    /// New random trace id, stamped now.
    pub fn fresh() -> Self {
        Self {
            trace_id: Uuid::new_v4(),
            timestamp_millis: Utc::now().timestamp_millis(),
        }
    }

    pub fn trace_id(&self) -> Uuid {
        self.trace_id
    }

    pub fn timestamp_millis(&self) -> i64 {
        self.timestamp_millis
    }

    pub(crate) fn headers(&self) -> [(&'static str, String); 2] {
        [
            (TRACE_ID_HEADER, self.trace_id.to_string()),
            (TIMESTAMP_HEADER, self.timestamp_millis.to_string()),
        ]
    }
}
