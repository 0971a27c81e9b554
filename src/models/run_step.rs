use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An audit record of one tool invocation.
///
/// Written before the tool runs, so failed and rejected calls are recorded
/// too. `payload` is the raw input exactly as the caller sent it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunStep {
    pub id: i64,
    pub run_id: i64,
    /// `tool:<name>`
    pub action: String,
    pub payload: serde_json::Value,
    pub created_at: DateTime<Utc>,
}
