use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize, sqlx::Type, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "varchar", rename_all = "lowercase")]
pub enum CheckinStatus {
    Pending,
    Approved,
    Rejected,
    Flagged,
}

#[derive(Debug, Serialize, Deserialize, sqlx::FromRow)]
pub struct CheckinRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub route_id: String,
    pub poi_id: String,
    pub status: CheckinStatus,
    pub signature: String,
    pub message: String,
    /// Arbitrary task payload submitted with the check-in (quiz answer,
    /// photo URL, device fingerprint, ...). Stored verbatim.
    pub task_data: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

/// Fields required to record a new check-in.
pub struct NewCheckin {
    pub user_id: Uuid,
    pub route_id: String,
    pub poi_id: String,
    pub status: CheckinStatus,
    pub signature: String,
    pub message: String,
    pub task_data: Option<serde_json::Value>,
}

/// A distinct (user, route) pair that has at least one approved check-in.
/// Unit of work for the completion sweep.
#[derive(Debug, Clone, PartialEq, Eq, Hash, sqlx::FromRow)]
pub struct CompletionCandidate {
    pub user_id: Uuid,
    pub route_id: String,
}

impl CompletionCandidate {
    /// Cache key used by the sweep's local skip-cache.
    pub fn key(&self) -> String {
        format!("{}:{}", self.user_id, self.route_id)
    }
}
