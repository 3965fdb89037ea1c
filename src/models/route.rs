use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, sqlx::FromRow)]
pub struct RouteRow {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub estimated_minutes: i32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct PoiRow {
    pub id: String,
    pub route_id: String,
    pub name: String,
    /// Position of this checkpoint along the route, ascending.
    pub ordinal: i32,
    pub latitude: f64,
    pub longitude: f64,
    pub task_prompt: Option<String>,
}

/// Per-user progress along a route, returned with every check-in response.
#[derive(Debug, Serialize)]
pub struct RouteProgress {
    pub completed: i64,
    pub total: i64,
    pub next_poi: Option<NextPoi>,
    pub is_route_completed: bool,
}

#[derive(Debug, Serialize)]
pub struct NextPoi {
    pub id: String,
    pub name: String,
}

impl RouteProgress {
    pub fn new(completed: i64, total: i64, next_poi: Option<NextPoi>) -> Self {
        Self {
            completed,
            total,
            next_poi,
            // An empty route is never "completed" — there is nothing to mint for.
            is_route_completed: total > 0 && completed >= total,
        }
    }

    pub fn remaining(&self) -> i64 {
        (self.total - self.completed).max(0)
    }
}
