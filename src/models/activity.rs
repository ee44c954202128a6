//! Activity log model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Activity {
    pub id: String,
    pub jurisdiction_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub committee_id: Option<String>,
    pub title: String,
    #[serde(default)]
    pub description: String,
    /// political, social, organizational, protest, other
    pub category: String,
    pub activity_date: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jurisdiction_name: Option<String>,
}

/// Request body for `POST /activities`.
#[derive(Debug, Clone, Serialize)]
pub struct LogActivityRequest {
    pub jurisdiction_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub committee_id: Option<String>,
    pub title: String,
    pub description: String,
    pub category: String,
    pub activity_date: DateTime<Utc>,
}
