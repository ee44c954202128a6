//! Membership application ("Form Ka") model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JoinRequest {
    pub id: String,
    pub full_name: String,
    #[serde(default)]
    pub full_name_bn: String,
    pub phone: String,
    #[serde(default)]
    pub occupation: String,
    #[serde(default)]
    pub address: String,
    pub jurisdiction_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jurisdiction_name: Option<String>,
    /// pending, under_review, approved, rejected, completed
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rejection_reason: Option<String>,
    pub applied_at: DateTime<Utc>,
}

/// Filters for `GET /join-requests`.
#[derive(Debug, Clone, Default)]
pub struct JoinRequestFilter {
    pub status: Option<String>,
    pub jurisdiction_id: Option<String>,
}

/// Request body for rejecting an application.
#[derive(Debug, Clone, Serialize)]
pub struct RejectJoinRequest {
    pub reason: String,
}
