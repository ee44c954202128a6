//! Committee and committee member models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Highest position rank counted as leadership (lower rank = more senior).
pub const LEADERSHIP_MAX_RANK: i32 = 3;

/// Lifecycle status of a committee.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum CommitteeStatus {
    Proposed,
    Active,
    Dissolved,
    Expired,
    Other(String),
}

impl CommitteeStatus {
    pub fn as_str(&self) -> &str {
        match self {
            CommitteeStatus::Proposed => "proposed",
            CommitteeStatus::Active => "active",
            CommitteeStatus::Dissolved => "dissolved",
            CommitteeStatus::Expired => "expired",
            CommitteeStatus::Other(s) => s,
        }
    }
}

impl From<String> for CommitteeStatus {
    fn from(s: String) -> Self {
        match s.as_str() {
            "proposed" => CommitteeStatus::Proposed,
            "active" => CommitteeStatus::Active,
            "dissolved" => CommitteeStatus::Dissolved,
            "expired" => CommitteeStatus::Expired,
            _ => CommitteeStatus::Other(s),
        }
    }
}

impl From<CommitteeStatus> for String {
    fn from(status: CommitteeStatus) -> Self {
        status.as_str().to_string()
    }
}

/// The governing body of a jurisdiction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Committee {
    pub id: String,
    pub jurisdiction_id: String,
    /// `full` or `convener`
    #[serde(rename = "type")]
    pub committee_type: String,
    pub status: CommitteeStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub formed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

impl Committee {
    pub fn is_active(&self) -> bool {
        self.status == CommitteeStatus::Active
    }
}

/// A person holding a position in a committee.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommitteeMember {
    pub id: String,
    pub committee_id: String,
    #[serde(default)]
    pub user_name: String,
    #[serde(default)]
    pub position_name: String,
    /// Lower is more senior. Absent when the position has no rank.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position_rank: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub joined_at: DateTime<Utc>,
}

impl CommitteeMember {
    pub fn is_leadership(&self) -> bool {
        matches!(self.position_rank, Some(rank) if rank <= LEADERSHIP_MAX_RANK)
    }
}

/// Request body for assigning a user to a committee position.
#[derive(Debug, Clone, Serialize)]
pub struct AddCommitteeMemberRequest {
    pub user_id: String,
    pub position_id: i32,
}

/// Leadership subset of a roster, in roster order.
pub fn leadership(members: &[CommitteeMember]) -> Vec<&CommitteeMember> {
    members.iter().filter(|m| m.is_leadership()).collect()
}
