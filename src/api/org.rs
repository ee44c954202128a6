//! Organisation endpoints: jurisdictions, committees and their members.

use reqwest::Method;
use tokio_util::sync::CancellationToken;

use super::{segment, with_query, ApiClient};
use crate::errors::ClientResult;
use crate::models::{AddCommitteeMemberRequest, Committee, CommitteeMember, JurisdictionNode};

impl ApiClient {
    /// GET /org/jurisdictions - Roots when `parent_id` is `None`, else the children of `parent_id`.
    pub async fn list_jurisdictions(
        &self,
        parent_id: Option<&str>,
        cancel: &CancellationToken,
    ) -> ClientResult<Option<Vec<JurisdictionNode>>> {
        let endpoint = with_query("/org/jurisdictions", &[("parent_id", parent_id)]);
        self.get_list(&endpoint, cancel).await
    }

    /// GET /org/committees - Committees, optionally scoped by jurisdiction and status.
    pub async fn list_committees(
        &self,
        jurisdiction_id: Option<&str>,
        status: Option<&str>,
        cancel: &CancellationToken,
    ) -> ClientResult<Option<Vec<Committee>>> {
        let endpoint = with_query(
            "/org/committees",
            &[("jurisdiction_id", jurisdiction_id), ("status", status)],
        );
        self.get_list(&endpoint, cancel).await
    }

    /// GET /org/committees/:id/members - A committee's roster.
    pub async fn committee_members(
        &self,
        committee_id: &str,
        cancel: &CancellationToken,
    ) -> ClientResult<Option<Vec<CommitteeMember>>> {
        let endpoint = format!("/org/committees/{}/members", segment(committee_id));
        self.get_list(&endpoint, cancel).await
    }

    /// POST /org/committees/:id/members - Assign a user to a position.
    pub async fn add_committee_member(
        &self,
        committee_id: &str,
        request: &AddCommitteeMemberRequest,
    ) -> ClientResult<Option<CommitteeMember>> {
        let endpoint = format!("/org/committees/{}/members", segment(committee_id));
        let body = serde_json::to_value(request)?;
        self.send_data(Method::POST, &endpoint, Some(&body)).await
    }
}
