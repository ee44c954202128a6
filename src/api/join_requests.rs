//! Join request ("Form Ka") endpoints.

use reqwest::Method;
use tokio_util::sync::CancellationToken;

use super::{segment, with_query, ApiClient};
use crate::errors::ClientResult;
use crate::models::{JoinRequest, JoinRequestFilter, RejectJoinRequest};

impl ApiClient {
    /// GET /join-requests - Applications matching `filter`.
    pub async fn list_join_requests(
        &self,
        filter: &JoinRequestFilter,
    ) -> ClientResult<Option<Vec<JoinRequest>>> {
        let endpoint = with_query(
            "/join-requests",
            &[
                ("status", filter.status.as_deref()),
                ("jurisdiction_id", filter.jurisdiction_id.as_deref()),
            ],
        );
        self.get_list(&endpoint, &CancellationToken::new()).await
    }

    /// PATCH /join-requests/:id/approve
    pub async fn approve_join_request(&self, id: &str) -> ClientResult<bool> {
        let endpoint = format!("/join-requests/{}/approve", segment(id));
        Ok(self.request(Method::PATCH, &endpoint, None).await?.is_some())
    }

    /// PATCH /join-requests/:id/reject
    pub async fn reject_join_request(&self, id: &str, reason: &str) -> ClientResult<bool> {
        let endpoint = format!("/join-requests/{}/reject", segment(id));
        let body = serde_json::to_value(RejectJoinRequest {
            reason: reason.to_string(),
        })?;
        Ok(self
            .request(Method::PATCH, &endpoint, Some(&body))
            .await?
            .is_some())
    }
}
