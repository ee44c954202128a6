//! Notification endpoints.

use reqwest::Method;
use tokio_util::sync::CancellationToken;

use super::{segment, ApiClient};
use crate::errors::ClientResult;
use crate::models::Notification;

impl ApiClient {
    /// GET /notifications - The backlog, newest first. Served as a bare array.
    pub async fn list_notifications(&self) -> ClientResult<Option<Vec<Notification>>> {
        self.get_list("/notifications", &CancellationToken::new())
            .await
    }

    /// POST /notifications/:id/read - Persist the read flag.
    ///
    /// Returns `Ok(false)` when the session was rejected before the flag could be stored.
    pub async fn mark_notification_read(&self, id: &str) -> ClientResult<bool> {
        let endpoint = format!("/notifications/{}/read", segment(id));
        Ok(self.request(Method::POST, &endpoint, None).await?.is_some())
    }
}
