//! Activity log endpoints.

use reqwest::Method;
use tokio_util::sync::CancellationToken;

use super::{with_query, ApiClient};
use crate::errors::ClientResult;
use crate::models::{Activity, LogActivityRequest};

impl ApiClient {
    /// GET /activities
    pub async fn list_activities(
        &self,
        jurisdiction_id: Option<&str>,
    ) -> ClientResult<Option<Vec<Activity>>> {
        let endpoint = with_query("/activities", &[("jurisdiction_id", jurisdiction_id)]);
        self.get_list(&endpoint, &CancellationToken::new()).await
    }

    /// POST /activities
    pub async fn log_activity(
        &self,
        request: &LogActivityRequest,
    ) -> ClientResult<Option<Activity>> {
        let body = serde_json::to_value(request)?;
        self.send_data(Method::POST, "/activities", Some(&body))
            .await
    }
}
