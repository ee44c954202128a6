//! Dashboard analytics.

use serde_json::Value;
use tokio_util::sync::CancellationToken;

use super::ApiClient;
use crate::errors::ClientResult;

impl ApiClient {
    /// GET /analytics/pulse - Aggregate dashboard metrics, served unenveloped.
    pub async fn pulse(&self) -> ClientResult<Option<Value>> {
        self.get_data("/analytics/pulse", &CancellationToken::new())
            .await
    }
}
