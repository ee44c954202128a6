//! Search endpoint.

use serde_json::Value;
use tokio_util::sync::CancellationToken;

use super::{with_query, ApiClient};
use crate::errors::ClientResult;

impl ApiClient {
    /// GET /search?q= - Free-form results; shape is owned by the search service.
    pub async fn search(&self, query: &str) -> ClientResult<Option<Value>> {
        let endpoint = with_query("/search", &[("q", Some(query))]);
        self.get_data(&endpoint, &CancellationToken::new()).await
    }
}
