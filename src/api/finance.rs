//! Finance ledger endpoints.

use reqwest::Method;
use tokio_util::sync::CancellationToken;

use super::{with_query, ApiClient};
use crate::errors::ClientResult;
use crate::models::{FinanceStatement, FinanceTransaction, RecordTransactionRequest};

impl ApiClient {
    /// GET /finance/statement - Balance and one page of transactions. Pages start at 1.
    pub async fn finance_statement(
        &self,
        jurisdiction_id: &str,
        page: u32,
    ) -> ClientResult<Option<FinanceStatement>> {
        let page = page.max(1).to_string();
        let endpoint = with_query(
            "/finance/statement",
            &[
                ("jurisdiction_id", Some(jurisdiction_id)),
                ("page", Some(page.as_str())),
            ],
        );
        self.get_data(&endpoint, &CancellationToken::new()).await
    }

    /// POST /finance/transactions
    pub async fn record_transaction(
        &self,
        request: &RecordTransactionRequest,
    ) -> ClientResult<Option<FinanceTransaction>> {
        let body = serde_json::to_value(request)?;
        self.send_data(Method::POST, "/finance/transactions", Some(&body))
            .await
    }
}
