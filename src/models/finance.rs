//! Finance ledger models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinanceTransaction {
    pub id: String,
    pub jurisdiction_id: String,
    pub category_id: String,
    /// income, expense, transfer
    #[serde(rename = "type")]
    pub kind: String,
    pub amount: f64,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub reference_no: String,
    pub transaction_date: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinanceBalance {
    pub jurisdiction_id: String,
    pub total_income: f64,
    pub total_expense: f64,
    pub current_balance: f64,
}

/// Response data of `GET /finance/statement`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FinanceStatement {
    pub balance: Option<FinanceBalance>,
    #[serde(default)]
    pub transactions: Vec<FinanceTransaction>,
}

/// Request body for `POST /finance/transactions`.
#[derive(Debug, Clone, Serialize)]
pub struct RecordTransactionRequest {
    pub jurisdiction_id: String,
    pub category_id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub amount: f64,
    pub description: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub reference_no: String,
    pub transaction_date: DateTime<Utc>,
}
