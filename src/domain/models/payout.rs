use serde::{Deserialize, Serialize};
use uuid::Uuid;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::FromRow;

use crate::domain::models::ambassador::Ambassador;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct PayoutStatement {
    pub ambassador_id: String,
    pub phase1_count: i64,
    pub phase1_total_pence: i64,
    pub phase2_count: i64,
    pub phase2_total_pence: i64,
    pub total_pence: i64,
    pub as_of: DateTime<Utc>,
}

/// `1234` -> `£12.34`
pub fn format_pence(pence: i64) -> String {
    let sign = if pence < 0 { "-" } else { "" };
    let abs = pence.unsigned_abs();
    format!("{}£{}.{:02}", sign, abs / 100, abs % 100)
}

#[derive(Debug, Serialize, Deserialize, FromRow, Clone)]
pub struct PaymentReceipt {
    pub id: String,
    pub receipt_number: String,
    pub ambassador_id: String,
    pub ambassador_name: String,
    pub ambassador_email: String,
    pub ambassador_address: String,
    pub payment_date: NaiveDate,
    pub phase1_count: i64,
    pub phase1_amount_pence: i64,
    pub phase2_count: i64,
    pub phase2_amount_pence: i64,
    pub total_pence: i64,
    pub payment_method: String,
    pub payout_address: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl PaymentReceipt {
    /// Snapshot of the ambassador at issue time. `receipt_number` is assigned
    /// by the repository once the sequence has been claimed.
    pub fn draft(ambassador: &Ambassador, statement: &PayoutStatement, payment_date: NaiveDate) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            receipt_number: String::new(),
            ambassador_id: ambassador.id.clone(),
            ambassador_name: ambassador.full_name(),
            ambassador_email: ambassador.email.clone(),
            ambassador_address: ambassador.postal_address(),
            payment_date,
            phase1_count: statement.phase1_count,
            phase1_amount_pence: statement.phase1_total_pence,
            phase2_count: statement.phase2_count,
            phase2_amount_pence: statement.phase2_total_pence,
            total_pence: statement.total_pence,
            payment_method: ambassador.payout_method.clone(),
            payout_address: ambassador.payout_address.clone().or_else(|| Some(ambassador.email.clone())),
            created_at: Utc::now(),
        }
    }
}

pub fn format_receipt_number(prefix: &str, seq: i64) -> String {
    format!("{}-{:05}", prefix, seq)
}
