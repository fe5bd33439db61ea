use crate::domain::{models::payout::{format_receipt_number, PaymentReceipt}, ports::ReceiptRepository};
use crate::error::AppError;
use async_trait::async_trait;
use sqlx::{SqlitePool, Row};

pub struct SqliteReceiptRepo {
    pool: SqlitePool,
}

impl SqliteReceiptRepo {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ReceiptRepository for SqliteReceiptRepo {
    async fn issue(&self, receipt: &PaymentReceipt, commission_ids: &[String]) -> Result<PaymentReceipt, AppError> {
        let mut tx = self.pool.begin().await.map_err(AppError::Database)?;

        let row = sqlx::query("UPDATE ambassadors SET receipt_seq = receipt_seq + 1 WHERE id = ? RETURNING receipt_seq, receipt_prefix")
            .bind(&receipt.ambassador_id)
            .fetch_optional(&mut *tx).await.map_err(AppError::Database)?
            .ok_or(AppError::NotFound("Ambassador not found".into()))?;
        let receipt_number = format_receipt_number(&row.get::<String, _>("receipt_prefix"), row.get::<i64, _>("receipt_seq"));

        for id in commission_ids {
            let settled = sqlx::query("UPDATE waitlist_commissions SET status = 'paid' WHERE id = ? AND status IN ('verified', 'payable')")
                .bind(id).execute(&mut *tx).await.map_err(AppError::Database)?;
            if settled.rows_affected() == 0 {
                return Err(AppError::Conflict("Commission already settled".into()));
            }
        }

        let issued = sqlx::query_as::<_, PaymentReceipt>(
            "INSERT INTO payment_receipts (id, receipt_number, ambassador_id, ambassador_name, ambassador_email, ambassador_address, payment_date, phase1_count, phase1_amount_pence, phase2_count, phase2_amount_pence, total_pence, payment_method, payout_address, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             RETURNING *"
        )
            .bind(&receipt.id).bind(&receipt_number).bind(&receipt.ambassador_id).bind(&receipt.ambassador_name)
            .bind(&receipt.ambassador_email).bind(&receipt.ambassador_address).bind(receipt.payment_date)
            .bind(receipt.phase1_count).bind(receipt.phase1_amount_pence).bind(receipt.phase2_count).bind(receipt.phase2_amount_pence)
            .bind(receipt.total_pence).bind(&receipt.payment_method).bind(&receipt.payout_address).bind(receipt.created_at)
            .fetch_one(&mut *tx).await.map_err(AppError::Database)?;

        sqlx::query("UPDATE ambassadors SET total_paid_pence = total_paid_pence + ? WHERE id = ?")
            .bind(receipt.total_pence).bind(&receipt.ambassador_id)
            .execute(&mut *tx).await.map_err(AppError::Database)?;

        tx.commit().await.map_err(AppError::Database)?;
        Ok(issued)
    }

    async fn list_by_ambassador(&self, ambassador_id: &str) -> Result<Vec<PaymentReceipt>, AppError> {
        sqlx::query_as::<_, PaymentReceipt>("SELECT * FROM payment_receipts WHERE ambassador_id = ? ORDER BY created_at DESC")
            .bind(ambassador_id).fetch_all(&self.pool).await.map_err(AppError::Database)
    }
}
