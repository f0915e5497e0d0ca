use crate::framework::DatabaseProcessor;
use kanau::processor::Processor;
use rust_decimal::Decimal;
use signup_sdk::objects::payment::{PurchaseResponse, PurchaseStatus as SdkPurchaseStatus};
use url::Url;
use uuid::Uuid;

/// Purchase status for database operations.
///
/// This is the sqlx::Type version. For API/DTO use, see
/// `signup_sdk::objects::payment::PurchaseStatus`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, sqlx::Type)]
#[sqlx(rename_all = "lowercase", type_name = "purchase_status")]
pub enum PurchaseStatus {
    Pending,
    Completed,
    Failed,
}

impl PurchaseStatus {
    pub fn is_final(self) -> bool {
        !matches!(self, PurchaseStatus::Pending)
    }
}

impl From<PurchaseStatus> for SdkPurchaseStatus {
    fn from(value: PurchaseStatus) -> Self {
        match value {
            PurchaseStatus::Pending => SdkPurchaseStatus::Pending,
            PurchaseStatus::Completed => SdkPurchaseStatus::Completed,
            PurchaseStatus::Failed => SdkPurchaseStatus::Failed,
        }
    }
}

/// State of a purchase's claim on the program's class-rep pool.
///
/// `Provisional` and `Committed` both count toward the pool limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, sqlx::Type)]
#[sqlx(rename_all = "lowercase", type_name = "class_rep_hold")]
pub enum ClassRepHold {
    Provisional,
    Committed,
    Released,
}

impl ClassRepHold {
    pub fn occupies_slot(self) -> bool {
        !matches!(self, ClassRepHold::Released)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct Purchase {
    pub id: Uuid,
    pub user_id: Uuid,
    pub program_id: Uuid,
    pub amount: Decimal,
    pub currency: String,
    pub status: PurchaseStatus,
    pub class_rep_hold: Option<ClassRepHold>,
    /// Set once the payment provider has opened a checkout session.
    pub checkout_session_id: Option<String>,
    pub created_at: time::PrimitiveDateTime,
    pub completed_at: Option<time::PrimitiveDateTime>,
}

impl Purchase {
    pub fn new_pending(
        user_id: Uuid,
        program_id: Uuid,
        amount: Decimal,
        currency: String,
        class_rep: bool,
    ) -> Self {
        Self {
            id: Uuid::now_v7(),
            user_id,
            program_id,
            amount,
            currency,
            status: PurchaseStatus::Pending,
            class_rep_hold: class_rep.then_some(ClassRepHold::Provisional),
            checkout_session_id: None,
            created_at: crate::entities::utc_now(),
            completed_at: None,
        }
    }

    /// Whether this purchase holds (or held until completion) a class-rep slot.
    pub fn is_class_rep(&self) -> bool {
        self.class_rep_hold.is_some_and(ClassRepHold::occupies_slot)
    }

    pub fn to_response(&self, checkout_url: Option<Url>) -> PurchaseResponse {
        PurchaseResponse {
            purchase_id: self.id,
            program_id: self.program_id,
            status: self.status.into(),
            amount: self.amount,
            currency: self.currency.clone(),
            class_rep: self.is_class_rep(),
            checkout_session_id: self.checkout_session_id.clone(),
            checkout_url,
        }
    }
}

/// Financial record written when a checkout session completes.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct PaymentTransaction {
    pub id: Uuid,
    pub purchase_id: Uuid,
    pub checkout_session_id: String,
    pub payment_reference: Option<String>,
    pub amount: Decimal,
    pub currency: String,
    pub recorded_at: time::PrimitiveDateTime,
}

const PURCHASE_COLUMNS: &str = "id, user_id, program_id, amount, currency, status, \
     class_rep_hold, checkout_session_id, created_at, completed_at";

#[derive(Debug, Clone)]
pub struct InsertPurchase {
    pub purchase: Purchase,
}

impl Processor<InsertPurchase> for DatabaseProcessor {
    type Output = ();
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:InsertPurchase")]
    async fn process(&self, insert: InsertPurchase) -> Result<(), sqlx::Error> {
        let p = insert.purchase;
        sqlx::query(
            r#"
            INSERT INTO purchases
                (id, user_id, program_id, amount, currency, status,
                 class_rep_hold, checkout_session_id, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(p.id)
        .bind(p.user_id)
        .bind(p.program_id)
        .bind(p.amount)
        .bind(p.currency)
        .bind(p.status)
        .bind(p.class_rep_hold)
        .bind(p.checkout_session_id)
        .bind(p.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct AttachCheckoutSession {
    pub purchase_id: Uuid,
    pub session_id: String,
}

impl Processor<AttachCheckoutSession> for DatabaseProcessor {
    type Output = ();
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:AttachCheckoutSession")]
    async fn process(&self, update: AttachCheckoutSession) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE purchases
            SET checkout_session_id = $2
            WHERE id = $1
            "#,
        )
        .bind(update.purchase_id)
        .bind(update.session_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct GetPurchaseById {
    pub purchase_id: Uuid,
}

impl Processor<GetPurchaseById> for DatabaseProcessor {
    type Output = Option<Purchase>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:GetPurchaseById")]
    async fn process(&self, query: GetPurchaseById) -> Result<Option<Purchase>, sqlx::Error> {
        sqlx::query_as::<_, Purchase>(&format!(
            "SELECT {PURCHASE_COLUMNS} FROM purchases WHERE id = $1"
        ))
        .bind(query.purchase_id)
        .fetch_optional(&self.pool)
        .await
    }
}

#[derive(Debug, Clone)]
pub struct GetPurchaseBySession {
    pub session_id: String,
}

impl Processor<GetPurchaseBySession> for DatabaseProcessor {
    type Output = Option<Purchase>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:GetPurchaseBySession")]
    async fn process(&self, query: GetPurchaseBySession) -> Result<Option<Purchase>, sqlx::Error> {
        sqlx::query_as::<_, Purchase>(&format!(
            "SELECT {PURCHASE_COLUMNS} FROM purchases WHERE checkout_session_id = $1"
        ))
        .bind(query.session_id)
        .fetch_optional(&self.pool)
        .await
    }
}

#[derive(Debug, Clone)]
/// Move a pending purchase to completed, commit its provisional class-rep
/// hold and record the payment transaction, all in one transaction.
///
/// Returns `false` (and writes nothing) if the purchase was not pending.
pub struct CompletePurchase {
    pub purchase_id: Uuid,
    pub transaction: PaymentTransaction,
}

impl Processor<CompletePurchase> for DatabaseProcessor {
    type Output = bool;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:CompletePurchase")]
    async fn process(&self, update: CompletePurchase) -> Result<bool, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r#"
            UPDATE purchases
            SET status = 'completed',
                completed_at = $2,
                class_rep_hold = CASE
                    WHEN class_rep_hold = 'provisional' THEN 'committed'::class_rep_hold
                    ELSE class_rep_hold
                END
            WHERE id = $1 AND status = 'pending'
            "#,
        )
        .bind(update.purchase_id)
        .bind(update.transaction.recorded_at)
        .execute(&mut *tx)
        .await?;
        if result.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(false);
        }

        let t = update.transaction;
        sqlx::query(
            r#"
            INSERT INTO payment_transactions
                (id, purchase_id, checkout_session_id, payment_reference,
                 amount, currency, recorded_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(t.id)
        .bind(t.purchase_id)
        .bind(t.checkout_session_id)
        .bind(t.payment_reference)
        .bind(t.amount)
        .bind(t.currency)
        .bind(t.recorded_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(true)
    }
}

#[derive(Debug, Clone)]
/// Move a pending purchase to failed and release its provisional hold.
/// Returns whether a row changed.
pub struct FailPurchase {
    pub purchase_id: Uuid,
}

impl Processor<FailPurchase> for DatabaseProcessor {
    type Output = bool;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:FailPurchase")]
    async fn process(&self, update: FailPurchase) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE purchases
            SET status = 'failed',
                class_rep_hold = CASE
                    WHEN class_rep_hold IS NULL THEN NULL
                    ELSE 'released'::class_rep_hold
                END
            WHERE id = $1 AND status = 'pending'
            "#,
        )
        .bind(update.purchase_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_class_rep_hold_counts_until_released() {
        let mut purchase = Purchase::new_pending(
            Uuid::now_v7(),
            Uuid::now_v7(),
            Decimal::new(4500, 2),
            "USD".into(),
            true,
        );
        assert_eq!(purchase.class_rep_hold, Some(ClassRepHold::Provisional));
        assert!(purchase.is_class_rep());

        purchase.class_rep_hold = Some(ClassRepHold::Committed);
        assert!(purchase.is_class_rep());

        purchase.class_rep_hold = Some(ClassRepHold::Released);
        assert!(!purchase.is_class_rep());
    }

    #[test]
    fn test_only_pending_is_not_final() {
        assert!(!PurchaseStatus::Pending.is_final());
        assert!(PurchaseStatus::Completed.is_final());
        assert!(PurchaseStatus::Failed.is_final());
    }
}
