use crate::entities::count_to_u32;
use crate::framework::DatabaseProcessor;
use kanau::processor::Processor;
use rust_decimal::Decimal;
use uuid::Uuid;

/// A purchasable program (course, retreat, ...).
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct Program {
    pub id: Uuid,
    pub title: String,
    pub price: Decimal,
    pub currency: String,
    /// Size of the program-wide class-rep slot pool.
    #[sqlx(try_from = "i64")]
    pub class_rep_limit: u32,
}

#[derive(Debug, Clone)]
pub struct GetProgramById {
    pub program_id: Uuid,
}

impl Processor<GetProgramById> for DatabaseProcessor {
    type Output = Option<Program>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:GetProgramById")]
    async fn process(&self, query: GetProgramById) -> Result<Option<Program>, sqlx::Error> {
        sqlx::query_as::<_, Program>(
            r#"
            SELECT id, title, price, currency, class_rep_limit
            FROM programs
            WHERE id = $1
            "#,
        )
        .bind(query.program_id)
        .fetch_optional(&self.pool)
        .await
    }
}

#[derive(Debug, Clone)]
/// Count class-rep slots taken in a program: provisional holds of pending
/// purchases plus committed holds of completed ones.
pub struct CountClassRepHolds {
    pub program_id: Uuid,
}

impl Processor<CountClassRepHolds> for DatabaseProcessor {
    type Output = u32;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:CountClassRepHolds")]
    async fn process(&self, query: CountClassRepHolds) -> Result<u32, sqlx::Error> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*)
            FROM purchases
            WHERE program_id = $1 AND class_rep_hold IN ('provisional', 'committed')
            "#,
        )
        .bind(query.program_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count_to_u32(count))
    }
}
