use crate::database::error::{DatabaseError, DbResult};
use crate::database::repository::{LockedPayment, PaymentFilter, PaymentStore};
use crate::database::transaction::DatabaseTransaction;
use crate::payments::models::{GatewayEvent, NewPayment, Payment, PaymentStatus};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::types::Json;
use sqlx::{FromRow, PgPool};
use tracing::{debug, info};
use uuid::Uuid;

const PAYMENT_COLUMNS: &str = "id, reference, amount, currency, status, customer_email, \
     checkout_url, access_code, webhook_received, webhook_verified, gateway_response, \
     metadata, created_at, updated_at, paid_at";

/// Row shape of the `payments` table
#[derive(Debug, FromRow)]
struct PaymentRow {
    id: Uuid,
    reference: String,
    amount: i64,
    currency: String,
    status: String,
    customer_email: String,
    checkout_url: Option<String>,
    access_code: Option<String>,
    webhook_received: bool,
    webhook_verified: bool,
    gateway_response: Json<Vec<GatewayEvent>>,
    metadata: Value,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    paid_at: Option<DateTime<Utc>>,
}

impl TryFrom<PaymentRow> for Payment {
    type Error = DatabaseError;

    fn try_from(row: PaymentRow) -> Result<Self, Self::Error> {
        let status = row
            .status
            .parse::<PaymentStatus>()
            .map_err(|e| DatabaseError::corrupt(format!("payment {}: {}", row.reference, e)))?;

        Ok(Payment {
            id: row.id,
            reference: row.reference,
            amount: row.amount,
            currency: row.currency,
            status,
            customer_email: row.customer_email,
            checkout_url: row.checkout_url,
            access_code: row.access_code,
            webhook_received: row.webhook_received,
            webhook_verified: row.webhook_verified,
            gateway_response: row.gateway_response.0,
            metadata: row.metadata,
            created_at: row.created_at,
            updated_at: row.updated_at,
            paid_at: row.paid_at,
        })
    }
}

/// Postgres-backed payment store
#[derive(Clone)]
pub struct PgPaymentStore {
    pool: PgPool,
}

impl PgPaymentStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PaymentStore for PgPaymentStore {
    async fn insert(&self, new: NewPayment) -> DbResult<Payment> {
        let payment = Payment::from_new(new, Utc::now());
        let query = format!(
            "INSERT INTO payments ({PAYMENT_COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15) \
             RETURNING {PAYMENT_COLUMNS}"
        );

        let row = sqlx::query_as::<_, PaymentRow>(&query)
            .bind(payment.id)
            .bind(&payment.reference)
            .bind(payment.amount)
            .bind(&payment.currency)
            .bind(payment.status.as_str())
            .bind(&payment.customer_email)
            .bind(&payment.checkout_url)
            .bind(&payment.access_code)
            .bind(payment.webhook_received)
            .bind(payment.webhook_verified)
            .bind(Json(&payment.gateway_response))
            .bind(&payment.metadata)
            .bind(payment.created_at)
            .bind(payment.updated_at)
            .bind(payment.paid_at)
            .fetch_one(&self.pool)
            .await
            .map_err(DatabaseError::from_sqlx)?;

        info!(reference = %payment.reference, "Payment record created");
        Payment::try_from(row)
    }

    async fn find_by_reference(&self, reference: &str) -> DbResult<Option<Payment>> {
        let query = format!("SELECT {PAYMENT_COLUMNS} FROM payments WHERE reference = $1");
        sqlx::query_as::<_, PaymentRow>(&query)
            .bind(reference)
            .fetch_optional(&self.pool)
            .await
            .map_err(DatabaseError::from_sqlx)?
            .map(Payment::try_from)
            .transpose()
    }

    async fn list(&self, filter: &PaymentFilter) -> DbResult<Vec<Payment>> {
        let query = format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments \
             WHERE ($1::text IS NULL OR status = $1) \
               AND ($2::text IS NULL OR customer_email ILIKE '%' || $2 || '%') \
             ORDER BY created_at DESC"
        );
        let rows = sqlx::query_as::<_, PaymentRow>(&query)
            .bind(filter.status.map(|status| status.as_str()))
            .bind(filter.email.as_deref())
            .fetch_all(&self.pool)
            .await
            .map_err(DatabaseError::from_sqlx)?;

        rows.into_iter().map(Payment::try_from).collect()
    }

    async fn lock_for_update(&self, reference: &str) -> DbResult<Option<Box<dyn LockedPayment>>> {
        let mut tx = DatabaseTransaction::begin(&self.pool).await?;
        let query = format!("SELECT {PAYMENT_COLUMNS} FROM payments WHERE reference = $1 FOR UPDATE");

        let row = sqlx::query_as::<_, PaymentRow>(&query)
            .bind(reference)
            .fetch_optional(&mut **tx.tx_mut()?)
            .await
            .map_err(DatabaseError::from_sqlx)?;

        let Some(row) = row else {
            tx.rollback().await?;
            return Ok(None);
        };

        debug!(reference, "Acquired payment row lock");
        Ok(Some(Box::new(PgLockedPayment {
            tx,
            payment: Payment::try_from(row)?,
        })))
    }

    async fn health_check(&self) -> DbResult<()> {
        super::health_check(&self.pool).await
    }
}

/// A payment row locked by an open transaction
struct PgLockedPayment {
    tx: DatabaseTransaction,
    payment: Payment,
}

#[async_trait]
impl LockedPayment for PgLockedPayment {
    fn payment(&self) -> &Payment {
        &self.payment
    }

    fn payment_mut(&mut self) -> &mut Payment {
        &mut self.payment
    }

    async fn commit(self: Box<Self>) -> DbResult<Payment> {
        let PgLockedPayment { mut tx, payment } = *self;
        let query = format!(
            "UPDATE payments SET \
                 status = $2, webhook_received = $3, webhook_verified = $4, \
                 gateway_response = $5, metadata = $6, paid_at = $7, updated_at = NOW() \
             WHERE reference = $1 \
             RETURNING {PAYMENT_COLUMNS}"
        );

        let row = sqlx::query_as::<_, PaymentRow>(&query)
            .bind(&payment.reference)
            .bind(payment.status.as_str())
            .bind(payment.webhook_received)
            .bind(payment.webhook_verified)
            .bind(Json(&payment.gateway_response))
            .bind(&payment.metadata)
            .bind(payment.paid_at)
            .fetch_one(&mut **tx.tx_mut()?)
            .await
            .map_err(DatabaseError::from_sqlx)?;

        tx.commit().await?;
        Payment::try_from(row)
    }

    async fn rollback(self: Box<Self>) -> DbResult<()> {
        self.tx.rollback().await
    }
}
