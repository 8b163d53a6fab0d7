use crate::database::error::{DatabaseError, DbResult};
use crate::database::repository::ProfileStore;
use crate::payments::models::{CustomerProfile, ProfilePaymentStatus};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};

#[derive(Debug, FromRow)]
struct ProfileRow {
    email: String,
    payment_status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ProfileRow> for CustomerProfile {
    type Error = DatabaseError;

    fn try_from(row: ProfileRow) -> Result<Self, Self::Error> {
        Ok(CustomerProfile {
            payment_status: row
                .payment_status
                .parse::<ProfilePaymentStatus>()
                .map_err(DatabaseError::corrupt)?,
            email: row.email,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Postgres-backed customer profile projection
#[derive(Clone)]
pub struct PgProfileStore {
    pool: PgPool,
}

impl PgProfileStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ProfileStore for PgProfileStore {
    async fn ensure_profile(&self, email: &str) -> DbResult<CustomerProfile> {
        // The no-op update makes RETURNING yield the existing row
        let row = sqlx::query_as::<_, ProfileRow>(
            "INSERT INTO customer_profiles (email, payment_status) VALUES ($1, 'pending') \
             ON CONFLICT (email) DO UPDATE SET email = EXCLUDED.email \
             RETURNING email, payment_status, created_at, updated_at",
        )
        .bind(email)
        .fetch_one(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        CustomerProfile::try_from(row)
    }

    async fn find_profile(&self, email: &str) -> DbResult<Option<CustomerProfile>> {
        sqlx::query_as::<_, ProfileRow>(
            "SELECT email, payment_status, created_at, updated_at \
             FROM customer_profiles WHERE email = $1",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)?
        .map(CustomerProfile::try_from)
        .transpose()
    }

    async fn set_payment_status(&self, email: &str, status: ProfilePaymentStatus) -> DbResult<()> {
        sqlx::query(
            "INSERT INTO customer_profiles (email, payment_status) VALUES ($1, $2) \
             ON CONFLICT (email) DO UPDATE \
             SET payment_status = EXCLUDED.payment_status, updated_at = NOW()",
        )
        .bind(email)
        .bind(status.as_str())
        .execute(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        Ok(())
    }
}
