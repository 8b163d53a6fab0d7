use crate::database::error::DatabaseError;
use crate::payments::models::{
    CustomerProfile, NewPayment, Payment, PaymentStatus, ProfilePaymentStatus,
};
use async_trait::async_trait;

/// Filters for listing payments
#[derive(Debug, Clone, Default)]
pub struct PaymentFilter {
    pub status: Option<PaymentStatus>,
    /// Case-insensitive substring of the customer email
    pub email: Option<String>,
}

impl PaymentFilter {
    pub fn matches(&self, payment: &Payment) -> bool {
        let status_ok = self.status.map_or(true, |status| payment.status == status);
        let email_ok = self.email.as_ref().map_or(true, |needle| {
            payment
                .customer_email
                .to_lowercase()
                .contains(&needle.to_lowercase())
        });
        status_ok && email_ok
    }
}

/// Durable storage for payment records
///
/// Mutation after creation goes exclusively through [`PaymentStore::lock_for_update`],
/// which serializes all writers for one reference.
#[async_trait]
pub trait PaymentStore: Send + Sync {
    /// Insert a new pending payment. Fails with a unique-constraint error if
    /// the reference already exists.
    async fn insert(&self, payment: NewPayment) -> Result<Payment, DatabaseError>;

    async fn find_by_reference(&self, reference: &str) -> Result<Option<Payment>, DatabaseError>;

    /// Newest first
    async fn list(&self, filter: &PaymentFilter) -> Result<Vec<Payment>, DatabaseError>;

    /// Acquire the exclusive lock for `reference` and load the current row.
    ///
    /// Returns `None` for an unknown reference. The lock is held until the
    /// returned guard is committed, rolled back or dropped.
    async fn lock_for_update(
        &self,
        reference: &str,
    ) -> Result<Option<Box<dyn LockedPayment>>, DatabaseError>;

    async fn health_check(&self) -> Result<(), DatabaseError>;
}

/// A payment row held under an exclusive lock
#[async_trait]
pub trait LockedPayment: Send {
    fn payment(&self) -> &Payment;

    fn payment_mut(&mut self) -> &mut Payment;

    /// Persist every field change as one write and release the lock
    async fn commit(self: Box<Self>) -> Result<Payment, DatabaseError>;

    /// Discard changes and release the lock
    async fn rollback(self: Box<Self>) -> Result<(), DatabaseError>;
}

/// Account-level payment status projection
#[async_trait]
pub trait ProfileStore: Send + Sync {
    /// Get or create the profile for `email`
    async fn ensure_profile(&self, email: &str) -> Result<CustomerProfile, DatabaseError>;

    async fn find_profile(&self, email: &str) -> Result<Option<CustomerProfile>, DatabaseError>;

    async fn set_payment_status(
        &self,
        email: &str,
        status: ProfilePaymentStatus,
    ) -> Result<(), DatabaseError>;
}
