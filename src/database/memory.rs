//! In-process store
//!
//! Single-instance stand-in for Postgres. Each reference owns an async mutex
//! that plays the role of the row lock; committed rows live in a shared map so
//! readers never wait on a reconciliation in progress.

use crate::database::error::{DatabaseError, DatabaseErrorKind, DbResult};
use crate::database::repository::{LockedPayment, PaymentFilter, PaymentStore, ProfileStore};
use crate::payments::models::{
    CustomerProfile, NewPayment, Payment, ProfilePaymentStatus,
};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::{Mutex as RowLock, OwnedMutexGuard};
use tracing::debug;

struct Slot {
    lock: Arc<RowLock<()>>,
    payment: Payment,
}

type Slots = Arc<Mutex<HashMap<String, Slot>>>;

fn poisoned() -> DatabaseError {
    DatabaseError::new(DatabaseErrorKind::TransactionError {
        message: "in-memory store lock poisoned".to_string(),
    })
}

fn lock_slots(slots: &Slots) -> DbResult<MutexGuard<'_, HashMap<String, Slot>>> {
    slots.lock().map_err(|_| poisoned())
}

#[derive(Clone, Default)]
pub struct InMemoryPaymentStore {
    slots: Slots,
}

impl InMemoryPaymentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PaymentStore for InMemoryPaymentStore {
    async fn insert(&self, payment: NewPayment) -> DbResult<Payment> {
        let mut slots = lock_slots(&self.slots)?;
        if slots.contains_key(&payment.reference) {
            return Err(DatabaseError::duplicate_reference(&payment.reference));
        }

        let payment = Payment::from_new(payment, Utc::now());
        slots.insert(
            payment.reference.clone(),
            Slot {
                lock: Arc::new(RowLock::new(())),
                payment: payment.clone(),
            },
        );
        Ok(payment)
    }

    async fn find_by_reference(&self, reference: &str) -> DbResult<Option<Payment>> {
        let slots = lock_slots(&self.slots)?;
        Ok(slots.get(reference).map(|slot| slot.payment.clone()))
    }

    async fn list(&self, filter: &PaymentFilter) -> DbResult<Vec<Payment>> {
        let slots = lock_slots(&self.slots)?;
        let mut payments: Vec<Payment> = slots
            .values()
            .map(|slot| &slot.payment)
            .filter(|payment| filter.matches(payment))
            .cloned()
            .collect();
        payments.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(payments)
    }

    async fn lock_for_update(&self, reference: &str) -> DbResult<Option<Box<dyn LockedPayment>>> {
        let row_lock = {
            let slots = lock_slots(&self.slots)?;
            match slots.get(reference) {
                Some(slot) => slot.lock.clone(),
                None => return Ok(None),
            }
        };

        let guard = row_lock.lock_owned().await;
        debug!(reference, "Acquired in-memory row lock");

        // Re-read under the lock so we see the previous holder's commit
        let payment = lock_slots(&self.slots)?
            .get(reference)
            .map(|slot| slot.payment.clone())
            .ok_or_else(|| {
                DatabaseError::new(DatabaseErrorKind::NotFound {
                    entity: "Payment".to_string(),
                    id: reference.to_string(),
                })
            })?;

        Ok(Some(Box::new(InMemoryLockedPayment {
            slots: self.slots.clone(),
            payment,
            _guard: guard,
        })))
    }

    async fn health_check(&self) -> DbResult<()> {
        lock_slots(&self.slots).map(|_| ())
    }
}

struct InMemoryLockedPayment {
    slots: Slots,
    payment: Payment,
    _guard: OwnedMutexGuard<()>,
}

#[async_trait]
impl LockedPayment for InMemoryLockedPayment {
    fn payment(&self) -> &Payment {
        &self.payment
    }

    fn payment_mut(&mut self) -> &mut Payment {
        &mut self.payment
    }

    async fn commit(self: Box<Self>) -> DbResult<Payment> {
        let InMemoryLockedPayment {
            slots,
            mut payment,
            _guard,
        } = *self;
        payment.updated_at = Utc::now();

        let mut rows = lock_slots(&slots)?;
        let slot = rows.get_mut(&payment.reference).ok_or_else(|| {
            DatabaseError::new(DatabaseErrorKind::TransactionError {
                message: format!("payment '{}' vanished while locked", payment.reference),
            })
        })?;
        slot.payment = payment.clone();
        Ok(payment)
    }

    async fn rollback(self: Box<Self>) -> DbResult<()> {
        Ok(())
    }
}

#[derive(Clone, Default)]
pub struct InMemoryProfileStore {
    profiles: Arc<Mutex<HashMap<String, CustomerProfile>>>,
}

impl InMemoryProfileStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn profiles(&self) -> DbResult<MutexGuard<'_, HashMap<String, CustomerProfile>>> {
        self.profiles.lock().map_err(|_| poisoned())
    }
}

#[async_trait]
impl ProfileStore for InMemoryProfileStore {
    async fn ensure_profile(&self, email: &str) -> DbResult<CustomerProfile> {
        let mut profiles = self.profiles()?;
        let profile = profiles.entry(email.to_string()).or_insert_with(|| {
            let now = Utc::now();
            CustomerProfile {
                email: email.to_string(),
                payment_status: ProfilePaymentStatus::Pending,
                created_at: now,
                updated_at: now,
            }
        });
        Ok(profile.clone())
    }

    async fn find_profile(&self, email: &str) -> DbResult<Option<CustomerProfile>> {
        Ok(self.profiles()?.get(email).cloned())
    }

    async fn set_payment_status(&self, email: &str, status: ProfilePaymentStatus) -> DbResult<()> {
        let mut profiles = self.profiles()?;
        let now = Utc::now();
        let profile = profiles
            .entry(email.to_string())
            .or_insert_with(|| CustomerProfile {
                email: email.to_string(),
                payment_status: status,
                created_at: now,
                updated_at: now,
            });
        profile.payment_status = status;
        profile.updated_at = now;
        Ok(())
    }
}
