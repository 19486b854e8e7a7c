// Booking persistence: writes the confirmed booking to the record store.
// Payment failure blocks completion; persistence failure does not. By the
// time this layer runs the charge is already captured, so a storage problem
// is logged for operational follow-up and the guest still gets their
// confirmation under the client-generated id.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use thiserror::Error;
use tracing::{info, warn};

use crate::booking::{BookingRecord, ConfirmedBooking};

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Record store unreachable: {0}")]
    Unreachable(String),

    #[error("Record store rejected the write: {0}")]
    Rejected(String),

    #[error("Booking {0} not found")]
    NotFound(u64),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredBooking {
    pub id: u64,
}

// Opaque durable record store, accessed through plain CRUD verbs.
#[async_trait]
pub trait BookingStore: Send + Sync {
    async fn create_booking(&self, record: BookingRecord) -> Result<StoredBooking, StoreError>;
    async fn get_booking(&self, id: u64) -> Result<BookingRecord, StoreError>;
    async fn update_booking(&self, id: u64, record: BookingRecord)
        -> Result<BookingRecord, StoreError>;
    async fn delete_booking(&self, id: u64) -> Result<(), StoreError>;
}

// What the guest sees on the confirmation screen. durable_id is None when
// the store write did not go through.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookingConfirmation {
    pub booking_id: String,
    pub durable_id: Option<u64>,
}

pub struct PersistenceClient<S: BookingStore> {
    store: S,
}

impl<S: BookingStore> PersistenceClient<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    // Submits the confirmed booking to the store, exactly once. Never fails
    // from the guest's point of view.
    pub async fn finalize(&self, booking: &ConfirmedBooking) -> BookingConfirmation {
        let record = BookingRecord::from(booking);
        match self.store.create_booking(record).await {
            Ok(stored) => {
                info!(booking_id = %booking.id, durable_id = stored.id, "booking persisted");
                BookingConfirmation {
                    booking_id: booking.id.clone(),
                    durable_id: Some(stored.id),
                }
            }
            Err(error) => {
                warn!(
                    booking_id = %booking.id,
                    %error,
                    "booking persistence failed after captured payment; confirming with client id"
                );
                BookingConfirmation {
                    booking_id: booking.id.clone(),
                    durable_id: None,
                }
            }
        }
    }
}

// In-memory record store with sequential ids and fail injection, the default
// store for tests and local runs.
pub struct InMemoryBookingStore {
    records: RwLock<HashMap<u64, BookingRecord>>,
    next_id: AtomicU64,
    fail_next: AtomicUsize,
}

impl InMemoryBookingStore {
    pub fn new() -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            fail_next: AtomicUsize::new(0),
        }
    }

    // The next `count` writes will fail as if the store were unreachable.
    pub fn fail_next_requests(&self, count: usize) {
        self.fail_next.store(count, Ordering::SeqCst);
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    fn take_failure(&self) -> bool {
        self.fail_next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |remaining| {
                remaining.checked_sub(1)
            })
            .is_ok()
    }
}

impl Default for InMemoryBookingStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BookingStore for InMemoryBookingStore {
    async fn create_booking(&self, record: BookingRecord) -> Result<StoredBooking, StoreError> {
        if self.take_failure() {
            return Err(StoreError::Unreachable("injected failure".to_string()));
        }
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.records.write().insert(id, record);
        Ok(StoredBooking { id })
    }

    async fn get_booking(&self, id: u64) -> Result<BookingRecord, StoreError> {
        self.records
            .read()
            .get(&id)
            .cloned()
            .ok_or(StoreError::NotFound(id))
    }

    async fn update_booking(
        &self,
        id: u64,
        record: BookingRecord,
    ) -> Result<BookingRecord, StoreError> {
        let mut records = self.records.write();
        if !records.contains_key(&id) {
            return Err(StoreError::NotFound(id));
        }
        records.insert(id, record.clone());
        Ok(record)
    }

    async fn delete_booking(&self, id: u64) -> Result<(), StoreError> {
        self.records
            .write()
            .remove(&id)
            .map(|_| ())
            .ok_or(StoreError::NotFound(id))
    }
}
