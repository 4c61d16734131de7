//! # Booking Ledger
//!
//! Owns the hotel order list. Every read-modify-write runs under the store's
//! lock, which gives two guarantees:
//! 1. **No lost updates**: concurrent submissions each see the previous one's write.
//! 2. **Idempotency**: a retried submission with the same key finds the first
//!    order instead of creating a second one.
//!
//! Validation happens before the lock is requested, so bad input never waits
//! behind other writers.

mod filter;

pub use filter::OrderFilter;

use crate::error::{LedgerError, Result, StoreError, ValidationError};
use crate::fs::{DocumentStore, JsonFileStore, LockOptions};
use crate::model::{BookingRequest, Order, OrderStatus, ValidBooking};
use crate::notify::{NoopNotifier, Notifier};
use chrono::Utc;
use log::{info, warn};
use serde::Serialize;
use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use uuid::Uuid;

/// File name of the orders document inside the data directory.
pub const ORDERS_FILE: &str = "hotel_orders.json";

/// Result of a submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingReceipt {
    pub order_id: String,
    /// `true` when the idempotency key matched an existing order.
    pub duplicated: bool,
}

/// Result of a status change.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusChange {
    pub order: Order,
    /// `true` when the order already had the requested status; nothing was written.
    pub duplicated: bool,
}

/// Who decided an order, recorded alongside the status change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
    pub decided_by: String,
}

#[derive(Clone)]
pub struct BookingLedger {
    store: Arc<dyn DocumentStore<Vec<Order>>>,
    notifier: Arc<dyn Notifier>,
}

impl BookingLedger {
    pub fn new(store: Arc<dyn DocumentStore<Vec<Order>>>, notifier: Arc<dyn Notifier>) -> Self {
        Self { store, notifier }
    }

    /// Ledger backed by `<data_dir>/hotel_orders.json`.
    pub fn open(data_dir: &Path, lock_options: LockOptions) -> Self {
        let store = JsonFileStore::with_lock_options(data_dir.join(ORDERS_FILE), lock_options);
        Self::new(Arc::new(store), Arc::new(NoopNotifier))
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    /// Records a booking, or returns the existing one for a known idempotency key.
    ///
    /// An empty key never matches, so every keyless submission creates an order.
    ///
    /// # Errors
    ///
    /// * [`LedgerError::Validation`] for a missing field or a bad price (no lock taken).
    /// * [`LedgerError::Store`] for lock timeouts and persistence failures.
    pub async fn submit_booking(
        &self,
        request: BookingRequest,
        idempotency_key: &str,
    ) -> Result<BookingReceipt> {
        let booking = request.validate()?;
        let key = idempotency_key.trim().to_string();

        let inserted = self
            .detached(move |ledger| async move { ledger.insert_locked(booking, key).await })
            .await?;

        let created = match inserted {
            Inserted::Existing(order_id) => {
                return Ok(BookingReceipt {
                    order_id,
                    duplicated: true,
                })
            }
            Inserted::Created(order) => order,
        };

        info!(
            "Ledger: Created order {} ({} / {})",
            created.id, created.hotel, created.room_type
        );
        self.notify_created(created.clone());

        Ok(BookingReceipt {
            order_id: created.id,
            duplicated: false,
        })
    }

    async fn insert_locked(&self, booking: ValidBooking, key: String) -> Result<Inserted> {
        let _guard = self.store.lock().await?;
        let mut orders = self.store.load().await?;

        if !key.is_empty() {
            if let Some(existing) = orders.iter().find(|o| o.idempotency_key == key) {
                info!(
                    "Ledger: Duplicate submission for key '{}' -> {}",
                    key, existing.id
                );
                return Ok(Inserted::Existing(existing.id.clone()));
            }
        }

        let mut id = new_order_id();
        while orders.iter().any(|o| o.id == id) {
            id = new_order_id();
        }

        let order = Order {
            id,
            idempotency_key: key,
            status: OrderStatus::Pending,
            hotel: booking.hotel,
            room_type: booking.room_type,
            price: booking.price,
            checkin: booking.checkin,
            checkout: booking.checkout,
            payment: booking.payment,
            tg_user: booking.tg_user,
            tg_id: booking.tg_id,
            created_at: Utc::now(),
            updated_at: None,
            decided_by: None,
            decided_at: None,
            extensions: booking.extensions,
        };
        orders.push(order.clone());
        self.store.save(&orders).await?;
        Ok(Inserted::Created(order))
    }

    /// Lists orders newest-first. Reads without the lock; a stale view is acceptable.
    pub async fn list_orders(&self, filter: &OrderFilter) -> Result<Vec<Order>> {
        let orders = self.store.load().await?;
        Ok(filter.apply(orders))
    }

    /// Moves an order to `status` (free text, normalized).
    ///
    /// Re-applying the current status succeeds with `duplicated: true` and
    /// leaves `updatedAt` untouched.
    pub async fn set_order_status(&self, order_id: &str, status: &str) -> Result<StatusChange> {
        let status = OrderStatus::parse(status).ok_or(ValidationError::Invalid("status"))?;
        self.transition(order_id, status, None).await
    }

    /// Status change coming from a messaging-bot button; also stamps who decided.
    pub async fn decide(
        &self,
        order_id: &str,
        status: OrderStatus,
        decision: Decision,
    ) -> Result<StatusChange> {
        self.transition(order_id, status, Some(decision)).await
    }

    async fn transition(
        &self,
        order_id: &str,
        status: OrderStatus,
        decision: Option<Decision>,
    ) -> Result<StatusChange> {
        let order_id = order_id.trim().to_string();
        if order_id.is_empty() {
            return Err(ValidationError::Missing("id").into());
        }

        self.detached(move |ledger| async move {
            ledger.transition_locked(&order_id, status, decision).await
        })
        .await
    }

    async fn transition_locked(
        &self,
        order_id: &str,
        status: OrderStatus,
        decision: Option<Decision>,
    ) -> Result<StatusChange> {
        let _guard = self.store.lock().await?;
        let mut orders = self.store.load().await?;

        let order = orders
            .iter_mut()
            .find(|o| o.id == order_id)
            .ok_or_else(|| LedgerError::NotFound(order_id.to_string()))?;

        if order.status == status {
            return Ok(StatusChange {
                order: order.clone(),
                duplicated: true,
            });
        }

        let now = Utc::now();
        let previous = order.status.clone();
        order.status = status;
        order.updated_at = Some(now);
        if let Some(decision) = decision {
            order.decided_by = Some(decision.decided_by);
            order.decided_at = Some(now);
        }
        let updated = order.clone();

        self.store.save(&orders).await?;
        info!(
            "Ledger: Order {} moved {} -> {}",
            updated.id, previous, updated.status
        );

        Ok(StatusChange {
            order: updated,
            duplicated: false,
        })
    }

    /// Runs a critical section (lock, load, save, release) on its own task.
    ///
    /// Dropping the caller, e.g. when an HTTP client disconnects, detaches the
    /// task instead of cancelling it between the save and the release.
    async fn detached<T, F, Fut>(&self, section: F) -> Result<T>
    where
        F: FnOnce(BookingLedger) -> Fut,
        Fut: Future<Output = Result<T>> + Send + 'static,
        T: Send + 'static,
    {
        match tokio::spawn(section(self.clone())).await {
            Ok(result) => result,
            Err(join_error) => {
                warn!("Ledger: Critical section aborted: {}", join_error);
                Err(StoreError::Io(std::io::Error::new(std::io::ErrorKind::Other, join_error)).into())
            }
        }
    }

    fn notify_created(&self, order: Order) {
        let notifier = self.notifier.clone();
        tokio::spawn(async move {
            if let Err(e) = notifier.order_created(&order).await {
                warn!("Ledger: Notification for {} failed: {}", order.id, e);
            }
        });
    }
}

enum Inserted {
    Existing(String),
    Created(Order),
}

/// `HOTEL_<unix millis>_<6 hex>`
fn new_order_id() -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("HOTEL_{}_{}", Utc::now().timestamp_millis(), &suffix[..6])
}
