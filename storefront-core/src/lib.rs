//! # Storefront Core Library
//!
//! Shared foundation for the hotel booking mini-app backend.
//!
//! ## Modules
//! - `fs`: Marker-file locks and atomic JSON document persistence.
//! - `model`: Order records and the typed booking payload.
//! - `ledger`: Idempotent booking submission and admin status transitions.
//! - `notify`: Outbound new-order notification seam.
//! - `telegram`: Bot API client, order notices and the decision-button dispatcher.

pub mod error;
pub mod fs;
pub mod ledger;
pub mod model;
pub mod notify;
pub mod telegram;

pub use error::{LedgerError, NotifyError, StoreError, ValidationError};
pub use ledger::{BookingLedger, BookingReceipt, Decision, OrderFilter, StatusChange};
