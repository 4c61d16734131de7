//! Telegram integration: new-order notices and the approve/reject button dispatcher.

pub mod callback;
pub mod client;

pub use callback::{CallbackAction, CallbackDispatcher, CallbackOutcome, Update};
pub use client::{TelegramClient, TelegramNotifier};

pub const APPROVE_PREFIX: &str = "hotel_approve_";
pub const REJECT_PREFIX: &str = "hotel_reject_";
