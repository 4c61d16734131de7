//! # Booking Server
//!
//! Axum front for the hotel booking ledger: guest submissions, the admin
//! order panel and the Telegram decision webhook.

pub mod api;
pub mod config;

use anyhow::Context;
use api::AppState;
use axum::Router;
use config::ServerConfig;
use log::{info, warn};
use std::sync::Arc;
use storefront_core::notify::{NoopNotifier, Notifier};
use storefront_core::telegram::{CallbackDispatcher, TelegramClient, TelegramNotifier};
use storefront_core::BookingLedger;

/// Wires ledger, notifier and dispatcher from the configuration.
///
/// # Arguments
/// * `config` - Parsed server settings.
///
/// # Returns
/// * `Router` ready to be served.
pub fn build_app(config: &ServerConfig) -> anyhow::Result<Router> {
    let client = match config.tg_bot_token() {
        Some(token) => Some(TelegramClient::new(token).context("building Telegram client")?),
        None => None,
    };

    let notifier: Arc<dyn Notifier> = match (&client, config.tg_admin_id()) {
        (Some(client), Some(chat_id)) => {
            info!("Server: New-order notices go to Telegram chat {}", chat_id);
            Arc::new(TelegramNotifier::new(client.clone(), chat_id))
        }
        _ => {
            warn!("Server: Telegram not configured, new-order notices disabled");
            Arc::new(NoopNotifier)
        }
    };

    let ledger = BookingLedger::open(config.data_dir(), config.lock_options()).with_notifier(notifier);
    if config.admin_key().is_empty() {
        warn!("Server: HOTEL_ADMIN_KEY is empty, admin routes are open");
    }

    let state = AppState {
        dispatcher: Arc::new(CallbackDispatcher::new(ledger.clone(), client)),
        ledger,
        admin_key: Arc::from(config.admin_key()),
    };
    Ok(api::router(state))
}
