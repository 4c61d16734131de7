use super::client::TelegramClient;
use super::{APPROVE_PREFIX, REJECT_PREFIX};
use crate::error::LedgerError;
use crate::ledger::{BookingLedger, Decision, StatusChange};
use crate::model::OrderStatus;
use log::{info, warn};
use serde::Deserialize;

/// The subset of a Telegram `Update` the dispatcher reads.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Update {
    #[serde(default)]
    pub callback_query: Option<CallbackQuery>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CallbackQuery {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub data: Option<String>,
    #[serde(default)]
    pub from: Option<User>,
    #[serde(default)]
    pub message: Option<Message>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct User {
    pub id: i64,
    #[serde(default)]
    pub username: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Message {
    pub message_id: i64,
    pub chat: Chat,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Chat {
    pub id: i64,
}

/// A decision button press: `hotel_approve_<id>` / `hotel_reject_<id>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallbackAction {
    pub order_id: String,
    pub status: OrderStatus,
}

impl CallbackAction {
    pub fn parse(data: &str) -> Option<Self> {
        let (status, rest) = if let Some(rest) = data.strip_prefix(APPROVE_PREFIX) {
            (OrderStatus::Approved, rest)
        } else if let Some(rest) = data.strip_prefix(REJECT_PREFIX) {
            (OrderStatus::Rejected, rest)
        } else {
            return None;
        };
        let order_id = rest.trim();
        if order_id.is_empty() {
            return None;
        }
        Some(Self {
            order_id: order_id.to_string(),
            status,
        })
    }
}

#[derive(Debug)]
pub enum CallbackOutcome {
    /// Not a hotel decision; nothing was done.
    Ignored,
    Applied(StatusChange),
    Failed(LedgerError),
}

/// Turns inbound button clicks into ledger status changes.
pub struct CallbackDispatcher {
    ledger: BookingLedger,
    client: Option<TelegramClient>,
}

impl CallbackDispatcher {
    /// Without a client, clicks are applied but not acknowledged in the chat.
    pub fn new(ledger: BookingLedger, client: Option<TelegramClient>) -> Self {
        Self { ledger, client }
    }

    pub async fn handle_update(&self, update: Update) -> CallbackOutcome {
        let Some(query) = update.callback_query else {
            return CallbackOutcome::Ignored;
        };
        let Some(action) = query.data.as_deref().and_then(CallbackAction::parse) else {
            return CallbackOutcome::Ignored;
        };

        let decided_by = query
            .from
            .as_ref()
            .map(|u| u.username.clone().unwrap_or_else(|| u.id.to_string()))
            .unwrap_or_default();

        let outcome = match self
            .ledger
            .decide(&action.order_id, action.status.clone(), Decision { decided_by })
            .await
        {
            Ok(change) => {
                info!(
                    "Telegram: Order {} -> {} (duplicated: {})",
                    action.order_id, action.status, change.duplicated
                );
                CallbackOutcome::Applied(change)
            }
            Err(e) => {
                warn!("Telegram: Decision on {} failed: {}", action.order_id, e);
                CallbackOutcome::Failed(e)
            }
        };

        self.acknowledge(&query, &action, &outcome).await;
        outcome
    }

    /// Best effort: answer the click and strip the buttons. Failures are only logged.
    async fn acknowledge(&self, query: &CallbackQuery, action: &CallbackAction, outcome: &CallbackOutcome) {
        let Some(client) = &self.client else {
            return;
        };

        let text = match outcome {
            CallbackOutcome::Applied(_) => format!("Order updated: {}", action.status),
            _ => "Order not found or update failed".to_string(),
        };
        if let Err(e) = client.answer_callback_query(&query.id, &text).await {
            warn!("Telegram: answerCallbackQuery failed: {}", e);
        }

        if let Some(message) = &query.message {
            if let Err(e) = client
                .clear_reply_markup(message.chat.id, message.message_id)
                .await
            {
                warn!("Telegram: editMessageReplyMarkup failed: {}", e);
            }
        }
    }
}
