use crate::error::NotifyError;
use crate::model::Order;
use crate::notify::Notifier;
use async_trait::async_trait;
use log::debug;
use serde_json::{json, Value};
use std::time::Duration;

pub const DEFAULT_API_BASE: &str = "https://api.telegram.org";

/// Minimal Bot API client: only the methods the booking flow calls.
#[derive(Debug, Clone)]
pub struct TelegramClient {
    http: reqwest::Client,
    api_base: String,
    token: String,
}

impl TelegramClient {
    pub fn new(token: impl Into<String>) -> Result<Self, NotifyError> {
        Self::with_api_base(token, DEFAULT_API_BASE)
    }

    /// `api_base` lets tests point the client at a local server.
    pub fn with_api_base(
        token: impl Into<String>,
        api_base: impl Into<String>,
    ) -> Result<Self, NotifyError> {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(15))
            .build()?;
        Ok(Self {
            http,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            token: token.into(),
        })
    }

    /// POSTs `payload` to `<base>/bot<token>/<method>`.
    pub async fn call(&self, method: &str, payload: &Value) -> Result<Value, NotifyError> {
        let url = format!("{}/bot{}/{}", self.api_base, self.token, method);
        debug!("Telegram: -> {}", method);

        let response = self.http.post(&url).json(payload).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(NotifyError::Api {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response.json::<Value>().await.unwrap_or(Value::Null))
    }

    pub async fn send_message(
        &self,
        chat_id: &str,
        text: &str,
        reply_markup: Option<Value>,
    ) -> Result<Value, NotifyError> {
        let mut payload = json!({ "chat_id": chat_id, "text": text });
        if let Some(markup) = reply_markup {
            payload["reply_markup"] = markup;
        }
        self.call("sendMessage", &payload).await
    }

    pub async fn answer_callback_query(
        &self,
        callback_query_id: &str,
        text: &str,
    ) -> Result<Value, NotifyError> {
        self.call(
            "answerCallbackQuery",
            &json!({
                "callback_query_id": callback_query_id,
                "text": text,
                "show_alert": false,
            }),
        )
        .await
    }

    /// Removes the inline keyboard from a message.
    pub async fn clear_reply_markup(
        &self,
        chat_id: i64,
        message_id: i64,
    ) -> Result<Value, NotifyError> {
        self.call(
            "editMessageReplyMarkup",
            &json!({
                "chat_id": chat_id,
                "message_id": message_id,
                "reply_markup": { "inline_keyboard": [] },
            }),
        )
        .await
    }
}

/// Posts a summary of each new order to the admin chat with approve/reject buttons.
pub struct TelegramNotifier {
    client: TelegramClient,
    admin_chat_id: String,
}

impl TelegramNotifier {
    pub fn new(client: TelegramClient, admin_chat_id: impl Into<String>) -> Self {
        Self {
            client,
            admin_chat_id: admin_chat_id.into(),
        }
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn order_created(&self, order: &Order) -> Result<(), NotifyError> {
        if self.admin_chat_id.is_empty() {
            return Err(NotifyError::Disabled);
        }
        self.client
            .send_message(
                &self.admin_chat_id,
                &order_summary(order),
                Some(decision_keyboard(&order.id)),
            )
            .await?;
        Ok(())
    }
}

/// Human-readable order card.
pub fn order_summary(order: &Order) -> String {
    [
        "[New hotel booking]".to_string(),
        format!("Guest: @{} ({})", order.tg_user, order.tg_id),
        format!("Hotel: {}", order.hotel),
        format!("Room: {}", order.room_type),
        format!("Price: {}/night", order.price),
        format!("Payment: {}", order.payment),
        format!("Check-in: {}", order.checkin),
        format!("Check-out: {}", order.checkout),
        format!("Order: {}", order.id),
    ]
    .join("\n")
}

/// Inline keyboard whose buttons round-trip through the callback dispatcher.
pub fn decision_keyboard(order_id: &str) -> Value {
    json!({
        "inline_keyboard": [[
            { "text": "Approve", "callback_data": format!("{}{}", super::APPROVE_PREFIX, order_id) },
            { "text": "Reject", "callback_data": format!("{}{}", super::REJECT_PREFIX, order_id) },
        ]]
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::OrderStatus;
    use chrono::Utc;

    fn order() -> Order {
        Order {
            id: "HOTEL_1_abcdef".into(),
            idempotency_key: String::new(),
            status: OrderStatus::Pending,
            hotel: "H1".into(),
            room_type: "Deluxe".into(),
            price: 199.0,
            checkin: "2025-01-01".into(),
            checkout: "2025-01-02".into(),
            payment: "wechat".into(),
            tg_user: "alice".into(),
            tg_id: "42".into(),
            created_at: Utc::now(),
            updated_at: None,
            decided_by: None,
            decided_at: None,
            extensions: Default::default(),
        }
    }

    #[test]
    fn test_keyboard_carries_both_actions() {
        let keyboard = decision_keyboard("HOTEL_1_abcdef");
        let row = &keyboard["inline_keyboard"][0];
        assert_eq!(row[0]["callback_data"], "hotel_approve_HOTEL_1_abcdef");
        assert_eq!(row[1]["callback_data"], "hotel_reject_HOTEL_1_abcdef");
    }

    #[test]
    fn test_summary_mentions_order_fields() {
        let text = order_summary(&order());
        assert!(text.contains("@alice (42)"));
        assert!(text.contains("Order: HOTEL_1_abcdef"));
        assert!(text.contains("Price: 199/night"));
    }

    #[tokio::test]
    async fn test_unreachable_api_is_an_error() {
        // Port 9 (discard) is not expected to serve HTTP locally.
        let client = TelegramClient::with_api_base("token", "http://127.0.0.1:9").unwrap();
        let notifier = TelegramNotifier::new(client, "1000");
        assert!(notifier.order_created(&order()).await.is_err());
    }
}
