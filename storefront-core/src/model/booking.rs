use super::order::RESERVED_KEYS;
use crate::error::ValidationError;
use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};

pub(crate) fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.trim().to_string(),
        Some(other) => other.to_string(),
    })
}

/// A booking submission as sent by the mini-app.
///
/// Scalars are accepted as strings, numbers or booleans (Telegram ids arrive
/// as numbers, prices sometimes as strings) and are trimmed.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingRequest {
    #[serde(default, deserialize_with = "lenient_string")]
    pub hotel: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub room_type: String,
    /// Older front-ends send the room name instead of the type.
    #[serde(default, deserialize_with = "lenient_string")]
    pub room_name: String,
    #[serde(default)]
    pub price: Option<Value>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub checkin: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub checkout: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub payment: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub tg_user: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub tg_id: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub client_request_id: String,

    #[serde(flatten)]
    pub extensions: Map<String, Value>,
}

/// The required fields of a booking, checked and normalized.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidBooking {
    pub hotel: String,
    pub room_type: String,
    pub price: f64,
    pub checkin: String,
    pub checkout: String,
    pub payment: String,
    pub tg_user: String,
    pub tg_id: String,
    pub extensions: Map<String, Value>,
}

impl BookingRequest {
    /// The header value wins; the body's `clientRequestId` is the fallback.
    pub fn idempotency_key(&self, header: Option<&str>) -> String {
        header
            .map(str::trim)
            .filter(|h| !h.is_empty())
            .unwrap_or(self.client_request_id.as_str())
            .trim()
            .to_string()
    }

    /// Checks presence of every required field and the price's shape.
    ///
    /// Dates are opaque: neither ordering nor past dates are checked.
    pub fn validate(self) -> Result<ValidBooking, ValidationError> {
        let room_type = if self.room_type.is_empty() {
            self.room_name
        } else {
            self.room_type
        };

        let price_text = match &self.price {
            None | Some(Value::Null) => String::new(),
            Some(Value::String(s)) => s.trim().to_string(),
            Some(other) => other.to_string(),
        };

        require("hotel", &self.hotel)?;
        require("roomType", &room_type)?;
        require("price", &price_text)?;
        require("checkin", &self.checkin)?;
        require("checkout", &self.checkout)?;
        require("payment", &self.payment)?;

        let price = match price_text.parse::<f64>() {
            Ok(p) if p.is_finite() && p > 0.0 => p,
            _ => return Err(ValidationError::Invalid("price")),
        };

        let mut extensions = self.extensions;
        for key in RESERVED_KEYS {
            extensions.remove(key);
        }

        Ok(ValidBooking {
            hotel: self.hotel,
            room_type,
            price,
            checkin: self.checkin,
            checkout: self.checkout,
            payment: self.payment,
            tg_user: or_default(self.tg_user, "Guest"),
            tg_id: or_default(self.tg_id, "Unknown"),
            extensions,
        })
    }
}

fn require(field: &'static str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        Err(ValidationError::Missing(field))
    } else {
        Ok(())
    }
}

fn or_default(value: String, fallback: &str) -> String {
    if value.is_empty() {
        fallback.to_string()
    } else {
        value
    }
}
