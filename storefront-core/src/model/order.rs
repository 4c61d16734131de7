use super::booking::lenient_string;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use std::fmt;

/// Lifecycle of a booking: `pending` until an admin approves or rejects it.
///
/// Records written by older deployments may carry free-text statuses; those
/// are kept verbatim in `Other` so a rewrite of the file does not alter them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub enum OrderStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
    Other(String),
}

impl OrderStatus {
    /// Normalizes free text (`" Approved "` -> `Approved`).
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "pending" => Some(OrderStatus::Pending),
            "approved" => Some(OrderStatus::Approved),
            "rejected" => Some(OrderStatus::Rejected),
            _ => None,
        }
    }

    /// Like `parse`, but never fails. Blank text reads as pending.
    pub fn from_stored(raw: &str) -> Self {
        if raw.trim().is_empty() {
            return OrderStatus::Pending;
        }
        Self::parse(raw).unwrap_or_else(|| OrderStatus::Other(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Approved => "approved",
            OrderStatus::Rejected => "rejected",
            OrderStatus::Other(raw) => raw,
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for OrderStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for OrderStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = lenient_string(deserializer)?;
        Ok(Self::from_stored(&raw))
    }
}

/// Numbers and numeric strings both read as a price; anything else reads as 0.
fn lenient_price<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        Some(Value::String(s)) => s
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|p| p.is_finite())
            .unwrap_or(0.0),
        _ => 0.0,
    })
}

/// ISO-8601 text; missing or unparsable stamps read as the epoch and sort last.
fn lenient_timestamp<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = lenient_string(deserializer)?;
    Ok(DateTime::parse_from_rfc3339(&raw)
        .map(|t| t.with_timezone(&Utc))
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH))
}

fn lenient_optional_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = lenient_string(deserializer)?;
    Ok(DateTime::parse_from_rfc3339(&raw)
        .ok()
        .map(|t| t.with_timezone(&Utc)))
}

fn epoch() -> DateTime<Utc> {
    DateTime::<Utc>::UNIX_EPOCH
}

/// A persisted booking record.
///
/// Unknown fields submitted by the client survive in `extensions` so older
/// and newer front-ends can share the same orders file. Every field reads
/// leniently; only a record that is not a JSON object fails to load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    #[serde(default, deserialize_with = "lenient_string")]
    pub id: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub idempotency_key: String,
    #[serde(default)]
    pub status: OrderStatus,

    #[serde(default, deserialize_with = "lenient_string")]
    pub hotel: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub room_type: String,
    #[serde(default, deserialize_with = "lenient_price")]
    pub price: f64,
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

    #[serde(default = "epoch", deserialize_with = "lenient_timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(
        default,
        deserialize_with = "lenient_optional_timestamp",
        skip_serializing_if = "Option::is_none"
    )]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decided_by: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient_optional_timestamp",
        skip_serializing_if = "Option::is_none"
    )]
    pub decided_at: Option<DateTime<Utc>>,

    #[serde(flatten)]
    pub extensions: Map<String, Value>,
}

impl Order {
    /// Case-insensitive substring match over the admin-searchable fields.
    /// `needle` must already be lowercase.
    pub fn matches_text(&self, needle: &str) -> bool {
        let haystack = [
            self.id.as_str(),
            self.hotel.as_str(),
            self.room_type.as_str(),
            self.payment.as_str(),
            self.tg_user.as_str(),
            self.tg_id.as_str(),
            self.checkin.as_str(),
            self.checkout.as_str(),
        ]
        .join(" ")
        .to_lowercase();
        haystack.contains(needle)
    }
}

/// Keys owned by the ledger; clients cannot smuggle them in through extensions.
pub const RESERVED_KEYS: [&str; 7] = [
    "id",
    "status",
    "createdAt",
    "updatedAt",
    "idempotencyKey",
    "decidedBy",
    "decidedAt",
];
