use std::path::PathBuf;
use thiserror::Error;

/// Failures of the JSON document store and its lock.
#[derive(Error, Debug)]
pub enum StoreError {
    /// The lock marker stayed in place for the whole retry budget.
    #[error("Failed to acquire lock {path} after {attempts} attempts")]
    LockTimeout { path: PathBuf, attempts: u32 },

    /// Underlying IO failure (anything other than "marker already exists").
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The document on disk is not valid JSON for the expected type.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StoreError {
    /// Lock contention is transient: the whole operation can be retried.
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::LockTimeout { .. })
    }
}

/// A booking or status input that cannot be accepted.
///
/// The `Display` form is the wire code returned to HTTP clients,
/// e.g. `missing:hotel` or `invalid:price`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("missing:{0}")]
    Missing(&'static str),
    #[error("invalid:{0}")]
    Invalid(&'static str),
}

impl ValidationError {
    /// Name of the offending field.
    pub fn field(&self) -> &'static str {
        match self {
            ValidationError::Missing(field) | ValidationError::Invalid(field) => field,
        }
    }
}

/// Errors surfaced by the booking ledger operations.
#[derive(Error, Debug)]
pub enum LedgerError {
    /// Client error, detected before the lock is touched.
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// The referenced order id does not exist.
    #[error("Order {0} not found")]
    NotFound(String),

    /// Lock or persistence failure, propagated untouched.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl LedgerError {
    /// Stable machine-readable code for API responses.
    pub fn code(&self) -> String {
        match self {
            LedgerError::Validation(e) => e.to_string(),
            LedgerError::NotFound(_) => "order_not_found".to_string(),
            LedgerError::Store(StoreError::LockTimeout { .. }) => "lock_timeout".to_string(),
            LedgerError::Store(_) => "internal_error".to_string(),
        }
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, LedgerError::Store(e) if e.is_transient())
    }
}

/// Outbound notification failures. Logged by the caller, never surfaced to bookers.
#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("Notifications are not configured")]
    Disabled,

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Telegram API returned {status}: {body}")]
    Api { status: u16, body: String },
}

/// A specialized Result type for store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// A specialized Result type for ledger operations.
pub type Result<T> = std::result::Result<T, LedgerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_codes() {
        assert_eq!(ValidationError::Missing("hotel").to_string(), "missing:hotel");
        assert_eq!(ValidationError::Invalid("price").to_string(), "invalid:price");
        assert_eq!(ValidationError::Invalid("price").field(), "price");
    }

    #[test]
    fn test_validation_error_composes_with_error_chains() {
        let boxed: Box<dyn std::error::Error + Send + Sync> =
            Box::new(ValidationError::Missing("checkin"));
        assert_eq!(boxed.to_string(), "missing:checkin");

        let wrapped = anyhow::Error::from(LedgerError::from(ValidationError::Invalid("status")));
        assert_eq!(wrapped.to_string(), "Validation failed: invalid:status");
        assert_eq!(wrapped.root_cause().to_string(), "invalid:status");
    }

    #[test]
    fn test_ledger_error_codes() {
        let timeout = LedgerError::from(StoreError::LockTimeout {
            path: PathBuf::from("orders.json.lock"),
            attempts: 3,
        });
        assert_eq!(timeout.code(), "lock_timeout");
        assert!(timeout.is_transient());

        let missing = LedgerError::NotFound("HOTEL_1".into());
        assert_eq!(missing.code(), "order_not_found");
        assert!(!missing.is_transient());
    }
}
