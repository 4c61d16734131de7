use crate::error::NotifyError;
use crate::model::Order;
use async_trait::async_trait;

/// Outbound channel told about every newly created order.
///
/// Calls are fire-and-forget from the ledger's point of view: a failure is
/// logged and never affects the booking that triggered it.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn order_created(&self, order: &Order) -> Result<(), NotifyError>;
}

/// Used when no messaging channel is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopNotifier;

#[async_trait]
impl Notifier for NoopNotifier {
    async fn order_created(&self, _order: &Order) -> Result<(), NotifyError> {
        Ok(())
    }
}
