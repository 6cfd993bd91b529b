use {
    crate::domain::{
        error::MarketError,
        notify::{Notification, Notifier},
    },
    std::{future::Future, pin::Pin},
};

/// Writes notifications to the log. Stands in for the delivery service when
/// none is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(
        &self,
        notification: Notification,
    ) -> Pin<Box<dyn Future<Output = Result<(), MarketError>> + Send + '_>> {
        Box::pin(async move {
            tracing::info!(
                kind = ?notification.kind,
                actor_id = %notification.actor_id,
                target_id = %notification.target_id,
                context = %notification.context,
                "notification"
            );
            Ok(())
        })
    }
}
