use {
    crate::domain::notify::{Notification, Notifier},
    std::sync::Arc,
};

/// Fire-and-forget. Delivery failures are logged and never reach the caller.
pub fn dispatch(notifier: &Arc<dyn Notifier>, notifications: Vec<Notification>) {
    for notification in notifications {
        let notifier = Arc::clone(notifier);
        tokio::spawn(async move {
            let kind = notification.kind;
            let target_id = notification.target_id;
            if let Err(e) = notifier.notify(notification).await {
                tracing::warn!(?kind, %target_id, error = %e, "notification delivery failed");
            }
        });
    }
}
