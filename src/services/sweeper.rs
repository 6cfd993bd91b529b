use {
    super::reconciler,
    crate::domain::{
        error::MarketError,
        id::SessionId,
        notify::Notifier,
        payment::SettlementResult,
        provider::PaymentProvider,
        store::{StaleSession, Store},
        subscription::{SubscriptionFlags, SubscriptionStatus},
    },
    chrono::{DateTime, Duration as ChronoDuration, Utc},
    std::{sync::Arc, time::Duration},
    tokio::sync::watch,
};

pub const BATCH_SIZE: i64 = 50;

/// Upper bound on how long a session that keeps failing to sweep is held
/// back.
const MAX_SWEEP_BACKOFF_SECS: i64 = 6 * 60 * 60;

#[derive(Debug, Clone, Copy)]
pub struct SweeperSettings {
    pub interval: Duration,
    /// Pending sessions older than this are reconciled and, if still open,
    /// expired.
    pub session_ttl: ChronoDuration,
}

/// Periodically expires abandoned checkout sessions and lapsed
/// subscriptions.
pub async fn run_sweeper(
    store: Arc<dyn Store>,
    provider: Arc<dyn PaymentProvider>,
    notifier: Arc<dyn Notifier>,
    settings: SweeperSettings,
    mut shutdown: watch::Receiver<bool>,
) {
    tracing::info!(
        interval_secs = settings.interval.as_secs(),
        ttl_hours = settings.session_ttl.num_hours(),
        "session sweeper started"
    );

    loop {
        tokio::select! {
            _ = shutdown.changed() => {
                tracing::info!("session sweeper shutting down");
                return;
            }
            _ = tokio::time::sleep(settings.interval) => {}
        }

        let now = Utc::now();
        match sweep_abandoned_sessions(&*store, &*provider, &notifier, now - settings.session_ttl)
            .await
        {
            Ok(0) => {}
            Ok(n) => tracing::info!(count = n, "expired abandoned sessions"),
            Err(e) => tracing::error!(error = %e, "session sweep error"),
        }
        match expire_subscriptions(&*store, now).await {
            Ok(0) => {}
            Ok(n) => tracing::info!(count = n, "expired lapsed subscriptions"),
            Err(e) => tracing::error!(error = %e, "subscription sweep error"),
        }
    }
}

/// Reconciles pending payments created before `cutoff`. Returns how many
/// changed state. A session the gateway reports as paid is settled, never
/// expired. Sessions that fail to reconcile are retried with exponential
/// backoff so they cannot starve newer ones.
pub async fn sweep_abandoned_sessions(
    store: &dyn Store,
    provider: &dyn PaymentProvider,
    notifier: &Arc<dyn Notifier>,
    cutoff: DateTime<Utc>,
) -> Result<usize, MarketError> {
    let now = Utc::now();
    let stale = {
        let mut uow = store.begin().await?;
        uow.stale_pending_payments(cutoff, now, BATCH_SIZE).await?
    };

    let mut changed = 0;
    for StaleSession {
        session_id,
        sweep_attempts,
    } in stale
    {
        match reconciler::expire(store, provider, notifier, &session_id).await {
            Ok(SettlementResult::Settled(_) | SettlementResult::Failed(_)) => changed += 1,
            Ok(_) => {}
            Err(e) => {
                let until = now + sweep_backoff(sweep_attempts + 1);
                tracing::warn!(
                    %session_id,
                    attempts = sweep_attempts + 1,
                    retry_at = %until,
                    error = %e,
                    "could not reconcile stale session"
                );
                if let Err(e) = defer(store, &session_id, until).await {
                    tracing::error!(%session_id, error = %e, "could not defer stale session");
                }
            }
        }
    }
    Ok(changed)
}

async fn defer(
    store: &dyn Store,
    session_id: &SessionId,
    until: DateTime<Utc>,
) -> Result<(), MarketError> {
    let mut uow = store.begin().await?;
    uow.defer_sweep(session_id, until).await?;
    uow.commit().await
}

/// One minute after the first failure, doubling per attempt up to six hours.
pub fn sweep_backoff(attempts: u32) -> ChronoDuration {
    let secs = 60_i64
        .checked_shl(attempts.saturating_sub(1).min(20))
        .unwrap_or(MAX_SWEEP_BACKOFF_SECS)
        .min(MAX_SWEEP_BACKOFF_SECS);
    ChronoDuration::seconds(secs)
}

/// Moves active subscriptions whose window ended to `expired` and clears the
/// owners' cached flags.
pub async fn expire_subscriptions(
    store: &dyn Store,
    now: DateTime<Utc>,
) -> Result<usize, MarketError> {
    let mut uow = store.begin().await?;
    let lapsed = uow.lapsed_subscriptions(now, BATCH_SIZE).await?;
    let count = lapsed.len();

    for mut sub in lapsed {
        sub.close(SubscriptionStatus::Expired, Some("window ended".into()), now)?;
        uow.update_subscription(&sub).await?;
        uow.set_subscription_flags(sub.owner_id, &SubscriptionFlags::default())
            .await?;
        tracing::debug!(subscription_id = %sub.id, owner_id = %sub.owner_id, "subscription expired");
    }
    uow.commit().await?;
    Ok(count)
}
