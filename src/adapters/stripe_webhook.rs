use {
    crate::{
        AppState,
        adapters::api_errors::ApiError,
        domain::{error::MarketError, id::{EventId, SessionId}},
        services::reconciler,
    },
    axum::{Json, extract::State, http::HeaderMap},
    stripe::EventType,
};

/// `checkout.session.*` events trigger the same confirmation as the
/// redirect. The event body is only a hint; the session status is fetched
/// from Stripe before anything is written.
#[tracing::instrument(
    name = "webhook",
    skip_all,
    fields(event_id = tracing::field::Empty, event_type = tracing::field::Empty)
)]
pub async fn stripe_webhook_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: String,
) -> Result<Json<serde_json::Value>, ApiError> {
    let sig = headers
        .get("Stripe-Signature")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| MarketError::WebhookSignature("missing Stripe-Signature header".into()))?;

    let event = stripe::Webhook::construct_event(&body, sig, &state.settings.stripe_webhook_secret)
        .map_err(|e| MarketError::WebhookSignature(e.to_string()))?;

    let event_id = EventId::new(event.id.to_string())?;
    tracing::Span::current()
        .record("event_id", tracing::field::display(&event_id))
        .record("event_type", tracing::field::debug(&event.type_));

    let is_checkout_event = matches!(
        event.type_,
        EventType::CheckoutSessionCompleted
            | EventType::CheckoutSessionAsyncPaymentSucceeded
            | EventType::CheckoutSessionAsyncPaymentFailed
            | EventType::CheckoutSessionExpired
    );
    let session = match event.data.object {
        stripe::EventObject::CheckoutSession(session) if is_checkout_event => session,
        _ => {
            tracing::debug!("event ignored");
            return Ok(Json(serde_json::json!({"status": "ignored"})));
        }
    };

    let session_id = match SessionId::new(session.id.to_string()) {
        Ok(id) => id,
        Err(MarketError::Validation(msg)) => {
            tracing::warn!("skipping invalid session id: {msg}");
            return Ok(Json(serde_json::json!({"status": "ignored_invalid_data"})));
        }
        Err(e) => return Err(e.into()),
    };

    match reconciler::confirm(
        &*state.store,
        &*state.provider,
        &state.notifier,
        &session_id,
    )
    .await
    {
        Ok(result) => {
            let status = result.payment().status;
            tracing::info!(%session_id, %status, "webhook reconciled");
            Ok(Json(serde_json::json!({"status": status})))
        }
        // Sessions opened elsewhere on the same Stripe account.
        Err(MarketError::NotFound(_)) => {
            tracing::info!(%session_id, "no payment for session, ignored");
            Ok(Json(serde_json::json!({"status": "unknown_session"})))
        }
        Err(e) => Err(e.into()),
    }
}
