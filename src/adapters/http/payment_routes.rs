use {
    super::auth::Caller,
    crate::{
        AppState,
        adapters::api_errors::ApiError,
        domain::{id::SessionId, payment::Payment},
        services::{
            checkout::{self, CheckoutPayload, CheckoutSession},
            reconciler,
        },
    },
    axum::{
        Json,
        extract::{Path, Query, State},
        response::Redirect,
    },
    serde::Deserialize,
};

pub async fn create_session(
    State(state): State<AppState>,
    Caller(payer): Caller,
    Json(payload): Json<CheckoutPayload>,
) -> Result<Json<CheckoutSession>, ApiError> {
    let session = checkout::create_session(
        &*state.store,
        &*state.provider,
        &state.settings.checkout_config(),
        &payer,
        payload,
    )
    .await?;
    Ok(Json(session))
}

#[derive(Debug, Deserialize)]
pub struct ConfirmQuery {
    pub session_id: String,
}

/// Gateway redirect target. Always answers with a redirect; errors are
/// logged and send the browser to the failure page.
#[tracing::instrument(skip_all, fields(session_id = %query.session_id))]
pub async fn confirm_payment(
    State(state): State<AppState>,
    Query(query): Query<ConfirmQuery>,
) -> Redirect {
    let failure = Redirect::to(&state.settings.failure_redirect_url);

    let session_id = match SessionId::new(query.session_id) {
        Ok(id) => id,
        Err(e) => {
            tracing::warn!(error = %e, "confirmation with invalid session id");
            return failure;
        }
    };

    match reconciler::confirm(&*state.store, &*state.provider, &state.notifier, &session_id).await
    {
        Ok(result) if result.is_success() => {
            let target = format!(
                "{}?session_id={}",
                state.settings.success_redirect_url, session_id
            );
            Redirect::to(&target)
        }
        Ok(result) => {
            tracing::info!(status = %result.payment().status, "payment not completed");
            failure
        }
        Err(e) => {
            tracing::error!(error = %e, "payment confirmation failed");
            failure
        }
    }
}

pub async fn cancel(State(state): State<AppState>) -> Redirect {
    Redirect::to(&state.settings.failure_redirect_url)
}

pub async fn reset_payment(
    State(state): State<AppState>,
    Caller(actor): Caller,
    Path(session_id): Path<String>,
) -> Result<Json<Payment>, ApiError> {
    let session_id = SessionId::new(session_id)?;
    let payment = reconciler::reset(&*state.store, &actor, &session_id).await?;
    Ok(Json(payment))
}
