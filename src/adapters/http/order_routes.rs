use {
    super::auth::Caller,
    crate::{
        AppState,
        adapters::api_errors::ApiError,
        domain::{
            event_order::{CustomAcceptance, EventOrder, EventOrderStatus, StatusChange},
            gear_order::{GearOrder, GearOrderStatus},
            workshop::{ParticipantStatus, WorkshopParticipant},
        },
        services::{
            orders::{self, CancelAction, NewEventOrder},
            subscriptions::{self, SubscriptionView},
        },
    },
    axum::{
        Json,
        extract::{Path, State},
        http::StatusCode,
    },
    chrono::{DateTime, Utc},
    serde::Deserialize,
    uuid::Uuid,
};

pub async fn create_event_order(
    State(state): State<AppState>,
    Caller(actor): Caller,
    Json(request): Json<NewEventOrder>,
) -> Result<(StatusCode, Json<EventOrder>), ApiError> {
    let order = orders::create_event_order(&*state.store, &state.notifier, &actor, request).await?;
    Ok((StatusCode::CREATED, Json(order)))
}

pub async fn get_event_order(
    State(state): State<AppState>,
    Caller(actor): Caller,
    Path(id): Path<Uuid>,
) -> Result<Json<EventOrder>, ApiError> {
    Ok(Json(orders::get_event_order(&*state.store, &actor, id).await?))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventStatusBody {
    pub status: EventOrderStatus,
    pub reason: Option<String>,
    /// Pricing and delivery date, read when accepting a custom order.
    #[serde(flatten)]
    pub acceptance: CustomAcceptance,
}

pub async fn change_event_order_status(
    State(state): State<AppState>,
    Caller(actor): Caller,
    Path(id): Path<Uuid>,
    Json(body): Json<EventStatusBody>,
) -> Result<Json<EventOrder>, ApiError> {
    let change = StatusChange {
        reason: body.reason,
        acceptance: Some(body.acceptance),
    };
    let order = orders::change_event_order_status(
        &*state.store,
        &state.notifier,
        &actor,
        id,
        body.status,
        change,
    )
    .await?;
    Ok(Json(order))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtensionRequestBody {
    pub new_delivery_date: DateTime<Utc>,
    pub reason: String,
}

pub async fn request_extension(
    State(state): State<AppState>,
    Caller(actor): Caller,
    Path(id): Path<Uuid>,
    Json(body): Json<ExtensionRequestBody>,
) -> Result<Json<EventOrder>, ApiError> {
    let order = orders::request_extension(
        &*state.store,
        &state.notifier,
        &actor,
        id,
        body.new_delivery_date,
        body.reason,
    )
    .await?;
    Ok(Json(order))
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtensionAnswer {
    Accept,
    Reject,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtensionAnswerBody {
    pub extension_id: Uuid,
    pub action: ExtensionAnswer,
}

/// `{id}` is the order id; the request being answered is named in the body.
pub async fn respond_extension(
    State(state): State<AppState>,
    Caller(actor): Caller,
    Path(id): Path<Uuid>,
    Json(body): Json<ExtensionAnswerBody>,
) -> Result<Json<EventOrder>, ApiError> {
    let accept = matches!(body.action, ExtensionAnswer::Accept);
    let order = orders::respond_extension(
        &*state.store,
        &state.notifier,
        &actor,
        id,
        body.extension_id,
        accept,
    )
    .await?;
    Ok(Json(order))
}

#[derive(Debug, Deserialize)]
pub struct CancelBody {
    pub action: CancelAction,
    pub reason: Option<String>,
}

pub async fn cancel_event_order(
    State(state): State<AppState>,
    Caller(actor): Caller,
    Path(order_id): Path<Uuid>,
    Json(body): Json<CancelBody>,
) -> Result<Json<EventOrder>, ApiError> {
    let order = orders::cancel_event_order(
        &*state.store,
        &state.notifier,
        &actor,
        order_id,
        body.action,
        body.reason,
    )
    .await?;
    Ok(Json(order))
}

pub async fn delete_event_order(
    State(state): State<AppState>,
    Caller(actor): Caller,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    orders::delete_event_order(&*state.store, &actor, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
pub struct StatusBody<S> {
    pub status: S,
    pub reason: Option<String>,
}

pub async fn change_gear_order_status(
    State(state): State<AppState>,
    Caller(actor): Caller,
    Path(id): Path<Uuid>,
    Json(body): Json<StatusBody<GearOrderStatus>>,
) -> Result<Json<GearOrder>, ApiError> {
    let order = orders::change_gear_order_status(
        &*state.store,
        &state.notifier,
        &actor,
        id,
        body.status,
        body.reason,
    )
    .await?;
    Ok(Json(order))
}

pub async fn change_participant_status(
    State(state): State<AppState>,
    Caller(actor): Caller,
    Path(id): Path<Uuid>,
    Json(body): Json<StatusBody<ParticipantStatus>>,
) -> Result<Json<WorkshopParticipant>, ApiError> {
    let participant = orders::change_participant_status(
        &*state.store,
        &state.notifier,
        &actor,
        id,
        body.status,
        body.reason,
    )
    .await?;
    Ok(Json(participant))
}

pub async fn my_subscription(
    State(state): State<AppState>,
    Caller(actor): Caller,
) -> Result<Json<SubscriptionView>, ApiError> {
    Ok(Json(subscriptions::current(&*state.store, actor.user_id).await?))
}
