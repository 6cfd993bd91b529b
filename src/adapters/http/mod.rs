pub mod auth;
pub mod order_routes;
pub mod payment_routes;

use {
    crate::{AppState, adapters::stripe_webhook::stripe_webhook_handler},
    axum::{
        Router,
        extract::DefaultBodyLimit,
        http::StatusCode,
        routing::{get, patch, post},
    },
    std::time::Duration,
    tower_http::timeout::TimeoutLayer,
};

pub fn router(state: AppState) -> Router {
    let payments = Router::new()
        .route("/create-session", post(payment_routes::create_session))
        .route("/confirm-payment", get(payment_routes::confirm_payment))
        .route("/cancel", get(payment_routes::cancel))
        .route("/webhook", post(stripe_webhook_handler))
        .route("/{session_id}/reset", post(payment_routes::reset_payment));

    let event_orders = Router::new()
        .route("/create", post(order_routes::create_event_order))
        .route(
            "/{id}",
            get(order_routes::get_event_order).delete(order_routes::delete_event_order),
        )
        .route("/{id}/status", patch(order_routes::change_event_order_status))
        .route("/{id}/extension", post(order_routes::request_extension))
        .route("/extension/{id}", patch(order_routes::respond_extension))
        .route("/cancel/{order_id}", patch(order_routes::cancel_event_order));

    Router::new()
        .route("/health", get(|| async { "ok" }))
        .nest("/payment", payments)
        .nest("/event-order", event_orders)
        .route(
            "/gear-order/{id}/status",
            patch(order_routes::change_gear_order_status),
        )
        .route(
            "/workshop-participant/{id}/status",
            patch(order_routes::change_participant_status),
        )
        .route("/subscription/me", get(order_routes::my_subscription))
        .layer(DefaultBodyLimit::max(64 * 1024))
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(30),
        ))
        .with_state(state)
}
