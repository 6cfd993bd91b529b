pub mod adapters;
pub mod config;
pub mod domain;
pub mod infra;
pub mod services;

use {
    config::Settings,
    domain::{notify::Notifier, provider::PaymentProvider, store::Store},
    std::sync::Arc,
};

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub provider: Arc<dyn PaymentProvider>,
    pub notifier: Arc<dyn Notifier>,
    pub settings: Arc<Settings>,
}
