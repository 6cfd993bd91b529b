use {
    market_sync::{
        AppState,
        adapters::{http, notifier::TracingNotifier, stripe_client::StripeGateway},
        config::Settings,
        domain::store::Store,
        infra::{
            memory::MemoryStore,
            postgres::{self, PgStore},
        },
        services::sweeper,
    },
    sqlx::postgres::PgPoolOptions,
    std::{error::Error, sync::Arc, time::Duration},
    tokio::{signal, sync::watch},
    tracing_subscriber::EnvFilter,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let settings = Arc::new(Settings::from_env()?);

    let store: Arc<dyn Store> = match &settings.database_url {
        Some(url) => {
            let pool = PgPoolOptions::new()
                .max_connections(20)
                .acquire_timeout(Duration::from_secs(3))
                .connect(url)
                .await?;
            postgres::run_migrations(&pool).await?;
            Arc::new(PgStore::new(pool))
        }
        None => {
            tracing::warn!("DATABASE_URL not set, state is kept in memory only");
            Arc::new(MemoryStore::new())
        }
    };

    let state = AppState {
        store,
        provider: Arc::new(StripeGateway::new(&settings.stripe_secret_key)),
        notifier: Arc::new(TracingNotifier),
        settings: settings.clone(),
    };

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let sweeper_handle = tokio::spawn(sweeper::run_sweeper(
        state.store.clone(),
        state.provider.clone(),
        state.notifier.clone(),
        settings.sweeper_settings(),
        shutdown_rx,
    ));

    let app = http::router(state);

    let listener = tokio::net::TcpListener::bind(settings.listen_addr).await?;
    tracing::info!(addr = %settings.listen_addr, "listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    let _ = shutdown_tx.send(true);
    if let Err(e) = sweeper_handle.await {
        tracing::error!(error = %e, "sweeper task panicked");
    }
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl+c");
            std::future::pending::<()>().await;
        }
    };

    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    tokio::select! {
        _ = ctrl_c => tracing::info!("received ctrl+c, shutting down"),
        _ = terminate => tracing::info!("received SIGTERM, shutting down"),
    }
}
