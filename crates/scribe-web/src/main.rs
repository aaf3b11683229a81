use std::net::SocketAddr;
use std::sync::Arc;

use scribe_core::store::memory::MemoryStore;
use scribe_core::store::sqlite::SqliteStore;
use scribe_core::{PostRepository, RateLimiter, UserRepository};
use scribe_web::config::ServerConfig;
use scribe_web::state::AppState;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "scribe_web=debug,scribe_core=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ServerConfig::load()?;
    let bind_addr = config.bind_addr;
    let tls_config = config.tls.clone();

    tracing::info!(
        "Starting {} v{}",
        config.project_name,
        env!("CARGO_PKG_VERSION")
    );
    tracing::info!("Debug mode: {}", config.debug);

    // Storage
    let (users, posts): (Arc<dyn UserRepository>, Arc<dyn PostRepository>) =
        if config.database.is_memory() {
            tracing::warn!("Using in-memory store; data is lost on restart");
            let store = Arc::new(MemoryStore::new());
            (store.clone(), store)
        } else {
            let store = Arc::new(SqliteStore::connect(&config.database).await?);
            tracing::info!("Database ready at {}", config.database.url);
            (store.clone(), store)
        };

    // Rate limiter (shared store with in-process fallback)
    let limiter = RateLimiter::connect(&config.rate_limit).await;
    tracing::info!(
        "Rate limiting: {} requests/minute via {}",
        config.rate_limit.requests_per_minute,
        limiter.backend_name()
    );

    let sweep_interval = config.rate_limit.sweep_interval();
    let state = AppState::new(config, users, posts, limiter);

    if let Some((username, email, hash)) = state.config.admin.credentials() {
        let admin = state.users.ensure_admin(username, email, hash).await?;
        tracing::info!("Administrator account ready: {}", admin.username);
    }

    // Idle window cleanup
    let sweeper = state.limiter.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(sweep_interval);
        loop {
            interval.tick().await;
            let removed = sweeper.sweep();
            if removed > 0 {
                tracing::debug!(removed, "Swept idle rate limit windows");
            }
        }
    });

    let app = scribe_web::app(state);

    if let (Some(cert), Some(key)) = (&tls_config.cert_path, &tls_config.key_path) {
        use axum_server::tls_rustls::RustlsConfig;
        let rustls_config = RustlsConfig::from_pem_file(cert, key).await?;
        tracing::info!("scribe-web listening on https://{}", bind_addr);
        axum_server::bind_rustls(bind_addr, rustls_config)
            .serve(app.into_make_service_with_connect_info::<SocketAddr>())
            .await?;
    } else {
        let listener = tokio::net::TcpListener::bind(bind_addr).await?;
        tracing::info!("scribe-web listening on http://{}", bind_addr);
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await?;
    }

    Ok(())
}
