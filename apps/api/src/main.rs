use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::http::HeaderValue;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use folio::auth::{build_identity_provider, IdentityProvider};
use folio::config::{AuthConfig, Config, StoreBackend};
use folio::db::create_pool;
use folio::resume::{MemoryResumeStore, PgResumeStore, ResumeStore};
use folio::routes::build_router;
use folio::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env()?;

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!(
                "{}={level},tower_http={level}",
                env!("CARGO_PKG_NAME"),
                level = &config.rust_log
            ))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting folio API v{}", env!("CARGO_PKG_VERSION"));

    let store = build_store(&config).await?;
    info!("Resume store initialized ({})", store.backend());

    if matches!(config.auth, AuthConfig::Mock { .. }) {
        warn!("Mock identity provider enabled; every request is treated as authenticated");
    }
    let identity = build_identity_provider(
        &config.auth,
        Duration::from_secs(config.identity_timeout_secs),
    )?;
    info!("Identity provider initialized ({})", identity.backend());

    let state = AppState { store, identity };

    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(config.cors_origin.as_deref())?);

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn build_store(config: &Config) -> Result<Arc<dyn ResumeStore>> {
    match config.store_backend {
        StoreBackend::Postgres => {
            let url = config
                .database_url
                .as_deref()
                .context("DATABASE_URL is required for the postgres store")?;
            let pool = create_pool(url, config.database_max_connections).await?;
            Ok(Arc::new(PgResumeStore::new(pool)))
        }
        StoreBackend::Memory => {
            warn!("Using in-memory resume store; data is lost on restart");
            Ok(Arc::new(MemoryResumeStore::new()))
        }
    }
}

fn cors_layer(origin: Option<&str>) -> Result<CorsLayer> {
    let Some(origin) = origin else {
        return Ok(CorsLayer::permissive());
    };
    let origin: HeaderValue = origin
        .parse()
        .with_context(|| format!("CORS_ORIGIN is not a valid header value: '{origin}'"))?;
    Ok(CorsLayer::new()
        .allow_origin(origin)
        .allow_methods(Any)
        .allow_headers(Any))
}
