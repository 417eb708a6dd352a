use anyhow::Context;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use voyage_api::{app, app_with_static, oauth::GoogleProvider, AppState, AuthConfig};
use voyage_store::{app_config::Config, open_document_store, seed_sample_plans, Repositories};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Local overrides first; dotenvy never replaces variables already set.
    dotenvy::from_filename(".env.local").ok();
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "voyage_api=debug,voyage_store=debug,tower_http=debug,axum::rejection=trace".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load().context("Failed to load config")?;
    tracing::info!("Starting Voyage API on port {}", config.server.port);

    if config.auth.jwt_secret.len() < 32 {
        tracing::warn!("auth.jwt_secret is shorter than 32 bytes; set VOYAGE__AUTH__JWT_SECRET");
    }

    // Document store
    let store = open_document_store(&config.store)
        .await
        .context("Failed to open document store")?;
    let repos = Repositories::new(store, &config.tables);

    if config.store.seed_sample_plans {
        let added = seed_sample_plans(repos.users.as_ref(), repos.plans.as_ref())
            .await
            .context("Failed to seed sample plans")?;
        tracing::info!("Seeded {} sample plans", added);
    }

    let mut app_state = AppState::new(
        repos,
        AuthConfig {
            secret: config.auth.jwt_secret.clone(),
            expiration: config.auth.jwt_expiration_seconds,
            refresh_window: config.auth.claims_refresh_seconds,
            cookie_name: config.auth.cookie_name.clone(),
        },
        Duration::from_secs(config.cache.plan_listing_ttl_seconds),
    )
    .with_vendor_self_verification(config.vendor.self_verification);

    // OAuth
    match config.auth.google.clone() {
        Some(google) => {
            app_state = app_state.with_identity(Arc::new(GoogleProvider::new(google)));
            tracing::info!("Google sign-in enabled");
        }
        None => tracing::info!("Google sign-in not configured"),
    }

    let app = match config.server.static_dir.as_deref() {
        Some(dir) => app_with_static(app_state, dir),
        None => app(app_state),
    };

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .context("Server error")?;

    Ok(())
}
