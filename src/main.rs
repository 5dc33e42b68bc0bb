use erp_portal::{
    AppState,
    config::{AppConfig, Env},
    create_router,
    rbac::{AccessGate, RoleRegistry},
    repository::{PostgresRepository, RepositoryState},
    session::{SessionState, SessionStore},
};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// main
///
/// The asynchronous entry point, responsible for initializing all core
/// components: Configuration, Logging, Database, Role Registry, Session Store,
/// and the HTTP server.
#[tokio::main]
async fn main() {
    // 1. Configuration & Environment Loading (Fail-Fast)
    dotenv::dotenv().ok();
    let config = AppConfig::load();

    // 2. Logging Filter Setup
    // Prioritizes RUST_LOG, falling back to sensible local defaults.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "erp_portal=debug,tower_http=info,axum=trace".into());

    // 3. Initialize Logging based on Environment
    match config.env {
        Env::Local => {
            // LOCAL: Pretty print output for human readability during debugging.
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
        Env::Production => {
            // PROD: JSON format for ingestion by centralized log aggregators.
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
    }

    tracing::info!("Application starting in {:?} mode", config.env);

    // 4. Database Initialization (Postgres)
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.db_url)
        .await
        .expect("FATAL: Failed to connect to Postgres. Check DATABASE_URL.");

    let repo = Arc::new(PostgresRepository::new(pool)) as RepositoryState;

    // 5. Access Control Gate Assembly
    // The role registry is built once here and never mutated afterwards; the
    // session store and registry are passed into the gate by handle — explicit
    // lifecycle, no ambient singletons.
    let registry = Arc::new(RoleRegistry::with_defaults());
    let sessions: SessionState = Arc::new(SessionStore::new(config.session_timeout_secs));
    let gate = AccessGate::new(registry, sessions.clone());

    // 6. Periodic Session Sweep
    // The tick half of the session monitor: drops expired entries so the store
    // does not accumulate dead sessions. Expiry itself is also enforced on
    // every request (pull model); both share the same arithmetic.
    {
        let sessions = sessions.clone();
        tokio::spawn(async move {
            let mut tick = tokio::time::interval(Duration::from_secs(60));
            loop {
                tick.tick().await;
                let swept = sessions.sweep();
                if swept > 0 {
                    tracing::debug!(swept, "expired sessions removed");
                }
            }
        });
    }

    // 7. Unified State Assembly
    let app_state = AppState {
        repo,
        sessions,
        gate,
        config,
    };

    // 8. Router and Server Startup
    let app = create_router(app_state);

    let listener = TcpListener::bind("0.0.0.0:3000").await.unwrap();

    tracing::info!("HTTP server bound successfully.");
    tracing::info!("Listening on 0.0.0.0:3000");
    tracing::info!("API Documentation (Swagger UI) available at: http://localhost:3000/swagger-ui");

    axum::serve(listener, app).await.unwrap();
}
