use coffee_shop_api::{
    AppState,
    auth::{TokenVerifier, VerifierSettings},
    config::{AppConfig, Env},
    create_router,
    repository::{PostgresRepository, RepositoryState},
    routes,
};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// main
///
/// Entry point: configuration, logging, database, signing keys, then the HTTP server.
/// Any failure during startup aborts the process.
#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();
    let config = AppConfig::load();

    // RUST_LOG wins; otherwise verbose for this crate during development.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "coffee_shop_api=debug,tower_http=info,axum=trace".into());

    match config.env {
        Env::Local => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
        Env::Production => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
    }

    tracing::info!("Application starting in {:?} mode", config.env);

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.db_url)
        .await
        .expect("FATAL: Failed to connect to Postgres. Check DATABASE_URL.");

    let postgres = PostgresRepository::new(pool);
    postgres
        .migrate()
        .await
        .expect("FATAL: Failed to apply database migrations.");

    if config.reset_db_on_start {
        let seed = postgres
            .reset_and_seed()
            .await
            .expect("FATAL: Failed to reset and seed the drinks table.");
        tracing::warn!(seed_id = seed.id, "drinks table reset (RESET_DB_ON_START)");
    }

    let repo = Arc::new(postgres) as RepositoryState;

    // Signing keys are fetched once here; requests never hit the identity provider.
    let settings = VerifierSettings::from_config(&config)
        .expect("FATAL: Invalid token verifier configuration. Check JWT_ALGORITHM.");
    let verifier = TokenVerifier::discover(settings)
        .await
        .expect("FATAL: Failed to fetch signing keys. Check AUTH0_DOMAIN / JWKS_URL.");

    for entry in routes::route_table() {
        tracing::info!(
            "route {} {} -> {}",
            entry.method,
            entry.path,
            entry.permission.unwrap_or("public")
        );
    }

    let bind_addr = config.bind_addr;
    let app_state = AppState {
        repo,
        verifier: Arc::new(verifier),
    };

    let app = create_router(app_state);

    let listener = TcpListener::bind(&bind_addr)
        .await
        .expect("FATAL: Failed to bind HTTP listener. Check BIND_ADDR.");

    tracing::info!("Listening on {}", bind_addr);
    tracing::info!("API Documentation (Swagger UI) available at /swagger-ui");

    axum::serve(listener, app)
        .await
        .expect("FATAL: HTTP server terminated unexpectedly.");
}
