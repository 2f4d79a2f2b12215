use axum::{Router, extract::FromRef, http::HeaderName};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

pub mod auth;
pub mod config;
pub mod error;
pub mod guard;
pub mod handlers;
pub mod models;
pub mod repository;

// Explicit route table: (method, path, permission) -> handler.
pub mod routes;

// --- Public Re-exports ---

pub use auth::{TokenVerifier, VerifierSettings, VerifierState};
pub use config::AppConfig;
pub use error::{ApiError, AuthError, AuthErrorKind};
pub use repository::{InMemoryRepository, PostgresRepository, RepositoryState};

/// ApiDoc
///
/// OpenAPI document for the drinks API, served at `/api-docs/openapi.json`.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::list_drinks, handlers::list_drink_details, handlers::create_drink,
        handlers::update_drink, handlers::delete_drink
    ),
    components(
        schemas(
            models::Ingredient, models::IngredientShort, models::DrinkShort, models::DrinkLong,
            models::RecipeInput, models::CreateDrinkRequest, models::UpdateDrinkRequest,
            models::DrinkSummaryList, models::DrinkDetailList, models::DrinkDetail,
            models::DrinkDeleted, error::ErrorBody,
        )
    ),
    tags(
        (name = "coffee-shop", description = "Drinks menu API")
    )
)]
struct ApiDoc;

/// AppState
///
/// The single shared container of services, cloned into every request. Holds no
/// authoritative drink data; every request goes through `repo`.
#[derive(Clone)]
pub struct AppState {
    /// Persistence layer (Postgres in production, in-memory in tests).
    pub repo: RepositoryState,
    /// Bearer-token verifier with its cached signing keys.
    pub verifier: VerifierState,
}

impl FromRef<AppState> for RepositoryState {
    fn from_ref(app_state: &AppState) -> RepositoryState {
        app_state.repo.clone()
    }
}

/// create_router
///
/// Assembles the route table, the documentation endpoints and the observability
/// layers, and registers the application state.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    let x_request_id = HeaderName::from_static("x-request-id");

    let base_router = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(routes::drink_routes(state.verifier.clone()))
        .with_state(state);

    base_router
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace_span_logger)
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        ),
                )
                .layer(PropagateRequestIdLayer::new(x_request_id)),
        )
        .layer(cors)
}

/// trace_span_logger
///
/// Opens the per-request span, tagged with method, uri and the `x-request-id` set by
/// the layer above so every log line of a request can be correlated.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}
