use crate::{AppState, auth::VerifierState, guard, handlers};
use axum::{
    Router,
    handler::Handler,
    http::Method,
    routing::{MethodFilter, MethodRouter, get, on},
};

/// RouteEntry
///
/// One row of the route table: the method and path matched, the permission the
/// caller's token must grant (if any), and the endpoint serving it.
pub struct RouteEntry {
    pub method: Method,
    pub path: &'static str,
    pub permission: Option<&'static str>,
    endpoint: MethodRouter<AppState>,
}

impl RouteEntry {
    fn new<H, T>(
        method: Method,
        path: &'static str,
        permission: Option<&'static str>,
        handler: H,
    ) -> Self
    where
        H: Handler<T, AppState>,
        T: 'static,
    {
        let filter = MethodFilter::try_from(method.clone())
            .expect("route table only uses standard HTTP methods");
        Self {
            method,
            path,
            permission,
            endpoint: on(filter, handler),
        }
    }
}

/// route_table
///
/// Every drink endpoint and the permission it requires. `GET /drinks` is the only
/// public one.
pub fn route_table() -> Vec<RouteEntry> {
    vec![
        RouteEntry::new(Method::GET, "/drinks", None, handlers::list_drinks),
        RouteEntry::new(
            Method::GET,
            "/drinks-detail",
            Some("get:drinks-detail"),
            handlers::list_drink_details,
        ),
        RouteEntry::new(
            Method::POST,
            "/drinks",
            Some("post:drinks"),
            handlers::create_drink,
        ),
        RouteEntry::new(
            Method::PATCH,
            "/drinks/{id}",
            Some("patch:drinks"),
            handlers::update_drink,
        ),
        RouteEntry::new(
            Method::DELETE,
            "/drinks/{id}",
            Some("delete:drinks"),
            handlers::delete_drink,
        ),
    ]
}

/// drink_routes
///
/// Builds the router from the route table, wrapping each protected endpoint in the
/// permission guard. Entries sharing a path are merged by method; a method the path
/// does not serve gets the uniform 405 body.
pub fn drink_routes(verifier: VerifierState) -> Router<AppState> {
    let mut router = Router::new()
        // GET /health
        // Unauthenticated liveness probe for load balancers.
        .route("/health", get(|| async { "ok" }));

    for entry in route_table() {
        let endpoint = match entry.permission {
            Some(permission) => guard::require(entry.endpoint, verifier.clone(), permission),
            None => entry.endpoint,
        };
        router = router.route(entry.path, endpoint);
    }

    router
        .method_not_allowed_fallback(handlers::method_not_allowed)
        .fallback(handlers::not_found)
}
