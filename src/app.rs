//! Shared application state and the HTTP router.

use axum::{
    extract::DefaultBodyLimit,
    http::HeaderValue,
    middleware::{from_fn, from_fn_with_state},
    routing::{delete, get},
    Router,
};
use std::sync::Arc;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};

use crate::config::AppConfig;
use crate::groups::PeerGroupService;
use crate::handlers::{elevated, protected, public};
use crate::middleware::{jwt_auth_middleware, require_admin};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub groups: Arc<PeerGroupService>,
}

impl AppState {
    pub fn new(config: AppConfig, groups: Arc<PeerGroupService>) -> Self {
        Self {
            config: Arc::new(config),
            groups,
        }
    }
}

pub fn app(state: AppState) -> Router {
    let mut router = Router::new()
        // Public
        .route("/", get(public::root))
        .route("/health", get(public::health))
        .merge(peer_group_routes(state.clone()))
        .merge(root_routes(state.clone()))
        .layer(DefaultBodyLimit::max(state.config.api.max_request_size_bytes));

    if state.config.security.enable_cors {
        router = router.layer(cors_layer(&state.config.security.cors_origins));
    }
    if state.config.api.enable_request_logging {
        router = router.layer(TraceLayer::new_for_http());
    }

    router.with_state(state)
}

fn peer_group_routes(state: AppState) -> Router<AppState> {
    use protected::peer_group;

    Router::new()
        .route("/api/peer-groups", get(peer_group::list))
        .route("/api/peer-groups/me", get(peer_group::mine).delete(peer_group::leave))
        .route("/api/peer-groups/:id", get(peer_group::show))
        .layer(from_fn_with_state(state, jwt_auth_middleware))
}

fn root_routes(state: AppState) -> Router<AppState> {
    use elevated::peer_group;

    Router::new()
        .route(
            "/api/root/peer-groups",
            delete(peer_group::delete_all).post(peer_group::form),
        )
        .route("/api/root/peer-groups/:id", delete(peer_group::delete))
        // Outer layer runs first: authenticate, then check the role.
        .layer(from_fn(require_admin))
        .layer(from_fn_with_state(state, jwt_auth_middleware))
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let base = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if origins.iter().any(|o| o == "*") {
        return base.allow_origin(Any);
    }
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match HeaderValue::from_str(o) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin '{}'", o);
                None
            }
        })
        .collect();
    base.allow_origin(AllowOrigin::list(origins))
}
