pub mod auth;
pub mod blacklist;
pub mod config;
pub mod dto;
pub mod error;
pub mod liveness;
pub mod logging;
pub mod logsink;
pub mod metrics;
pub mod reaper;
pub mod registry;
pub mod routes;
pub mod shutdown;
pub mod spawner;
pub mod supervisor;
pub mod validation;

use std::sync::Arc;

use axum::Router;
use tower::ServiceBuilder;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use config::{EndpointsConfig, Specification};

/// Shared state handed to every handler. Cheap to clone: every field is an `Arc`.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Specification>,
    pub endpoints: Arc<EndpointsConfig>,
    pub registry: Arc<registry::Registry>,
    pub blacklist: Arc<blacklist::Blacklist>,
    pub verifier: Option<Arc<auth::Verifier>>,
}

impl AppState {
    pub fn new(
        config: Specification,
        endpoints: EndpointsConfig,
        registry: Arc<registry::Registry>,
    ) -> anyhow::Result<Self> {
        let blacklist = if config.blacklist.enabled {
            Arc::new(blacklist::Blacklist::enabled(
                config.blacklist.limit,
                std::time::Duration::from_secs(config.blacklist.ban_duration_secs),
            ))
        } else {
            Arc::new(blacklist::Blacklist::disabled())
        };

        let verifier = if config.jwt.enabled {
            Some(Arc::new(auth::Verifier::from_config(&config.jwt)?))
        } else {
            None
        };

        Ok(AppState {
            config: Arc::new(config),
            endpoints: Arc::new(endpoints),
            registry,
            blacklist,
            verifier,
        })
    }
}

/// Assembles the full HTTP surface. Kept separate from `main` so integration
/// tests can mount the same router a real deployment serves.
pub fn build_router(state: AppState) -> Router {
    let cors = if state.config.cors.enabled {
        let origins = if state.config.cors.allowed_origins.is_empty() {
            AllowOrigin::any()
        } else {
            AllowOrigin::list(
                state
                    .config
                    .cors
                    .allowed_origins
                    .iter()
                    .filter_map(|o| o.parse().ok()),
            )
        };
        CorsLayer::new()
            .allow_origin(origins)
            .allow_credentials(state.config.cors.allow_credentials)
            .max_age(std::time::Duration::from_secs(state.config.cors.max_age_secs))
    } else {
        CorsLayer::permissive()
    };

    routes::router(state).layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()).layer(cors))
}
