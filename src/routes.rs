use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use uuid::Uuid;

use crate::auth::{self, Claims};
use crate::config::EndpointToggle;
use crate::dto::{StartRequest, StartResponse, StopRequest, StreamDto};
use crate::error::GatewayError;
use crate::registry::Registry;
use crate::supervisor::{LogSinkConfig, StreamSpec, Supervisor};
use crate::validation;
use crate::AppState;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/healthz", get(healthz))
        .route("/metrics", get(metrics_handler))
        .route("/list", get(list_streams))
        .route("/start", post(start_stream))
        .route("/stop", post(stop_stream))
        .route("/stream/*filepath", get(stream_file))
        .with_state(state)
}

async fn root() -> impl IntoResponse {
    (StatusCode::OK, "")
}

async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

async fn metrics_handler() -> impl IntoResponse {
    crate::metrics::render()
}

fn authorize(state: &AppState, headers: &HeaderMap, toggle: &EndpointToggle) -> Result<(), GatewayError> {
    if !toggle.enabled {
        return Err(GatewayError::NotFound);
    }
    if let Some(verifier) = &state.verifier {
        let claims: Claims = verifier.verify(headers)?;
        auth::check_endpoint_secret(&claims, toggle.secret.as_deref())?;
    }
    Ok(())
}

async fn list_streams(State(state): State<AppState>, headers: HeaderMap) -> Response {
    if let Err(e) = authorize(&state, &headers, &state.endpoints.list) {
        return e.into_response();
    }

    let mut out: Vec<StreamDto> = state
        .registry
        .list()
        .into_iter()
        .map(|entry| {
            let label = entry.alias.clone().unwrap_or_else(|| entry.id.clone());
            StreamDto {
                running: entry.running,
                uri: format!("/stream/{label}/index.m3u8"),
                id: entry.id,
                alias: entry.alias.unwrap_or_default(),
            }
        })
        .collect();

    for alias in state.registry.preload_aliases() {
        out.push(StreamDto {
            running: false,
            uri: format!("/stream/{alias}/index.m3u8"),
            id: String::new(),
            alias,
        });
    }

    Json(out).into_response()
}

async fn start_stream(State(state): State<AppState>, headers: HeaderMap, Json(req): Json<StartRequest>) -> Response {
    if let Err(e) = authorize(&state, &headers, &state.endpoints.start) {
        return e.into_response();
    }
    if let Err(e) = validation::validate_uri(&req.uri, "uri") {
        return GatewayError::Validation(e.to_string()).into_response();
    }
    if let Some(alias) = &req.alias {
        if let Err(e) = validation::validate_alias(alias) {
            return GatewayError::Validation(e.to_string()).into_response();
        }
    }

    if state.blacklist.is_banned(&req.uri) {
        return GatewayError::Rejected.into_response();
    }

    if let Some(existing) = state.registry.by_uri(&req.uri) {
        if existing.is_running() {
            return respond_started(&state, &existing);
        }
        return match existing.restart().await {
            Ok(()) => respond_started(&state, &existing),
            Err(e) => {
                state.blacklist.add_or_increase(&req.uri);
                e.into_response()
            }
        };
    }

    match create_and_start(&state, &req.uri, req.alias.clone()).await {
        Ok(sup) => {
            state.blacklist.remove(&req.uri);
            respond_started(&state, &sup)
        }
        Err(e) => {
            state.blacklist.add_or_increase(&req.uri);
            e.into_response()
        }
    }
}

/// `uri` in the response is the public playlist URL, not the RTSP source — matches
/// `/list`'s `StreamDto::uri` and the original `streamDto{URI: s.Path}`.
fn respond_started(state: &AppState, sup: &Arc<Supervisor>) -> Response {
    let alias = state.registry.alias_for(&sup.spec.id).unwrap_or_default();
    let label = if alias.is_empty() { sup.spec.id.clone() } else { alias.clone() };
    Json(StartResponse {
        running: sup.is_running(),
        uri: format!("/stream/{label}/index.m3u8"),
        id: sup.spec.id.clone(),
        alias,
    })
    .into_response()
}

async fn create_and_start(
    state: &AppState,
    uri: &str,
    alias: Option<String>,
) -> Result<Arc<Supervisor>, GatewayError> {
    let id = Uuid::new_v4().to_string();
    let store_dir = state.config.store_dir.join(&id);

    let log_sink_config = if state.config.process_logging.enabled {
        Some(LogSinkConfig {
            dir: state.config.process_logging.dir.clone(),
            max_size_bytes: state.config.process_logging.max_size_bytes,
            max_age: std::time::Duration::from_secs(state.config.process_logging.max_age_days * 86_400),
            max_backups: state.config.process_logging.max_backups,
            compress: state.config.process_logging.compress,
        })
    } else {
        None
    };

    let supervisor = Arc::new(Supervisor::new(
        StreamSpec {
            id: id.clone(),
            original_uri: uri.to_string(),
            store_dir,
            binary: state.config.transcoder_binary(),
            audio_enabled: state.config.audio_enabled,
            keep_files: state.config.keep_files,
            wait_timeout: std::time::Duration::from_secs(state.config.wait_timeout_secs),
        },
        std::time::Duration::from_secs(state.config.cleanup_period_secs.max(30)),
        log_sink_config,
    ));

    supervisor.start().await?;
    state.registry.insert(supervisor.clone(), alias);
    Ok(supervisor)
}

async fn stop_stream(State(state): State<AppState>, headers: HeaderMap, Json(req): Json<StopRequest>) -> Response {
    if let Err(e) = authorize(&state, &headers, &state.endpoints.stop) {
        return e.into_response();
    }

    let id = match resolve_id(&state.registry, req.id.as_deref(), req.alias.as_deref()) {
        Some(id) => id,
        None => return GatewayError::NotFound.into_response(),
    };

    if let Some(sup) = state.registry.by_id(&id) {
        sup.stop().await;
        if req.remove {
            state.registry.remove(&id);
        }
    }

    (StatusCode::OK, "").into_response()
}

fn resolve_id(registry: &Registry, id: Option<&str>, alias: Option<&str>) -> Option<String> {
    if let Some(id) = id {
        return Some(id.to_string());
    }
    alias.and_then(|a| registry.resolve_alias(a))
}

async fn stream_file(State(state): State<AppState>, Path(filepath): Path<String>) -> Response {
    if !state.endpoints.static_.enabled {
        return GatewayError::NotFound.into_response();
    }

    let mut segments = filepath.splitn(2, '/');
    let first = segments.next().unwrap_or_default();
    let rest = segments.next();

    if let Err(e) = validation::validate_alias(first) {
        return GatewayError::Validation(e.to_string()).into_response();
    }

    if let Some(uri) = state.registry.take_preload(first) {
        match create_and_start(&state, &uri, Some(first.to_string())).await {
            Ok(sup) => return redirect_to(&sup.spec.id, rest),
            Err(e) => {
                state.blacklist.add_or_increase(&uri);
                return e.into_response();
            }
        }
    }

    if let Some(id) = state.registry.resolve_alias(first) {
        return redirect_to(&id, rest);
    }

    let Some(sup) = state.registry.by_id(first) else {
        return GatewayError::NotFound.into_response();
    };

    sup.liveness.hit();
    if !sup.is_running() {
        if let Err(e) = sup.restart().await {
            return e.into_response();
        }
    }

    let relative = rest.unwrap_or("index.m3u8");
    serve_segment(&state, first, relative).await
}

/// `axum::response::Redirect::to` issues a 303 See Other; the alias contract here
/// calls for a plain 302 Found so that players re-request with the same method.
fn redirect_to(id: &str, rest: Option<&str>) -> Response {
    let location = match rest {
        Some(r) => format!("/stream/{id}/{r}"),
        None => format!("/stream/{id}/index.m3u8"),
    };
    (StatusCode::FOUND, [(header::LOCATION, location)]).into_response()
}

async fn serve_segment(state: &AppState, id: &str, relative: &str) -> Response {
    if relative.contains("..") {
        return GatewayError::Validation("path traversal rejected".to_string()).into_response();
    }

    let path = state.config.store_dir.join(id).join(relative);
    match tokio::fs::read(&path).await {
        Ok(bytes) => {
            let content_type = if relative.ends_with(".m3u8") {
                "application/vnd.apple.mpegurl"
            } else if relative.ends_with(".ts") {
                "video/mp2t"
            } else {
                "application/octet-stream"
            };
            ([(axum::http::header::CONTENT_TYPE, content_type)], bytes).into_response()
        }
        Err(_) => GatewayError::NotFound.into_response(),
    }
}
