//! End-to-end tests driving the full router with a stub transcoder standing in
//! for ffmpeg. The stub is a short shell script that ignores the args it is
//! handed and just creates the playlist file, matching the way a real transcoder
//! would announce readiness.

use anyhow::Result;
use axum_test::TestServer;
use rtsp_gateway::config::{
    BlacklistConfig, CorsConfig, EndpointsConfig, JwtConfig, JwtMethod, ProcessLoggingConfig, Specification,
};
use rtsp_gateway::registry::Registry;
use rtsp_gateway::{build_router, AppState};
use serde_json::{json, Value};
use std::sync::Arc;
use tempfile::TempDir;

fn write_stub_transcoder(dir: &std::path::Path, succeed: bool) -> std::path::PathBuf {
    let path = dir.join("stub-transcoder.sh");
    let body = if succeed {
        "#!/bin/sh\n# last positional argument is the playlist path build_args() appends\neval last=\\${$#}\nmkdir -p \"$(dirname \"$last\")\"\ntouch \"$last\"\nsleep 5\n"
    } else {
        "#!/bin/sh\nexit 1\n"
    };
    std::fs::write(&path, body).unwrap();
    let mut perms = std::fs::metadata(&path).unwrap().permissions();
    std::os::unix::fs::PermissionsExt::set_mode(&mut perms, 0o755);
    std::fs::set_permissions(&path, perms).unwrap();
    path
}

fn test_spec(store_dir: &std::path::Path, transcoder: &std::path::Path) -> Specification {
    Specification {
        port: 0,
        debug: false,
        cleanup_enabled: false,
        cleanup_period_secs: 120,
        store_dir: store_dir.to_path_buf(),
        keep_files: false,
        audio_enabled: true,
        wait_timeout_secs: 3,
        endpoints_file: std::path::PathBuf::from("./rtsp-stream.yml"),
        transcoder_binary: transcoder.to_string_lossy().into_owned(),
        jwt: JwtConfig { enabled: false, method: JwtMethod::Hmac, secret: String::new(), pubkey_path: None },
        cors: CorsConfig {
            enabled: true,
            allowed_origins: Vec::new(),
            allow_credentials: false,
            max_age_secs: 300,
        },
        blacklist: BlacklistConfig { enabled: true, limit: 1, ban_duration_secs: 60 },
        process_logging: ProcessLoggingConfig {
            enabled: false,
            dir: std::path::PathBuf::from("./logs"),
            max_size_bytes: 10 * 1024 * 1024,
            max_backups: 3,
            max_age_days: 7,
            compress: true,
        },
    }
}

async fn test_server(store_dir: &std::path::Path, transcoder: &std::path::Path) -> Result<TestServer> {
    test_server_with_endpoints(store_dir, transcoder, EndpointsConfig::default()).await
}

async fn test_server_with_endpoints(
    store_dir: &std::path::Path,
    transcoder: &std::path::Path,
    endpoints: EndpointsConfig,
) -> Result<TestServer> {
    let spec = test_spec(store_dir, transcoder);
    let registry = Arc::new(Registry::new());
    for entry in &endpoints.listen {
        if entry.enabled {
            registry.seed_preload(entry.alias.clone(), entry.uri.clone());
        }
    }
    let state = AppState::new(spec, endpoints, registry)?;
    let app = build_router(state);
    Ok(TestServer::new(app)?)
}

#[tokio::test]
async fn start_then_list_then_stop() -> Result<()> {
    let base = TempDir::new()?;
    let stub = write_stub_transcoder(base.path(), true);
    let server = test_server(&base.path().join("streams"), &stub).await?;

    let start_response = server.post("/start").json(&json!({ "uri": "rtsp://cam/1" })).await;
    start_response.assert_status_ok();
    let body: Value = start_response.json();
    assert_eq!(body["running"], true);
    let id = body["id"].as_str().unwrap().to_string();

    let list_response = server.get("/list").await;
    list_response.assert_status_ok();
    let list: Value = list_response.json();
    assert_eq!(list.as_array().unwrap().len(), 1);

    let stop_response = server.post("/stop").json(&json!({ "id": id, "remove": true })).await;
    stop_response.assert_status_ok();

    let list_after_stop: Value = server.get("/list").await.json();
    assert_eq!(list_after_stop.as_array().unwrap().len(), 0);

    Ok(())
}

#[tokio::test]
async fn repeated_start_does_not_create_a_second_stream() -> Result<()> {
    let base = TempDir::new()?;
    let stub = write_stub_transcoder(base.path(), true);
    let server = test_server(&base.path().join("streams"), &stub).await?;

    let first: Value = server.post("/start").json(&json!({ "uri": "rtsp://cam/1" })).await.json();
    let second: Value = server.post("/start").json(&json!({ "uri": "rtsp://cam/1" })).await.json();

    assert_eq!(first["id"], second["id"]);

    let list: Value = server.get("/list").await.json();
    assert_eq!(list.as_array().unwrap().len(), 1);

    Ok(())
}

#[tokio::test]
async fn failing_transcoder_eventually_gets_blacklisted() -> Result<()> {
    let base = TempDir::new()?;
    let stub = write_stub_transcoder(base.path(), false);
    let server = test_server(&base.path().join("streams"), &stub).await?;

    // With RTSP_STREAM_BLACKLIST_LIMIT=1, the first two failures each fail with a
    // timeout (the transcoder exited before producing a playlist); the third finds
    // the source already banned.
    let first = server.post("/start").json(&json!({ "uri": "rtsp://cam/bad" })).await;
    assert_eq!(first.status_code(), axum::http::StatusCode::REQUEST_TIMEOUT);

    let second = server.post("/start").json(&json!({ "uri": "rtsp://cam/bad" })).await;
    assert_eq!(second.status_code(), axum::http::StatusCode::REQUEST_TIMEOUT);

    let third = server.post("/start").json(&json!({ "uri": "rtsp://cam/bad" })).await;
    assert_eq!(third.status_code(), axum::http::StatusCode::TOO_MANY_REQUESTS);

    Ok(())
}

#[tokio::test]
async fn preload_alias_starts_stream_and_redirects() -> Result<()> {
    let base = TempDir::new()?;
    let stub = write_stub_transcoder(base.path(), true);

    let mut endpoints = EndpointsConfig::default();
    endpoints.listen.push(rtsp_gateway::config::ListenEntry {
        enabled: true,
        uri: "rtsp://cam/front-door".to_string(),
        alias: "front-door".to_string(),
    });

    let server = test_server_with_endpoints(&base.path().join("streams"), &stub, endpoints).await?;

    let first = server.get("/stream/front-door/index.m3u8").await;
    assert_eq!(first.status_code(), axum::http::StatusCode::FOUND);
    let location = first
        .headers()
        .get(axum::http::header::LOCATION)
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert!(location.starts_with("/stream/"));
    assert!(location.ends_with("/index.m3u8"));

    let list: Value = server.get("/list").await.json();
    let entries = list.as_array().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["alias"], "front-door");

    // The preload entry is consumed on first hit, so the second request resolves
    // through the alias table rather than the preload table, but yields the same
    // redirect target.
    let second = server.get("/stream/front-door/index.m3u8").await;
    assert_eq!(second.status_code(), axum::http::StatusCode::FOUND);
    assert_eq!(
        second.headers().get(axum::http::header::LOCATION).unwrap().to_str().unwrap(),
        location
    );

    Ok(())
}

#[tokio::test]
async fn unknown_stream_segment_returns_not_found() -> Result<()> {
    let base = TempDir::new()?;
    let stub = write_stub_transcoder(base.path(), true);
    let server = test_server(&base.path().join("streams"), &stub).await?;

    let response = server.get("/stream/does-not-exist/index.m3u8").await;
    assert_eq!(response.status_code(), axum::http::StatusCode::NOT_FOUND);

    Ok(())
}
