use anyhow::{Context, Result};
use std::path::PathBuf;

fn env_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_u64(key: &str, default: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_string(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JwtMethod {
    Hmac,
    Rsa,
}

#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub enabled: bool,
    pub method: JwtMethod,
    pub secret: String,
    pub pubkey_path: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct CorsConfig {
    pub enabled: bool,
    pub allowed_origins: Vec<String>,
    pub allow_credentials: bool,
    pub max_age_secs: u64,
}

#[derive(Debug, Clone)]
pub struct BlacklistConfig {
    pub enabled: bool,
    pub limit: u32,
    pub ban_duration_secs: u64,
}

#[derive(Debug, Clone)]
pub struct ProcessLoggingConfig {
    pub enabled: bool,
    pub dir: PathBuf,
    pub max_size_bytes: u64,
    pub max_backups: u32,
    pub max_age_days: u64,
    pub compress: bool,
}

/// Gateway-wide configuration, loaded once at startup from `RTSP_STREAM_`-prefixed
/// environment variables. Every field has a documented default so the effective
/// configuration is visible at the call site rather than buried in a macro.
#[derive(Debug, Clone)]
pub struct Specification {
    pub port: u16,
    pub debug: bool,
    pub cleanup_enabled: bool,
    pub cleanup_period_secs: u64,
    pub store_dir: PathBuf,
    pub keep_files: bool,
    pub audio_enabled: bool,
    pub wait_timeout_secs: u64,
    pub endpoints_file: PathBuf,
    pub transcoder_binary: String,
    pub jwt: JwtConfig,
    pub cors: CorsConfig,
    pub blacklist: BlacklistConfig,
    pub process_logging: ProcessLoggingConfig,
}

impl Specification {
    pub fn transcoder_binary(&self) -> String {
        self.transcoder_binary.clone()
    }

    pub fn from_env() -> Result<Self> {
        let jwt_method = match env_string("RTSP_STREAM_JWT_METHOD", "hmac").as_str() {
            "rsa" => JwtMethod::Rsa,
            _ => JwtMethod::Hmac,
        };

        let jwt = JwtConfig {
            enabled: env_bool("RTSP_STREAM_JWT_ENABLED", false),
            method: jwt_method,
            secret: env_string("RTSP_STREAM_JWT_SECRET", ""),
            pubkey_path: std::env::var("RTSP_STREAM_JWT_PUBKEY_PATH").ok().map(PathBuf::from),
        };

        let cors = CorsConfig {
            enabled: env_bool("RTSP_STREAM_CORS_ENABLED", true),
            allowed_origins: std::env::var("RTSP_STREAM_CORS_ALLOWED_ORIGINS")
                .ok()
                .map(|v| v.split(',').map(|s| s.trim().to_string()).collect())
                .unwrap_or_default(),
            allow_credentials: env_bool("RTSP_STREAM_CORS_ALLOW_CREDENTIALS", false),
            max_age_secs: env_u64("RTSP_STREAM_CORS_MAX_AGE_SECS", 300),
        };

        let blacklist = BlacklistConfig {
            enabled: env_bool("RTSP_STREAM_BLACKLIST_ENABLED", true),
            limit: env_u64("RTSP_STREAM_BLACKLIST_LIMIT", 3) as u32,
            ban_duration_secs: env_u64("RTSP_STREAM_BLACKLIST_BAN_DURATION_SECS", 300),
        };

        let process_logging = ProcessLoggingConfig {
            enabled: env_bool("RTSP_STREAM_PROCESS_LOGGING_ENABLED", false),
            dir: PathBuf::from(env_string("RTSP_STREAM_PROCESS_LOGGING_DIR", "./logs")),
            max_size_bytes: env_u64("RTSP_STREAM_PROCESS_LOGGING_MAX_SIZE_BYTES", 10 * 1024 * 1024),
            max_backups: env_u64("RTSP_STREAM_PROCESS_LOGGING_MAX_BACKUPS", 3) as u32,
            max_age_days: env_u64("RTSP_STREAM_PROCESS_LOGGING_MAX_AGE_DAYS", 7),
            compress: env_bool("RTSP_STREAM_PROCESS_LOGGING_COMPRESS", true),
        };

        let spec = Specification {
            port: env_u64("RTSP_STREAM_PORT", 8080) as u16,
            debug: env_bool("RTSP_STREAM_DEBUG", false),
            cleanup_enabled: env_bool("RTSP_STREAM_CLEANUP_ENABLED", true),
            cleanup_period_secs: env_u64("RTSP_STREAM_CLEANUP_PERIOD_SECS", 120),
            store_dir: PathBuf::from(env_string("RTSP_STREAM_STORE_DIR", "./streams")),
            keep_files: env_bool("RTSP_STREAM_KEEP_FILES", false),
            audio_enabled: env_bool("RTSP_STREAM_AUDIO_ENABLED", true),
            wait_timeout_secs: env_u64("RTSP_STREAM_WAIT_TIMEOUT_SECS", 25),
            endpoints_file: PathBuf::from(env_string("RTSP_STREAM_ENDPOINTS_FILE", "./rtsp-stream.yml")),
            transcoder_binary: env_string("RTSP_STREAM_TRANSCODER_BINARY", "ffmpeg"),
            jwt,
            cors,
            blacklist,
            process_logging,
        };

        if spec.jwt.enabled && spec.jwt.method == JwtMethod::Rsa && spec.jwt.pubkey_path.is_none() {
            anyhow::bail!("RTSP_STREAM_JWT_METHOD=rsa requires RTSP_STREAM_JWT_PUBKEY_PATH");
        }

        if spec.cors.enabled && spec.cors.allow_credentials && spec.cors.allowed_origins.is_empty() {
            anyhow::bail!(
                "RTSP_STREAM_CORS_ALLOW_CREDENTIALS=true requires a non-empty \
                 RTSP_STREAM_CORS_ALLOWED_ORIGINS (wildcard origin and credentials cannot be combined)"
            );
        }

        Ok(spec)
    }
}

/// Per-endpoint enable/secret toggle plus preload table, loaded from an optional
/// YAML file. A missing file leaves every endpoint enabled with no preloads.
#[derive(Debug, Clone, serde::Deserialize)]
#[serde(default)]
pub struct EndpointToggle {
    pub enabled: bool,
    pub secret: Option<String>,
}

impl Default for EndpointToggle {
    fn default() -> Self {
        EndpointToggle { enabled: true, secret: None }
    }
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct ListenEntry {
    #[serde(default = "default_true")]
    pub enabled: bool,
    pub uri: String,
    pub alias: String,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, serde::Deserialize, Default)]
#[serde(default)]
pub struct EndpointsConfig {
    pub start: EndpointToggle,
    pub stop: EndpointToggle,
    pub list: EndpointToggle,
    #[serde(rename = "static")]
    pub static_: EndpointToggle,
    pub listen: Vec<ListenEntry>,
}

impl EndpointsConfig {
    pub async fn load(path: &std::path::Path) -> Result<Self> {
        match tokio::fs::read_to_string(path).await {
            Ok(raw) => serde_yaml::from_str(&raw)
                .with_context(|| format!("parsing endpoints file {}", path.display())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(EndpointsConfig::default()),
            Err(e) => Err(e).with_context(|| format!("reading endpoints file {}", path.display())),
        }
    }
}
