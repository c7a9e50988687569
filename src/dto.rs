use serde::{Deserialize, Serialize};

#[derive(Deserialize)]
pub struct StartRequest {
    pub uri: String,
    #[serde(default)]
    pub alias: Option<String>,
}

#[derive(Serialize)]
pub struct StartResponse {
    pub running: bool,
    pub uri: String,
    pub id: String,
    #[serde(default)]
    pub alias: String,
}

#[derive(Deserialize)]
pub struct StopRequest {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub alias: Option<String>,
    #[serde(default)]
    pub remove: bool,
    /// Accepted for wire compatibility; `Supervisor::stop` already waits for the
    /// child to be reaped before returning, so there is no fire-and-forget mode to
    /// select between.
    #[serde(default)]
    pub wait: bool,
}

#[derive(Serialize)]
pub struct StreamDto {
    pub running: bool,
    pub uri: String,
    pub id: String,
    #[serde(default)]
    pub alias: String,
}
