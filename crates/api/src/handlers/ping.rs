//! Liveness ping

use axum::Json;
use serde::{Deserialize, Serialize};

use crate::dependencies::SettingsDep;

#[derive(Debug, Serialize, Deserialize)]
pub struct PingResponse {
    pub status: String,
    pub message: String,
    pub version: String,
}

/// Answer as long as the process is up and its settings load
pub async fn ping(SettingsDep(settings): SettingsDep) -> Json<PingResponse> {
    Json(PingResponse {
        status: "ok".to_string(),
        message: "pong".to_string(),
        version: settings.app_version.clone(),
    })
}
