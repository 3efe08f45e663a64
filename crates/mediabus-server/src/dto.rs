//! JSON wire shapes for `/api/*`. Kept separate from `mediabus_core::types`
//! so the on-disk/in-memory runtime shapes can evolve without touching the
//! contract clients depend on.

use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: &'static str,
    pub host: String,
    pub port: u16,
}

/// `paired` is serialized as a real boolean, so the two shapes are built
/// directly with `serde_json::json!` in the handler rather than through a
/// tagged enum (serde's internal tagging would stringify the tag value).
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PairedBootstrap {
    pub device: BootstrapDevice,
    pub host: String,
    pub port: u16,
    pub show_hidden_files: bool,
    pub allow_upload: bool,
    pub allow_download: bool,
    pub allow_delete: bool,
}

#[derive(Debug, Serialize)]
pub struct BootstrapDevice {
    pub id: String,
    #[serde(rename = "displayName")]
    pub display_name: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnpairedBootstrap {
    pub app_name: &'static str,
    pub pair_code: String,
    pub pair_token: String,
    pub pair_expires_at: u64,
    pub pair_qr_payload: String,
}

#[derive(Debug, Deserialize)]
pub struct PairStatusQuery {
    pub token: String,
}

#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PairStatusResponse {
    Pending { #[serde(rename = "expiresAt")] expires_at: u64 },
    Approved,
    Blocked { reason: &'static str },
    NotFound,
}

#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum HeartbeatResponse {
    Ok,
    Revoked { error: String },
    Error { error: String },
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub path: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListResponse {
    pub device_id: String,
    pub path: String,
    pub items: Vec<FileEntry>,
    pub show_hidden_files: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileEntry {
    pub name: String,
    pub path: String,
    pub directory: bool,
    pub size: u64,
    pub last_modified: u64,
}

#[derive(Debug, Deserialize)]
pub struct DownloadQuery {
    #[serde(default)]
    pub path: String,
}

#[derive(Debug, Deserialize)]
pub struct UploadQuery {
    #[serde(default)]
    pub path: String,
    pub name: String,
    #[serde(default)]
    pub batch_id: Option<String>,
    #[serde(default)]
    pub batch_total_files: Option<u32>,
    #[serde(default)]
    pub batch_total_bytes: Option<u64>,
    #[serde(default)]
    pub batch_completed_files: Option<u32>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct UploadResponse {
    pub status: &'static str,
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct MkdirQuery {
    #[serde(default)]
    pub path: String,
    pub name: String,
}

#[derive(Debug, Serialize)]
pub struct MkdirResponse {
    pub path: String,
}

#[derive(Debug, Deserialize)]
pub struct RenameQuery {
    #[serde(default)]
    pub path: String,
    pub name: String,
}

#[derive(Debug, Serialize)]
pub struct RenameResponse {
    pub path: String,
    pub renamed: String,
}

#[derive(Debug, Deserialize)]
pub struct QrQuery {
    pub value: String,
}
