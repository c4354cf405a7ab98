use serde::{Deserialize, Serialize};

use crate::types::IndexNames;

// ---------------------------------------------------------------------------
// Request payloads
// ---------------------------------------------------------------------------

/// Creates a new processing session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateSessionRequest {
    #[serde(rename = "cliente_por_defecto")]
    pub default_client: String,
    #[serde(rename = "subcliente_por_defecto")]
    pub sub_client: Option<String>,
}

/// Allocates server-side storage for one file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InitUploadRequest {
    pub session_id: String,
    pub filename: String,
    pub total_size: u64,
}

/// Query string of `PUT /upload/chunk`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkQuery {
    pub session_id: String,
    pub upload_id: String,
    pub filename: String,
    pub total_size: u64,
}

/// Query string of `POST /upload/complete`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompleteUploadQuery {
    pub session_id: String,
    pub upload_id: String,
    pub filename: String,
}

/// Triggers processing of all uploaded files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessRequest {
    pub session_id: String,
}

/// Bulk-loads the generated tables into Elasticsearch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestRequest {
    pub session_id: String,
    pub t1_normal_index: String,
    #[serde(rename = "t1_ajustada_index")]
    pub t1_adjusted_index: String,
    pub t2_normal_index: String,
    #[serde(rename = "t2_ajustada_index")]
    pub t2_adjusted_index: String,
}

impl IngestRequest {
    pub fn new(session_id: &str, indices: &IndexNames) -> Self {
        Self {
            session_id: session_id.to_string(),
            t1_normal_index: indices.t1_normal.clone(),
            t1_adjusted_index: indices.t1_adjusted.clone(),
            t2_normal_index: indices.t2_normal.clone(),
            t2_adjusted_index: indices.t2_adjusted.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Response payloads
// ---------------------------------------------------------------------------

/// Response to session creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionInfo {
    pub session_id: String,
    #[serde(default)]
    pub status: String,
}

/// Response to upload allocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InitUploadResponse {
    pub upload_id: String,
}

/// Acknowledgment of one chunk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkAck {
    pub ok: bool,
    #[serde(default)]
    pub received: u64,
}

/// Acknowledgment of upload completion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompleteUploadResponse {
    pub ok: bool,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub path: String,
}

/// Response to the processing trigger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessResponse {
    pub ok: bool,
    /// Set when the server ignored the trigger because a run is active.
    #[serde(default)]
    pub already_running: bool,
}

/// Response to an ingest request. `stats` is passed through untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestResponse {
    pub ok: bool,
    #[serde(default)]
    pub stats: serde_json::Value,
}
