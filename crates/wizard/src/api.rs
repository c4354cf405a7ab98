//! Transport seam for the non-upload endpoints.

use reportflow_protocol::ApiFuture;
use reportflow_protocol::messages::{
    CreateSessionRequest, IngestRequest, IngestResponse, ProcessRequest, ProcessResponse,
    SessionInfo,
};
use reportflow_transfer::UploadApi;

/// Every endpoint the workflow calls besides the event feed.
pub trait WorkflowApi: UploadApi {
    /// `POST /sessions`.
    fn create_session(&self, request: CreateSessionRequest) -> ApiFuture<'_, SessionInfo>;

    /// `POST /process`. Not idempotent.
    fn start_processing(&self, request: ProcessRequest) -> ApiFuture<'_, ProcessResponse>;

    /// `GET /sessions/{id}/results.zip`. A 404 status means "not ready".
    fn download_results(&self, session_id: String) -> ApiFuture<'_, Vec<u8>>;

    /// `POST /sessions/{id}/ingest`.
    fn ingest(&self, request: IngestRequest) -> ApiFuture<'_, IngestResponse>;
}
