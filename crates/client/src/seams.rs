//! Transport seam implementations for [`ApiClient`].

use std::future::Future;
use std::pin::Pin;

use reportflow_event_stream::{EventFeed, EventSource, StreamError};
use reportflow_protocol::messages::{
    ChunkAck, ChunkQuery, CompleteUploadQuery, CompleteUploadResponse, CreateSessionRequest,
    IngestRequest, IngestResponse, InitUploadRequest, InitUploadResponse, ProcessRequest,
    ProcessResponse, SessionInfo,
};
use reportflow_protocol::{ApiFuture, ChunkRange};
use reportflow_transfer::UploadApi;
use reportflow_wizard::WorkflowApi;

use crate::client::ApiClient;

impl UploadApi for ApiClient {
    fn init_upload(&self, request: InitUploadRequest) -> ApiFuture<'_, InitUploadResponse> {
        Box::pin(async move { ApiClient::init_upload(self, &request).await })
    }

    fn send_chunk(
        &self,
        query: ChunkQuery,
        range: ChunkRange,
        data: Vec<u8>,
    ) -> ApiFuture<'_, ChunkAck> {
        Box::pin(async move { ApiClient::send_chunk(self, &query, range, data).await })
    }

    fn complete_upload(&self, query: CompleteUploadQuery) -> ApiFuture<'_, CompleteUploadResponse> {
        Box::pin(async move { ApiClient::complete_upload(self, &query).await })
    }
}

impl WorkflowApi for ApiClient {
    fn create_session(&self, request: CreateSessionRequest) -> ApiFuture<'_, SessionInfo> {
        Box::pin(async move { ApiClient::create_session(self, &request).await })
    }

    fn start_processing(&self, request: ProcessRequest) -> ApiFuture<'_, ProcessResponse> {
        Box::pin(async move { ApiClient::start_processing(self, &request).await })
    }

    fn download_results(&self, session_id: String) -> ApiFuture<'_, Vec<u8>> {
        Box::pin(async move { ApiClient::download_results(self, &session_id).await })
    }

    fn ingest(&self, request: IngestRequest) -> ApiFuture<'_, IngestResponse> {
        Box::pin(async move { ApiClient::ingest(self, &request).await })
    }
}

impl EventSource for ApiClient {
    fn connect(
        &self,
        session_id: String,
        from: Option<String>,
    ) -> Pin<Box<dyn Future<Output = Result<EventFeed, StreamError>> + Send + '_>> {
        Box::pin(async move { self.events(&session_id, from.as_deref()).await })
    }
}
