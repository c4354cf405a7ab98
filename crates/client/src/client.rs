//! Session API client.
//!
//! Async HTTP client using `reqwest`. Every call maps transport failures
//! and non-2xx answers into [`ApiError`].

use std::time::Duration;

use percent_encoding::{NON_ALPHANUMERIC, utf8_percent_encode};
use reportflow_event_stream::{EventFeed, StreamError};
use reportflow_protocol::constants::{
    CHUNK_REQUEST_TIMEOUT, CONNECT_TIMEOUT, EVENT_IDLE_TIMEOUT, EVENTS_FROM_PARAM,
    LONG_REQUEST_TIMEOUT, REQUEST_TIMEOUT,
};
use reportflow_protocol::messages::{
    ChunkAck, ChunkQuery, CompleteUploadQuery, CompleteUploadResponse, CreateSessionRequest,
    IngestRequest, IngestResponse, InitUploadRequest, InitUploadResponse, ProcessRequest,
    ProcessResponse, SessionInfo,
};
use reportflow_protocol::{ApiError, ChunkRange};
use reqwest::header::{ACCEPT, CONTENT_RANGE, CONTENT_TYPE};
use reqwest::{RequestBuilder, Response};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::events::sse_feed;

/// Maps a `reqwest` failure (connect, timeout, body read).
fn transport(e: reqwest::Error) -> ApiError {
    ApiError::Http(e.to_string())
}

/// Report-processing API client.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    event_idle_timeout: Duration,
}

impl ApiClient {
    /// Creates a client for the service at `base_url`.
    pub fn new(base_url: &str) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(transport)?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            event_idle_timeout: EVENT_IDLE_TIMEOUT,
        })
    }

    /// Overrides how long the event feed may stay silent before it counts
    /// as disconnected.
    pub fn with_event_idle_timeout(mut self, idle: Duration) -> Self {
        self.event_idle_timeout = idle;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn session_url(&self, session_id: &str, tail: &str) -> String {
        let encoded = utf8_percent_encode(session_id, NON_ALPHANUMERIC);
        format!("{}/sessions/{encoded}/{tail}", self.base_url)
    }

    /// Sends a request and rejects non-success statuses.
    async fn send(request: RequestBuilder) -> Result<Response, ApiError> {
        let resp = request.send().await.map_err(transport)?;
        let status = resp.status();

        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ApiError::Status {
                status: status.as_u16(),
                body,
            });
        }

        Ok(resp)
    }

    async fn send_json<T: DeserializeOwned>(request: RequestBuilder) -> Result<T, ApiError> {
        let resp = Self::send(request).await?;
        let body = resp.bytes().await.map_err(transport)?;
        Ok(serde_json::from_slice(&body)?)
    }

    /// `POST /sessions`.
    pub async fn create_session(
        &self,
        request: &CreateSessionRequest,
    ) -> Result<SessionInfo, ApiError> {
        debug!(client = %request.default_client, "creating session");
        let req = self
            .http
            .post(self.url("/sessions"))
            .timeout(REQUEST_TIMEOUT)
            .json(request);
        Self::send_json(req).await
    }

    /// `POST /upload/init`.
    pub async fn init_upload(
        &self,
        request: &InitUploadRequest,
    ) -> Result<InitUploadResponse, ApiError> {
        let req = self
            .http
            .post(self.url("/upload/init"))
            .timeout(REQUEST_TIMEOUT)
            .json(request);
        Self::send_json(req).await
    }

    /// `PUT /upload/chunk` with the range in `Content-Range`.
    pub async fn send_chunk(
        &self,
        query: &ChunkQuery,
        range: ChunkRange,
        data: Vec<u8>,
    ) -> Result<ChunkAck, ApiError> {
        debug!(upload_id = %query.upload_id, range = %range, "sending chunk");
        let req = self
            .http
            .put(self.url("/upload/chunk"))
            .query(query)
            .header(CONTENT_RANGE, range.header_value())
            .header(CONTENT_TYPE, "application/octet-stream")
            .timeout(CHUNK_REQUEST_TIMEOUT)
            .body(data);
        Self::send_json(req).await
    }

    /// `POST /upload/complete`.
    pub async fn complete_upload(
        &self,
        query: &CompleteUploadQuery,
    ) -> Result<CompleteUploadResponse, ApiError> {
        let req = self
            .http
            .post(self.url("/upload/complete"))
            .query(query)
            .timeout(REQUEST_TIMEOUT);
        Self::send_json(req).await
    }

    /// `POST /process`.
    pub async fn start_processing(
        &self,
        request: &ProcessRequest,
    ) -> Result<ProcessResponse, ApiError> {
        let req = self
            .http
            .post(self.url("/process"))
            .timeout(REQUEST_TIMEOUT)
            .json(request);
        Self::send_json(req).await
    }

    /// `GET /sessions/{id}/events`, resuming after `from` when given.
    ///
    /// No overall timeout applies: the feed stays open until the server
    /// closes it or the caller drops it.
    pub async fn events(
        &self,
        session_id: &str,
        from: Option<&str>,
    ) -> Result<EventFeed, StreamError> {
        let mut req = self
            .http
            .get(self.session_url(session_id, "events"))
            .header(ACCEPT, "text/event-stream");
        if let Some(from) = from {
            req = req.query(&[(EVENTS_FROM_PARAM, from)]);
        }

        let resp = Self::send(req).await?;
        Ok(sse_feed(resp.bytes_stream(), self.event_idle_timeout))
    }

    /// `GET /sessions/{id}/results.zip`. A 404 means the archive is not
    /// ready yet.
    pub async fn download_results(&self, session_id: &str) -> Result<Vec<u8>, ApiError> {
        let req = self
            .http
            .get(self.session_url(session_id, "results.zip"))
            .timeout(LONG_REQUEST_TIMEOUT);
        let resp = Self::send(req).await?;
        Ok(resp.bytes().await.map_err(transport)?.to_vec())
    }

    /// `POST /sessions/{id}/ingest`.
    pub async fn ingest(&self, request: &IngestRequest) -> Result<IngestResponse, ApiError> {
        let req = self
            .http
            .post(self.session_url(&request.session_id, "ingest"))
            .timeout(LONG_REQUEST_TIMEOUT)
            .json(request);
        Self::send_json(req).await
    }
}
