//! Per-file upload session and the transport seam it drives.

use std::fs::File;
use std::io::{Read, Seek};
use std::path::Path;

use reportflow_protocol::messages::{
    ChunkAck, ChunkQuery, CompleteUploadQuery, CompleteUploadResponse, InitUploadRequest,
    InitUploadResponse,
};
use reportflow_protocol::{ApiError, ApiFuture, ChunkRange};
use tracing::{debug, info, warn};

use crate::chunked::ChunkReader;
use crate::types::{UploadProgress, UploadStatus, UploadTask};
use crate::{DEFAULT_CHUNK_SIZE, UploadError, remote_file_name, validate_file_name};

/// Upload endpoints of the remote service.
///
/// The HTTP client implements this trait; keeping it abstract lets upload
/// logic be tested against scripted mocks.
pub trait UploadApi: Send + Sync {
    /// `POST /upload/init`.
    fn init_upload(&self, request: InitUploadRequest) -> ApiFuture<'_, InitUploadResponse>;

    /// `PUT /upload/chunk` with a `Content-Range` header. Must be safe to
    /// repeat for the same range.
    fn send_chunk(
        &self,
        query: ChunkQuery,
        range: ChunkRange,
        data: Vec<u8>,
    ) -> ApiFuture<'_, ChunkAck>;

    /// `POST /upload/complete`.
    fn complete_upload(&self, query: CompleteUploadQuery) -> ApiFuture<'_, CompleteUploadResponse>;
}

/// Drives one file's transfer, chunk by chunk.
///
/// Chunks are sent strictly in order with one in flight. A failed send leaves
/// the offset untouched, so calling [`send_next_chunk`](Self::send_next_chunk)
/// again re-sends the same range.
pub struct UploadSession<'a, R> {
    api: &'a dyn UploadApi,
    session_id: String,
    reader: ChunkReader<R>,
    chunk_size: u64,
    task: UploadTask,
}

impl<'a> UploadSession<'a, File> {
    /// Opens a local file and allocates its upload on the server.
    ///
    /// The remote name is the path's final component.
    pub async fn open_file(
        api: &'a dyn UploadApi,
        session_id: &str,
        path: &Path,
    ) -> Result<Self, UploadError> {
        let filename = remote_file_name(path)?;
        let file = File::open(path)?;
        Self::begin(api, session_id, &filename, file).await
    }
}

impl<'a, R: Read + Seek + Send> UploadSession<'a, R> {
    /// Requests server-side allocation for `filename` and returns a session
    /// positioned at offset 0.
    pub async fn begin(
        api: &'a dyn UploadApi,
        session_id: &str,
        filename: &str,
        source: R,
    ) -> Result<Self, UploadError> {
        validate_file_name(filename)?;
        let reader = ChunkReader::new(source)?;
        let total_size = reader.total_size();

        let request = InitUploadRequest {
            session_id: session_id.to_string(),
            filename: filename.to_string(),
            total_size,
        };
        let response = api
            .init_upload(request)
            .await
            .map_err(|source| UploadError::Allocation {
                filename: filename.to_string(),
                source,
            })?;

        info!(
            file = %filename,
            upload_id = %response.upload_id,
            total_bytes = total_size,
            "upload allocated"
        );

        Ok(Self {
            api,
            session_id: session_id.to_string(),
            reader,
            chunk_size: DEFAULT_CHUNK_SIZE,
            task: UploadTask::new(filename.to_string(), total_size, response.upload_id),
        })
    }

    /// Overrides the chunk size. `0` restores [`DEFAULT_CHUNK_SIZE`].
    pub fn with_chunk_size(mut self, chunk_size: u64) -> Self {
        self.chunk_size = if chunk_size == 0 {
            DEFAULT_CHUNK_SIZE
        } else {
            chunk_size
        };
        self
    }

    /// The range the next [`send_next_chunk`](Self::send_next_chunk) will
    /// transmit, or `None` once every byte is acknowledged.
    pub fn next_range(&self) -> Option<ChunkRange> {
        ChunkRange::next(self.task.offset, self.chunk_size, self.task.total_size)
    }

    /// Sends the range starting at the current offset and returns the new
    /// offset once the server acknowledges it.
    ///
    /// When everything has already been acknowledged this is a no-op that
    /// returns the current offset.
    pub async fn send_next_chunk(&mut self) -> Result<u64, UploadError> {
        self.ensure_in_progress()?;

        let Some(range) = self.next_range() else {
            debug!(file = %self.task.filename, "all chunks acknowledged, nothing to send");
            return Ok(self.task.offset);
        };

        let offset = self.task.offset;
        let data = self.reader.read_range(&range)?;
        let query = ChunkQuery {
            session_id: self.session_id.clone(),
            upload_id: self.task.upload_id.clone(),
            filename: self.task.filename.clone(),
            total_size: self.task.total_size,
        };

        let result = self.api.send_chunk(query, range, data).await.and_then(|ack| {
            if !ack.ok {
                return Err(ApiError::Rejected("chunk not acknowledged".into()));
            }
            if ack.received != range.len() {
                return Err(ApiError::Rejected(format!(
                    "server received {} of {} bytes",
                    ack.received,
                    range.len()
                )));
            }
            Ok(())
        });

        match result {
            Ok(()) => {
                self.task.offset = range.end_exclusive();
                debug!(
                    file = %self.task.filename,
                    range = %range,
                    offset = self.task.offset,
                    "chunk acknowledged"
                );
                Ok(self.task.offset)
            }
            Err(source) => {
                warn!(
                    file = %self.task.filename,
                    range = %range,
                    error = %source,
                    "chunk transfer failed"
                );
                Err(UploadError::ChunkTransfer { offset, source })
            }
        }
    }

    /// Signals the server that every range has arrived.
    ///
    /// Only valid once the offset equals the total size. On failure the
    /// chunks stay acknowledged; retry this call, not the chunks.
    pub async fn complete(&mut self) -> Result<(), UploadError> {
        self.ensure_in_progress()?;

        if !self.task.is_fully_sent() {
            return Err(UploadError::Incomplete {
                offset: self.task.offset,
                total_size: self.task.total_size,
            });
        }

        let query = CompleteUploadQuery {
            session_id: self.session_id.clone(),
            upload_id: self.task.upload_id.clone(),
            filename: self.task.filename.clone(),
        };

        let response = self
            .api
            .complete_upload(query)
            .await
            .and_then(|resp| {
                if resp.ok {
                    Ok(resp)
                } else {
                    Err(ApiError::Rejected("completion not acknowledged".into()))
                }
            })
            .map_err(|e| {
                warn!(file = %self.task.filename, error = %e, "upload completion failed");
                UploadError::Completion(e)
            })?;

        self.task.status = UploadStatus::Complete;
        info!(
            file = %self.task.filename,
            path = %response.path,
            "upload completed"
        );
        Ok(())
    }

    /// Marks the upload as abandoned. Further operations are rejected.
    pub fn fail(&mut self, reason: &str) {
        if self.task.status == UploadStatus::InProgress {
            self.task.status = UploadStatus::Failed;
            warn!(
                file = %self.task.filename,
                offset = self.task.offset,
                reason,
                "upload abandoned"
            );
        }
    }

    /// Current task state.
    pub fn task(&self) -> &UploadTask {
        &self.task
    }

    /// Current progress snapshot.
    pub fn progress(&self) -> UploadProgress {
        self.task.progress()
    }

    fn ensure_in_progress(&self) -> Result<(), UploadError> {
        match self.task.status {
            UploadStatus::InProgress => Ok(()),
            other => Err(UploadError::Finished(other)),
        }
    }
}
