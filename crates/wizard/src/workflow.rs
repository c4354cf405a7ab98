//! Workflow orchestrator.
//!
//! Drives one session through upload, processing and results, keeping the
//! wizard step, the activity log and the processing lock in shared state
//! that the event handler updates from the stream task.

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use reportflow_event_stream::{
    EventHandler, EventSource, EventStreamConsumer, StreamState, TerminalReason,
};
use reportflow_protocol::constants::DEFAULT_CLIENT;
use reportflow_protocol::messages::{CreateSessionRequest, IngestRequest, ProcessRequest};
use reportflow_protocol::{ApiError, EventCategory, EventRecord, IndexNames, StatusDetail};
use reportflow_transfer::{UploadApi, UploadError, UploadSession};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::api::WorkflowApi;
use crate::error::WizardError;
use crate::types::{LogLine, Session, WizardStep, WorkflowConfig, WorkflowEvent};

#[derive(Debug, Default)]
struct WorkflowState {
    session: Option<Session>,
    /// Set when processing is requested, cleared by a terminal status or a
    /// failed trigger.
    processing: bool,
    log: Vec<LogLine>,
}

/// State shared between the workflow and the event handler.
#[derive(Clone)]
struct Shared {
    state: Arc<Mutex<WorkflowState>>,
    events_tx: mpsc::Sender<WorkflowEvent>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, WorkflowState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn emit(&self, event: WorkflowEvent) {
        if let Err(e) = self.events_tx.try_send(event) {
            debug!(error = %e, "workflow event dropped");
        }
    }

    fn log(&self, category: EventCategory, detail: impl Into<String>) {
        self.push_log(LogLine::now(category, detail));
    }

    fn push_log(&self, line: LogLine) {
        self.lock().log.push(line.clone());
        self.emit(WorkflowEvent::Log(line));
    }

    fn set_step(&self, step: WizardStep) {
        let changed = match self.lock().session.as_mut() {
            Some(session) if session.step != step => {
                session.step = step;
                true
            }
            _ => false,
        };
        if changed {
            info!(step = %step, "wizard step changed");
            self.emit(WorkflowEvent::StepChanged(step));
        }
    }

    fn session_id(&self) -> Result<String, WizardError> {
        self.lock()
            .session
            .as_ref()
            .map(|s| s.id.clone())
            .ok_or(WizardError::NoSession)
    }
}

/// Builds the handler that follows processing progress.
fn processing_handler(shared: Shared) -> EventHandler {
    Box::new(move |record: &EventRecord| {
        let payload = record.payload();
        let terminal = payload.terminal_status();
        shared.push_log(LogLine::from_payload(payload));

        match terminal {
            Some(StatusDetail::Done) => {
                shared.lock().processing = false;
                shared.set_step(WizardStep::Results);
                shared.emit(WorkflowEvent::ProcessingFinished { success: true });
            }
            Some(StatusDetail::Error) => {
                shared.lock().processing = false;
                shared.emit(WorkflowEvent::ProcessingFinished { success: false });
            }
            None => {}
        }
    })
}

/// Orchestrates one report workflow at a time.
pub struct Workflow<A> {
    api: Arc<A>,
    consumer: EventStreamConsumer,
    config: WorkflowConfig,
    shared: Shared,
    events_rx: Option<mpsc::Receiver<WorkflowEvent>>,
}

impl<A: WorkflowApi + 'static> Workflow<A> {
    /// Creates a workflow. `events` opens the session event feed.
    pub fn new(api: Arc<A>, events: Arc<dyn EventSource>, config: WorkflowConfig) -> Self {
        let (events_tx, events_rx) = mpsc::channel(256);
        Self {
            api,
            consumer: EventStreamConsumer::new(events, config.stream.clone()),
            config,
            shared: Shared {
                state: Arc::new(Mutex::new(WorkflowState::default())),
                events_tx,
            },
            events_rx: Some(events_rx),
        }
    }

    /// Takes the event receiver. Can only be called once.
    pub fn take_events(&mut self) -> Option<mpsc::Receiver<WorkflowEvent>> {
        self.events_rx.take()
    }

    pub fn session(&self) -> Option<Session> {
        self.shared.lock().session.clone()
    }

    /// Current wizard step; [`WizardStep::Client`] until a session exists.
    pub fn step(&self) -> WizardStep {
        self.shared
            .lock()
            .session
            .as_ref()
            .map_or(WizardStep::Client, |s| s.step)
    }

    /// Snapshot of the activity log.
    pub fn log(&self) -> Vec<LogLine> {
        self.shared.lock().log.clone()
    }

    pub fn is_processing(&self) -> bool {
        self.shared.lock().processing
    }

    /// State of the processing event stream, if one was opened.
    pub fn stream_state(&self) -> Option<StreamState> {
        self.consumer.state()
    }

    /// Creates a session and moves to the upload step.
    ///
    /// An empty client label becomes `"DEFAULT"`; a blank sub-client is
    /// omitted. The stream of a previous session is dropped once the new
    /// session exists; on failure the current session is left untouched.
    pub async fn create_session(
        &mut self,
        client: &str,
        sub_client: Option<&str>,
    ) -> Result<String, WizardError> {
        let client = match client.trim() {
            "" => DEFAULT_CLIENT,
            c => c,
        }
        .to_string();
        let sub_client = sub_client
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string);

        let request = CreateSessionRequest {
            default_client: client.clone(),
            sub_client: sub_client.clone(),
        };
        let result = self.api.create_session(request).await.and_then(|info| {
            if info.session_id.is_empty() {
                Err(ApiError::Decode("empty session id".into()))
            } else {
                Ok(info)
            }
        });
        let info = match result {
            Ok(info) => info,
            Err(e) => {
                error!(error = %e, "session creation failed");
                self.shared
                    .log(EventCategory::Error, format!("could not create session: {e}"));
                return Err(WizardError::SessionCreation(e));
            }
        };

        self.consumer.discard().await;
        {
            let mut state = self.shared.lock();
            state.session = Some(Session {
                id: info.session_id.clone(),
                client,
                sub_client,
                step: WizardStep::Client,
                indices: self.config.indices.clone(),
            });
            state.processing = false;
            state.log.clear();
        }

        info!(session = %info.session_id, "session created");
        self.shared
            .log(EventCategory::Info, format!("session {} created", info.session_id));
        self.shared.set_step(WizardStep::Upload);
        Ok(info.session_id)
    }

    /// Uploads files one after another, then moves to the processing step.
    ///
    /// Each allocation, chunk and completion is retried according to
    /// [`RetryPolicy`](crate::RetryPolicy). The first file that still fails
    /// stops the run; files before it stay uploaded.
    pub async fn upload_files<P: AsRef<Path>>(&mut self, files: &[P]) -> Result<(), WizardError> {
        let session_id = self.shared.session_id()?;
        if files.is_empty() {
            return Err(WizardError::NoFiles);
        }

        for path in files {
            let path = path.as_ref();
            self.shared
                .log(EventCategory::Info, format!("uploading {}", path.display()));

            if let Err(source) = self.upload_one(&session_id, path).await {
                let file = path.display().to_string();
                error!(file = %file, error = %source, "upload failed");
                self.shared
                    .log(EventCategory::Error, format!("upload of {file} failed: {source}"));
                return Err(WizardError::Upload { file, source });
            }
        }

        info!(session = %session_id, files = files.len(), "upload completed");
        self.shared.log(EventCategory::Info, "upload completed");
        self.shared.set_step(WizardStep::Process);
        Ok(())
    }

    async fn upload_one(&self, session_id: &str, path: &Path) -> Result<(), UploadError> {
        let api: &dyn UploadApi = &*self.api;

        let mut attempt = 1;
        let mut upload = loop {
            match UploadSession::open_file(api, session_id, path).await {
                Ok(upload) => break upload.with_chunk_size(self.config.chunk_size),
                Err(e) => self.pause_before_retry(&mut attempt, e).await?,
            }
        };

        while upload.next_range().is_some() {
            let mut attempt = 1;
            while let Err(e) = upload.send_next_chunk().await {
                if let Err(e) = self.pause_before_retry(&mut attempt, e).await {
                    upload.fail("chunk retries exhausted");
                    return Err(e);
                }
            }
            self.shared
                .emit(WorkflowEvent::UploadProgress(upload.progress()));
        }

        let mut attempt = 1;
        while let Err(e) = upload.complete().await {
            if let Err(e) = self.pause_before_retry(&mut attempt, e).await {
                upload.fail("completion retries exhausted");
                return Err(e);
            }
        }
        Ok(())
    }

    /// Sleeps before the next attempt, or hands the error back when it is
    /// not retryable or attempts are exhausted.
    async fn pause_before_retry(&self, attempt: &mut u32, err: UploadError) -> Result<(), UploadError> {
        let retry = &self.config.retry;
        if !err.is_retryable() || *attempt >= retry.max_attempts {
            return Err(err);
        }
        warn!(
            attempt = *attempt,
            max_attempts = retry.max_attempts,
            error = %err,
            "upload step failed, retrying"
        );
        *attempt += 1;
        tokio::time::sleep(retry.delay).await;
        Ok(())
    }

    /// Asks the server to process the uploaded files and starts following
    /// the session's event feed.
    ///
    /// Only one request is ever outstanding: while processing is in
    /// progress this returns [`WizardError::ProcessingInProgress`] without
    /// contacting the server. A session whose processing finished with
    /// `status|done` is refused; after `status|error` or [`close`] the
    /// request is sent again and the feed is followed from the start.
    ///
    /// [`close`]: Self::close
    pub async fn start_processing(&mut self) -> Result<(), WizardError> {
        let session_id = self.shared.session_id()?;

        let own_stream = self.consumer.session_id() == Some(session_id.as_str());
        let finished = own_stream.then(|| self.consumer.state()).flatten();
        if finished == Some(StreamState::Terminated(TerminalReason::Done)) {
            return Err(WizardError::AlreadyProcessed);
        }

        {
            let mut state = self.shared.lock();
            if state.processing {
                warn!(session = %session_id, "processing already requested, ignoring");
                return Err(WizardError::ProcessingInProgress);
            }
            state.processing = true;
        }
        self.shared.log(EventCategory::Info, "processing requested");

        let request = ProcessRequest {
            session_id: session_id.clone(),
        };
        let result = self.api.start_processing(request).await.and_then(|resp| {
            if resp.ok {
                Ok(resp)
            } else {
                Err(ApiError::Rejected("processing not accepted".into()))
            }
        });
        match result {
            Ok(resp) if resp.already_running => {
                info!(session = %session_id, "processing already running on server");
                self.shared
                    .log(EventCategory::Info, "processing already running on the server");
            }
            Ok(_) => info!(session = %session_id, "processing started"),
            Err(e) => {
                self.shared.lock().processing = false;
                error!(session = %session_id, error = %e, "processing trigger failed");
                self.shared
                    .log(EventCategory::Error, format!("could not start processing: {e}"));
                return Err(WizardError::ProcessTrigger(e));
            }
        }

        if finished.as_ref().is_some_and(StreamState::is_terminated) {
            debug!(session = %session_id, "restarting event stream after failed run");
            self.consumer.discard().await;
        }

        let handler = processing_handler(self.shared.clone());
        if !self.consumer.open(&session_id, handler).await {
            debug!(session = %session_id, "event stream already open");
        }
        Ok(())
    }

    /// Waits for the processing stream of the current session to end.
    pub async fn wait_processing(&self) -> Result<(), WizardError> {
        let session_id = self.shared.session_id()?;
        if self.consumer.session_id() != Some(session_id.as_str()) {
            return Err(WizardError::NotProcessing);
        }

        match self.consumer.wait_terminated().await {
            Some(TerminalReason::Done) => Ok(()),
            Some(TerminalReason::Error) => Err(WizardError::Terminal(self.last_error())),
            Some(TerminalReason::Cancelled) => Err(WizardError::Cancelled),
            None => Err(WizardError::NotProcessing),
        }
    }

    fn last_error(&self) -> String {
        self.shared
            .lock()
            .log
            .iter()
            .rev()
            .find(|line| line.category == EventCategory::Error)
            .map_or_else(|| "server reported an error".to_string(), |line| line.detail.clone())
    }

    /// Downloads the results archive.
    pub async fn download_results(&self) -> Result<Vec<u8>, WizardError> {
        let session_id = self.shared.session_id()?;

        match self.api.download_results(session_id.clone()).await {
            Ok(bytes) => {
                info!(session = %session_id, bytes = bytes.len(), "results downloaded");
                self.shared.log(
                    EventCategory::Info,
                    format!("results downloaded ({} bytes)", bytes.len()),
                );
                Ok(bytes)
            }
            Err(e) if e.is_not_found() => {
                warn!(session = %session_id, "results not available yet");
                self.shared
                    .log(EventCategory::Warning, "no results to download yet");
                Err(WizardError::DownloadUnavailable)
            }
            Err(e) => {
                error!(session = %session_id, error = %e, "results download failed");
                self.shared
                    .log(EventCategory::Error, format!("download failed: {e}"));
                Err(WizardError::Download(e))
            }
        }
    }

    /// Loads the generated tables into the given Elasticsearch indices and
    /// returns the server's statistics.
    pub async fn ingest(&self, indices: IndexNames) -> Result<serde_json::Value, WizardError> {
        let session_id = self.shared.session_id()?;

        if let Some(slot) = indices.first_empty() {
            self.shared
                .log(EventCategory::Warning, format!("index name for {slot} is empty"));
            return Err(WizardError::InvalidIndex(slot));
        }
        if let Some(session) = self.shared.lock().session.as_mut() {
            session.indices = indices.clone();
        }

        self.shared
            .log(EventCategory::Info, "ingesting into Elasticsearch");
        let request = IngestRequest::new(&session_id, &indices);
        let result = self.api.ingest(request).await.and_then(|resp| {
            if resp.ok {
                Ok(resp)
            } else {
                Err(ApiError::Rejected("ingest not accepted".into()))
            }
        });

        match result {
            Ok(resp) => {
                info!(session = %session_id, stats = %resp.stats, "ingest completed");
                self.shared
                    .log(EventCategory::Success, format!("ingest completed: {}", resp.stats));
                Ok(resp.stats)
            }
            Err(e) => {
                error!(session = %session_id, error = %e, "ingest failed");
                self.shared
                    .log(EventCategory::Error, format!("ingest failed: {e}"));
                Err(WizardError::Ingest(e))
            }
        }
    }

    /// Tears down the event stream and clears the processing lock.
    pub async fn close(&mut self) {
        self.consumer.close().await;
        self.shared.lock().processing = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::future::Future;
    use std::io::Write;
    use std::pin::Pin;
    use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
    use std::time::Duration;

    use futures_util::stream::{self, StreamExt};
    use reportflow_event_stream::{EventFeed, StreamError};
    use reportflow_protocol::ApiFuture;
    use reportflow_protocol::messages::{
        ChunkAck, ChunkQuery, CompleteUploadQuery, CompleteUploadResponse, InitUploadRequest,
        InitUploadResponse, IngestResponse, ProcessResponse, SessionInfo,
    };
    use reportflow_protocol::ChunkRange;

    use crate::types::RetryPolicy;

    #[derive(Default)]
    struct MockApi {
        fail_create: AtomicBool,
        chunk_failures: AtomicU32,
        process_failures: AtomicU32,
        chunk_attempts: AtomicUsize,
        completes: AtomicUsize,
        process_calls: AtomicUsize,
        results: Option<Vec<u8>>,
        created: Mutex<Vec<CreateSessionRequest>>,
        ingested: Mutex<Vec<IngestRequest>>,
        uploaded: Mutex<Vec<u8>>,
    }

    fn take_failure(counter: &AtomicU32) -> bool {
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }

    impl UploadApi for MockApi {
        fn init_upload(&self, request: InitUploadRequest) -> ApiFuture<'_, InitUploadResponse> {
            Box::pin(async move {
                Ok(InitUploadResponse {
                    upload_id: format!("up-{}", request.filename),
                })
            })
        }

        fn send_chunk(
            &self,
            _query: ChunkQuery,
            _range: ChunkRange,
            data: Vec<u8>,
        ) -> ApiFuture<'_, ChunkAck> {
            Box::pin(async move {
                self.chunk_attempts.fetch_add(1, Ordering::SeqCst);
                if take_failure(&self.chunk_failures) {
                    return Err(ApiError::Http("connection reset".into()));
                }
                self.uploaded.lock().unwrap().extend_from_slice(&data);
                Ok(ChunkAck {
                    ok: true,
                    received: data.len() as u64,
                })
            })
        }

        fn complete_upload(
            &self,
            _query: CompleteUploadQuery,
        ) -> ApiFuture<'_, CompleteUploadResponse> {
            Box::pin(async move {
                self.completes.fetch_add(1, Ordering::SeqCst);
                Ok(CompleteUploadResponse {
                    ok: true,
                    path: String::new(),
                })
            })
        }
    }

    impl WorkflowApi for MockApi {
        fn create_session(&self, request: CreateSessionRequest) -> ApiFuture<'_, SessionInfo> {
            Box::pin(async move {
                if self.fail_create.load(Ordering::SeqCst) {
                    return Err(ApiError::Status {
                        status: 500,
                        body: "db down".into(),
                    });
                }
                self.created.lock().unwrap().push(request);
                Ok(SessionInfo {
                    session_id: "s1".into(),
                    status: "created".into(),
                })
            })
        }

        fn start_processing(&self, _request: ProcessRequest) -> ApiFuture<'_, ProcessResponse> {
            Box::pin(async move {
                self.process_calls.fetch_add(1, Ordering::SeqCst);
                if take_failure(&self.process_failures) {
                    return Err(ApiError::Http("timed out".into()));
                }
                Ok(ProcessResponse {
                    ok: true,
                    already_running: false,
                })
            })
        }

        fn download_results(&self, _session_id: String) -> ApiFuture<'_, Vec<u8>> {
            Box::pin(async move {
                self.results.clone().ok_or(ApiError::Status {
                    status: 404,
                    body: "not ready".into(),
                })
            })
        }

        fn ingest(&self, request: IngestRequest) -> ApiFuture<'_, IngestResponse> {
            Box::pin(async move {
                self.ingested.lock().unwrap().push(request);
                Ok(IngestResponse {
                    ok: true,
                    stats: serde_json::json!({"t1_normal": 3}),
                })
            })
        }
    }

    /// First connection yields the scripted records, then stays open;
    /// later connections stay open without records.
    #[derive(Default)]
    struct FeedSource {
        records: Mutex<VecDeque<Vec<EventRecord>>>,
        connects: AtomicUsize,
    }

    impl EventSource for FeedSource {
        fn connect(
            &self,
            _session_id: String,
            _from: Option<String>,
        ) -> Pin<Box<dyn Future<Output = Result<EventFeed, StreamError>> + Send + '_>> {
            Box::pin(async move {
                self.connects.fetch_add(1, Ordering::SeqCst);
                let records = self.records.lock().unwrap().pop_front().unwrap_or_default();
                let feed: EventFeed = Box::pin(
                    stream::iter(records.into_iter().map(Ok)).chain(stream::pending()),
                );
                Ok(feed)
            })
        }
    }

    fn config() -> WorkflowConfig {
        WorkflowConfig {
            chunk_size: 4,
            retry: RetryPolicy {
                max_attempts: 3,
                delay: Duration::from_secs(1),
            },
            ..WorkflowConfig::default()
        }
    }

    fn workflow(api: MockApi, feeds: Vec<Vec<EventRecord>>) -> (Workflow<MockApi>, Arc<MockApi>, Arc<FeedSource>) {
        let api = Arc::new(api);
        let source = Arc::new(FeedSource {
            records: Mutex::new(feeds.into()),
            ..FeedSource::default()
        });
        let events: Arc<dyn EventSource> = source.clone();
        (Workflow::new(Arc::clone(&api), events, config()), api, source)
    }

    fn temp_file(content: &[u8]) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content).unwrap();
        file
    }

    #[tokio::test]
    async fn blank_client_becomes_default() {
        let (mut wf, api, _) = workflow(MockApi::default(), vec![]);
        let mut events = wf.take_events().unwrap();
        assert!(wf.take_events().is_none());

        let id = wf.create_session("  ", Some(" ")).await.unwrap();
        assert_eq!(id, "s1");
        assert_eq!(wf.step(), WizardStep::Upload);

        let created = api.created.lock().unwrap().clone();
        assert_eq!(created[0].default_client, "DEFAULT");
        assert_eq!(created[0].sub_client, None);

        let session = wf.session().unwrap();
        assert_eq!(session.indices, IndexNames::default());

        let mut saw_step = false;
        while let Ok(event) = events.try_recv() {
            if let WorkflowEvent::StepChanged(WizardStep::Upload) = event {
                saw_step = true;
            }
        }
        assert!(saw_step);
    }

    #[tokio::test]
    async fn session_creation_failure_is_logged() {
        let api = MockApi {
            fail_create: AtomicBool::new(true),
            ..MockApi::default()
        };
        let (mut wf, _, _) = workflow(api, vec![]);

        let err = wf.create_session("ACME", None).await.unwrap_err();
        assert!(matches!(err, WizardError::SessionCreation(_)));
        assert_eq!(wf.step(), WizardStep::Client);
        assert!(wf.session().is_none());

        let log = wf.log();
        assert_eq!(log.last().unwrap().category, EventCategory::Error);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_new_session_keeps_current_stream() {
        let (mut wf, api, source) = workflow(MockApi::default(), vec![]);
        wf.create_session("ACME", None).await.unwrap();
        wf.start_processing().await.unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(wf.stream_state(), Some(StreamState::Open));

        api.fail_create.store(true, Ordering::SeqCst);
        let err = wf.create_session("OTHER", None).await.unwrap_err();
        assert!(matches!(err, WizardError::SessionCreation(_)));

        assert_eq!(wf.stream_state(), Some(StreamState::Open));
        assert!(wf.is_processing());
        assert_eq!(wf.session().unwrap().client, "ACME");
        assert_eq!(wf.step(), WizardStep::Upload);
        assert_eq!(source.connects.load(Ordering::SeqCst), 1);
        assert!(matches!(
            wf.start_processing().await,
            Err(WizardError::ProcessingInProgress)
        ));
        wf.close().await;
    }

    #[tokio::test]
    async fn operations_require_session() {
        let (mut wf, _, _) = workflow(MockApi::default(), vec![]);
        let file = temp_file(b"data");

        assert!(matches!(
            wf.upload_files(&[file.path()]).await,
            Err(WizardError::NoSession)
        ));
        assert!(matches!(wf.start_processing().await, Err(WizardError::NoSession)));
        assert!(matches!(wf.download_results().await, Err(WizardError::NoSession)));
    }

    #[tokio::test(start_paused = true)]
    async fn upload_retries_failed_chunk() {
        let api = MockApi {
            chunk_failures: AtomicU32::new(2),
            ..MockApi::default()
        };
        let (mut wf, api, _) = workflow(api, vec![]);
        let mut events = wf.take_events().unwrap();
        let a = temp_file(b"0123456789");
        let b = temp_file(b"abc");

        wf.create_session("ACME", Some("Norte")).await.unwrap();
        wf.upload_files(&[a.path(), b.path()]).await.unwrap();

        assert_eq!(wf.step(), WizardStep::Process);
        assert_eq!(&*api.uploaded.lock().unwrap(), b"0123456789abc");
        // 3 + 1 chunks, plus the two failed attempts.
        assert_eq!(api.chunk_attempts.load(Ordering::SeqCst), 6);
        assert_eq!(api.completes.load(Ordering::SeqCst), 2);

        let mut last_progress = None;
        while let Ok(event) = events.try_recv() {
            if let WorkflowEvent::UploadProgress(p) = event {
                last_progress = Some(p);
            }
        }
        assert_eq!(last_progress.unwrap().percent(), 100);
    }

    #[tokio::test(start_paused = true)]
    async fn upload_gives_up_after_max_attempts() {
        let api = MockApi {
            chunk_failures: AtomicU32::new(10),
            ..MockApi::default()
        };
        let (mut wf, api, _) = workflow(api, vec![]);
        let file = temp_file(b"0123456789");

        wf.create_session("ACME", None).await.unwrap();
        let err = wf.upload_files(&[file.path()]).await.unwrap_err();

        match err {
            WizardError::Upload { source, .. } => {
                assert!(matches!(source, UploadError::ChunkTransfer { offset: 0, .. }));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(api.chunk_attempts.load(Ordering::SeqCst), 3);
        assert_eq!(api.completes.load(Ordering::SeqCst), 0);
        assert_eq!(wf.step(), WizardStep::Upload);
    }

    #[tokio::test]
    async fn upload_requires_files() {
        let (mut wf, _, _) = workflow(MockApi::default(), vec![]);
        wf.create_session("ACME", None).await.unwrap();
        let none: [&Path; 0] = [];
        assert!(matches!(wf.upload_files(&none).await, Err(WizardError::NoFiles)));
    }

    #[tokio::test(start_paused = true)]
    async fn processing_lock_blocks_second_request() {
        let (mut wf, api, source) = workflow(MockApi::default(), vec![]);
        wf.create_session("ACME", None).await.unwrap();

        wf.start_processing().await.unwrap();
        assert!(wf.is_processing());

        let err = wf.start_processing().await.unwrap_err();
        assert!(matches!(err, WizardError::ProcessingInProgress));
        assert_eq!(api.process_calls.load(Ordering::SeqCst), 1);

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(source.connects.load(Ordering::SeqCst), 1);
        wf.close().await;
    }

    #[tokio::test]
    async fn failed_trigger_clears_lock() {
        let api = MockApi {
            process_failures: AtomicU32::new(1),
            ..MockApi::default()
        };
        let (mut wf, api, source) = workflow(api, vec![]);
        wf.create_session("ACME", None).await.unwrap();

        let err = wf.start_processing().await.unwrap_err();
        assert!(matches!(err, WizardError::ProcessTrigger(_)));
        assert!(!wf.is_processing());
        assert_eq!(source.connects.load(Ordering::SeqCst), 0);

        wf.start_processing().await.unwrap();
        assert_eq!(api.process_calls.load(Ordering::SeqCst), 2);
        wf.close().await;
    }

    #[tokio::test(start_paused = true)]
    async fn done_status_moves_to_results() {
        let feed = vec![
            EventRecord::new("1", "info|Procesando archivo"),
            EventRecord::new("1", "info|Procesando archivo"),
            EventRecord::new("2", "status|done"),
        ];
        let (mut wf, api, _) = workflow(MockApi::default(), vec![feed]);
        wf.create_session("ACME", None).await.unwrap();

        wf.start_processing().await.unwrap();
        wf.wait_processing().await.unwrap();

        assert_eq!(wf.step(), WizardStep::Results);
        assert!(!wf.is_processing());
        let details: Vec<String> = wf.log().into_iter().map(|l| l.detail).collect();
        assert_eq!(details.iter().filter(|d| *d == "Procesando archivo").count(), 1);
        assert_eq!(details.last().map(String::as_str), Some("done"));

        // The finished session cannot be processed again.
        let err = wf.start_processing().await.unwrap_err();
        assert!(matches!(err, WizardError::AlreadyProcessed));
        assert_eq!(api.process_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn error_status_is_terminal_failure() {
        let feed = vec![
            EventRecord::new("1", "error|Columna faltante: QID"),
            EventRecord::new("2", "status|error"),
        ];
        let (mut wf, _, _) = workflow(MockApi::default(), vec![feed]);
        wf.create_session("ACME", None).await.unwrap();
        wf.start_processing().await.unwrap();

        match wf.wait_processing().await {
            Err(WizardError::Terminal(msg)) => assert_eq!(msg, "Columna faltante: QID"),
            other => panic!("unexpected result: {other:?}"),
        }
        assert_eq!(wf.step(), WizardStep::Upload);
        assert!(!wf.is_processing());
    }

    #[tokio::test(start_paused = true)]
    async fn error_status_allows_new_trigger() {
        let feeds = vec![
            vec![
                EventRecord::new("1", "error|boom"),
                EventRecord::new("2", "status|error"),
            ],
            vec![
                EventRecord::new("1", "info|reintento"),
                EventRecord::new("2", "status|done"),
            ],
        ];
        let (mut wf, api, source) = workflow(MockApi::default(), feeds);
        wf.create_session("ACME", None).await.unwrap();

        wf.start_processing().await.unwrap();
        assert!(matches!(wf.wait_processing().await, Err(WizardError::Terminal(_))));
        assert!(!wf.is_processing());

        wf.start_processing().await.unwrap();
        assert_eq!(api.process_calls.load(Ordering::SeqCst), 2);
        wf.wait_processing().await.unwrap();

        assert_eq!(wf.step(), WizardStep::Results);
        assert_eq!(source.connects.load(Ordering::SeqCst), 2);
        let details: Vec<String> = wf.log().into_iter().map(|l| l.detail).collect();
        assert!(details.contains(&"reintento".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn closed_stream_can_be_restarted() {
        let (mut wf, api, source) = workflow(MockApi::default(), vec![]);
        wf.create_session("ACME", None).await.unwrap();
        wf.start_processing().await.unwrap();
        wf.close().await;
        assert!(!wf.is_processing());

        wf.start_processing().await.unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(api.process_calls.load(Ordering::SeqCst), 2);
        assert_eq!(source.connects.load(Ordering::SeqCst), 2);
        assert_eq!(wf.stream_state(), Some(StreamState::Open));
        wf.close().await;
    }

    #[tokio::test]
    async fn wait_without_processing() {
        let (mut wf, _, _) = workflow(MockApi::default(), vec![]);
        wf.create_session("ACME", None).await.unwrap();
        assert!(matches!(
            wf.wait_processing().await,
            Err(WizardError::NotProcessing)
        ));
    }

    #[tokio::test]
    async fn download_not_ready_is_a_warning() {
        let (mut wf, _, _) = workflow(MockApi::default(), vec![]);
        wf.create_session("ACME", None).await.unwrap();

        let err = wf.download_results().await.unwrap_err();
        assert!(matches!(err, WizardError::DownloadUnavailable));
        assert_eq!(wf.log().last().unwrap().category, EventCategory::Warning);
    }

    #[tokio::test]
    async fn download_returns_archive() {
        let api = MockApi {
            results: Some(b"PK\x03\x04".to_vec()),
            ..MockApi::default()
        };
        let (mut wf, _, _) = workflow(api, vec![]);
        wf.create_session("ACME", None).await.unwrap();

        assert_eq!(wf.download_results().await.unwrap(), b"PK\x03\x04");
    }

    #[tokio::test]
    async fn ingest_sends_index_names() {
        let (mut wf, api, _) = workflow(MockApi::default(), vec![]);
        wf.create_session("ACME", None).await.unwrap();

        let indices = IndexNames {
            t1_normal: "custom_t1".into(),
            ..IndexNames::default()
        };
        let stats = wf.ingest(indices.clone()).await.unwrap();
        assert_eq!(stats["t1_normal"], 3);

        let sent = api.ingested.lock().unwrap().clone();
        assert_eq!(sent[0].session_id, "s1");
        assert_eq!(sent[0].t1_normal_index, "custom_t1");
        assert_eq!(sent[0].t2_adjusted_index, "qualys_t2_ajustada");
        assert_eq!(wf.session().unwrap().indices, indices);
        assert_eq!(wf.log().last().unwrap().category, EventCategory::Success);
    }

    #[tokio::test]
    async fn ingest_rejects_empty_index() {
        let (mut wf, api, _) = workflow(MockApi::default(), vec![]);
        wf.create_session("ACME", None).await.unwrap();

        let indices = IndexNames {
            t1_adjusted: String::new(),
            ..IndexNames::default()
        };
        let err = wf.ingest(indices).await.unwrap_err();
        assert!(matches!(err, WizardError::InvalidIndex("t1_adjusted")));
        assert!(api.ingested.lock().unwrap().is_empty());
    }
}
