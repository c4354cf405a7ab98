use std::time::Duration;

/// Default API base URL when no configuration overrides it.
pub const DEFAULT_API_BASE_URL: &str = "http://localhost:8000";

/// Fixed size of every upload chunk except the last one (8 MiB).
pub const CHUNK_SIZE: u64 = 8 * 1024 * 1024;

/// Client label used when the user leaves the field empty.
pub const DEFAULT_CLIENT: &str = "DEFAULT";

/// Default target index for table 1, normal variant.
pub const DEFAULT_T1_NORMAL_INDEX: &str = "qualys_t1_normal";
/// Default target index for table 1, adjusted variant.
pub const DEFAULT_T1_ADJUSTED_INDEX: &str = "qualys_t1_ajustada";
/// Default target index for table 2, normal variant.
pub const DEFAULT_T2_NORMAL_INDEX: &str = "qualys_t2_normal";
/// Default target index for table 2, adjusted variant.
pub const DEFAULT_T2_ADJUSTED_INDEX: &str = "qualys_t2_ajustada";

/// Query parameter carrying the resume cursor on the event feed.
pub const EVENTS_FROM_PARAM: &str = "from";

/// Timeout for plain request/response calls.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Timeout for a single chunk upload.
///
/// Chunks are 8 MiB, so this is deliberately longer than [`REQUEST_TIMEOUT`].
pub const CHUNK_REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Timeout for downloads and ingest, which wait on large payloads or
/// Elasticsearch bulk loads.
pub const LONG_REQUEST_TIMEOUT: Duration = Duration::from_secs(600);

/// Timeout for establishing a TCP connection.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Longest silence tolerated on the event feed before the connection is
/// treated as dropped. The server pings every second.
pub const EVENT_IDLE_TIMEOUT: Duration = Duration::from_secs(30);
