//! Constants for the ACP backend client.

/// Default backend base URL.
pub const DEFAULT_BASE_URL: &str = "https://acpx.virtuals.io";

/// Header carrying the static API key.
pub const API_KEY_HEADER: &str = "x-api-key";

/// Path listing the wallet's active jobs (paginated).
pub const ACTIVE_JOBS_PATH: &str = "/acp/jobs/active";

/// Attempts the transport itself makes on 429/5xx before surfacing the
/// error to the policy layer.
pub const TRANSPORT_ATTEMPTS: u32 = 3;

/// Base delay for the transport-level backoff.
pub const TRANSPORT_BASE_DELAY_MS: u64 = 250;
