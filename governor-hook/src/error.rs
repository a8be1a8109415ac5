//! Error taxonomy for the governor hook
//!
//! Config and auth failures abort the run, API failures abort because no
//! affinity is known, governor write failures are aggregated across cores.
//! An unsupported phase is not fatal: the dispatcher turns it into a no-op.

use std::fmt;
use std::path::PathBuf;

/// Bad or missing configuration file
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid governor for `{field}`: name is empty")]
    InvalidGovernor { field: &'static str },
}

/// Failure to obtain a session ticket
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("invalid credentials for user {user}")]
    InvalidCredentials { user: String },
    #[error("management API at {url} unreachable: {source}")]
    Unreachable {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("authentication rejected with HTTP {0}")]
    Status(reqwest::StatusCode),
    #[error("malformed ticket response: {0}")]
    MalformedResponse(String),
    #[error("cannot build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
}

/// Failure while reading VM data from the management API
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("not authenticated against the management API")]
    NotAuthenticated,
    #[error("VM {0} not found on any online node")]
    VmNotFound(u32),
    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{url} answered HTTP {status}")]
    Status {
        url: String,
        status: reqwest::StatusCode,
    },
    #[error("malformed response from {url}: {reason}")]
    MalformedResponse { url: String, reason: String },
    #[error("malformed affinity for VM {vmid}: {source}")]
    MalformedAffinity {
        vmid: u32,
        #[source]
        source: AffinityParseError,
    },
}

/// CPU list notation that could not be expanded
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AffinityParseError {
    #[error("empty entry in cpu list `{0}`")]
    EmptyEntry(String),
    #[error("invalid core index `{0}`")]
    InvalidIndex(String),
    #[error("core index `{0}` out of range (max {max})", max = crate::affinity::MAX_CORE_INDEX)]
    IndexOutOfRange(String),
    #[error("descending range `{start}-{end}`")]
    DescendingRange { start: u32, end: u32 },
}

/// One core whose control file could not be written
#[derive(Debug)]
pub struct CoreWriteFailure {
    pub core: u32,
    pub path: PathBuf,
    pub source: std::io::Error,
}

impl fmt::Display for CoreWriteFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cpu{} ({}): {}", self.core, self.path.display(), self.source)
    }
}

/// Aggregate of every per-core write failure in one `set_governor` call
#[derive(Debug)]
pub struct GovernorWriteError {
    pub governor: String,
    pub attempted: usize,
    pub failures: Vec<CoreWriteFailure>,
}

impl GovernorWriteError {
    /// Indices of the cores that failed, in attempt order
    pub fn failed_cores(&self) -> Vec<u32> {
        self.failures.iter().map(|f| f.core).collect()
    }
}

impl fmt::Display for GovernorWriteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "failed to set governor `{}` on {} of {} cores",
            self.governor,
            self.failures.len(),
            self.attempted
        )?;
        for failure in &self.failures {
            write!(f, "; {}", failure)?;
        }
        Ok(())
    }
}

impl std::error::Error for GovernorWriteError {}

/// Lifecycle phase the hook does not act on
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unsupported phase `{0}`")]
pub struct UnsupportedPhase(pub String);

/// Fatal errors of one hook invocation
#[derive(Debug, thiserror::Error)]
pub enum HookError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error(transparent)]
    GovernorWrite(#[from] GovernorWriteError),
}
