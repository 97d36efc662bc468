use std::path::PathBuf;

pub type Result<T, E = Error> = core::result::Result<T, E>;

/// Failures while opening or addressing the shared robot state region.
#[derive(thiserror::Error, Debug)]
pub enum RegionError {
    #[error("shared memory region `{name}` could not be opened: {reason}")]
    Open { name: String, reason: String },
    #[error("region field table is malformed: {0}")]
    Malformed(String),
    #[error("field `{0}` not found in shared memory region")]
    FieldMissing(String),
    #[error("field `{name}` has kind {found}, expected {expected}")]
    FieldKind {
        name: String,
        expected: &'static str,
        found: &'static str,
    },
    #[error("field `{name}` holds {len} values, {required} degrees of freedom required")]
    FieldTooShort {
        name: String,
        len: usize,
        required: usize,
    },
}

/// Failures crossing the controller RPC boundary. Every one is permanent.
#[derive(thiserror::Error, Debug)]
pub enum RpcError {
    #[error("amqp transport: {0}")]
    Transport(#[from] lapin::Error),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("codec: {0}")]
    Codec(#[from] serde_json::Error),
    #[error("{op} rejected by server: {message}")]
    Rejected { op: &'static str, message: String },
    #[error("reply stream closed before `{op}` was answered")]
    ReplyStreamClosed { op: &'static str },
}

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("reading {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("parsing config {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("decoding robot client metadata {path}: {source}")]
    Metadata {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Region(#[from] RegionError),
    #[error("client initialization failed: {0}")]
    Init(#[source] RpcError),
    #[error("control update failed at iteration {iteration}: {source}")]
    ControlUpdate {
        iteration: u64,
        #[source]
        source: RpcError,
    },
    #[error("stats report: {0}")]
    Report(#[from] csv::Error),
    #[error("real-time scheduling: {0}")]
    Scheduler(String),
}

impl ConfigError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::Invalid(msg.into())
    }
}
