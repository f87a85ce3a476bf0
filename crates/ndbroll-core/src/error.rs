use thiserror::Error;

#[derive(Debug, Error)]
pub enum RollingError {
    // Fatal
    #[error("Cluster snapshot reports zero restartable nodes")]
    EmptyCluster,

    #[error("Could not establish the management session: {0}")]
    SessionInit(String),

    #[error("Gave up after {attempts} consecutive reconnect attempts")]
    RetriesExhausted { attempts: u32 },

    /// The endpoint accepted the restart, then the session could not be rebuilt.
    #[error("Restart of node {node_id} was accepted but the session was lost: {source}")]
    ReconnectAfterRestart {
        node_id: u32,
        source: Box<RollingError>,
    },

    // Recovered
    #[error("Transient connection failure: {0}")]
    TransientConnection(String),

    #[error("Restart of node {node_id} rejected (return code {code})")]
    RestartRejected { node_id: u32, code: i32 },

    // Backend
    #[error("Unknown management backend: {0}")]
    UnknownBackend(String),

    #[error("Invalid topology: {0}")]
    Topology(String),

    // IO
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Config
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Configuration file not found at {0}")]
    ConfigNotFound(String),

    #[error("TOML deserialization error: {0}")]
    TomlDe(String),

    #[error("TOML serialization error: {0}")]
    TomlSer(String),
}

impl RollingError {
    /// Errors the supervisor recovers from by reconnecting and retrying.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            RollingError::TransientConnection(_) | RollingError::RestartRejected { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, RollingError>;
