#[derive(Debug, thiserror::Error)]
pub enum ConsentError {
    #[error("Invalid tab ID")]
    InvalidTabId,

    #[error("Tab limit in zone exceeded")]
    TabLimitExceeded,

    #[error("Broadcast channel closed")]
    ChannelClosed,

    #[error("Broadcast channel lagged, {0} messages dropped")]
    ChannelLagged(u64),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
