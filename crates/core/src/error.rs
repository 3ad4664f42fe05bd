//! Error types for chess-match-core

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid square: {0}")]
    InvalidSquare(String),

    #[error("Player {0} is already searching or playing")]
    PlayerBusy(String),

    #[error("Matching pool is full")]
    PoolFull,

    #[error("Matching pool is closed")]
    PoolClosed,

    #[error("Engine unavailable: {0}")]
    EngineUnavailable(String),

    #[error("Engine protocol error: {0}")]
    EngineProtocol(String),

    #[error("Match channel closed")]
    ChannelClosed,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parsing failed: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
