use arena_shared::ConnectionId;
use thiserror::Error;

/// Failures of the arena authority. Expected gameplay outcomes (dash on
/// cooldown, hit on an invincible victim) are not errors and never appear here.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ArenaError {
    #[error("no free spawn point left in the arena")]
    PoolExhausted,

    #[error("connection {0} is already registered")]
    DuplicateConnection(ConnectionId),

    #[error("connection {0} is not registered")]
    UnknownConnection(ConnectionId),
}

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("win score must be at least 1")]
    ZeroWinScore,

    #[error("tick interval must be at least 1ms")]
    ZeroTickInterval,

    #[error("dash performing window ({performing_ms}ms) exceeds dash cooldown ({cooldown_ms}ms)")]
    PerformingExceedsCooldown { performing_ms: u64, cooldown_ms: u64 },

    #[error("at least one spawn point is required")]
    NoSpawnPoints,

    #[error("max clients must be at least 1")]
    ZeroMaxClients,

    #[error("max clients {max_clients} exceeds {limit}, the most a welcome packet can list")]
    TooManyClients { max_clients: usize, limit: usize },

    #[error("invalid spawn point '{0}', expected x,y,z")]
    InvalidSpawnPoint(String),
}

pub type Result<T> = std::result::Result<T, ArenaError>;
