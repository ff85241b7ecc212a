// src/error.rs
use std::fmt;
use thiserror::Error;

/// Failure of a single RCON exchange.
#[derive(Debug, Error)]
pub enum RconError {
    #[error("failed to connect to {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: std::io::Error,
    },
    #[error("rcon authentication rejected by {0}")]
    Auth(String),
    #[error("rcon request to {0} timed out")]
    Timeout(String),
    #[error("rcon protocol error: {0}")]
    Protocol(String),
}

impl From<std::io::Error> for RconError {
    fn from(e: std::io::Error) -> Self {
        Self::Protocol(e.to_string())
    }
}

#[derive(Debug, Error)]
pub enum StateError {
    #[error("unknown server id {0}")]
    UnknownServer(i32),
    #[error("player not found")]
    PlayerNotFound,
    #[error("invalid target steam id")]
    InvalidTarget,
    #[error("server {server_id}: {source}")]
    Exec {
        server_id: i32,
        #[source]
        source: RconError,
    },
    #[error("{0}")]
    ExecFailures(ExecFailures),
    #[error("command for server {0} did not complete")]
    Incomplete(i32),
}

/// Every failure collected from a fan-out, in completion order.
#[derive(Debug)]
pub struct ExecFailures {
    pub failures: Vec<StateError>,
    pub attempted: usize,
}

impl ExecFailures {
    pub fn first(&self) -> Option<&StateError> {
        self.failures.first()
    }
}

impl fmt::Display for ExecFailures {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} of {} commands failed", self.failures.len(), self.attempted)?;
        if let Some(first) = self.first() {
            write!(f, ", first: {}", first)?;
        }
        Ok(())
    }
}

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("failed to read server configs: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse server configs: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("server {0} not found")]
    NotFound(i32),
}
