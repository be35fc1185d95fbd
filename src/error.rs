#![allow(dead_code)]

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CiteError {
    #[error("config file invalid or unreadable: {0}")]
    InvalidConfig(String),
    #[error("page markup unavailable: {0}")]
    MissingMarkup(String),
    #[error("no transport produced a response for {0}")]
    TransportExhausted(String),
}

/// Warning codes attached to advisory trace output. None of these abort a
/// capture; the worst outcome is a record populated entirely by defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarnCode {
    W001Transport,
    W002AuthExpired,
    W003MalformedPayload,
    W004SnapshotDegraded,
    W005GenericValue,
}

impl WarnCode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::W001Transport => "W001_TRANSPORT",
            Self::W002AuthExpired => "W002_AUTH_EXPIRED",
            Self::W003MalformedPayload => "W003_MALFORMED_PAYLOAD",
            Self::W004SnapshotDegraded => "W004_SNAPSHOT_DEGRADED",
            Self::W005GenericValue => "W005_GENERIC_VALUE",
        }
    }
}
