//! Client gate port - the external authority on whether a client may transact

use thiserror::Error;

use crate::domain::{BlacklistStatus, ClientStatus, DenialReason};

/// Why a gate query did not produce an answer
///
/// A typed denial (`Denied`) is kept apart from "we were not allowed to ask"
/// (`CallerUnauthorized`), so a 403 is never read as a blacklist verdict by
/// accident.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GateError {
    #[error("client {0} not found")]
    ClientNotFound(i64),

    #[error("caller is not authorized to query the client gate")]
    CallerUnauthorized,

    #[error("client denied: {0}")]
    Denied(DenialReason),

    #[error("client gate timed out")]
    Timeout,

    #[error("client gate unavailable: {0}")]
    Unavailable(String),

    #[error("unexpected status {0} from client gate")]
    UnexpectedStatus(u16),

    #[error("malformed client gate response: {0}")]
    Malformed(String),
}

impl GateError {
    /// Reason reported to the caller when this error fails a mutating call closed
    pub fn denial_reason(&self) -> DenialReason {
        match self {
            Self::ClientNotFound(_) => DenialReason::ClientNotFound,
            Self::CallerUnauthorized => DenialReason::UnauthorizedAccess,
            Self::Denied(reason) => *reason,
            Self::Timeout
            | Self::Unavailable(_)
            | Self::UnexpectedStatus(_)
            | Self::Malformed(_) => DenialReason::ServiceUnavailable,
        }
    }
}

/// Synchronous client authorization queries
pub trait ClientGate: Send + Sync {
    fn can_transact(&self, client_id: i64) -> Result<bool, GateError>;

    fn blacklist_status(&self, client_id: i64) -> Result<BlacklistStatus, GateError>;

    fn client_status(&self, client_id: i64) -> Result<ClientStatus, GateError>;
}
