//! Client authorization types shared with the client gate

use std::fmt;

use serde::{Deserialize, Serialize};

/// Reason a client was refused a ledger operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DenialReason {
    ClientBlacklisted,
    ClientInactive,
    ClientTransactionBlocked,
    ClientNotFound,
    /// We are not allowed to ask the gate about this client
    UnauthorizedAccess,
    /// The gate could not give an answer (timeout, transport, 5xx)
    ServiceUnavailable,
}

impl DenialReason {
    pub fn code(&self) -> &'static str {
        match self {
            Self::ClientBlacklisted => "CLIENT_BLACKLISTED",
            Self::ClientInactive => "CLIENT_INACTIVE",
            Self::ClientTransactionBlocked => "CLIENT_TRANSACTION_BLOCKED",
            Self::ClientNotFound => "CLIENT_NOT_FOUND",
            Self::UnauthorizedAccess => "UNAUTHORIZED_ACCESS",
            Self::ServiceUnavailable => "SERVICE_UNAVAILABLE",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "CLIENT_BLACKLISTED" => Some(Self::ClientBlacklisted),
            "CLIENT_INACTIVE" => Some(Self::ClientInactive),
            "CLIENT_TRANSACTION_BLOCKED" => Some(Self::ClientTransactionBlocked),
            "CLIENT_NOT_FOUND" => Some(Self::ClientNotFound),
            "UNAUTHORIZED_ACCESS" => Some(Self::UnauthorizedAccess),
            "SERVICE_UNAVAILABLE" => Some(Self::ServiceUnavailable),
            _ => None,
        }
    }

    /// Message suitable for the end customer
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::ClientBlacklisted => "Your account has been temporarily suspended. Please contact customer support for assistance.",
            Self::ClientInactive => "Your account is currently inactive. Please contact customer support to reactivate your account.",
            Self::ClientTransactionBlocked => "You are not authorized to perform this transaction. Please contact customer support for assistance.",
            Self::ClientNotFound => "Client account not found. Please contact customer support for assistance.",
            Self::UnauthorizedAccess => "You are not authorized to access this service. Please contact customer support for assistance.",
            Self::ServiceUnavailable => "Service is temporarily unavailable. Please try again later or contact customer support.",
        }
    }
}

impl fmt::Display for DenialReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::ClientBlacklisted => "client is blacklisted",
            Self::ClientInactive => "client is inactive",
            Self::ClientTransactionBlocked => "client is not authorized to perform transactions",
            Self::ClientNotFound => "client not found",
            Self::UnauthorizedAccess => "not authorized to query the client gate",
            Self::ServiceUnavailable => "client gate unavailable",
        };
        write!(f, "{} ({})", text, self.code())
    }
}

/// Blacklist lookup answer from the gate
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlacklistStatus {
    pub blacklisted: bool,
    #[serde(default)]
    pub reason: Option<String>,
}

/// Lifecycle status of a client as reported by the gate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClientStatus {
    Active,
    Inactive,
    Suspended,
    Closed,
    #[serde(other)]
    Unknown,
}

impl ClientStatus {
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Active)
    }
}
