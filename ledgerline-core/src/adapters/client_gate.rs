//! Client gate adapters
//!
//! `HttpClientGate` talks to the client service over HTTP:
//! - GET {base}/api/v1/clients/{id}/can-transact     -> true | false
//! - GET {base}/api/v1/clients/{id}/blacklist-status -> { "blacklisted": bool, "reason": "..." }
//! - GET {base}/api/v1/clients/{id}/status           -> { "status": "ACTIVE" | ... }
//!
//! A 403 only counts as a verdict when the body names one
//! (`{"code": "CLIENT_BLACKLISTED"}`). A bare 403 means we may not ask.
//!
//! `StaticClientGate` answers from an in-memory table, for tests and local
//! tooling.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::RwLock;
use std::time::Duration;

use reqwest::blocking::{Client, Response};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::domain::result::{Error, Result};
use crate::domain::{BlacklistStatus, ClientStatus, DenialReason};
use crate::ports::{ClientGate, GateError};

// =============================================================================
// HTTP adapter
// =============================================================================

#[derive(Debug, Deserialize)]
struct StatusBody {
    status: ClientStatus,
}

#[derive(Debug, Deserialize)]
struct DenialBody {
    code: Option<String>,
}

/// Client gate backed by the client service's HTTP API
pub struct HttpClientGate {
    client: Client,
    base_url: String,
    api_token: Option<String>,
}

impl HttpClientGate {
    /// Create a gate client. `timeout` bounds every call, a timed out call
    /// surfaces as `GateError::Timeout`.
    pub fn new(base_url: &str, timeout: Duration, api_token: Option<String>) -> Result<Self> {
        let parsed = url::Url::parse(base_url)
            .map_err(|e| Error::config(format!("Invalid client gate URL '{}': {}", base_url, e)))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(Error::config(format!(
                "Client gate URL must be http or https, got '{}'",
                parsed.scheme()
            )));
        }

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_token: api_token.filter(|t| !t.is_empty()),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn get(&self, client_id: i64, endpoint: &str) -> std::result::Result<Response, GateError> {
        let url = format!("{}/api/v1/clients/{}/{}", self.base_url, client_id, endpoint);
        debug!(client_id, endpoint, "querying client gate");

        let mut request = self.client.get(&url);
        if let Some(token) = &self.api_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().map_err(map_request_error)?;
        check_response_status(response, client_id)
    }
}

impl ClientGate for HttpClientGate {
    fn can_transact(&self, client_id: i64) -> std::result::Result<bool, GateError> {
        self.get(client_id, "can-transact")?
            .json::<bool>()
            .map_err(|e| GateError::Malformed(e.to_string()))
    }

    fn blacklist_status(&self, client_id: i64) -> std::result::Result<BlacklistStatus, GateError> {
        self.get(client_id, "blacklist-status")?
            .json::<BlacklistStatus>()
            .map_err(|e| GateError::Malformed(e.to_string()))
    }

    fn client_status(&self, client_id: i64) -> std::result::Result<ClientStatus, GateError> {
        self.get(client_id, "status")?
            .json::<StatusBody>()
            .map(|body| body.status)
            .map_err(|e| GateError::Malformed(e.to_string()))
    }
}

fn map_request_error(error: reqwest::Error) -> GateError {
    if error.is_timeout() {
        GateError::Timeout
    } else if error.is_connect() {
        GateError::Unavailable("unable to connect to client service".to_string())
    } else {
        GateError::Unavailable(error.to_string())
    }
}

/// Check response status and turn anything but 200 into a typed error
fn check_response_status(
    response: Response,
    client_id: i64,
) -> std::result::Result<Response, GateError> {
    match response.status().as_u16() {
        200 => Ok(response),
        401 => Err(GateError::CallerUnauthorized),
        403 => {
            let reason = response
                .json::<DenialBody>()
                .ok()
                .and_then(|body| body.code)
                .and_then(|code| DenialReason::from_code(&code));
            match reason {
                Some(reason) => Err(GateError::Denied(reason)),
                None => {
                    warn!(client_id, "client gate returned 403 without a denial code");
                    Err(GateError::CallerUnauthorized)
                }
            }
        }
        404 => Err(GateError::ClientNotFound(client_id)),
        status @ 500..=599 => Err(GateError::Unavailable(format!("HTTP {}", status))),
        status => Err(GateError::UnexpectedStatus(status)),
    }
}

// =============================================================================
// In-memory adapter
// =============================================================================

/// What the static gate knows about one client
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientProfile {
    pub can_transact: bool,
    pub blacklist: BlacklistStatus,
    pub status: ClientStatus,
}

impl ClientProfile {
    pub fn active() -> Self {
        Self {
            can_transact: true,
            blacklist: BlacklistStatus::default(),
            status: ClientStatus::Active,
        }
    }

    pub fn blacklisted(reason: impl Into<String>) -> Self {
        Self {
            can_transact: false,
            blacklist: BlacklistStatus {
                blacklisted: true,
                reason: Some(reason.into()),
            },
            status: ClientStatus::Active,
        }
    }

    pub fn inactive() -> Self {
        Self {
            can_transact: false,
            blacklist: BlacklistStatus::default(),
            status: ClientStatus::Inactive,
        }
    }
}

#[derive(Debug, Clone)]
enum Entry {
    Profile(ClientProfile),
    Failing(GateError),
}

/// Answer for clients without an entry
#[derive(Debug, Clone)]
enum Fallback {
    Allow,
    NotFound,
    Failing(GateError),
}

/// Client gate answering from an in-memory table
pub struct StaticClientGate {
    entries: RwLock<HashMap<i64, Entry>>,
    fallback: Fallback,
    calls: AtomicUsize,
}

impl StaticClientGate {
    fn with_fallback(fallback: Fallback) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            fallback,
            calls: AtomicUsize::new(0),
        }
    }

    /// Unknown clients are active and may transact
    pub fn allow_all() -> Self {
        Self::with_fallback(Fallback::Allow)
    }

    /// Unknown clients are reported as not found
    pub fn known_clients_only() -> Self {
        Self::with_fallback(Fallback::NotFound)
    }

    /// Every query for an unknown client fails as if the service were down
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self::with_fallback(Fallback::Failing(GateError::Unavailable(reason.into())))
    }

    pub fn set_profile(&self, client_id: i64, profile: ClientProfile) {
        self.write_entry(client_id, Entry::Profile(profile));
    }

    /// Make every query about `client_id` fail with `error`
    pub fn fail_with(&self, client_id: i64, error: GateError) {
        self.write_entry(client_id, Entry::Failing(error));
    }

    /// Number of queries answered so far
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn write_entry(&self, client_id: i64, entry: Entry) {
        // A poisoned table only means a panicking test thread, keep going with its data
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        entries.insert(client_id, entry);
    }

    fn lookup(&self, client_id: i64) -> std::result::Result<ClientProfile, GateError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        match entries.get(&client_id) {
            Some(Entry::Profile(profile)) => Ok(profile.clone()),
            Some(Entry::Failing(error)) => Err(error.clone()),
            None => match &self.fallback {
                Fallback::Allow => Ok(ClientProfile::active()),
                Fallback::NotFound => Err(GateError::ClientNotFound(client_id)),
                Fallback::Failing(error) => Err(error.clone()),
            },
        }
    }
}

impl ClientGate for StaticClientGate {
    fn can_transact(&self, client_id: i64) -> std::result::Result<bool, GateError> {
        self.lookup(client_id).map(|p| p.can_transact)
    }

    fn blacklist_status(&self, client_id: i64) -> std::result::Result<BlacklistStatus, GateError> {
        self.lookup(client_id).map(|p| p.blacklist)
    }

    fn client_status(&self, client_id: i64) -> std::result::Result<ClientStatus, GateError> {
        self.lookup(client_id).map(|p| p.status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::client_gate_mock::{MockClientService, MockConfig};

    fn gate_for(server: &MockClientService) -> HttpClientGate {
        HttpClientGate::new(&server.base_url(), Duration::from_secs(2), Some("svc_token".into())).unwrap()
    }

    #[test]
    fn test_rejects_invalid_url() {
        assert!(HttpClientGate::new("not a url", Duration::from_secs(1), None).is_err());
        assert!(HttpClientGate::new("ftp://gate", Duration::from_secs(1), None).is_err());
    }

    #[test]
    fn test_trailing_slash_is_trimmed() {
        let gate = HttpClientGate::new("http://localhost:9000/", Duration::from_secs(1), None).unwrap();
        assert_eq!(gate.base_url(), "http://localhost:9000");
    }

    #[test]
    fn test_active_client() {
        let server = MockClientService::start(MockConfig::default()).unwrap();
        let gate = gate_for(&server);

        assert_eq!(gate.can_transact(1), Ok(true));
        assert_eq!(gate.blacklist_status(1).map(|b| b.blacklisted), Ok(false));
        assert_eq!(gate.client_status(1), Ok(ClientStatus::Active));
    }

    #[test]
    fn test_blacklisted_client() {
        let config = MockConfig {
            blacklisted: vec![7],
            ..Default::default()
        };
        let server = MockClientService::start(config).unwrap();
        let gate = gate_for(&server);

        assert_eq!(gate.can_transact(7), Ok(false));
        let status = gate.blacklist_status(7).unwrap();
        assert!(status.blacklisted);
        assert_eq!(status.reason.as_deref(), Some("fraud review"));
    }

    #[test]
    fn test_unknown_client_is_not_found() {
        let config = MockConfig {
            unknown: vec![404],
            ..Default::default()
        };
        let server = MockClientService::start(config).unwrap();
        assert_eq!(gate_for(&server).can_transact(404), Err(GateError::ClientNotFound(404)));
    }

    #[test]
    fn test_typed_and_untyped_forbidden_are_distinct() {
        let config = MockConfig {
            denied_with_code: vec![(3, "CLIENT_BLACKLISTED")],
            forbidden_without_code: vec![4],
            ..Default::default()
        };
        let server = MockClientService::start(config).unwrap();
        let gate = gate_for(&server);

        assert_eq!(
            gate.can_transact(3),
            Err(GateError::Denied(DenialReason::ClientBlacklisted))
        );
        assert_eq!(gate.can_transact(4), Err(GateError::CallerUnauthorized));
    }

    #[test]
    fn test_missing_token_is_unauthorized() {
        let server = MockClientService::start(MockConfig::default()).unwrap();
        let gate = HttpClientGate::new(&server.base_url(), Duration::from_secs(2), None).unwrap();
        assert_eq!(gate.can_transact(1), Err(GateError::CallerUnauthorized));
    }

    #[test]
    fn test_server_error_is_unavailable() {
        let config = MockConfig {
            fail_server: true,
            ..Default::default()
        };
        let server = MockClientService::start(config).unwrap();
        assert!(matches!(
            gate_for(&server).can_transact(1),
            Err(GateError::Unavailable(_))
        ));
    }

    #[test]
    fn test_slow_gate_times_out() {
        let config = MockConfig {
            delay_ms: 1500,
            ..Default::default()
        };
        let server = MockClientService::start(config).unwrap();
        let gate = HttpClientGate::new(&server.base_url(), Duration::from_millis(200), Some("svc_token".into()))
            .unwrap();
        assert_eq!(gate.can_transact(1), Err(GateError::Timeout));
    }

    #[test]
    fn test_connection_refused_is_unavailable() {
        // Port 9 (discard) is almost never listening on loopback
        let gate = HttpClientGate::new("http://127.0.0.1:9", Duration::from_secs(1), None).unwrap();
        let err = gate.can_transact(1).unwrap_err();
        assert_eq!(err.denial_reason(), DenialReason::ServiceUnavailable);
    }

    #[test]
    fn test_static_gate() {
        let gate = StaticClientGate::known_clients_only();
        gate.set_profile(1, ClientProfile::active());
        gate.set_profile(2, ClientProfile::blacklisted("chargebacks"));
        gate.fail_with(3, GateError::Timeout);

        assert_eq!(gate.can_transact(1), Ok(true));
        assert_eq!(gate.can_transact(2), Ok(false));
        assert!(gate.blacklist_status(2).unwrap().blacklisted);
        assert_eq!(gate.client_status(3), Err(GateError::Timeout));
        assert_eq!(gate.can_transact(99), Err(GateError::ClientNotFound(99)));
        assert_eq!(gate.calls(), 5);

        let down = StaticClientGate::unavailable("maintenance");
        assert!(matches!(down.can_transact(1), Err(GateError::Unavailable(_))));
    }
}
