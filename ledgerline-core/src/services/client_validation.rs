//! Client validation - turns client gate answers into ledger decisions
//!
//! Mutating paths go through `validate_client_can_transact`, which fails
//! closed: any gate error is an access denial. Read paths only ask
//! `is_client_blacklisted`, which fails open.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::domain::result::{Error, Result};
use crate::domain::DenialReason;
use crate::ports::ClientGate;

/// Client authorization checks shared by the ledger services
pub struct ClientValidation {
    gate: Arc<dyn ClientGate>,
}

impl ClientValidation {
    pub fn new(gate: Arc<dyn ClientGate>) -> Self {
        Self { gate }
    }

    /// Require the client to be allowed to move money
    pub fn validate_client_can_transact(&self, client_id: i64) -> Result<()> {
        match self.gate.can_transact(client_id) {
            Ok(true) => {
                debug!(client_id, "client authorized");
                Ok(())
            }
            Ok(false) => {
                warn!(client_id, "client gate refused transaction");
                Err(Error::access_denied(
                    DenialReason::ClientTransactionBlocked,
                    client_id,
                ))
            }
            Err(e) => {
                warn!(client_id, error = %e, "client gate check failed, denying");
                Err(Error::access_denied(e.denial_reason(), client_id))
            }
        }
    }

    /// Blacklist flag for display paths, false when the gate cannot answer
    pub fn is_client_blacklisted(&self, client_id: i64) -> bool {
        match self.gate.blacklist_status(client_id) {
            Ok(status) => status.blacklisted,
            Err(e) => {
                warn!(client_id, error = %e, "blacklist check failed, assuming not blacklisted");
                false
            }
        }
    }

    /// Client lifecycle flag, false when the gate cannot answer
    pub fn is_client_active(&self, client_id: i64) -> bool {
        match self.gate.client_status(client_id) {
            Ok(status) => status.is_active(),
            Err(e) => {
                warn!(client_id, error = %e, "client status check failed");
                false
            }
        }
    }

    /// Read-path guard: refuse only on a confirmed blacklist entry
    pub fn ensure_not_blacklisted(&self, client_id: i64) -> Result<()> {
        if self.is_client_blacklisted(client_id) {
            return Err(Error::access_denied(DenialReason::ClientBlacklisted, client_id));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::client_gate::{ClientProfile, StaticClientGate};
    use crate::ports::GateError;

    fn validation() -> (Arc<StaticClientGate>, ClientValidation) {
        let gate = Arc::new(StaticClientGate::known_clients_only());
        (gate.clone(), ClientValidation::new(gate))
    }

    fn denial(result: Result<()>) -> Option<DenialReason> {
        match result {
            Err(Error::AccessDenied { reason, .. }) => Some(reason),
            _ => None,
        }
    }

    #[test]
    fn test_mutating_path_fails_closed() {
        let (gate, validation) = validation();
        gate.set_profile(1, ClientProfile::active());
        gate.set_profile(2, ClientProfile::blacklisted("fraud"));
        gate.fail_with(3, GateError::Timeout);
        gate.fail_with(4, GateError::Denied(DenialReason::ClientInactive));
        gate.fail_with(5, GateError::CallerUnauthorized);

        assert!(validation.validate_client_can_transact(1).is_ok());
        assert_eq!(
            denial(validation.validate_client_can_transact(2)),
            Some(DenialReason::ClientTransactionBlocked)
        );
        assert_eq!(
            denial(validation.validate_client_can_transact(3)),
            Some(DenialReason::ServiceUnavailable)
        );
        assert_eq!(
            denial(validation.validate_client_can_transact(4)),
            Some(DenialReason::ClientInactive)
        );
        assert_eq!(
            denial(validation.validate_client_can_transact(5)),
            Some(DenialReason::UnauthorizedAccess)
        );
        assert_eq!(
            denial(validation.validate_client_can_transact(99)),
            Some(DenialReason::ClientNotFound)
        );
    }

    #[test]
    fn test_read_path_fails_open() {
        let (gate, validation) = validation();
        gate.set_profile(2, ClientProfile::blacklisted("fraud"));
        gate.fail_with(3, GateError::Unavailable("down".into()));

        assert!(validation.is_client_blacklisted(2));
        assert!(!validation.is_client_blacklisted(3));
        assert!(validation.ensure_not_blacklisted(3).is_ok());
        assert_eq!(
            denial(validation.ensure_not_blacklisted(2)),
            Some(DenialReason::ClientBlacklisted)
        );
    }

    #[test]
    fn test_client_active() {
        let (gate, validation) = validation();
        gate.set_profile(1, ClientProfile::active());
        gate.set_profile(2, ClientProfile::inactive());

        assert!(validation.is_client_active(1));
        assert!(!validation.is_client_active(2));
        assert!(!validation.is_client_active(99));
    }
}
