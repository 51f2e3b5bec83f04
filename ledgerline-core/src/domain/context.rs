//! Request-scoped context passed explicitly through every audited call

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::audit::SYSTEM_ACTOR;

/// Who is performing an operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub user_id: Option<i64>,
    pub email: String,
    pub role: String,
}

impl Actor {
    pub fn new(user_id: Option<i64>, email: impl Into<String>, role: impl Into<String>) -> Self {
        Self {
            user_id,
            email: email.into(),
            role: role.into(),
        }
    }

    pub fn system() -> Self {
        Self::new(None, SYSTEM_ACTOR, SYSTEM_ACTOR)
    }

    pub fn is_system(&self) -> bool {
        self.user_id.is_none() && self.email == SYSTEM_ACTOR
    }
}

/// Per-request metadata: actor identity plus where the request came from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestContext {
    pub actor: Actor,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub session_id: Option<String>,
    pub correlation_id: String,
}

impl RequestContext {
    /// New context with a fresh correlation id
    pub fn new(actor: Actor) -> Self {
        Self {
            actor,
            ip_address: None,
            user_agent: None,
            session_id: None,
            correlation_id: Uuid::new_v4().to_string(),
        }
    }

    /// Context for scheduled jobs and other unattended work
    pub fn system() -> Self {
        Self::new(Actor::system())
    }

    pub fn with_ip(mut self, ip: impl Into<String>) -> Self {
        self.ip_address = Some(ip.into());
        self
    }

    pub fn with_user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = Some(agent.into());
        self
    }

    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    /// Reuse an upstream correlation id instead of the generated one
    pub fn with_correlation_id(mut self, id: impl Into<String>) -> Self {
        self.correlation_id = id.into();
        self
    }
}
