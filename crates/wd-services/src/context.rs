//! Request metadata carried into audit records

use wd_models::AuditLog;

/// Where a request came from
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestContext {
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

impl RequestContext {
    pub fn new(ip_address: Option<String>, user_agent: Option<String>) -> Self {
        Self {
            ip_address,
            user_agent,
        }
    }

    /// Context for operations started outside an HTTP request (CLI, background jobs)
    pub fn system() -> Self {
        Self::default()
    }

    /// Stamp the request origin onto an audit entry
    pub fn stamp(&self, entry: AuditLog) -> AuditLog {
        entry.origin(self.ip_address.clone(), self.user_agent.clone())
    }
}
