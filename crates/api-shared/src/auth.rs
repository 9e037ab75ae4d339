//! Caller identity as established by the upstream token verifier.
//!
//! The gateway does not verify bearer tokens itself. The verifier in front of it passes the
//! caller's identity in request headers, and handlers check scopes against that identity.

/// Header carrying the user id of a human caller.
pub const CALLER_ID_HEADER: &str = "x-caller-id";
/// Header carrying the caller's space-separated scopes.
pub const CALLER_SCOPES_HEADER: &str = "x-caller-scopes";
/// Header carrying the system id of a service caller.
pub const SYSTEM_ID_HEADER: &str = "x-system-id";

/// Scopes any of which allow patient search.
pub const PATIENT_SEARCH_SCOPES: &[&str] =
    &["read:patient", "read:gdm_patient", "read:gdm_patient_all"];

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum AccessError {
    #[error("caller identity is missing")]
    Unauthenticated,
    #[error("forbidden: {0}")]
    Forbidden(String),
}

/// Identity of the caller of one request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CallerIdentity {
    pub caller_id: Option<String>,
    pub system_id: Option<String>,
    pub scopes: Vec<String>,
}

impl CallerIdentity {
    /// Build an identity from raw header values.
    ///
    /// # Errors
    ///
    /// Returns [`AccessError::Unauthenticated`] when neither a caller id nor a system id is
    /// present.
    pub fn from_headers(
        caller_id: Option<&str>,
        scopes: Option<&str>,
        system_id: Option<&str>,
    ) -> Result<Self, AccessError> {
        let non_empty = |v: Option<&str>| {
            v.map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };
        let caller_id = non_empty(caller_id);
        let system_id = non_empty(system_id);
        if caller_id.is_none() && system_id.is_none() {
            return Err(AccessError::Unauthenticated);
        }

        Ok(Self {
            caller_id,
            system_id,
            scopes: scopes
                .unwrap_or_default()
                .split_whitespace()
                .map(str::to_string)
                .collect(),
        })
    }

    /// Name recorded against ledger entries written for this caller.
    pub fn actor(&self) -> &str {
        self.system_id
            .as_deref()
            .or(self.caller_id.as_deref())
            .unwrap_or_default()
    }

    pub fn has_scope(&self, scope: &str) -> bool {
        self.scopes.iter().any(|s| s == scope)
    }

    /// Require at least one of `scopes`.
    pub fn require_any_scope(&self, scopes: &[&str]) -> Result<(), AccessError> {
        if scopes.iter().any(|s| self.has_scope(s)) {
            Ok(())
        } else {
            Err(AccessError::Forbidden(format!(
                "requires one of the scopes: {}",
                scopes.join(", ")
            )))
        }
    }

    /// Require a system (service) caller.
    pub fn require_system(&self) -> Result<(), AccessError> {
        if self.system_id.is_some() {
            Ok(())
        } else {
            Err(AccessError::Forbidden("requires a system caller".into()))
        }
    }
}
