use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Terminal outcome applied when verification cannot complete: timeouts,
/// exhausted attempts, and unreachable users.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureAction {
    /// Decline the join request outright.
    Reject,
    /// Hold the request for a manual admin decision.
    Pending,
}

impl FailureAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureAction::Reject => "reject",
            FailureAction::Pending => "pending",
        }
    }

    pub fn parse(value: &str) -> Option<FailureAction> {
        match value {
            "reject" => Some(FailureAction::Reject),
            "pending" => Some(FailureAction::Pending),
            _ => None,
        }
    }
}

impl fmt::Display for FailureAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Effective verification policy. Records capture `max_attempts` at creation
/// and deadlines at prompt issuance, so a policy change applies to records
/// created or re-prompted afterwards, never retroactively.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct VerificationPolicy {
    pub max_attempts: u32,
    pub verify_timeout: Duration,
    pub lang_timeout: Duration,
    pub failure_action: FailureAction,
}

impl Default for VerificationPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            verify_timeout: Duration::from_secs(120),
            lang_timeout: Duration::from_secs(120),
            failure_action: FailureAction::Reject,
        }
    }
}
