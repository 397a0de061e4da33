// Moderation domain models - verdicts and the chirp moderation lifecycle.
//
// These are pure domain types. Classifiers (AI or rule-based) produce
// Verdicts; the pipeline turns a verdict into a ModerationState on the chirp.

use chrono::{DateTime, Utc};

/// The call a classifier makes on a piece of content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Approved,
    Rejected,
}

impl std::fmt::Display for Decision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Decision::Approved => write!(f, "approved"),
            Decision::Rejected => write!(f, "rejected"),
        }
    }
}

/// Output of any classifier: the decision, a human-readable reason, and a
/// confidence in [0, 1]. Immutable once produced; the AI path and the
/// fallback rules both return this same shape.
#[derive(Debug, Clone, PartialEq)]
pub struct Verdict {
    pub decision: Decision,
    pub reason: String,
    pub confidence: f64,
}

impl Verdict {
    pub fn approved(reason: impl Into<String>, confidence: f64) -> Self {
        Self {
            decision: Decision::Approved,
            reason: reason.into(),
            confidence,
        }
    }

    pub fn rejected(reason: impl Into<String>, confidence: f64) -> Self {
        Self {
            decision: Decision::Rejected,
            reason: reason.into(),
            confidence,
        }
    }

    pub fn is_rejected(&self) -> bool {
        self.decision == Decision::Rejected
    }
}

/// Moderation lifecycle of a chirp.
///
/// Reason and timestamp only exist once a verdict has been applied, so a
/// pending chirp structurally cannot carry stale values - the invariant
/// "reason and moderated_at are set iff the status left pending" holds by
/// construction rather than by convention.
#[derive(Debug, Clone, PartialEq)]
pub enum ModerationState {
    Pending,
    Approved {
        reason: String,
        moderated_at: DateTime<Utc>,
    },
    Rejected {
        reason: String,
        moderated_at: DateTime<Utc>,
    },
}

impl ModerationState {
    /// Build the state a verdict transitions a chirp into.
    pub fn from_verdict(verdict: &Verdict, moderated_at: DateTime<Utc>) -> Self {
        match verdict.decision {
            Decision::Approved => ModerationState::Approved {
                reason: verdict.reason.clone(),
                moderated_at,
            },
            Decision::Rejected => ModerationState::Rejected {
                reason: verdict.reason.clone(),
                moderated_at,
            },
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, ModerationState::Pending)
    }

    pub fn is_approved(&self) -> bool {
        matches!(self, ModerationState::Approved { .. })
    }

    #[allow(dead_code)]
    pub fn is_rejected(&self) -> bool {
        matches!(self, ModerationState::Rejected { .. })
    }

    /// Status column value as persisted.
    pub fn status(&self) -> &'static str {
        match self {
            ModerationState::Pending => "pending",
            ModerationState::Approved { .. } => "approved",
            ModerationState::Rejected { .. } => "rejected",
        }
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            ModerationState::Pending => None,
            ModerationState::Approved { reason, .. } | ModerationState::Rejected { reason, .. } => {
                Some(reason)
            }
        }
    }

    pub fn moderated_at(&self) -> Option<DateTime<Utc>> {
        match self {
            ModerationState::Pending => None,
            ModerationState::Approved { moderated_at, .. }
            | ModerationState::Rejected { moderated_at, .. } => Some(*moderated_at),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verdict_constructors() {
        let ok = Verdict::approved("looks fine", 0.9);
        assert_eq!(ok.decision, Decision::Approved);
        assert!(!ok.is_rejected());

        let bad = Verdict::rejected("not fine", 0.8);
        assert_eq!(bad.decision, Decision::Rejected);
        assert!(bad.is_rejected());
    }

    #[test]
    fn test_state_from_verdict_carries_reason_and_timestamp() {
        let now = Utc::now();
        let state = ModerationState::from_verdict(&Verdict::rejected("spammy", 0.8), now);

        assert_eq!(state.status(), "rejected");
        assert_eq!(state.reason(), Some("spammy"));
        assert_eq!(state.moderated_at(), Some(now));
    }

    #[test]
    fn test_pending_has_no_reason_or_timestamp() {
        let state = ModerationState::Pending;

        assert!(state.is_pending());
        assert_eq!(state.status(), "pending");
        assert_eq!(state.reason(), None);
        assert_eq!(state.moderated_at(), None);
    }
}
