//! The closed set of decisions the validator can reach and the reason
//! codes attached to them.

use serde::{Deserialize, Serialize};
use strum_macros::AsRefStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsRefStr)]
pub enum ReasonCode {
    /// Validation succeeded, nothing noteworthy to report.
    OK,
    /// The envelope or payload failed schema validation.
    ERR_PAYLOAD_MISSING,
    /// A domain guard (reason code, symptom/cause/action, contract) failed.
    ERR_GUARD_FAILED,
    /// An SLA.* event was submitted by a non-SYSTEM actor.
    ERR_SLA_SERVER_ONLY,
    /// The actor's role (or engineer binding) does not permit this event.
    ERR_RBAC_DENIED,
    /// The event does not name a legal transition from the current state.
    ERR_INVALID_TRANSITION,
    /// The projection's business/execution state pair violates the
    /// composite invariant (details carry the observed pair).
    ERR_STATE_MISMATCH,
    /// Accepted, but the reported time was ambiguous enough to flag for review.
    REV_AMBIGUOUS_TIME,
    /// Accepted, but this event had already been appended (idempotent replay).
    DUPLICATE_IGNORED,
}

/// What the validator alone can conclude, before the event store and
/// applier have run. `Accepted` carries the normalized event rather than
/// an `event_id` — that identity only exists once the event store has
/// appended it.
#[derive(Debug, Clone)]
pub enum ValidatorOutcome {
    Accepted(crate::events::NormalizedEvent),
    Rejected {
        reason_code: ReasonCode,
        details: String,
    },
    NeedsReview {
        reason_code: ReasonCode,
        details: String,
    },
}

/// The final, public decision returned by the ingestion orchestrator —
/// this is what a caller of `POST /v1/events` would actually see.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestDecision {
    pub decision: DecisionKind,
    pub reason_code: ReasonCode,
    pub event_id: Option<uuid::Uuid>,
    pub details: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsRefStr)]
pub enum DecisionKind {
    ACCEPTED,
    REJECTED,
    NEEDS_REVIEW,
}
