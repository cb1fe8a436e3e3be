//! Ingestion orchestrator: the atomic `{validate -> append -> apply}`
//! sequence. A single call owns one transaction's worth of work against
//! one entity; per-entity serialization is the caller's responsibility
//! (row lock, serializable retry, or an entity-keyed worker queue — see
//! the concurrency model this is grounded on).

use once_cell::sync::Lazy;
use prometheus::{register_counter_vec, register_histogram, CounterVec, Histogram};
use serde_json::Value;
use tracing::{info, instrument, warn};

use crate::applier;
use crate::clock::Clock;
use crate::event_store::EventStore;
use crate::events::{Actor, Envelope};
use crate::projections::ProjectionStore;
use crate::reason::{DecisionKind, IngestDecision, ReasonCode, ValidatorOutcome};
use crate::schema_registry::SchemaRegistry;
use crate::validator::Validator;

static DECISIONS: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "csdp_ingest_decisions_total",
        "Ingestion decisions by reason code",
        &["reason_code"]
    )
    .expect("metric registration never fails twice for the same name")
});

static INGEST_LATENCY: Lazy<Histogram> = Lazy::new(|| {
    prometheus::register_histogram!(
        "csdp_ingest_duration_seconds",
        "End-to-end duration of a single ingestion call"
    )
    .expect("metric registration never fails twice for the same name")
});

pub struct Orchestrator<'a> {
    pub schema_registry: &'a SchemaRegistry,
    pub clock: &'a dyn Clock,
}

impl<'a> Orchestrator<'a> {
    pub fn new(schema_registry: &'a SchemaRegistry, clock: &'a dyn Clock) -> Self {
        Orchestrator { schema_registry, clock }
    }

    /// Runs one event through validation, append, and apply. `backend`
    /// must implement both `EventStore` and `ProjectionStore` — in
    /// production this is the single `Database` connection the caller
    /// already holds a transaction on.
    #[instrument(skip(self, backend, raw_envelope, envelope))]
    pub fn ingest<B>(
        &self,
        backend: &mut B,
        raw_envelope: &Value,
        envelope: &Envelope,
        actor: &Actor,
    ) -> anyhow::Result<IngestDecision>
    where
        B: EventStore + ProjectionStore,
    {
        let timer = INGEST_LATENCY.start_timer();
        let validator = Validator::new(self.schema_registry, self.clock);
        let outcome = validator.validate(backend, raw_envelope, envelope, actor)?;
        let decision = self.finish(backend, outcome);
        timer.observe_duration();
        let decision = decision?;
        DECISIONS
            .with_label_values(&[decision.reason_code.as_ref()])
            .inc();
        Ok(decision)
    }

    fn finish<B>(&self, backend: &mut B, outcome: ValidatorOutcome) -> anyhow::Result<IngestDecision>
    where
        B: EventStore + ProjectionStore,
    {
        match outcome {
            ValidatorOutcome::Rejected { reason_code, details } => {
                warn!(?reason_code, %details, "event rejected");
                Ok(IngestDecision {
                    decision: DecisionKind::REJECTED,
                    reason_code,
                    event_id: None,
                    details: Some(details),
                })
            }
            ValidatorOutcome::NeedsReview { reason_code, details } => {
                warn!(?reason_code, %details, "event needs review");
                Ok(IngestDecision {
                    decision: DecisionKind::NEEDS_REVIEW,
                    reason_code,
                    event_id: None,
                    details: Some(details),
                })
            }
            ValidatorOutcome::Accepted(normalized) => {
                let (event_id, duplicate) = backend.append(&normalized)?;
                if duplicate {
                    info!(%event_id, "duplicate event ignored");
                    return Ok(IngestDecision {
                        decision: DecisionKind::ACCEPTED,
                        reason_code: ReasonCode::DUPLICATE_IGNORED,
                        event_id: Some(event_id),
                        details: None,
                    });
                }
                applier::apply_event(backend, &normalized, event_id, self.clock)?;
                info!(%event_id, "event accepted and applied");
                Ok(IngestDecision {
                    decision: DecisionKind::ACCEPTED,
                    reason_code: ReasonCode::OK,
                    event_id: Some(event_id),
                    details: None,
                })
            }
        }
    }
}
