//! The validator: a pure decision function over `(projection snapshot,
//! envelope, actor)`. Every check below short-circuits on first failure,
//! in the exact order the event-ingestion contract requires — the order
//! itself is load-bearing, not a style choice (e.g. RBAC must be checked
//! before the projection is fetched, and the engineer-binding check
//! before the existence rule, so a denied actor never learns whether an
//! entity exists).

use chrono::{DateTime, Duration, Utc};
use serde_json::Value;

use crate::clock::Clock;
use crate::events::{Actor, EventType, Envelope, NormalizedEvent, Role};
use crate::fsm;
use crate::projections::{ProjectionStore, WorkOrderProjection};
use crate::reason::{ReasonCode, ValidatorOutcome};
use crate::schema_registry::SchemaRegistry;

const FUTURE_SKEW: Duration = Duration::minutes(5);
const MOBILE_DRIFT_TOLERANCE: Duration = Duration::minutes(180);

fn allowed_roles(event_type: EventType) -> &'static [Role] {
    use EventType::*;
    use Role::*;
    match event_type {
        WorkOrderCreated => &[DISPATCHER, ADMIN, SYSTEM],
        WorkOrderAssigned => &[DISPATCHER, SYSTEM, ADMIN],
        WorkOrderCancelled => &[DISPATCHER, MANAGER, ADMIN],
        WorkOrderClosed => &[DISPATCHER, ENGINEER, MANAGER, ADMIN, SYSTEM],
        WorkStarted | WorkPaused | WorkResumed | WorkCompleted | WorkDispatched
        | WorkArrivedOnSite => &[ENGINEER, DISPATCHER, ADMIN],
        PartReserved | PartConsumed => &[DISPATCHER, ADMIN, SYSTEM],
        PartInstalled => &[ENGINEER, DISPATCHER, ADMIN],
        EvidencePhotoAdded | EvidenceDocumentAdded | EvidenceSignatureCaptured => {
            &[ENGINEER, DISPATCHER, ADMIN]
        }
        SlaAtRisk | SlaBreached | SlaRecovered | SlaBreachAccepted => &[SYSTEM],
    }
}

fn reject(reason_code: ReasonCode, details: impl Into<String>) -> ValidatorOutcome {
    ValidatorOutcome::Rejected {
        reason_code,
        details: details.into(),
    }
}

pub struct Validator<'a> {
    pub schema_registry: &'a SchemaRegistry,
    pub clock: &'a dyn Clock,
}

impl<'a> Validator<'a> {
    pub fn new(schema_registry: &'a SchemaRegistry, clock: &'a dyn Clock) -> Self {
        Validator {
            schema_registry,
            clock,
        }
    }

    pub fn validate(
        &self,
        store: &dyn ProjectionStore,
        raw_envelope: &Value,
        envelope: &Envelope,
        actor: &Actor,
    ) -> anyhow::Result<ValidatorOutcome> {
        // 1. Envelope schema.
        let envelope_violations = self.schema_registry.validate_envelope(raw_envelope)?;
        if !envelope_violations.is_empty() {
            return Ok(reject(
                ReasonCode::ERR_PAYLOAD_MISSING,
                envelope_violations.join("; "),
            ));
        }

        // 2. Payload schema.
        let payload_value = Value::Object(envelope.payload.clone());
        let payload_violations = self
            .schema_registry
            .validate_payload(envelope.event_type, &payload_value)?;
        if !payload_violations.is_empty() {
            return Ok(reject(
                ReasonCode::ERR_PAYLOAD_MISSING,
                payload_violations.join("; "),
            ));
        }

        // 3. SLA server-only.
        if envelope.event_type.is_sla_event() && envelope.source != "system" {
            return Ok(reject(
                ReasonCode::ERR_SLA_SERVER_ONLY,
                "SLA.* events must be submitted with source=system",
            ));
        }

        // 4. RBAC role.
        if !allowed_roles(envelope.event_type).contains(&actor.role) {
            return Ok(reject(
                ReasonCode::ERR_RBAC_DENIED,
                format!("role {:?} is not authorized for {}", actor.role, envelope.event_type.as_wire()),
            ));
        }

        // 5. Projection fetch.
        let projection = store.fetch_work_order(envelope.entity_id)?;

        // 6. Engineer binding — applies to every engineer-submitted event,
        // parts and evidence included.
        if actor.role == Role::ENGINEER {
            if let Some(ref p) = projection {
                if p.assigned_engineer_id.map(|id| id.to_string()) != actor.actor_id {
                    return Ok(reject(
                        ReasonCode::ERR_RBAC_DENIED,
                        "engineer is not assigned to this work order",
                    ));
                }
            }
        }

        // 7. Existence rule.
        let is_create = envelope.event_type == EventType::WorkOrderCreated;
        match (&projection, is_create) {
            (None, false) => {
                return Ok(reject(
                    ReasonCode::ERR_INVALID_TRANSITION,
                    "no existing projection for a non-create event",
                ));
            }
            (Some(_), true) => {
                return Ok(reject(
                    ReasonCode::ERR_INVALID_TRANSITION,
                    "a projection already exists for this work order",
                ));
            }
            _ => {}
        }

        // 8. Time policy.
        let now = self.clock.now();
        let effective_time = match self.evaluate_time_policy(envelope, projection.as_ref(), now) {
            TimeOutcome::Rejected(details) => return Ok(reject(ReasonCode::ERR_GUARD_FAILED, details)),
            TimeOutcome::NeedsReview => {
                return Ok(ValidatorOutcome::NeedsReview {
                    reason_code: ReasonCode::REV_AMBIGUOUS_TIME,
                    details: "mobile clock drift exceeded tolerance".into(),
                })
            }
            TimeOutcome::Effective(t) => t,
        };

        // 9. Catalog guards.
        if let Some(details) = self.check_catalog_guards(store, envelope)? {
            return Ok(reject(ReasonCode::ERR_GUARD_FAILED, details));
        }

        // 10. Contract guard (WORK_ORDER.CREATED only).
        if envelope.event_type == EventType::WorkOrderCreated {
            if let Some(details) = self.check_contract_guard(store, envelope, now)? {
                return Ok(reject(ReasonCode::ERR_GUARD_FAILED, details));
            }
        }

        // 11. FSM validation.
        if let Some((reason_code, details)) =
            self.check_fsm(envelope.event_type, projection.as_ref())
        {
            return Ok(reject(reason_code, details));
        }

        // 12. Success.
        let normalized = NormalizedEvent {
            envelope: envelope.clone(),
            effective_time,
            created_by: actor.actor_id.clone(),
        };
        Ok(ValidatorOutcome::Accepted(normalized))
    }

    fn evaluate_time_policy(
        &self,
        envelope: &Envelope,
        projection: Option<&WorkOrderProjection>,
        now: DateTime<Utc>,
    ) -> TimeOutcome {
        let t_rep = match envelope.event_type {
            EventType::WorkStarted => envelope
                .payload
                .get("actual_start_reported")
                .and_then(Value::as_str)
                .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
                .map(|t| t.with_timezone(&Utc))
                .or(envelope.created_at_reported),
            EventType::WorkCompleted => envelope
                .payload
                .get("actual_end_reported")
                .and_then(Value::as_str)
                .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
                .map(|t| t.with_timezone(&Utc))
                .or(envelope.created_at_reported),
            _ => envelope.created_at_reported,
        };

        if let Some(t) = t_rep {
            if t > now + FUTURE_SKEW {
                return TimeOutcome::Rejected("reported time is ahead of server time".into());
            }
        }

        if envelope.source == "mobile" {
            if let Some(t) = t_rep {
                let drift = (t - now).num_minutes().abs();
                if drift > MOBILE_DRIFT_TOLERANCE.num_minutes() {
                    return TimeOutcome::NeedsReview;
                }
            }
        }

        let effective_time = t_rep.unwrap_or(now);

        if envelope.event_type == EventType::WorkCompleted {
            if let Some(p) = projection {
                if let Some(start) = p.actual_start_effective {
                    if effective_time < start {
                        return TimeOutcome::Rejected(
                            "completion time precedes recorded start time".into(),
                        );
                    }
                }
            }
        }

        TimeOutcome::Effective(effective_time)
    }

    fn check_catalog_guards(
        &self,
        store: &dyn ProjectionStore,
        envelope: &Envelope,
    ) -> anyhow::Result<Option<String>> {
        match envelope.event_type {
            EventType::WorkPaused => {
                if let Some(code) = envelope.payload.get("reason_code").and_then(Value::as_str) {
                    if !crate::catalog::require_active_code(store, "WORK_PAUSE_REASON", code)? {
                        return Ok(Some(format!("unknown pause reason code {code}")));
                    }
                }
            }
            EventType::WorkOrderCancelled => {
                if let Some(code) = envelope.payload.get("reason_code").and_then(Value::as_str) {
                    if !crate::catalog::require_active_code(store, "CANCEL_REASON", code)? {
                        return Ok(Some(format!("unknown cancel reason code {code}")));
                    }
                }
            }
            EventType::WorkCompleted => {
                for (field, catalog) in [
                    ("symptoms", "SYMPTOM"),
                    ("causes", "CAUSE"),
                    ("actions", "ACTION"),
                ] {
                    if let Some(items) = envelope.payload.get(field).and_then(Value::as_array) {
                        for item in items {
                            if let Some(code) = item.as_str() {
                                if !crate::catalog::require_active_code(store, catalog, code)? {
                                    return Ok(Some(format!("unknown {catalog} code {code}")));
                                }
                            }
                        }
                    }
                }
            }
            _ => {}
        }
        Ok(None)
    }

    fn check_contract_guard(
        &self,
        store: &dyn ProjectionStore,
        envelope: &Envelope,
        now: DateTime<Utc>,
    ) -> anyhow::Result<Option<String>> {
        let Some(contract_id) = envelope
            .payload
            .get("contract_id")
            .and_then(Value::as_str)
        else {
            return Ok(None);
        };
        let Ok(contract_id) = contract_id.parse::<uuid::Uuid>() else {
            return Ok(Some("contract_id is not a valid identifier".into()));
        };
        let Some(contract) = store.fetch_contract(contract_id)? else {
            return Ok(Some("referenced contract does not exist".into()));
        };
        let Some(client_id) = envelope.payload.get("client_id").and_then(Value::as_str) else {
            return Ok(Some("client_id is required alongside contract_id".into()));
        };
        if contract.client_id.to_string() != client_id {
            return Ok(Some("contract does not belong to the declared client".into()));
        }
        if !contract.is_active {
            return Ok(Some("contract is not active".into()));
        }
        if contract.active_from > now || contract.active_to.map(|to| to < now).unwrap_or(false) {
            return Ok(Some("contract is outside its validity window".into()));
        }
        Ok(None)
    }

    fn check_fsm(
        &self,
        event_type: EventType,
        projection: Option<&WorkOrderProjection>,
    ) -> Option<(ReasonCode, String)> {
        let Some(projection) = projection else {
            // WORK_ORDER.CREATED: nothing to validate against, the
            // existence rule above has already confirmed no projection
            // exists.
            return None;
        };

        if !fsm::composite_invariant_holds(projection.business_state, projection.execution_state) {
            return Some((
                ReasonCode::ERR_STATE_MISMATCH,
                format!(
                    "business={:?} execution={:?} violates the composite invariant",
                    projection.business_state, projection.execution_state
                ),
            ));
        }

        if event_type.is_sla_event() {
            return match fsm::sla_transition(projection.sla_state, event_type) {
                Some(_) => None,
                None => Some((
                    ReasonCode::ERR_INVALID_TRANSITION,
                    format!("no SLA transition from {:?} via {}", projection.sla_state, event_type.as_wire()),
                )),
            };
        }

        if event_type.is_part_event() || event_type.is_evidence_event() {
            return None;
        }

        if event_type == EventType::WorkOrderCancelled && !fsm::cancel_allowed(projection.business_state) {
            return Some((
                ReasonCode::ERR_INVALID_TRANSITION,
                "cancellation is not allowed once an order is completed or closed".into(),
            ));
        }

        let is_execution_event = matches!(
            event_type,
            EventType::WorkDispatched
                | EventType::WorkArrivedOnSite
                | EventType::WorkStarted
                | EventType::WorkPaused
                | EventType::WorkResumed
                | EventType::WorkCompleted
        );

        if is_execution_event {
            if !fsm::execution_requires_business(event_type, projection.business_state) {
                return Some((
                    ReasonCode::ERR_INVALID_TRANSITION,
                    format!(
                        "{} is not legal while business state is {:?}",
                        event_type.as_wire(),
                        projection.business_state
                    ),
                ));
            }
            if !fsm::execution_allowed(projection.execution_state, event_type) {
                return Some((
                    ReasonCode::ERR_INVALID_TRANSITION,
                    format!(
                        "no execution transition from {:?} via {}",
                        projection.execution_state,
                        event_type.as_wire()
                    ),
                ));
            }
            // WORK.STARTED/PAUSED/RESUMED/COMPLETED also drive the
            // business FSM; require that transition be legal too.
            if matches!(
                event_type,
                EventType::WorkStarted
                    | EventType::WorkPaused
                    | EventType::WorkResumed
                    | EventType::WorkCompleted
            ) && fsm::business_transition(projection.business_state, event_type).is_none()
            {
                return Some((
                    ReasonCode::ERR_INVALID_TRANSITION,
                    format!(
                        "no business transition from {:?} via {}",
                        projection.business_state,
                        event_type.as_wire()
                    ),
                ));
            }
            return None;
        }

        // Remaining business-only events: ASSIGNED, CLOSED, CANCELLED.
        match fsm::business_transition(projection.business_state, event_type) {
            Some(_) => None,
            None => Some((
                ReasonCode::ERR_INVALID_TRANSITION,
                format!(
                    "no business transition from {:?} via {}",
                    projection.business_state,
                    event_type.as_wire()
                ),
            )),
        }
    }
}

enum TimeOutcome {
    Effective(DateTime<Utc>),
    NeedsReview,
    Rejected(String),
}

#[cfg(test)]
mod test {
    use once_cell::sync::Lazy;
    use serde_json::Map;
    use uuid::Uuid;

    use super::*;
    use crate::clock::FixedClock;

    static REGISTRY: Lazy<SchemaRegistry> = Lazy::new(SchemaRegistry::new);

    fn base_envelope(source: &str) -> Envelope {
        Envelope {
            event_type: EventType::WorkOrderCancelled,
            entity_type: "work_order".to_string(),
            entity_id: Uuid::new_v4(),
            source: source.to_string(),
            client_event_id: None,
            idempotency_key: None,
            created_at_reported: None,
            correlation_id: None,
            causation_id: None,
            schema_version: None,
            payload: Map::new(),
        }
    }

    fn validator(now: DateTime<Utc>) -> (Validator<'static>, FixedClock) {
        let clock = FixedClock(now);
        // Leaked for 'static borrow convenience in tests only.
        let clock_ref: &'static FixedClock = Box::leak(Box::new(clock));
        (Validator::new(&REGISTRY, clock_ref), *clock_ref)
    }

    #[test]
    fn future_skew_beyond_five_minutes_is_rejected() {
        let now = Utc::now();
        let (v, _) = validator(now);
        let mut envelope = base_envelope("web");
        envelope.created_at_reported = Some(now + Duration::minutes(10));
        match v.evaluate_time_policy(&envelope, None, now) {
            TimeOutcome::Rejected(_) => {}
            other => panic!("expected future-skew rejection, got {:?}", describe(&other)),
        }
    }

    #[test]
    fn mobile_drift_within_tolerance_is_accepted() {
        let now = Utc::now();
        let (v, _) = validator(now);
        let mut envelope = base_envelope("mobile");
        envelope.created_at_reported = Some(now - Duration::minutes(90));
        match v.evaluate_time_policy(&envelope, None, now) {
            TimeOutcome::Effective(_) => {}
            other => panic!("expected acceptance, got {:?}", describe(&other)),
        }
    }

    #[test]
    fn mobile_drift_beyond_tolerance_needs_review() {
        let now = Utc::now();
        let (v, _) = validator(now);
        let mut envelope = base_envelope("mobile");
        envelope.created_at_reported = Some(now - Duration::minutes(200));
        match v.evaluate_time_policy(&envelope, None, now) {
            TimeOutcome::NeedsReview => {}
            other => panic!("expected needs-review, got {:?}", describe(&other)),
        }
    }

    #[test]
    fn web_drift_beyond_tolerance_is_still_accepted() {
        // The 180-minute tolerance only applies to source == "mobile".
        let now = Utc::now();
        let (v, _) = validator(now);
        let mut envelope = base_envelope("web");
        envelope.created_at_reported = Some(now - Duration::minutes(200));
        match v.evaluate_time_policy(&envelope, None, now) {
            TimeOutcome::Effective(_) => {}
            other => panic!("expected acceptance, got {:?}", describe(&other)),
        }
    }

    fn describe(outcome: &TimeOutcome) -> &'static str {
        match outcome {
            TimeOutcome::Effective(_) => "Effective",
            TimeOutcome::NeedsReview => "NeedsReview",
            TimeOutcome::Rejected(_) => "Rejected",
        }
    }
}
