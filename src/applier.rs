//! Projection applier: turns one freshly appended (non-duplicate) event
//! into mutations of the read-side projections. Always runs in the same
//! transaction as the append that produced its event — a duplicate never
//! reaches this module.

use chrono::{DateTime, Duration, Utc};
use serde_json::Value;
use uuid::Uuid;

use crate::clock::Clock;
use crate::events::{EventType, NormalizedEvent};
use crate::fsm::{BusinessState, ExecutionState, SlaState};
use crate::projections::{
    EngineerBoardEntry, EngineerStatus, EvidenceEntry, PartsLine, Priority, ProjectionStore,
    SlaView, TimelineEntry, WorkOrderProjection,
};

pub fn apply_event(
    store: &mut dyn ProjectionStore,
    event: &NormalizedEvent,
    event_id: Uuid,
    clock: &dyn Clock,
) -> anyhow::Result<()> {
    let event_type = event.envelope.event_type;
    let work_order_id = event.envelope.entity_id;

    match event_type {
        EventType::WorkOrderCreated => apply_created(store, event, work_order_id, clock)?,
        EventType::WorkOrderAssigned => apply_assigned(store, event, work_order_id, clock)?,
        EventType::WorkDispatched => {
            with_projection(store, work_order_id, |p| {
                if p.execution_state == ExecutionState::NOT_STARTED {
                    p.execution_state = ExecutionState::TRAVEL;
                }
            })?;
        }
        EventType::WorkArrivedOnSite => {
            with_projection(store, work_order_id, |p| {
                if p.execution_state == ExecutionState::TRAVEL {
                    p.execution_state = ExecutionState::WORK;
                }
            })?;
        }
        EventType::WorkStarted => apply_started(store, event, work_order_id)?,
        EventType::WorkPaused => apply_paused(store, event, work_order_id)?,
        EventType::WorkResumed => {
            with_projection(store, work_order_id, |p| {
                p.business_state = BusinessState::IN_PROGRESS;
                p.execution_state = ExecutionState::WORK;
            })?;
        }
        EventType::WorkCompleted => apply_completed(store, event, work_order_id)?,
        EventType::WorkOrderClosed => {
            with_projection(store, work_order_id, |p| {
                p.business_state = BusinessState::CLOSED;
            })?;
        }
        EventType::WorkOrderCancelled => {
            with_projection(store, work_order_id, |p| {
                p.business_state = BusinessState::CANCELLED;
            })?;
        }
        EventType::SlaAtRisk
        | EventType::SlaBreached
        | EventType::SlaRecovered
        | EventType::SlaBreachAccepted => apply_sla_event(store, event, work_order_id, clock)?,
        EventType::PartReserved | EventType::PartInstalled | EventType::PartConsumed => {
            apply_part_event(store, event, work_order_id)?
        }
        EventType::EvidencePhotoAdded
        | EventType::EvidenceDocumentAdded
        | EventType::EvidenceSignatureCaptured => apply_evidence_event(store, event, work_order_id)?,
    }

    append_timeline(store, event, event_id)?;
    refresh_engineer_board(store, work_order_id, clock)?;
    Ok(())
}

fn with_projection(
    store: &mut dyn ProjectionStore,
    work_order_id: Uuid,
    mutate: impl FnOnce(&mut WorkOrderProjection),
) -> anyhow::Result<()> {
    let mut projection = store
        .fetch_work_order(work_order_id)?
        .ok_or_else(|| anyhow::anyhow!("projection {work_order_id} vanished mid-transaction"))?;
    mutate(&mut projection);
    projection.version += 1;
    store.upsert_work_order(projection)?;
    Ok(())
}

/// Touches `last_event_id`/`last_event_at` without an extra version bump
/// — the dispatch arm above already incremented `version` for the state
/// change this event caused.
fn touch_last_event(
    store: &mut dyn ProjectionStore,
    work_order_id: Uuid,
    event_id: Uuid,
    at: DateTime<Utc>,
) -> anyhow::Result<()> {
    let Some(mut projection) = store.fetch_work_order(work_order_id)? else {
        return Ok(());
    };
    projection.last_event_id = Some(event_id);
    projection.last_event_at = Some(at);
    store.upsert_work_order(projection)?;
    Ok(())
}

fn apply_created(
    store: &mut dyn ProjectionStore,
    event: &NormalizedEvent,
    work_order_id: Uuid,
    clock: &dyn Clock,
) -> anyhow::Result<()> {
    let payload = &event.envelope.payload;
    let client_id: Uuid = payload
        .get("client_id")
        .and_then(Value::as_str)
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| anyhow::anyhow!("client_id missing or invalid"))?;
    let asset_id: Uuid = payload
        .get("asset_id")
        .and_then(Value::as_str)
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| anyhow::anyhow!("asset_id missing or invalid"))?;
    let priority = payload
        .get("priority")
        .and_then(Value::as_str)
        .and_then(Priority::from_wire)
        .ok_or_else(|| anyhow::anyhow!("priority missing or invalid"))?;
    let work_type = payload
        .get("type")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    let description = payload
        .get("description")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    let contract_id = payload
        .get("contract_id")
        .and_then(Value::as_str)
        .and_then(|s| s.parse().ok());

    let projection = WorkOrderProjection {
        work_order_id,
        client_id,
        asset_id,
        priority,
        work_type,
        description,
        business_state: BusinessState::NEW,
        execution_state: ExecutionState::NOT_STARTED,
        sla_state: SlaState::IN_SLA,
        assigned_engineer_id: None,
        assigned_team: None,
        scheduled_start: None,
        scheduled_end: None,
        actual_start_effective: None,
        actual_end_effective: None,
        downtime_minutes: None,
        contract_id,
        created_at_system: event.effective_time,
        version: 1,
        last_event_id: None,
        last_event_at: None,
    };
    store.upsert_work_order(projection.clone())?;
    let _ = clock; // deadlines derive from projection/contract time, not now()
    ensure_sla_deadlines_from_contract(
        store,
        work_order_id,
        projection.contract_id,
        projection.created_at_system,
    )?;
    Ok(())
}

fn apply_assigned(
    store: &mut dyn ProjectionStore,
    event: &NormalizedEvent,
    work_order_id: Uuid,
    clock: &dyn Clock,
) -> anyhow::Result<()> {
    let payload = &event.envelope.payload;
    let engineer_id: Option<Uuid> = payload
        .get("engineer_id")
        .and_then(Value::as_str)
        .and_then(|s| s.parse().ok());
    let team = payload
        .get("team")
        .and_then(Value::as_str)
        .map(str::to_string);
    let scheduled_start = parse_time(payload.get("scheduled_start"));
    let scheduled_end = parse_time(payload.get("scheduled_end"));

    with_projection(store, work_order_id, |p| {
        p.assigned_engineer_id = engineer_id;
        p.assigned_team = team;
        p.scheduled_start = scheduled_start;
        p.scheduled_end = scheduled_end;
        p.business_state = BusinessState::PLANNED;
    })?;

    let projection = store
        .fetch_work_order(work_order_id)?
        .ok_or_else(|| anyhow::anyhow!("projection vanished"))?;
    let _ = clock; // deadlines derive from scheduled_start/created_at_system, not now()
    let base = projection
        .scheduled_start
        .unwrap_or(projection.created_at_system);
    ensure_sla_deadlines_from_priority(store, work_order_id, projection.priority, base)?;
    Ok(())
}

fn apply_started(
    store: &mut dyn ProjectionStore,
    event: &NormalizedEvent,
    work_order_id: Uuid,
) -> anyhow::Result<()> {
    with_projection(store, work_order_id, |p| {
        p.business_state = BusinessState::IN_PROGRESS;
        p.actual_start_effective = Some(event.effective_time);
        if matches!(p.execution_state, ExecutionState::NOT_STARTED | ExecutionState::TRAVEL) {
            p.execution_state = ExecutionState::WORK;
        }
    })?;
    apply_reaction_deadline_check(store, work_order_id, event.effective_time)?;
    Ok(())
}

fn apply_paused(
    store: &mut dyn ProjectionStore,
    event: &NormalizedEvent,
    work_order_id: Uuid,
) -> anyhow::Result<()> {
    let reason_code = event.payload_str("reason_code").map(str::to_string);
    with_projection(store, work_order_id, |p| {
        p.business_state = BusinessState::ON_HOLD;
        if p.execution_state == ExecutionState::WORK {
            match reason_code.as_deref() {
                Some("PARTS") => p.execution_state = ExecutionState::WAITING_PARTS,
                Some("CLIENT") => p.execution_state = ExecutionState::WAITING_CLIENT,
                _ => {}
            }
        }
    })?;
    Ok(())
}

fn apply_completed(
    store: &mut dyn ProjectionStore,
    event: &NormalizedEvent,
    work_order_id: Uuid,
) -> anyhow::Result<()> {
    with_projection(store, work_order_id, |p| {
        p.business_state = BusinessState::COMPLETED;
        p.execution_state = ExecutionState::FINISHED;
        if let Some(start) = p.actual_start_effective {
            p.downtime_minutes = Some((event.effective_time - start).num_minutes());
        }
        p.actual_end_effective = Some(event.effective_time);
    })?;
    apply_restore_deadline_check(store, work_order_id, event.effective_time)?;
    Ok(())
}

fn sla_event_target(event_type: EventType) -> SlaState {
    match event_type {
        EventType::SlaAtRisk => SlaState::AT_RISK,
        EventType::SlaBreached => SlaState::BREACHED,
        EventType::SlaRecovered => SlaState::IN_SLA,
        EventType::SlaBreachAccepted => SlaState::ACCEPTED_BREACH,
        _ => unreachable!("sla_event_target called with a non-SLA event"),
    }
}

fn apply_sla_event(
    store: &mut dyn ProjectionStore,
    event: &NormalizedEvent,
    work_order_id: Uuid,
    clock: &dyn Clock,
) -> anyhow::Result<()> {
    let target = sla_event_target(event.envelope.event_type);
    let mut view = store
        .fetch_sla_view(work_order_id)?
        .unwrap_or(SlaView {
            work_order_id,
            state: SlaState::IN_SLA,
            reaction_deadline: None,
            restore_deadline: None,
            breached_at: None,
        });
    view.state = target;
    if target == SlaState::BREACHED && view.breached_at.is_none() {
        view.breached_at = Some(clock.now());
    }
    store.upsert_sla_view(view)?;
    with_projection(store, work_order_id, |p| p.sla_state = target)?;
    Ok(())
}

fn apply_part_event(
    store: &mut dyn ProjectionStore,
    event: &NormalizedEvent,
    work_order_id: Uuid,
) -> anyhow::Result<()> {
    let part_id: Uuid = event
        .envelope
        .payload
        .get("part_id")
        .and_then(Value::as_str)
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| anyhow::anyhow!("part_id missing or invalid"))?;
    let quantity = event.payload_f64("quantity").unwrap_or(0.0);

    let mut line = store
        .fetch_parts(work_order_id, part_id)?
        .unwrap_or(PartsLine {
            work_order_id,
            part_id,
            ..Default::default()
        });
    match event.envelope.event_type {
        EventType::PartReserved => line.reserved_qty += quantity,
        EventType::PartInstalled => line.installed_qty += quantity,
        EventType::PartConsumed => line.consumed_qty += quantity,
        _ => unreachable!(),
    }
    line.last_event_at = Some(event.effective_time);
    store.upsert_parts(line)?;
    Ok(())
}

fn apply_evidence_event(
    store: &mut dyn ProjectionStore,
    event: &NormalizedEvent,
    work_order_id: Uuid,
) -> anyhow::Result<()> {
    let evidence_type = match event.envelope.event_type {
        EventType::EvidencePhotoAdded => "PHOTO",
        EventType::EvidenceDocumentAdded => "DOCUMENT",
        EventType::EvidenceSignatureCaptured => "SIGNATURE",
        _ => unreachable!(),
    };
    let mut meta = event.envelope.payload.clone();
    let url = meta
        .remove("url")
        .or_else(|| meta.remove("signature_url"))
        .and_then(|v| v.as_str().map(str::to_string))
        .ok_or_else(|| anyhow::anyhow!("evidence event missing url/signature_url"))?;

    store.insert_evidence(EvidenceEntry {
        evidence_id: Uuid::new_v4(),
        work_order_id,
        evidence_type: evidence_type.to_string(),
        url,
        meta: Value::Object(meta),
        created_at: event.effective_time,
        created_by: event.created_by.clone(),
    })?;
    Ok(())
}

fn append_timeline(
    store: &mut dyn ProjectionStore,
    event: &NormalizedEvent,
    event_id: Uuid,
) -> anyhow::Result<()> {
    store.append_timeline(TimelineEntry {
        event_id,
        work_order_id: event.envelope.entity_id,
        event_type: event.envelope.event_type.as_wire().to_string(),
        created_at_system: event.effective_time,
        created_by: event.created_by.clone(),
        payload: Value::Object(event.envelope.payload.clone()),
    })?;
    touch_last_event(store, event.envelope.entity_id, event_id, event.effective_time)
}

fn refresh_engineer_board(
    store: &mut dyn ProjectionStore,
    work_order_id: Uuid,
    clock: &dyn Clock,
) -> anyhow::Result<()> {
    let Some(projection) = store.fetch_work_order(work_order_id)? else {
        return Ok(());
    };
    let Some(engineer_id) = projection.assigned_engineer_id else {
        return Ok(());
    };
    let status = match projection.execution_state {
        ExecutionState::TRAVEL => EngineerStatus::TRAVEL,
        ExecutionState::WORK | ExecutionState::WAITING_PARTS | ExecutionState::WAITING_CLIENT => {
            EngineerStatus::WORK
        }
        ExecutionState::FINISHED | ExecutionState::NOT_STARTED => EngineerStatus::AVAILABLE,
    };
    store.upsert_engineer_board(EngineerBoardEntry {
        engineer_id,
        status,
        current_work_order_id: Some(work_order_id),
        updated_at: clock.now(),
    })?;
    Ok(())
}

fn fetch_or_default_sla_view(
    store: &dyn ProjectionStore,
    work_order_id: Uuid,
) -> anyhow::Result<SlaView> {
    Ok(store.fetch_sla_view(work_order_id)?.unwrap_or(SlaView {
        work_order_id,
        state: SlaState::IN_SLA,
        reaction_deadline: None,
        restore_deadline: None,
        breached_at: None,
    }))
}

/// `WORK_ORDER.CREATED` only derives deadlines from a contract the payload
/// references — a create with no contract (or an inactive/unreferenced
/// one) leaves both deadlines null, matching the original's
/// "missing contract means null deadlines" behavior. The priority-default
/// fallback only applies at ASSIGNED (`ensure_sla_deadlines_from_priority`),
/// once `scheduled_start` is known.
fn ensure_sla_deadlines_from_contract(
    store: &mut dyn ProjectionStore,
    work_order_id: Uuid,
    contract_id: Option<Uuid>,
    base: DateTime<Utc>,
) -> anyhow::Result<()> {
    let Some(contract_id) = contract_id else {
        return Ok(());
    };
    let Some(contract) = store.fetch_contract(contract_id)? else {
        return Ok(());
    };
    if !contract.is_active {
        return Ok(());
    }
    let mut view = fetch_or_default_sla_view(store, work_order_id)?;
    // Write-once: an existing deadline is never overwritten.
    view.reaction_deadline
        .get_or_insert(base + Duration::minutes(contract.reaction_minutes));
    view.restore_deadline
        .get_or_insert(base + Duration::minutes(contract.restore_minutes));
    store.upsert_sla_view(view)?;
    Ok(())
}

/// `WORK_ORDER.ASSIGNED` derives the priority-default deadlines from
/// `scheduled_start`, write-once against whatever a contract-derived
/// CREATED may already have set.
fn ensure_sla_deadlines_from_priority(
    store: &mut dyn ProjectionStore,
    work_order_id: Uuid,
    priority: Priority,
    base: DateTime<Utc>,
) -> anyhow::Result<()> {
    let (reaction_minutes, restore_minutes) = priority.default_sla_minutes();
    let mut view = fetch_or_default_sla_view(store, work_order_id)?;
    view.reaction_deadline
        .get_or_insert(base + Duration::minutes(reaction_minutes));
    view.restore_deadline
        .get_or_insert(base + Duration::minutes(restore_minutes));
    store.upsert_sla_view(view)?;
    Ok(())
}

fn apply_reaction_deadline_check(
    store: &mut dyn ProjectionStore,
    work_order_id: Uuid,
    effective_time: DateTime<Utc>,
) -> anyhow::Result<()> {
    if let Some(view) = store.fetch_sla_view(work_order_id)? {
        if let Some(deadline) = view.reaction_deadline {
            if effective_time > deadline {
                mark_sla_breached(store, work_order_id, effective_time)?;
            }
        }
    }
    Ok(())
}

fn apply_restore_deadline_check(
    store: &mut dyn ProjectionStore,
    work_order_id: Uuid,
    effective_time: DateTime<Utc>,
) -> anyhow::Result<()> {
    if let Some(view) = store.fetch_sla_view(work_order_id)? {
        if let Some(deadline) = view.restore_deadline {
            if effective_time > deadline {
                mark_sla_breached(store, work_order_id, effective_time)?;
            }
        }
    }
    Ok(())
}

fn mark_sla_breached(
    store: &mut dyn ProjectionStore,
    work_order_id: Uuid,
    now: DateTime<Utc>,
) -> anyhow::Result<()> {
    let mut view = store
        .fetch_sla_view(work_order_id)?
        .ok_or_else(|| anyhow::anyhow!("sla_view missing for {work_order_id}"))?;
    view.state = SlaState::BREACHED;
    view.breached_at.get_or_insert(now);
    store.upsert_sla_view(view)?;
    with_projection(store, work_order_id, |p| p.sla_state = SlaState::BREACHED)?;
    Ok(())
}

fn parse_time(value: Option<&Value>) -> Option<DateTime<Utc>> {
    value
        .and_then(Value::as_str)
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|t| t.with_timezone(&Utc))
}
