//! Diesel row structs mirroring `schema.rs`, plus conversions to and
//! from the domain types in `projections`/`events`/`event_store`. States
//! round-trip through their `Text` columns via `strum`'s `AsRef`/
//! `FromStr` derives rather than custom SQL types — one fewer thing a
//! migration has to know about.

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde_json::Value;
use uuid::Uuid;

use crate::event_store::StoredEvent;
use crate::events::NormalizedEvent;
use crate::fsm::{BusinessState, ExecutionState, SlaState};
use crate::projections::{
    Contract, EngineerBoardEntry, EngineerStatus, EvidenceEntry, PartsLine, Priority, SlaView,
    TimelineEntry, WorkOrderProjection,
};

use super::schema::*;

fn parse<T: std::str::FromStr>(s: &str, what: &str) -> T
where
    T::Err: std::fmt::Debug,
{
    s.parse()
        .unwrap_or_else(|e| panic!("stored {what} value {s:?} does not round-trip: {e:?}"))
}

#[derive(Debug, Clone, Queryable, Insertable)]
#[diesel(table_name = event_store)]
pub struct NewEventRow {
    pub event_id: Uuid,
    pub entity_id: Uuid,
    pub event_type: String,
    pub payload: Value,
    pub source: String,
    pub client_event_id: Option<String>,
    pub idempotency_key: Option<String>,
    pub correlation_id: Option<Uuid>,
    pub causation_id: Option<Uuid>,
    pub schema_version: Option<String>,
    pub effective_time: DateTime<Utc>,
    pub created_at_system: DateTime<Utc>,
    pub created_by: Option<String>,
}

pub type EventRow = NewEventRow;

impl NewEventRow {
    pub fn from_normalized(event: &NormalizedEvent) -> Self {
        NewEventRow {
            event_id: Uuid::new_v4(),
            entity_id: event.envelope.entity_id,
            event_type: event.envelope.event_type.as_wire().to_string(),
            payload: Value::Object(event.envelope.payload.clone()),
            source: event.envelope.source.clone(),
            client_event_id: event.envelope.client_event_id.clone(),
            idempotency_key: event.envelope.idempotency_key.clone(),
            correlation_id: event.envelope.correlation_id,
            causation_id: event.envelope.causation_id,
            schema_version: event.envelope.schema_version.clone(),
            effective_time: event.effective_time,
            created_at_system: event.effective_time,
            created_by: event.created_by.clone(),
        }
    }
}

impl From<EventRow> for StoredEvent {
    fn from(row: EventRow) -> Self {
        StoredEvent {
            event_id: row.event_id,
            entity_id: row.entity_id,
            event_type: row.event_type,
            payload: row.payload,
            source: row.source,
            client_event_id: row.client_event_id,
            idempotency_key: row.idempotency_key,
            correlation_id: row.correlation_id,
            causation_id: row.causation_id,
            schema_version: row.schema_version,
            effective_time: row.effective_time,
            created_at_system: row.created_at_system,
            created_by: row.created_by,
        }
    }
}

#[derive(Debug, Clone, Queryable, Insertable, AsChangeset)]
#[diesel(table_name = work_orders_current)]
pub struct WorkOrderRow {
    pub work_order_id: Uuid,
    pub client_id: Uuid,
    pub asset_id: Uuid,
    pub priority: String,
    pub work_type: String,
    pub description: String,
    pub business_state: String,
    pub execution_state: String,
    pub sla_state: String,
    pub assigned_engineer_id: Option<Uuid>,
    pub assigned_team: Option<String>,
    pub scheduled_start: Option<DateTime<Utc>>,
    pub scheduled_end: Option<DateTime<Utc>>,
    pub actual_start_effective: Option<DateTime<Utc>>,
    pub actual_end_effective: Option<DateTime<Utc>>,
    pub downtime_minutes: Option<i64>,
    pub contract_id: Option<Uuid>,
    pub created_at_system: DateTime<Utc>,
    pub version: i64,
    pub last_event_id: Option<Uuid>,
    pub last_event_at: Option<DateTime<Utc>>,
}

impl From<WorkOrderProjection> for WorkOrderRow {
    fn from(p: WorkOrderProjection) -> Self {
        WorkOrderRow {
            work_order_id: p.work_order_id,
            client_id: p.client_id,
            asset_id: p.asset_id,
            priority: format!("{:?}", p.priority),
            work_type: p.work_type,
            description: p.description,
            business_state: p.business_state.as_ref().to_string(),
            execution_state: p.execution_state.as_ref().to_string(),
            sla_state: p.sla_state.as_ref().to_string(),
            assigned_engineer_id: p.assigned_engineer_id,
            assigned_team: p.assigned_team,
            scheduled_start: p.scheduled_start,
            scheduled_end: p.scheduled_end,
            actual_start_effective: p.actual_start_effective,
            actual_end_effective: p.actual_end_effective,
            downtime_minutes: p.downtime_minutes,
            contract_id: p.contract_id,
            created_at_system: p.created_at_system,
            version: p.version,
            last_event_id: p.last_event_id,
            last_event_at: p.last_event_at,
        }
    }
}

impl From<WorkOrderRow> for WorkOrderProjection {
    fn from(row: WorkOrderRow) -> Self {
        WorkOrderProjection {
            work_order_id: row.work_order_id,
            client_id: row.client_id,
            asset_id: row.asset_id,
            priority: Priority::from_wire(&row.priority)
                .unwrap_or_else(|| panic!("stored priority {:?} does not round-trip", row.priority)),
            work_type: row.work_type,
            description: row.description,
            business_state: parse::<BusinessState>(&row.business_state, "business_state"),
            execution_state: parse::<ExecutionState>(&row.execution_state, "execution_state"),
            sla_state: parse::<SlaState>(&row.sla_state, "sla_state"),
            assigned_engineer_id: row.assigned_engineer_id,
            assigned_team: row.assigned_team,
            scheduled_start: row.scheduled_start,
            scheduled_end: row.scheduled_end,
            actual_start_effective: row.actual_start_effective,
            actual_end_effective: row.actual_end_effective,
            downtime_minutes: row.downtime_minutes,
            contract_id: row.contract_id,
            created_at_system: row.created_at_system,
            version: row.version,
            last_event_id: row.last_event_id,
            last_event_at: row.last_event_at,
        }
    }
}

#[derive(Debug, Clone, Queryable, Insertable)]
#[diesel(table_name = work_order_timeline)]
pub struct TimelineRow {
    pub event_id: Uuid,
    pub work_order_id: Uuid,
    pub event_type: String,
    pub created_at_system: DateTime<Utc>,
    pub created_by: Option<String>,
    pub payload: Value,
}

impl From<TimelineEntry> for TimelineRow {
    fn from(e: TimelineEntry) -> Self {
        TimelineRow {
            event_id: e.event_id,
            work_order_id: e.work_order_id,
            event_type: e.event_type,
            created_at_system: e.created_at_system,
            created_by: e.created_by,
            payload: e.payload,
        }
    }
}

#[derive(Debug, Clone, Queryable, Insertable, AsChangeset)]
#[diesel(table_name = work_order_parts)]
pub struct PartsRow {
    pub work_order_id: Uuid,
    pub part_id: Uuid,
    pub reserved_qty: f64,
    pub installed_qty: f64,
    pub consumed_qty: f64,
    pub last_event_at: Option<DateTime<Utc>>,
}

impl From<PartsLine> for PartsRow {
    fn from(p: PartsLine) -> Self {
        PartsRow {
            work_order_id: p.work_order_id,
            part_id: p.part_id,
            reserved_qty: p.reserved_qty,
            installed_qty: p.installed_qty,
            consumed_qty: p.consumed_qty,
            last_event_at: p.last_event_at,
        }
    }
}

impl From<PartsRow> for PartsLine {
    fn from(row: PartsRow) -> Self {
        PartsLine {
            work_order_id: row.work_order_id,
            part_id: row.part_id,
            reserved_qty: row.reserved_qty,
            installed_qty: row.installed_qty,
            consumed_qty: row.consumed_qty,
            last_event_at: row.last_event_at,
        }
    }
}

#[derive(Debug, Clone, Queryable, Insertable)]
#[diesel(table_name = work_order_evidence)]
pub struct EvidenceRow {
    pub evidence_id: Uuid,
    pub work_order_id: Uuid,
    pub evidence_type: String,
    pub url: String,
    pub meta: Value,
    pub created_at: DateTime<Utc>,
    pub created_by: Option<String>,
}

impl From<EvidenceEntry> for EvidenceRow {
    fn from(e: EvidenceEntry) -> Self {
        EvidenceRow {
            evidence_id: e.evidence_id,
            work_order_id: e.work_order_id,
            evidence_type: e.evidence_type,
            url: e.url,
            meta: e.meta,
            created_at: e.created_at,
            created_by: e.created_by,
        }
    }
}

#[derive(Debug, Clone, Queryable, Insertable, AsChangeset)]
#[diesel(table_name = engineer_board)]
pub struct EngineerBoardRow {
    pub engineer_id: Uuid,
    pub status: String,
    pub current_work_order_id: Option<Uuid>,
    pub updated_at: DateTime<Utc>,
}

impl From<EngineerBoardEntry> for EngineerBoardRow {
    fn from(e: EngineerBoardEntry) -> Self {
        EngineerBoardRow {
            engineer_id: e.engineer_id,
            status: match e.status {
                EngineerStatus::AVAILABLE => "AVAILABLE",
                EngineerStatus::TRAVEL => "TRAVEL",
                EngineerStatus::WORK => "WORK",
            }
            .to_string(),
            current_work_order_id: e.current_work_order_id,
            updated_at: e.updated_at,
        }
    }
}

#[derive(Debug, Clone, Queryable, Insertable, AsChangeset)]
#[diesel(table_name = sla_view)]
pub struct SlaViewRow {
    pub work_order_id: Uuid,
    pub state: String,
    pub reaction_deadline: Option<DateTime<Utc>>,
    pub restore_deadline: Option<DateTime<Utc>>,
    pub breached_at: Option<DateTime<Utc>>,
}

impl From<SlaView> for SlaViewRow {
    fn from(v: SlaView) -> Self {
        SlaViewRow {
            work_order_id: v.work_order_id,
            state: v.state.as_ref().to_string(),
            reaction_deadline: v.reaction_deadline,
            restore_deadline: v.restore_deadline,
            breached_at: v.breached_at,
        }
    }
}

impl From<SlaViewRow> for SlaView {
    fn from(row: SlaViewRow) -> Self {
        SlaView {
            work_order_id: row.work_order_id,
            state: parse::<SlaState>(&row.state, "sla_state"),
            reaction_deadline: row.reaction_deadline,
            restore_deadline: row.restore_deadline,
            breached_at: row.breached_at,
        }
    }
}

#[derive(Debug, Clone, Queryable, Insertable)]
#[diesel(table_name = contracts)]
pub struct ContractRow {
    pub contract_id: Uuid,
    pub client_id: Uuid,
    pub contract_type: String,
    pub reaction_minutes: i64,
    pub restore_minutes: i64,
    pub is_active: bool,
    pub active_from: DateTime<Utc>,
    pub active_to: Option<DateTime<Utc>>,
}

impl From<ContractRow> for Contract {
    fn from(row: ContractRow) -> Self {
        Contract {
            contract_id: row.contract_id,
            client_id: row.client_id,
            contract_type: row.contract_type,
            reaction_minutes: row.reaction_minutes,
            restore_minutes: row.restore_minutes,
            is_active: row.is_active,
            active_from: row.active_from,
            active_to: row.active_to,
        }
    }
}
