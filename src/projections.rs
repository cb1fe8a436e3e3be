//! Read-side projection records and the store trait the validator and
//! applier read from / write to. Query-side list/filter endpoints over
//! these tables are an external collaborator and are not implemented
//! here — only the internal reads the core itself needs to make a
//! decision or apply an event.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::fsm::{BusinessState, ExecutionState, SlaState};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Priority {
    CRITICAL,
    HIGH,
    MEDIUM,
    LOW,
}

impl Priority {
    pub fn from_wire(s: &str) -> Option<Priority> {
        match s {
            "CRITICAL" => Some(Priority::CRITICAL),
            "HIGH" => Some(Priority::HIGH),
            "MEDIUM" => Some(Priority::MEDIUM),
            "LOW" => Some(Priority::LOW),
            _ => None,
        }
    }

    /// Default (reaction, restore) durations in minutes, used when no
    /// active contract overrides them.
    pub fn default_sla_minutes(self) -> (i64, i64) {
        match self {
            Priority::CRITICAL => (120, 480),
            Priority::HIGH => (240, 960),
            Priority::MEDIUM => (480, 2880),
            Priority::LOW => (480, 4320),
        }
    }
}

#[derive(Debug, Clone)]
pub struct WorkOrderProjection {
    pub work_order_id: Uuid,
    pub client_id: Uuid,
    pub asset_id: Uuid,
    pub priority: Priority,
    pub work_type: String,
    pub description: String,
    pub business_state: BusinessState,
    pub execution_state: ExecutionState,
    pub sla_state: SlaState,
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

#[derive(Debug, Clone)]
pub struct SlaView {
    pub work_order_id: Uuid,
    pub state: SlaState,
    pub reaction_deadline: Option<DateTime<Utc>>,
    pub restore_deadline: Option<DateTime<Utc>>,
    pub breached_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct TimelineEntry {
    pub event_id: Uuid,
    pub work_order_id: Uuid,
    pub event_type: String,
    pub created_at_system: DateTime<Utc>,
    pub created_by: Option<String>,
    pub payload: serde_json::Value,
}

#[derive(Debug, Clone, Default)]
pub struct PartsLine {
    pub work_order_id: Uuid,
    pub part_id: Uuid,
    pub reserved_qty: f64,
    pub installed_qty: f64,
    pub consumed_qty: f64,
    pub last_event_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct EvidenceEntry {
    pub evidence_id: Uuid,
    pub work_order_id: Uuid,
    pub evidence_type: String,
    pub url: String,
    pub meta: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub created_by: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineerStatus {
    AVAILABLE,
    TRAVEL,
    WORK,
}

#[derive(Debug, Clone)]
pub struct EngineerBoardEntry {
    pub engineer_id: Uuid,
    pub status: EngineerStatus,
    pub current_work_order_id: Option<Uuid>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct RefCatalogItem {
    pub catalog: String,
    pub code: String,
    pub title: String,
    pub is_active: bool,
    pub sort_order: i32,
}

#[derive(Debug, Clone)]
pub struct Contract {
    pub contract_id: Uuid,
    pub client_id: Uuid,
    pub contract_type: String,
    pub reaction_minutes: i64,
    pub restore_minutes: i64,
    pub is_active: bool,
    pub active_from: DateTime<Utc>,
    pub active_to: Option<DateTime<Utc>>,
}

/// The read/write surface the validator and applier need against
/// projection state. A production implementation backs this with
/// Diesel + Postgres (see `db`); tests back it with an in-memory
/// double so FSM and time-policy logic can be exercised without a
/// live database.
pub trait ProjectionStore {
    fn fetch_work_order(&self, work_order_id: Uuid) -> anyhow::Result<Option<WorkOrderProjection>>;
    fn upsert_work_order(&mut self, projection: WorkOrderProjection) -> anyhow::Result<()>;

    fn fetch_sla_view(&self, work_order_id: Uuid) -> anyhow::Result<Option<SlaView>>;
    fn upsert_sla_view(&mut self, view: SlaView) -> anyhow::Result<()>;

    fn append_timeline(&mut self, entry: TimelineEntry) -> anyhow::Result<()>;

    fn fetch_parts(&self, work_order_id: Uuid, part_id: Uuid) -> anyhow::Result<Option<PartsLine>>;
    fn upsert_parts(&mut self, line: PartsLine) -> anyhow::Result<()>;

    fn insert_evidence(&mut self, entry: EvidenceEntry) -> anyhow::Result<()>;

    fn upsert_engineer_board(&mut self, entry: EngineerBoardEntry) -> anyhow::Result<()>;

    fn ref_code_exists(&self, catalog: &str, code: &str) -> anyhow::Result<bool>;

    fn fetch_contract(&self, contract_id: Uuid) -> anyhow::Result<Option<Contract>>;
    fn fetch_active_contract_for_client(
        &self,
        client_id: Uuid,
        now: DateTime<Utc>,
    ) -> anyhow::Result<Option<Contract>>;
}
