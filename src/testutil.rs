//! In-memory `EventStore` + `ProjectionStore` double used by tests. No
//! live Postgres required to exercise validator/applier/orchestrator
//! logic, mirroring the teacher's acknowledgment (its `#[ignore]`d
//! `test_db`) that DB-backed tests need a live instance — this crate's
//! own persistence trait split lets the rest of the suite run without one.

#![cfg(test)]

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::event_store::{self, EventStore, StoredEvent};
use crate::events::NormalizedEvent;
use crate::projections::{
    Contract, EngineerBoardEntry, EvidenceEntry, PartsLine, ProjectionStore, RefCatalogItem,
    SlaView, TimelineEntry, WorkOrderProjection,
};

fn stored_event(event_id: Uuid, event: &NormalizedEvent) -> StoredEvent {
    StoredEvent {
        event_id,
        entity_id: event.envelope.entity_id,
        event_type: event.envelope.event_type.as_wire().to_string(),
        payload: serde_json::Value::Object(event.envelope.payload.clone()),
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

#[derive(Default)]
pub struct MemoryBackend {
    events: Vec<StoredEvent>,
    dup_index: HashMap<(Uuid, String), Uuid>,
    work_orders: HashMap<Uuid, WorkOrderProjection>,
    sla_views: HashMap<Uuid, SlaView>,
    pub timeline: Vec<TimelineEntry>,
    parts: HashMap<(Uuid, Uuid), PartsLine>,
    pub evidence: Vec<EvidenceEntry>,
    pub engineer_board: HashMap<Uuid, EngineerBoardEntry>,
    active_codes: HashMap<(String, String), bool>,
    contracts: HashMap<Uuid, Contract>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed_active_code(&mut self, catalog: &str, code: &str) {
        self.active_codes
            .insert((catalog.to_string(), code.to_string()), true);
    }

    pub fn seed_contract(&mut self, contract: Contract) {
        self.contracts.insert(contract.contract_id, contract);
    }

    pub fn work_order(&self, work_order_id: Uuid) -> Option<&WorkOrderProjection> {
        self.work_orders.get(&work_order_id)
    }

    pub fn sla_view(&self, work_order_id: Uuid) -> Option<&SlaView> {
        self.sla_views.get(&work_order_id)
    }

    #[allow(dead_code)]
    pub fn seed_ref_item(&mut self, item: RefCatalogItem) {
        self.active_codes
            .insert((item.catalog, item.code), item.is_active);
    }
}

impl EventStore for MemoryBackend {
    fn append(&mut self, event: &NormalizedEvent) -> Result<(Uuid, bool), event_store::Error> {
        if let Some(key) = event_store::dedup_key(event) {
            let dedup_key = (event.envelope.entity_id, key.to_string());
            if let Some(existing) = self.dup_index.get(&dedup_key) {
                return Ok((*existing, true));
            }
            let event_id = Uuid::new_v4();
            self.dup_index.insert(dedup_key, event_id);
            self.events.push(stored_event(event_id, event));
            return Ok((event_id, false));
        }

        let event_id = Uuid::new_v4();
        self.events.push(stored_event(event_id, event));
        Ok((event_id, false))
    }

    fn fetch_by_id(&self, event_id: Uuid) -> Result<StoredEvent, event_store::Error> {
        self.events
            .iter()
            .find(|e| e.event_id == event_id)
            .cloned()
            .ok_or(event_store::Error::NotFound(event_id))
    }
}

impl ProjectionStore for MemoryBackend {
    fn fetch_work_order(&self, work_order_id: Uuid) -> anyhow::Result<Option<WorkOrderProjection>> {
        Ok(self.work_orders.get(&work_order_id).cloned())
    }

    fn upsert_work_order(&mut self, projection: WorkOrderProjection) -> anyhow::Result<()> {
        self.work_orders.insert(projection.work_order_id, projection);
        Ok(())
    }

    fn fetch_sla_view(&self, work_order_id: Uuid) -> anyhow::Result<Option<SlaView>> {
        Ok(self.sla_views.get(&work_order_id).cloned())
    }

    fn upsert_sla_view(&mut self, view: SlaView) -> anyhow::Result<()> {
        self.sla_views.insert(view.work_order_id, view);
        Ok(())
    }

    fn append_timeline(&mut self, entry: TimelineEntry) -> anyhow::Result<()> {
        self.timeline.push(entry);
        Ok(())
    }

    fn fetch_parts(&self, work_order_id: Uuid, part_id: Uuid) -> anyhow::Result<Option<PartsLine>> {
        Ok(self.parts.get(&(work_order_id, part_id)).cloned())
    }

    fn upsert_parts(&mut self, line: PartsLine) -> anyhow::Result<()> {
        self.parts.insert((line.work_order_id, line.part_id), line);
        Ok(())
    }

    fn insert_evidence(&mut self, entry: EvidenceEntry) -> anyhow::Result<()> {
        self.evidence.push(entry);
        Ok(())
    }

    fn upsert_engineer_board(&mut self, entry: EngineerBoardEntry) -> anyhow::Result<()> {
        self.engineer_board.insert(entry.engineer_id, entry);
        Ok(())
    }

    fn ref_code_exists(&self, catalog: &str, code: &str) -> anyhow::Result<bool> {
        Ok(self
            .active_codes
            .get(&(catalog.to_string(), code.to_string()))
            .copied()
            .unwrap_or(false))
    }

    fn fetch_contract(&self, contract_id: Uuid) -> anyhow::Result<Option<Contract>> {
        Ok(self.contracts.get(&contract_id).cloned())
    }

    fn fetch_active_contract_for_client(
        &self,
        client_id: Uuid,
        now: DateTime<Utc>,
    ) -> anyhow::Result<Option<Contract>> {
        Ok(self
            .contracts
            .values()
            .find(|c| {
                c.client_id == client_id
                    && c.is_active
                    && c.active_from <= now
                    && c.active_to.map(|to| to >= now).unwrap_or(true)
            })
            .cloned())
    }
}
