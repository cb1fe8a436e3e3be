//! Event envelope and payload types flowing through the ingestion core.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use strum_macros::{AsRefStr, EnumString};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, AsRefStr, EnumString)]
pub enum Role {
    DISPATCHER,
    ENGINEER,
    MANAGER,
    ADMIN,
    SYSTEM,
}

#[derive(Debug, Clone)]
pub struct Actor {
    pub role: Role,
    pub actor_id: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, AsRefStr, EnumString)]
pub enum EventType {
    #[strum(serialize = "WORK_ORDER.CREATED")]
    #[serde(rename = "WORK_ORDER.CREATED")]
    WorkOrderCreated,
    #[strum(serialize = "WORK_ORDER.ASSIGNED")]
    #[serde(rename = "WORK_ORDER.ASSIGNED")]
    WorkOrderAssigned,
    #[strum(serialize = "WORK_ORDER.CANCELLED")]
    #[serde(rename = "WORK_ORDER.CANCELLED")]
    WorkOrderCancelled,
    #[strum(serialize = "WORK_ORDER.CLOSED")]
    #[serde(rename = "WORK_ORDER.CLOSED")]
    WorkOrderClosed,
    #[strum(serialize = "WORK.DISPATCHED")]
    #[serde(rename = "WORK.DISPATCHED")]
    WorkDispatched,
    #[strum(serialize = "WORK.ARRIVED_ON_SITE")]
    #[serde(rename = "WORK.ARRIVED_ON_SITE")]
    WorkArrivedOnSite,
    #[strum(serialize = "WORK.STARTED")]
    #[serde(rename = "WORK.STARTED")]
    WorkStarted,
    #[strum(serialize = "WORK.PAUSED")]
    #[serde(rename = "WORK.PAUSED")]
    WorkPaused,
    #[strum(serialize = "WORK.RESUMED")]
    #[serde(rename = "WORK.RESUMED")]
    WorkResumed,
    #[strum(serialize = "WORK.COMPLETED")]
    #[serde(rename = "WORK.COMPLETED")]
    WorkCompleted,
    #[strum(serialize = "SLA.AT_RISK")]
    #[serde(rename = "SLA.AT_RISK")]
    SlaAtRisk,
    #[strum(serialize = "SLA.BREACHED")]
    #[serde(rename = "SLA.BREACHED")]
    SlaBreached,
    #[strum(serialize = "SLA.RECOVERED")]
    #[serde(rename = "SLA.RECOVERED")]
    SlaRecovered,
    #[strum(serialize = "SLA.BREACH_ACCEPTED")]
    #[serde(rename = "SLA.BREACH_ACCEPTED")]
    SlaBreachAccepted,
    #[strum(serialize = "PART.RESERVED")]
    #[serde(rename = "PART.RESERVED")]
    PartReserved,
    #[strum(serialize = "PART.INSTALLED")]
    #[serde(rename = "PART.INSTALLED")]
    PartInstalled,
    #[strum(serialize = "PART.CONSUMED")]
    #[serde(rename = "PART.CONSUMED")]
    PartConsumed,
    #[strum(serialize = "EVIDENCE.PHOTO_ADDED")]
    #[serde(rename = "EVIDENCE.PHOTO_ADDED")]
    EvidencePhotoAdded,
    #[strum(serialize = "EVIDENCE.DOCUMENT_ADDED")]
    #[serde(rename = "EVIDENCE.DOCUMENT_ADDED")]
    EvidenceDocumentAdded,
    #[strum(serialize = "EVIDENCE.SIGNATURE_CAPTURED")]
    #[serde(rename = "EVIDENCE.SIGNATURE_CAPTURED")]
    EvidenceSignatureCaptured,
}

impl EventType {
    pub fn as_wire(&self) -> &'static str {
        match self {
            EventType::WorkOrderCreated => "WORK_ORDER.CREATED",
            EventType::WorkOrderAssigned => "WORK_ORDER.ASSIGNED",
            EventType::WorkOrderCancelled => "WORK_ORDER.CANCELLED",
            EventType::WorkOrderClosed => "WORK_ORDER.CLOSED",
            EventType::WorkDispatched => "WORK.DISPATCHED",
            EventType::WorkArrivedOnSite => "WORK.ARRIVED_ON_SITE",
            EventType::WorkStarted => "WORK.STARTED",
            EventType::WorkPaused => "WORK.PAUSED",
            EventType::WorkResumed => "WORK.RESUMED",
            EventType::WorkCompleted => "WORK.COMPLETED",
            EventType::SlaAtRisk => "SLA.AT_RISK",
            EventType::SlaBreached => "SLA.BREACHED",
            EventType::SlaRecovered => "SLA.RECOVERED",
            EventType::SlaBreachAccepted => "SLA.BREACH_ACCEPTED",
            EventType::PartReserved => "PART.RESERVED",
            EventType::PartInstalled => "PART.INSTALLED",
            EventType::PartConsumed => "PART.CONSUMED",
            EventType::EvidencePhotoAdded => "EVIDENCE.PHOTO_ADDED",
            EventType::EvidenceDocumentAdded => "EVIDENCE.DOCUMENT_ADDED",
            EventType::EvidenceSignatureCaptured => "EVIDENCE.SIGNATURE_CAPTURED",
        }
    }

    pub fn is_part_event(&self) -> bool {
        matches!(
            self,
            EventType::PartReserved | EventType::PartInstalled | EventType::PartConsumed
        )
    }

    pub fn is_evidence_event(&self) -> bool {
        matches!(
            self,
            EventType::EvidencePhotoAdded
                | EventType::EvidenceDocumentAdded
                | EventType::EvidenceSignatureCaptured
        )
    }

    pub fn is_sla_event(&self) -> bool {
        matches!(
            self,
            EventType::SlaAtRisk
                | EventType::SlaBreached
                | EventType::SlaRecovered
                | EventType::SlaBreachAccepted
        )
    }
}

/// The envelope as it arrives from a caller, before normalization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    pub event_type: EventType,
    pub entity_type: String,
    pub entity_id: Uuid,
    pub source: String,
    #[serde(default)]
    pub client_event_id: Option<String>,
    #[serde(default)]
    pub idempotency_key: Option<String>,
    #[serde(default)]
    pub created_at_reported: Option<DateTime<Utc>>,
    #[serde(default)]
    pub correlation_id: Option<Uuid>,
    #[serde(default)]
    pub causation_id: Option<Uuid>,
    #[serde(default)]
    pub schema_version: Option<String>,
    #[serde(default)]
    pub payload: Map<String, Value>,
}

/// An envelope after the validator has normalized its time fields and
/// resolved an effective timestamp. This is what gets appended to the
/// event store and handed to the applier.
#[derive(Debug, Clone)]
pub struct NormalizedEvent {
    pub envelope: Envelope,
    pub effective_time: DateTime<Utc>,
    pub created_by: Option<String>,
}

impl NormalizedEvent {
    pub fn payload_str(&self, key: &str) -> Option<&str> {
        self.envelope.payload.get(key).and_then(Value::as_str)
    }

    pub fn payload_f64(&self, key: &str) -> Option<f64> {
        self.envelope.payload.get(key).and_then(Value::as_f64)
    }
}
