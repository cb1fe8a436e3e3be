//! Compiles and caches JSON Schemas for the envelope shape and each event
//! type's payload. Schemas are embedded in the binary at compile time —
//! there is no filesystem load path at runtime, only a one-time compile
//! on first use.

use std::collections::HashMap;

use jsonschema::{Draft, JSONSchema};
use once_cell::sync::OnceCell;
use serde_json::Value;
use thiserror::Error;

use crate::events::EventType;

#[derive(Debug, Error)]
pub enum Error {
    #[error("unknown event type: {0}")]
    UnknownEventType(String),
    #[error("schema did not compile: {0}")]
    Compile(String),
}

fn compile(schema_json: &str) -> Result<JSONSchema, Error> {
    let value: Value = serde_json::from_str(schema_json).expect("embedded schema is valid JSON");
    // Leaked once per process: schemas are static for the lifetime of the
    // registry, so this trades a one-time allocation for a 'static
    // compiled schema instead of a self-referential struct.
    let leaked: &'static Value = Box::leak(Box::new(value));
    JSONSchema::options()
        .with_draft(Draft::Draft202012)
        .compile(leaked)
        .map_err(|e| Error::Compile(e.to_string()))
}

macro_rules! payload_schema {
    ($path:literal) => {
        include_str!(concat!("schemas/payload/", $path))
    };
}

fn payload_schema_json(event_type: EventType) -> &'static str {
    use EventType::*;
    match event_type {
        WorkOrderCreated => payload_schema!("work_order_created.json"),
        WorkOrderAssigned => payload_schema!("work_order_assigned.json"),
        WorkOrderCancelled => payload_schema!("work_order_cancelled.json"),
        WorkOrderClosed => payload_schema!("empty.json"),
        WorkDispatched => payload_schema!("empty.json"),
        WorkArrivedOnSite => payload_schema!("empty.json"),
        WorkStarted => payload_schema!("work_started.json"),
        WorkPaused => payload_schema!("work_paused.json"),
        WorkResumed => payload_schema!("work_resumed.json"),
        WorkCompleted => payload_schema!("work_completed.json"),
        SlaAtRisk | SlaBreached | SlaRecovered | SlaBreachAccepted => payload_schema!("empty.json"),
        PartReserved | PartInstalled | PartConsumed => payload_schema!("part_event.json"),
        EvidencePhotoAdded => payload_schema!("evidence_photo.json"),
        EvidenceDocumentAdded => payload_schema!("evidence_document.json"),
        EvidenceSignatureCaptured => payload_schema!("evidence_signature.json"),
    }
}

/// Holds one compiled schema for the envelope and one per event type,
/// built lazily and cached for the process lifetime.
pub struct SchemaRegistry {
    envelope: OnceCell<JSONSchema>,
    payloads: once_cell::sync::Lazy<std::sync::Mutex<HashMap<EventType, &'static JSONSchema>>>,
}

impl Default for SchemaRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SchemaRegistry {
    pub fn new() -> Self {
        SchemaRegistry {
            envelope: OnceCell::new(),
            payloads: once_cell::sync::Lazy::new(|| std::sync::Mutex::new(HashMap::new())),
        }
    }

    fn envelope_schema(&self) -> Result<&JSONSchema, Error> {
        self.envelope
            .get_or_try_init(|| compile(include_str!("schemas/envelope.json")))
    }

    fn payload_schema(&self, event_type: EventType) -> Result<&'static JSONSchema, Error> {
        let mut cache = self.payloads.lock().expect("schema cache poisoned");
        if let Some(schema) = cache.get(&event_type) {
            return Ok(*schema);
        }
        let compiled = compile(payload_schema_json(event_type))?;
        let leaked: &'static JSONSchema = Box::leak(Box::new(compiled));
        cache.insert(event_type, leaked);
        Ok(leaked)
    }

    /// Validates a raw envelope document (before it has been parsed into
    /// typed `Envelope`). Returns sorted violation messages; empty means
    /// the envelope is well-formed.
    pub fn validate_envelope(&self, envelope: &Value) -> Result<Vec<String>, Error> {
        let schema = self.envelope_schema()?;
        let mut violations: Vec<String> = schema
            .validate(envelope)
            .map(|_| Vec::new())
            .unwrap_or_else(|errors| errors.map(|e| e.to_string()).collect());
        violations.sort();
        Ok(violations)
    }

    /// Validates a payload document against the schema registered for
    /// `event_type`.
    pub fn validate_payload(
        &self,
        event_type: EventType,
        payload: &Value,
    ) -> Result<Vec<String>, Error> {
        let schema = self.payload_schema(event_type)?;
        let mut violations: Vec<String> = schema
            .validate(payload)
            .map(|_| Vec::new())
            .unwrap_or_else(|errors| errors.map(|e| e.to_string()).collect());
        violations.sort();
        Ok(violations)
    }
}
