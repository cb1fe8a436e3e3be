//! Append-only event log with idempotency keys.
//!
//! The idempotency invariant is resolved by letting the database's
//! unique index fail and recovering from that failure — never by a
//! pre-read check, which would race two concurrent submissions of the
//! same key. On a unique-constraint collision the insert is rolled back
//! to a savepoint and the prior `event_id` is looked up and returned.

use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::events::NormalizedEvent;

#[derive(Debug, Error)]
pub enum Error {
    #[error("storage error: {0}")]
    Storage(#[from] anyhow::Error),
    #[error("event {0} not found")]
    NotFound(Uuid),
}

#[derive(Debug, Clone)]
pub struct StoredEvent {
    pub event_id: Uuid,
    pub entity_id: Uuid,
    pub event_type: String,
    pub payload: serde_json::Value,
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

/// Backing storage for the event log. A Diesel/Postgres implementation
/// lives in `db`; an in-memory implementation backs tests.
pub trait EventStore {
    /// Appends `event`, returning `(event_id, duplicate)`. `duplicate` is
    /// true when an event with the same idempotency key had already been
    /// appended, in which case the returned `event_id` is the prior
    /// event's id and no new row was written.
    fn append(&mut self, event: &NormalizedEvent) -> Result<(Uuid, bool), Error>;

    fn fetch_by_id(&self, event_id: Uuid) -> Result<StoredEvent, Error>;
}

/// Computes the idempotency key an event should be deduplicated on:
/// `client_event_id` takes priority over `idempotency_key`. Events with
/// neither set are never deduplicated (each submission is distinct).
pub fn dedup_key(event: &NormalizedEvent) -> Option<&str> {
    event
        .envelope
        .client_event_id
        .as_deref()
        .or(event.envelope.idempotency_key.as_deref())
}
