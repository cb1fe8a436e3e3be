//! Event-ingestion and validation core of a field-service work-order
//! platform: schema/RBAC/time/catalog/FSM validation, an idempotent
//! event store, and the projection applier that derives read models and
//! SLA deadlines from the event stream.

#[macro_use]
extern crate diesel;

pub mod applier;
pub mod catalog;
pub mod clock;
pub mod config;
pub mod db;
pub mod event_store;
pub mod events;
pub mod fsm;
pub mod kpi;
pub mod logging;
pub mod metrics;
pub mod orchestrator;
pub mod projections;
pub mod reason;
pub mod schema_registry;
pub mod shutdown;
pub mod validator;

#[cfg(test)]
mod testutil;
