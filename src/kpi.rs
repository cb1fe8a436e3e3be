//! Batch collaborator that rebuilds `kpi_daily` from the event log over
//! a date range. Not part of the transactional ingestion path — this
//! never mutates `event_store` or the live projections, and is safe to
//! run concurrently with ingestion (it only reads events and replaces
//! `kpi_daily` rows inside the requested window).

use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, Utc};
use diesel::prelude::*;
use serde_json::Value;
use uuid::Uuid;

use crate::db::{schema, Database};
use crate::fsm::SlaState;

#[derive(Default, Clone)]
struct Accumulator {
    created: Option<DateTime<Utc>>,
    started: Option<DateTime<Utc>>,
    completed: Option<DateTime<Utc>>,
    client_id: Option<Uuid>,
}

pub fn rebuild_daily(db: &Database, date_from: NaiveDate, date_to: NaiveDate) -> anyhow::Result<()> {
    use schema::event_store::dsl;

    let window_start = date_from.and_hms_opt(0, 0, 0).unwrap().and_utc();
    let window_end = date_to.and_hms_opt(23, 59, 59).unwrap().and_utc();

    db.with_connection("kpi_clear_range", move |conn| {
        diesel::delete(
            schema::kpi_daily::table
                .filter(schema::kpi_daily::day.ge(date_from))
                .filter(schema::kpi_daily::day.le(date_to)),
        )
        .execute(conn)
    })?;

    let rows: Vec<(Uuid, String, Value, DateTime<Utc>)> =
        db.with_connection("kpi_scan_events", move |conn| {
            dsl::event_store
                .filter(dsl::effective_time.ge(window_start))
                .filter(dsl::effective_time.le(window_end))
                .filter(
                    dsl::event_type
                        .eq("WORK_ORDER.CREATED")
                        .or(dsl::event_type.eq("WORK.STARTED"))
                        .or(dsl::event_type.eq("WORK.COMPLETED")),
                )
                .select((dsl::entity_id, dsl::event_type, dsl::payload, dsl::effective_time))
                .load(conn)
        })?;

    let mut per_work_order: HashMap<Uuid, Accumulator> = HashMap::new();
    for (entity_id, event_type, payload, effective_time) in rows {
        let acc = per_work_order.entry(entity_id).or_default();
        match event_type.as_str() {
            "WORK_ORDER.CREATED" => {
                acc.created = Some(effective_time);
                acc.client_id = payload
                    .get("client_id")
                    .and_then(Value::as_str)
                    .and_then(|s| s.parse().ok());
            }
            "WORK.STARTED" => acc.started = Some(effective_time),
            "WORK.COMPLETED" => acc.completed = Some(effective_time),
            _ => {}
        }
    }

    #[derive(Default)]
    struct DayClient {
        reaction_minutes: Vec<i64>,
        mttr_minutes: Vec<i64>,
        compliant: i64,
        total: i64,
    }

    let mut by_day_client: HashMap<(NaiveDate, Uuid), DayClient> = HashMap::new();
    for (work_order_id, acc) in &per_work_order {
        let Some(created) = acc.created else { continue };
        let Some(client_id) = acc.client_id else { continue };
        let day = created.date_naive();
        let entry = by_day_client.entry((day, client_id)).or_default();
        entry.total += 1;

        if let Some(started) = acc.started {
            entry.reaction_minutes.push((started - created).num_minutes());
        }
        if let (Some(started), Some(completed)) = (acc.started, acc.completed) {
            entry.mttr_minutes.push((completed - started).num_minutes());
        }

        let sla_state = db.with_connection("kpi_sla_lookup", {
            let work_order_id = *work_order_id;
            move |conn| {
                schema::sla_view::table
                    .find(work_order_id)
                    .select(schema::sla_view::state)
                    .first::<String>(conn)
                    .optional()
            }
        })?;
        let breached = sla_state
            .as_deref()
            .map(|s| s.parse::<SlaState>().ok() == Some(SlaState::BREACHED))
            .unwrap_or(false);
        if !breached {
            entry.compliant += 1;
        }
    }

    for ((day, client_id), agg) in by_day_client {
        let reaction_avg = average(&agg.reaction_minutes);
        let mttr_avg = average(&agg.mttr_minutes);
        let compliance_percent = if agg.total > 0 {
            Some(100.0 * agg.compliant as f64 / agg.total as f64)
        } else {
            None
        };

        db.with_connection("kpi_insert", move |conn| {
            diesel::insert_into(schema::kpi_daily::table)
                .values((
                    schema::kpi_daily::day.eq(day),
                    schema::kpi_daily::client_id.eq(client_id),
                    schema::kpi_daily::reaction_avg_minutes.eq(reaction_avg),
                    schema::kpi_daily::mttr_avg_minutes.eq(mttr_avg),
                    schema::kpi_daily::sla_compliance_percent.eq(compliance_percent),
                    schema::kpi_daily::work_orders_total.eq(agg.total),
                ))
                .execute(conn)
        })?;
    }

    Ok(())
}

fn average(values: &[i64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<i64>() as f64 / values.len() as f64)
}
