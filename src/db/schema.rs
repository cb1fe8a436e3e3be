// Diesel table declarations for the persisted event-ingestion schema.
// DDL is managed out-of-band; these declarations are hand-kept in sync
// with it rather than generated by `diesel print-schema`.

diesel::table! {
    use diesel::sql_types::*;

    event_store (event_id) {
        event_id -> Uuid,
        entity_id -> Uuid,
        event_type -> Text,
        payload -> Jsonb,
        source -> Text,
        client_event_id -> Nullable<Text>,
        idempotency_key -> Nullable<Text>,
        correlation_id -> Nullable<Uuid>,
        causation_id -> Nullable<Uuid>,
        schema_version -> Nullable<Text>,
        effective_time -> Timestamptz,
        created_at_system -> Timestamptz,
        created_by -> Nullable<Text>,
    }
}

diesel::table! {
    use diesel::sql_types::*;

    work_orders_current (work_order_id) {
        work_order_id -> Uuid,
        client_id -> Uuid,
        asset_id -> Uuid,
        priority -> Text,
        work_type -> Text,
        description -> Text,
        business_state -> Text,
        execution_state -> Text,
        sla_state -> Text,
        assigned_engineer_id -> Nullable<Uuid>,
        assigned_team -> Nullable<Text>,
        scheduled_start -> Nullable<Timestamptz>,
        scheduled_end -> Nullable<Timestamptz>,
        actual_start_effective -> Nullable<Timestamptz>,
        actual_end_effective -> Nullable<Timestamptz>,
        downtime_minutes -> Nullable<BigInt>,
        contract_id -> Nullable<Uuid>,
        created_at_system -> Timestamptz,
        version -> BigInt,
        last_event_id -> Nullable<Uuid>,
        last_event_at -> Nullable<Timestamptz>,
    }
}

diesel::table! {
    use diesel::sql_types::*;

    work_order_timeline (event_id) {
        event_id -> Uuid,
        work_order_id -> Uuid,
        event_type -> Text,
        created_at_system -> Timestamptz,
        created_by -> Nullable<Text>,
        payload -> Jsonb,
    }
}

diesel::table! {
    use diesel::sql_types::*;

    work_order_parts (work_order_id, part_id) {
        work_order_id -> Uuid,
        part_id -> Uuid,
        reserved_qty -> Double,
        installed_qty -> Double,
        consumed_qty -> Double,
        last_event_at -> Nullable<Timestamptz>,
    }
}

diesel::table! {
    use diesel::sql_types::*;

    work_order_evidence (evidence_id) {
        evidence_id -> Uuid,
        work_order_id -> Uuid,
        evidence_type -> Text,
        url -> Text,
        meta -> Jsonb,
        created_at -> Timestamptz,
        created_by -> Nullable<Text>,
    }
}

diesel::table! {
    use diesel::sql_types::*;

    engineer_board (engineer_id) {
        engineer_id -> Uuid,
        status -> Text,
        current_work_order_id -> Nullable<Uuid>,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    use diesel::sql_types::*;

    sla_view (work_order_id) {
        work_order_id -> Uuid,
        state -> Text,
        reaction_deadline -> Nullable<Timestamptz>,
        restore_deadline -> Nullable<Timestamptz>,
        breached_at -> Nullable<Timestamptz>,
    }
}

diesel::table! {
    use diesel::sql_types::*;

    ref_catalog_items (catalog, code) {
        catalog -> Text,
        code -> Text,
        title -> Text,
        description -> Nullable<Text>,
        is_active -> Bool,
        sort_order -> Integer,
        meta -> Jsonb,
    }
}

diesel::table! {
    use diesel::sql_types::*;

    contracts (contract_id) {
        contract_id -> Uuid,
        client_id -> Uuid,
        contract_type -> Text,
        reaction_minutes -> BigInt,
        restore_minutes -> BigInt,
        is_active -> Bool,
        active_from -> Timestamptz,
        active_to -> Nullable<Timestamptz>,
    }
}

diesel::table! {
    use diesel::sql_types::*;

    kpi_daily (day, client_id) {
        day -> Date,
        client_id -> Uuid,
        reaction_avg_minutes -> Nullable<Double>,
        mttr_avg_minutes -> Nullable<Double>,
        sla_compliance_percent -> Nullable<Double>,
        work_orders_total -> BigInt,
    }
}
