// Esquema Diesel compartido por SQLite y Postgres.
// Las marcas de tiempo se guardan como milisegundos UTC y el JSON como texto.
use diesel::allow_tables_to_appear_in_same_query;
diesel::table! {
    events (event_id) {
        event_id -> Text,
        tenant_id -> Text,
        correlation_id -> Text,
        idempotency_key -> Text,
        event_type -> Text,
        payload -> Text,
        payload_hash -> Text,
        version -> Text,
        status -> Text,
        created_at_ms -> BigInt,
        updated_at_ms -> BigInt,
    }
}
diesel::table! {
    audit_logs (id) {
        id -> Text,
        actor -> Text,
        action -> Text,
        resource_type -> Text,
        resource_id -> Text,
        previous_state -> Nullable<Text>,
        new_state -> Nullable<Text>,
        reason -> Nullable<Text>,
        metadata -> Nullable<Text>,
        correlation_id -> Text,
        tenant_id -> Text,
        created_at_ms -> BigInt,
    }
}
diesel::table! {
    workflow_states (event_id) {
        event_id -> Text,
        tenant_id -> Text,
        correlation_id -> Text,
        workflow_type -> Text,
        raw_event -> Text,
        node_cursor -> BigInt,
        node_outputs -> Text,
        resolved_model_version -> Nullable<Text>,
        resolved_prompt_version -> Nullable<Text>,
        status -> Text,
        failure_reason -> Nullable<Text>,
        version -> BigInt,
        created_at_ms -> BigInt,
        updated_at_ms -> BigInt,
    }
}
diesel::table! {
    model_records (name, version) {
        name -> Text,
        version -> Text,
        approval_status -> Text,
        approved_by -> Nullable<Text>,
        approved_at_ms -> Nullable<BigInt>,
        checksum -> Text,
        registered_seq -> BigInt,
        registered_at_ms -> BigInt,
    }
}
diesel::table! {
    prompt_records (prompt_id, version) {
        prompt_id -> Text,
        version -> Text,
        approval_status -> Text,
        approved_by -> Nullable<Text>,
        approved_at_ms -> Nullable<BigInt>,
        template -> Text,
        registered_seq -> BigInt,
        registered_at_ms -> BigInt,
    }
}
diesel::table! {
    shared_kv (key) {
        key -> Text,
        value -> Text,
        expires_at_ms -> Nullable<BigInt>,
    }
}
diesel::table! {
    rate_windows (id) {
        id -> Text,
        window_key -> Text,
        hit_at_ms -> BigInt,
    }
}
allow_tables_to_appear_in_same_query!(events, audit_logs, workflow_states, model_records, prompt_records, shared_kv,
                                      rate_windows);
