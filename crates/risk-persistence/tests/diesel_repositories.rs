// Pruebas sólo-SQLite: con la feature `pg` el crate apunta a Postgres y se
// omiten en tiempo de ejecución.
#![cfg(not(feature = "pg"))]

use flow::domain::{PersistResult, WorkflowState, WorkflowStatus};
use flow::errors::FlowError;
use flow::repository::WorkflowStateStore;
use risk_domain::{AuditEntry, AuditRepository, DomainError, Event, EventRepository, EventRequest, EventStatus};
use risk_governance::{ApprovalStatus, ModelApprovals, ModelRecord, ModelRegistry, PromptApprovals, PromptRecord,
                      PromptRegistry};
use risk_persistence::{new_sqlite_for_test, Database, DieselAuditRepository, DieselEventRepository, DieselRegistry,
                       DieselWorkflowStateStore};
use serde_json::json;
use uuid::Uuid;

fn temp_db() -> Database {
  let path = std::env::temp_dir().join(format!("riskflow_test_{}.db", Uuid::new_v4()));
  new_sqlite_for_test(path.to_str().expect("utf8 path")).expect("sqlite db")
}

fn event(tenant: &str, key: &str) -> Event {
  let req = EventRequest::new("risk", json!({"event_type": "standard", "risk_score": 10.0}), "v1");
  Event::accept(&req, tenant, key, "corr-1").expect("accept")
}

#[tokio::test(flavor = "multi_thread")]
async fn events_roundtrip_and_tenant_scoping() {
  let repo = DieselEventRepository::new(temp_db());
  let mut ev = event("acme", "k-1");
  repo.save(&ev).await.expect("insert");

  ev.transition_to(EventStatus::Validated).expect("transition");
  repo.save(&ev).await.expect("update");

  let found = repo.find("acme", &ev.event_id).await.expect("find").expect("present");
  assert_eq!(found.status, EventStatus::Validated);
  assert_eq!(found.payload, ev.payload);
  assert_eq!(found.payload_hash, ev.payload_hash);

  let by_key = repo.find_by_idempotency("acme", "k-1").await.expect("by key").expect("present");
  assert_eq!(by_key.event_id, ev.event_id);
  assert!(repo.find_by_idempotency("globex", "k-1").await.expect("other tenant").is_none());

  let err = repo.find("globex", &ev.event_id).await.unwrap_err();
  assert!(matches!(err, DomainError::TenantIsolation));
  assert!(repo.find("acme", &Uuid::new_v4()).await.expect("missing").is_none());
}

#[tokio::test(flavor = "multi_thread")]
async fn second_event_with_same_key_is_rejected() {
  let repo = DieselEventRepository::new(temp_db());
  repo.save(&event("acme", "dup")).await.expect("first");
  let err = repo.save(&event("acme", "dup")).await.unwrap_err();
  assert!(matches!(err, DomainError::IdempotencyConflict(_)));
  // La misma clave en otro tenant es independiente.
  repo.save(&event("globex", "dup")).await.expect("other tenant");
}

#[tokio::test(flavor = "multi_thread")]
async fn audit_is_append_only_insert() {
  let db = temp_db();
  let repo = DieselAuditRepository::new(db);
  for action in ["EVENT_ACCEPTED", "STATUS_CHANGED"] {
    let rec = AuditEntry::new("system", action, "event", "evt-1", "corr-1", "acme").with_metadata(json!({"n": 1}))
                                                                                   .into_record();
    repo.append(&rec).await.expect("append");
  }
  let rows = repo.list_for_tenant("acme").await.expect("list");
  assert_eq!(rows.len(), 2);
  assert!(repo.list_for_tenant("globex").await.expect("list").is_empty());
  repo.ping().await.expect("ping");
}

#[tokio::test(flavor = "multi_thread")]
async fn workflow_state_uses_optimistic_versions() {
  let store = DieselWorkflowStateStore::new(temp_db());
  let mut st = WorkflowState::new(Uuid::new_v4(), "acme", "corr-1", "risk", json!({"payload": {}}));

  assert_eq!(store.put(&st).await.expect("insert"), PersistResult::Ok { new_version: 1 });
  // Escribir de nuevo con la versión vieja es un conflicto.
  assert_eq!(store.put(&st).await.expect("stale"), PersistResult::Conflict);

  st.version = 1;
  st.record_node("retrieval", json!({"output": {"source": "payload"}}));
  st.record_node("policy", json!({"output": {"result": "PASS"}}));
  assert_eq!(store.put(&st).await.expect("update"), PersistResult::Ok { new_version: 2 });

  let loaded = store.get("acme", &st.event_id).await.expect("get").expect("state");
  assert_eq!(loaded.version, 2);
  assert_eq!(loaded.node_cursor, 2);
  let keys: Vec<&str> = loaded.node_outputs.keys().map(|k| k.as_str()).collect();
  assert_eq!(keys, vec!["retrieval", "policy"]);
  assert_eq!(loaded.status, WorkflowStatus::Processing);

  assert!(matches!(store.get("globex", &st.event_id).await, Err(FlowError::TenantIsolation)));
}

#[tokio::test(flavor = "multi_thread")]
async fn registry_latest_is_last_registered() {
  let reg = DieselRegistry::new(temp_db());
  ModelApprovals::register(&reg, ModelRecord::new("risk-model", "v10", b"a")).await.expect("v10");
  ModelApprovals::register(&reg, ModelRecord::new("risk-model", "v2", b"b")).await.expect("v2");
  ModelApprovals::approve(&reg, "risk-model", "v10", "reviewer").await.expect("approve");

  let latest = ModelRegistry::get_latest(&reg, "risk-model").await.expect("latest").expect("present");
  assert_eq!(latest.version, "v2");
  assert_eq!(latest.approval_status, ApprovalStatus::Pending);

  let v10 = ModelRegistry::get(&reg, "risk-model", "v10").await.expect("get").expect("present");
  assert!(v10.is_approved());
  assert_eq!(v10.approved_by.as_deref(), Some("reviewer"));
  assert!(v10.verify_artifact(b"a"));

  assert!(ModelApprovals::register(&reg, ModelRecord::new("risk-model", "v2", b"b")).await.is_err());

  PromptApprovals::register(&reg, PromptRecord::new("risk-prompt", "v1", "Evalua {payload}")).await.expect("prompt");
  PromptApprovals::reject(&reg, "risk-prompt", "v1", "reviewer").await.expect("reject");
  let p = PromptRegistry::get_latest(&reg, "risk-prompt").await.expect("latest").expect("present");
  assert_eq!(p.approval_status, ApprovalStatus::Rejected);
}
