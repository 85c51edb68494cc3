use risk_domain::{AuditEntry, AuditRepository, DomainError, Event, EventRepository, EventRequest, InMemoryAuditRepository,
                  InMemoryEventRepository};
use serde_json::json;

fn event_for(tenant: &str, key: &str) -> Event {
  let req = EventRequest::new("risk", json!({"event_type": "standard"}), "v1");
  Event::accept(&req, tenant, key, "corr").expect("accept")
}

#[tokio::test]
async fn cross_tenant_find_is_denied() {
  let repo = InMemoryEventRepository::new();
  let ev = event_for("globex", "k-1");
  repo.save(&ev).await.expect("save");

  let own = repo.find("globex", &ev.event_id).await.expect("find own");
  assert_eq!(own.map(|e| e.event_id), Some(ev.event_id));

  let err = repo.find("acme", &ev.event_id).await.unwrap_err();
  assert!(matches!(err, DomainError::TenantIsolation));
  assert!(!err.to_string().contains("globex"));
}

#[tokio::test]
async fn idempotency_key_is_unique_per_tenant() {
  let repo = InMemoryEventRepository::new();
  repo.save(&event_for("acme", "dup")).await.expect("first");
  let err = repo.save(&event_for("acme", "dup")).await.unwrap_err();
  assert!(matches!(err, DomainError::IdempotencyConflict(_)));
  // La misma clave en otro tenant es independiente.
  repo.save(&event_for("globex", "dup")).await.expect("other tenant");
  assert_eq!(repo.len().await, 2);

  let found = repo.find_by_idempotency("acme", "dup").await.expect("lookup");
  assert!(found.is_some());
  assert!(repo.find_by_idempotency("acme", "missing").await.expect("lookup").is_none());
}

#[tokio::test]
async fn save_upserts_same_event() {
  let repo = InMemoryEventRepository::new();
  let mut ev = event_for("acme", "k");
  repo.save(&ev).await.expect("save");
  ev.transition_to(risk_domain::EventStatus::Validated).expect("transition");
  repo.save(&ev).await.expect("upsert");
  let stored = repo.find("acme", &ev.event_id).await.expect("find").expect("some");
  assert_eq!(stored.status, risk_domain::EventStatus::Validated);
  assert_eq!(repo.len().await, 1);
}

#[tokio::test]
async fn audit_is_append_only() {
  let repo = InMemoryAuditRepository::new();
  let rec = AuditEntry::new("system", "EVENT_ACCEPTED", "event", "e-1", "corr", "acme").with_reason("ok")
                                                                                     .into_record();
  repo.append(&rec).await.expect("append");
  repo.append(&rec).await.expect("append again");
  assert_eq!(repo.records().await.len(), 2);
  assert_eq!(repo.records_with_action("EVENT_ACCEPTED").await.len(), 2);
}
