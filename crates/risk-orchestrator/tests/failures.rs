mod common;

use async_trait::async_trait;
use common::{harness, harness_with, risk_request, standard_request, test_config};
use flow::repository::WorkflowStateStore;
use risk_audit::{actions, FailureCategory};
use risk_domain::{ErrorKind, EventRepository, EventRequest, EventStatus};
use risk_governance::{ModelApprovals, ModelRecord};
use risk_orchestrator::{idempotency_cache_key, OrchestratorError, PublishError};
use risk_resilience::{CircuitState, SharedStore};
use risk_workflow::nodes::RetrievalOutput;
use risk_workflow::{NoopWorkflowTrigger, RiskScorer, WorkflowError, WorkflowServices, RISK_SCORER};
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Falla la primera llamada con un error transitorio.
#[derive(Default)]
struct FlakyScorer {
  calls: AtomicUsize,
}

#[async_trait]
impl RiskScorer for FlakyScorer {
  async fn score(&self, _ctx: &RetrievalOutput, _model_version: &str) -> Result<f64, WorkflowError> {
    if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
      return Err(WorkflowError::node("scoring", "scorer no disponible", ErrorKind::Infrastructure));
    }
    Ok(20.0)
  }
}

#[tokio::test]
async fn publish_failure_leaves_event_received_and_retry_completes() {
  let h = harness().await;
  h.publisher.fail_next(1);

  let err = h.orchestrator
             .create_event(&standard_request(), "key-pub", "acme", "corr-1")
             .await
             .unwrap_err();
  assert!(matches!(err, OrchestratorError::Publish(PublishError::Unavailable(_))));
  assert!(err.is_retriable());

  let stored = h.events
                .find_by_idempotency("acme", "key-pub")
                .await
                .expect("find")
                .expect("persisted");
  assert_eq!(stored.status, EventStatus::Received);
  let cached = h.ctx.shared.get(&idempotency_cache_key("acme", "key-pub")).await.expect("get");
  assert!(cached.is_none());

  let resp = h.orchestrator
              .create_event(&standard_request(), "key-pub", "acme", "corr-1")
              .await
              .expect("retry");
  assert_eq!(resp.event_id, stored.event_id);
  assert_eq!(resp.status, EventStatus::Approved);
  assert_eq!(h.events.len().await, 1);
  assert_eq!(h.publisher.count().await, 1);
}

#[tokio::test]
async fn pending_latest_model_fails_the_workflow_not_the_acceptance() {
  let h = harness().await;
  h.models
   .register(ModelRecord::new("risk-model", "v2", b"v2"))
   .await
   .expect("register pending");

  let resp = h.orchestrator
              .create_event(&standard_request(), "key-gov", "acme", "corr-gov")
              .await
              .expect("accepted");
  assert_eq!(resp.status, EventStatus::Failed);

  let violations = h.audit.records_with_action(actions::GOVERNANCE_VIOLATION).await;
  assert_eq!(violations.len(), 1);
  assert_eq!(violations[0].resource_id, "risk-model");

  let failed = h.audit.records_with_action(actions::WORKFLOW_FAILED).await;
  assert_eq!(failed.len(), 1);
  let meta = failed[0].metadata.clone().expect("metadata");
  assert_eq!(meta["category"], json!(FailureCategory::PolicyViolation));
  assert_eq!(meta["retriable"], json!(false));
  assert_eq!(h.ctx.classifier.failure_count(FailureCategory::PolicyViolation), 1);

  // Aprobar después no reabre un evento terminal.
  ModelApprovals::approve(h.models.as_ref(), "risk-model", "v2", "reviewer").await.expect("approve");
  let again = h.orchestrator.resume_event("acme", &resp.event_id).await.expect("resume");
  assert_eq!(again.status, EventStatus::Failed);
}

#[tokio::test]
async fn transient_node_failure_is_resumed_at_the_cursor() {
  let scorer = Arc::new(FlakyScorer::default());
  let services = WorkflowServices { scorer: scorer.clone(),
                                    ..WorkflowServices::default() };
  let h = harness_with(test_config(), move |b| b.with_services(services)).await;

  let resp = h.orchestrator
              .create_event(&standard_request(), "key-flaky", "acme", "corr-1")
              .await
              .expect("accepted");
  assert_eq!(resp.status, EventStatus::Processing);
  let failed = h.audit.records_with_action(actions::WORKFLOW_FAILED).await;
  assert_eq!(failed.len(), 1);
  assert_eq!(failed[0].metadata.clone().expect("metadata")["category"], json!(FailureCategory::InfraError));

  let state = h.ctx
               .states
               .get("acme", &resp.event_id)
               .await
               .expect("get")
               .expect("state");
  assert_eq!(state.node_cursor, 2);

  let resumed = h.orchestrator.resume_event("acme", &resp.event_id).await.expect("resume");
  assert_eq!(resumed.status, EventStatus::Approved);
  assert_eq!(scorer.calls.load(Ordering::SeqCst), 2);
  let event = h.orchestrator.get_event("acme", &resp.event_id).await.expect("get");
  assert_eq!(event.status, EventStatus::Approved);
}

#[tokio::test]
async fn other_tenant_gets_a_generic_denial() {
  let h = harness().await;
  let resp = h.orchestrator
              .create_event(&standard_request(), "key-iso", "acme", "corr-1")
              .await
              .expect("create");

  let err = h.orchestrator.get_event("globex", &resp.event_id).await.unwrap_err();
  assert_eq!(err.kind(), ErrorKind::TenantIsolation);
  assert_eq!(err.to_string(), "Acceso denegado");

  let err = h.orchestrator.resume_event("globex", &resp.event_id).await.unwrap_err();
  assert_eq!(err.kind(), ErrorKind::TenantIsolation);

  let own = h.orchestrator.get_event("acme", &resp.event_id).await.expect("own event");
  assert_eq!(own.tenant_id, "acme");
}

#[tokio::test]
async fn high_risk_event_is_rejected_pending_review() {
  let h = harness().await;
  let resp = h.orchestrator
              .create_event(&risk_request(json!({"event_type": "high_risk"})), "key-high", "acme", "corr-1")
              .await
              .expect("create");
  assert_eq!(resp.status, EventStatus::Rejected);
  assert_eq!(h.audit.records_with_action(actions::ESCALATION_REQUESTED).await.len(), 1);

  let transitions: Vec<_> = h.audit
                             .records_with_action(actions::STATUS_CHANGED)
                             .await
                             .into_iter()
                             .map(|r| r.new_state.expect("new state"))
                             .collect();
  assert_eq!(transitions, vec![json!("validated"), json!("processing"), json!("rejected")]);
}

#[tokio::test]
async fn noop_trigger_leaves_event_processing() {
  let h = harness_with(test_config(), |b| b.with_trigger(Arc::new(NoopWorkflowTrigger))).await;
  let resp = h.orchestrator
              .create_event(&standard_request(), "key-noop", "acme", "corr-1")
              .await
              .expect("create");
  assert_eq!(resp.status, EventStatus::Processing);
  assert!(h.audit.records_with_action(actions::WORKFLOW_FAILED).await.is_empty());
}

#[tokio::test]
async fn out_of_range_scores_from_one_tenant_do_not_block_others() {
  let h = harness().await;
  for i in 0..5 {
    let req = EventRequest::new("compliance", json!({"regulation_ref": "GDPR-17", "risk_score": 150}), "v1");
    let err = h.orchestrator
               .create_event(&req, &format!("bad-{}", i), "globex", "c")
               .await
               .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::RiskThresholdViolation);
    assert!(!err.is_retriable());
  }

  let resp = h.orchestrator
              .create_event(&standard_request(), "good", "acme", "c")
              .await
              .expect("valid event");
  assert_eq!(resp.status, EventStatus::Approved);
  let states = h.ctx.guards.breaker_states().await;
  let scorer = states.iter().find(|(dep, _)| dep == RISK_SCORER).expect("scorer breaker");
  assert_eq!(scorer.1.clone().expect("state"), CircuitState::Closed);
}
