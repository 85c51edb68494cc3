mod common;

use async_trait::async_trait;
use common::{approved_registries, breaker_after, harness, harness_with, state_for};
use flow::domain::WorkflowStatus;
use flow::repository::WorkflowStateStore;
use risk_audit::actions;
use risk_domain::ErrorKind;
use risk_governance::{ModelApprovals, ModelRecord};
use risk_resilience::{CircuitBreakerConfig, CircuitState, ResilienceError};
use risk_workflow::nodes::RetrievalOutput;
use risk_workflow::{ContextSource, PayloadContextSource, RiskScorer, WorkflowError, WorkflowServices, WorkflowTrigger,
                    GOVERNANCE_VIOLATION};
use serde_json::{json, Value as JsonValue};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Cuenta las llamadas a la fuente de contexto.
#[derive(Default)]
struct CountingSource {
  calls: AtomicUsize,
}

#[async_trait]
impl ContextSource for CountingSource {
  async fn fetch(&self, payload: &JsonValue) -> Result<RetrievalOutput, WorkflowError> {
    self.calls.fetch_add(1, Ordering::SeqCst);
    PayloadContextSource.fetch(payload).await
  }
}

/// Falla las primeras `failures` llamadas con un error transitorio.
struct FlakyScorer {
  failures: usize,
  calls: AtomicUsize,
}

#[async_trait]
impl RiskScorer for FlakyScorer {
  async fn score(&self, _ctx: &RetrievalOutput, _model_version: &str) -> Result<f64, WorkflowError> {
    let n = self.calls.fetch_add(1, Ordering::SeqCst);
    if n < self.failures {
      return Err(WorkflowError::node("scoring", "scorer no disponible", ErrorKind::Infrastructure));
    }
    Ok(40.0)
  }
}

struct OutOfRangeScorer;

#[async_trait]
impl RiskScorer for OutOfRangeScorer {
  async fn score(&self, _ctx: &RetrievalOutput, _model_version: &str) -> Result<f64, WorkflowError> {
    Ok(150.0)
  }
}

#[tokio::test]
async fn transient_failure_resumes_at_the_failed_node() {
  let (models, prompts) = approved_registries().await;
  let source = Arc::new(CountingSource::default());
  let scorer = Arc::new(FlakyScorer { failures: 1,
                                      calls: AtomicUsize::new(0) });
  let services = WorkflowServices { context_source: source.clone(),
                                    scorer: scorer.clone() };
  let h = harness_with(models, prompts, services, CircuitBreakerConfig::default());
  let st = state_for("risk", json!({"event_type": "standard"}));
  let id = st.event_id;

  let err = h.engine.run(st.clone()).await.unwrap_err();
  assert!(err.is_retriable());
  let partial = h.states.get("acme", &id).await.expect("get").expect("state");
  assert_eq!(partial.status, WorkflowStatus::Processing);
  assert_eq!(partial.node_cursor, 2);

  let status = h.engine.run(st).await.expect("resumed");
  assert_eq!(status, WorkflowStatus::Approved);
  // retrieval no se repite al reanudar
  assert_eq!(source.calls.load(Ordering::SeqCst), 1);
  assert_eq!(scorer.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn terminal_state_is_returned_without_running_nodes() {
  let (models, prompts) = approved_registries().await;
  let source = Arc::new(CountingSource::default());
  let services = WorkflowServices { context_source: source.clone(),
                                    ..WorkflowServices::default() };
  let h = harness_with(models, prompts, services, CircuitBreakerConfig::default());
  let st = state_for("risk", json!({"event_type": "standard"}));

  assert_eq!(h.engine.run(st.clone()).await.expect("first"), WorkflowStatus::Approved);
  let writes = h.states.write_count().await;
  assert_eq!(h.engine.run(st).await.expect("second"), WorkflowStatus::Approved);
  assert_eq!(source.calls.load(Ordering::SeqCst), 1);
  assert_eq!(h.states.write_count().await, writes);
}

#[tokio::test]
async fn pending_latest_model_fails_with_one_violation_record() {
  let h = harness().await;
  // v2 queda como última versión sin aprobar; v1 aprobado no se usa.
  h.models
   .register(ModelRecord::new("risk-model", "v2", b"v2"))
   .await
   .expect("register v2");
  let st = state_for("risk", json!({"event_type": "standard"}));
  let id = st.event_id;

  let err = h.engine.run(st).await.unwrap_err();
  assert!(matches!(err, WorkflowError::Governance(_)));
  assert_eq!(err.kind(), ErrorKind::ModelNotApproved);
  assert!(!err.is_retriable());

  let stored = h.states.get("acme", &id).await.expect("get").expect("state");
  assert_eq!(stored.status, WorkflowStatus::Failed);
  assert_eq!(stored.failure_reason.as_deref(), Some(GOVERNANCE_VIOLATION));
  assert!(stored.node_outputs.is_empty());

  let violations = h.audit.records_with_action(actions::GOVERNANCE_VIOLATION).await;
  assert_eq!(violations.len(), 1);
  assert_eq!(violations[0].actor, "system");
  assert_eq!(violations[0].resource_type, "model");
  assert_eq!(violations[0].resource_id, "risk-model");
  assert!(violations[0].reason.as_deref().unwrap_or_default().contains("unapproved"));
  assert_eq!(violations[0].tenant_id, "acme");
}

#[tokio::test]
async fn score_out_of_range_marks_node_failed() {
  let (models, prompts) = approved_registries().await;
  let services = WorkflowServices { scorer: Arc::new(OutOfRangeScorer),
                                    ..WorkflowServices::default() };
  let h = harness_with(models, prompts, services, CircuitBreakerConfig::default());
  let st = state_for("risk", json!({"event_type": "standard"}));
  let id = st.event_id;

  let err = h.engine.run(st).await.unwrap_err();
  assert_eq!(err.kind(), ErrorKind::RiskThresholdViolation);
  let stored = h.states.get("acme", &id).await.expect("get").expect("state");
  assert_eq!(stored.status, WorkflowStatus::Failed);
  assert_eq!(stored.failure_reason.as_deref(), Some("NODE_FAILED:scoring"));
  assert_eq!(stored.node_cursor, 2);
}

#[tokio::test]
async fn failing_scorer_opens_its_circuit() {
  let (models, prompts) = approved_registries().await;
  let services = WorkflowServices { scorer: Arc::new(FlakyScorer { failures: usize::MAX,
                                                                    calls: AtomicUsize::new(0) }),
                                    ..WorkflowServices::default() };
  let h = harness_with(models, prompts, services, breaker_after(2));

  for _ in 0..2 {
    let err = h.engine.run(state_for("risk", json!({}))).await.unwrap_err();
    assert!(matches!(err, WorkflowError::Node { .. }));
  }
  let err = h.engine.run(state_for("risk", json!({}))).await.unwrap_err();
  assert!(matches!(err, WorkflowError::Resilience(ResilienceError::CircuitOpen(_))));

  let states = h.guards.breaker_states().await;
  let scorer = states.iter().find(|(dep, _)| dep == "risk-scorer").expect("scorer breaker");
  assert_eq!(scorer.1.clone().expect("state"), CircuitState::Open);
}

#[tokio::test]
async fn rejected_scores_do_not_open_the_scorer_circuit() {
  let (models, prompts) = approved_registries().await;
  let h = harness_with(models, prompts, WorkflowServices::default(), breaker_after(2));

  // el scorer responde; el valor fuera de rango es problema del evento
  for _ in 0..5 {
    let err = h.engine.run(state_for("compliance", json!({"risk_score": 150.0}))).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::RiskThresholdViolation);
  }
  let states = h.guards.breaker_states().await;
  let scorer = states.iter().find(|(dep, _)| dep == "risk-scorer").expect("scorer breaker");
  assert_eq!(scorer.1.clone().expect("state"), CircuitState::Closed);

  let status = h.engine.run(state_for("risk", json!({"event_type": "standard"}))).await.expect("valid event");
  assert_eq!(status, WorkflowStatus::Approved);
}

#[tokio::test]
async fn resume_keeps_the_model_version_already_resolved() {
  let (models, prompts) = approved_registries().await;
  let scorer = Arc::new(FlakyScorer { failures: 1,
                                      calls: AtomicUsize::new(0) });
  let services = WorkflowServices { scorer: scorer.clone(),
                                    ..WorkflowServices::default() };
  let h = harness_with(models, prompts, services, CircuitBreakerConfig::default());
  let st = state_for("risk", json!({"event_type": "standard"}));
  let id = st.event_id;

  h.engine.run(st.clone()).await.unwrap_err();
  h.models.register(ModelRecord::new("risk-model", "v2", b"v2")).await.expect("register v2");
  h.models.approve("risk-model", "v2", "reviewer").await.expect("approve v2");

  assert_eq!(h.engine.run(st).await.expect("resumed"), WorkflowStatus::Approved);
  let stored = h.states.get("acme", &id).await.expect("get").expect("state");
  assert_eq!(stored.resolved_model_version.as_deref(), Some("v1"));
  let scoring = stored.node_outputs.get("scoring").expect("scoring output");
  assert_eq!(scoring["model_version"], "v1");
}

#[tokio::test]
async fn resume_fails_when_the_pinned_model_is_revoked() {
  let (models, prompts) = approved_registries().await;
  let services = WorkflowServices { scorer: Arc::new(FlakyScorer { failures: 1,
                                                                    calls: AtomicUsize::new(0) }),
                                    ..WorkflowServices::default() };
  let h = harness_with(models, prompts, services, CircuitBreakerConfig::default());
  let st = state_for("risk", json!({"event_type": "standard"}));

  h.engine.run(st.clone()).await.unwrap_err();
  h.models.reject("risk-model", "v1", "reviewer").await.expect("reject v1");

  let err = h.engine.run(st).await.unwrap_err();
  assert_eq!(err.kind(), ErrorKind::ModelNotApproved);
}
