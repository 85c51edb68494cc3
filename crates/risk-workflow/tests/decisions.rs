mod common;

use common::{harness, state_for};
use flow::domain::WorkflowStatus;
use flow::repository::WorkflowStateStore;
use risk_audit::actions;
use risk_workflow::nodes::{Decision, DecisionOutput, PolicyOutput, PolicyResult, ScoringOutput};
use risk_workflow::{WorkflowFactory, WorkflowTrigger, WorkflowType, REQUIRE_APPROVAL};
use serde_json::json;

fn output<T: serde::de::DeserializeOwned>(state: &flow::domain::WorkflowState, node: &str) -> T {
  serde_json::from_value(state.output(node).expect("node output")["output"].clone()).expect("typed output")
}

#[tokio::test]
async fn standard_risk_event_is_approved() {
  let h = harness().await;
  let st = state_for("risk", json!({"event_type": "standard"}));
  let (tenant, id) = (st.tenant_id.clone(), st.event_id);

  let status = h.engine.run(st).await.expect("run");
  assert_eq!(status, WorkflowStatus::Approved);

  let stored = h.states.get(&tenant, &id).await.expect("get").expect("state");
  assert_eq!(stored.node_cursor, 5);
  let names: Vec<String> = stored.node_outputs.keys().cloned().collect();
  assert_eq!(names, WorkflowFactory::node_names(WorkflowType::Risk));
  let scoring: ScoringOutput = output(&stored, "scoring");
  assert_eq!(scoring.score, 30.0);
  assert_eq!(scoring.model_version, "v1");
  let policy: PolicyOutput = output(&stored, "policy");
  assert_eq!(policy.result, PolicyResult::Pass);
  assert_eq!(stored.resolved_model_version.as_deref(), Some("v1"));
  assert_eq!(stored.resolved_prompt_version.as_deref(), Some("v1"));
  assert!(h.audit.records_with_action(actions::ESCALATION_REQUESTED).await.is_empty());
}

#[tokio::test]
async fn high_risk_requires_approval_and_escalates() {
  let h = harness().await;
  let st = state_for("risk", json!({"event_type": "high_risk"}));
  let (tenant, id) = (st.tenant_id.clone(), st.event_id);

  let status = h.engine.run(st).await.expect("run");
  assert_eq!(status, WorkflowStatus::Rejected);

  let stored = h.states.get(&tenant, &id).await.expect("get").expect("state");
  assert_eq!(stored.failure_reason.as_deref(), Some(REQUIRE_APPROVAL));
  let decision: DecisionOutput = output(&stored, "decision");
  assert_eq!(decision.decision, Decision::RequireApproval);
  assert!(decision.approval_required);

  let escalations = h.audit.records_with_action(actions::ESCALATION_REQUESTED).await;
  assert_eq!(escalations.len(), 1);
  assert_eq!(escalations[0].resource_id, id.to_string());
  assert_eq!(escalations[0].correlation_id, "corr-1");
}

#[tokio::test]
async fn sensitive_category_fails_policy() {
  let h = harness().await;
  let st = state_for("risk", json!({"event_type": "low_risk", "metadata": {"category": "sensitive"}}));
  let (tenant, id) = (st.tenant_id.clone(), st.event_id);

  assert_eq!(h.engine.run(st).await.expect("run"), WorkflowStatus::Rejected);
  let stored = h.states.get(&tenant, &id).await.expect("get").expect("state");
  let policy: PolicyOutput = output(&stored, "policy");
  assert_eq!(policy.result, PolicyResult::Fail);
  let scoring: ScoringOutput = output(&stored, "scoring");
  assert_eq!(scoring.score, 15.0);
}

#[tokio::test]
async fn blocked_payload_is_rejected_without_escalation() {
  let h = harness().await;
  let st = state_for("risk", json!({"event_type": "standard", "blocked": true}));
  let (tenant, id) = (st.tenant_id.clone(), st.event_id);

  assert_eq!(h.engine.run(st).await.expect("run"), WorkflowStatus::Rejected);
  let stored = h.states.get(&tenant, &id).await.expect("get").expect("state");
  let decision: DecisionOutput = output(&stored, "decision");
  assert_eq!(decision.decision, Decision::Rejected);
  assert_eq!(stored.failure_reason, None);
  assert!(h.audit.records_with_action(actions::ESCALATION_REQUESTED).await.is_empty());
}

#[tokio::test]
async fn compliance_flags_require_approval() {
  let h = harness().await;
  let flagged = state_for("compliance", json!({"event_type": "low_risk", "regulatory_flags": ["AML"]}));
  let id = flagged.event_id;
  assert_eq!(h.engine.run(flagged).await.expect("run"), WorkflowStatus::Rejected);
  let stored = h.states.get("acme", &id).await.expect("get").expect("state");
  let decision: DecisionOutput = output(&stored, "decision");
  assert_eq!(decision.decision, Decision::RequireApproval);
  assert!(decision.approval_required);

  let clean = state_for("compliance", json!({"event_type": "low_risk"}));
  assert_eq!(h.engine.run(clean).await.expect("run"), WorkflowStatus::Approved);
}

#[tokio::test]
async fn same_input_gives_same_decision() {
  let h = harness().await;
  let payload = json!({"event_type": "standard", "risk_score": 72.5, "metadata": {"category": "retail"}});
  let a = state_for("risk", payload.clone());
  let b = state_for("risk", payload);
  let (ia, ib) = (a.event_id, b.event_id);
  assert_eq!(h.engine.run(a).await.expect("a"), h.engine.run(b).await.expect("b"));

  let sa = h.states.get("acme", &ia).await.expect("get").expect("a");
  let sb = h.states.get("acme", &ib).await.expect("get").expect("b");
  let da: DecisionOutput = output(&sa, "decision");
  let db: DecisionOutput = output(&sb, "decision");
  assert_eq!(da, db);
}
