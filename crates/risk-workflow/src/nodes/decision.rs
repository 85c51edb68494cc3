use crate::node::{NodeContext, NodeResult, WorkflowNode};
use crate::nodes::{GuardrailResult, GuardrailsOutput, PolicyOutput, PolicyResult, RetrievalOutput, ScoringOutput};
use crate::workflow_type::WorkflowType;
use async_trait::async_trait;
use flow::domain::WorkflowStatus;
use serde::{Deserialize, Serialize};

pub const APPROVAL_SCORE_THRESHOLD: f64 = 70.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Decision {
  Approved,
  RequireApproval,
  Rejected,
}

impl Decision {
  /// Estado terminal del workflow. `RequireApproval` termina rechazado
  /// hasta que una persona lo revise.
  pub fn terminal_status(&self) -> WorkflowStatus {
    match self {
      Decision::Approved => WorkflowStatus::Approved,
      Decision::RequireApproval | Decision::Rejected => WorkflowStatus::Rejected,
    }
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionOutput {
  pub decision: Decision,
  pub approval_required: bool,
  pub reasons: Vec<String>,
}

pub struct DecisionNode;

#[async_trait]
impl WorkflowNode for DecisionNode {
  fn name(&self) -> &str {
    super::DECISION
  }

  async fn execute(&self, ctx: &NodeContext<'_>) -> NodeResult {
    let retrieval: RetrievalOutput = ctx.typed_output(super::RETRIEVAL)?;
    let policy: PolicyOutput = ctx.typed_output(super::POLICY)?;
    let scoring: ScoringOutput = ctx.typed_output(super::SCORING)?;
    let guardrails: GuardrailsOutput = ctx.typed_output(super::GUARDRAILS)?;

    if guardrails.result == GuardrailResult::Block {
      return Ok(serde_json::to_value(DecisionOutput { decision: Decision::Rejected,
                                                      approval_required: false,
                                                      reasons: guardrails.reasons })?);
    }

    let mut reasons = policy.violations.clone();
    if policy.result == PolicyResult::Fail && reasons.is_empty() {
      reasons.push("politica fallida".to_string());
    }
    if scoring.score >= APPROVAL_SCORE_THRESHOLD {
      reasons.push(format!("score {} >= {}", scoring.score, APPROVAL_SCORE_THRESHOLD));
    }
    if ctx.workflow_type == WorkflowType::Compliance && !retrieval.regulatory_flags.is_empty() {
      reasons.push(format!("flags regulatorios: {}", retrieval.regulatory_flags.join(",")));
    }

    let out = if reasons.is_empty() {
      DecisionOutput { decision: Decision::Approved,
                       approval_required: false,
                       reasons }
    } else {
      DecisionOutput { decision: Decision::RequireApproval,
                       approval_required: true,
                       reasons }
    };
    Ok(serde_json::to_value(out)?)
  }
}
