use crate::node::{NodeContext, NodeResult, WorkflowNode};
use crate::nodes::{RetrievalOutput, ScoringOutput};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub const BLOCK_SCORE_THRESHOLD: f64 = 95.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GuardrailResult {
  Ok,
  Block,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuardrailsOutput {
  pub result: GuardrailResult,
  pub reasons: Vec<String>,
}

pub struct GuardrailsNode;

#[async_trait]
impl WorkflowNode for GuardrailsNode {
  fn name(&self) -> &str {
    super::GUARDRAILS
  }

  async fn execute(&self, ctx: &NodeContext<'_>) -> NodeResult {
    let retrieval: RetrievalOutput = ctx.typed_output(super::RETRIEVAL)?;
    let scoring: ScoringOutput = ctx.typed_output(super::SCORING)?;
    let mut reasons = Vec::new();
    if scoring.score >= BLOCK_SCORE_THRESHOLD {
      reasons.push(format!("score {} >= {}", scoring.score, BLOCK_SCORE_THRESHOLD));
    }
    if retrieval.blocked {
      reasons.push("evento marcado como bloqueado".to_string());
    }
    let result = if reasons.is_empty() { GuardrailResult::Ok } else { GuardrailResult::Block };
    Ok(serde_json::to_value(GuardrailsOutput { result, reasons })?)
  }
}
