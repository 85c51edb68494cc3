use crate::node::{NodeContext, NodeResult, WorkflowNode};
use crate::nodes::RetrievalOutput;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Categorías que nunca pasan la política sin revisión humana.
pub const RESTRICTED_CATEGORIES: [&str; 2] = ["sensitive", "restricted"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PolicyResult {
  Pass,
  Fail,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyOutput {
  pub result: PolicyResult,
  pub violations: Vec<String>,
}

pub struct PolicyNode;

#[async_trait]
impl WorkflowNode for PolicyNode {
  fn name(&self) -> &str {
    super::POLICY
  }

  async fn execute(&self, ctx: &NodeContext<'_>) -> NodeResult {
    let retrieval: RetrievalOutput = ctx.typed_output(super::RETRIEVAL)?;
    let violations: Vec<String> = retrieval.category
                                           .iter()
                                           .filter(|c| RESTRICTED_CATEGORIES.contains(&c.as_str()))
                                           .map(|c| format!("categoria restringida: {}", c))
                                           .collect();
    let result = if violations.is_empty() { PolicyResult::Pass } else { PolicyResult::Fail };
    Ok(serde_json::to_value(PolicyOutput { result, violations })?)
  }
}
