use crate::node::{NodeContext, NodeResult, WorkflowNode};
use crate::nodes::RetrievalOutput;
use crate::services::{RiskScorer, RISK_SCORER};
use async_trait::async_trait;
use risk_domain::validators::validate_risk_score;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringOutput {
  pub score: f64,
  pub model_version: String,
}

pub struct ScoringNode {
  scorer: Arc<dyn RiskScorer>,
}

impl ScoringNode {
  pub fn new(scorer: Arc<dyn RiskScorer>) -> Self {
    Self { scorer }
  }
}

#[async_trait]
impl WorkflowNode for ScoringNode {
  fn name(&self) -> &str {
    super::SCORING
  }

  fn dependency(&self) -> Option<&str> {
    Some(RISK_SCORER)
  }

  async fn execute(&self, ctx: &NodeContext<'_>) -> NodeResult {
    let retrieval: RetrievalOutput = ctx.typed_output(super::RETRIEVAL)?;
    let raw = self.scorer.score(&retrieval, &ctx.assets.model_version).await?;
    // Fuera de [0, 100] es un error de dominio, no se recorta.
    let score = validate_risk_score(raw)?;
    Ok(serde_json::to_value(ScoringOutput { score,
                                            model_version: ctx.assets.model_version.clone() })?)
  }
}
