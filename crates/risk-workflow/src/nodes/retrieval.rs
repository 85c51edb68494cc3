use crate::node::{NodeContext, NodeResult, WorkflowNode};
use crate::services::{ContextSource, CONTEXT_SOURCE};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Contexto del evento que consumen los nodos siguientes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalOutput {
  /// Subtipo dentro del payload (`standard`, `high_risk`, `low_risk`, ...).
  pub event_type: String,
  pub category: Option<String>,
  pub source: String,
  #[serde(default)]
  pub regulatory_flags: Vec<String>,
  pub risk_score: Option<f64>,
  #[serde(default)]
  pub blocked: bool,
}

pub struct RetrievalNode {
  source: Arc<dyn ContextSource>,
}

impl RetrievalNode {
  pub fn new(source: Arc<dyn ContextSource>) -> Self {
    Self { source }
  }
}

#[async_trait]
impl WorkflowNode for RetrievalNode {
  fn name(&self) -> &str {
    super::RETRIEVAL
  }

  fn dependency(&self) -> Option<&str> {
    Some(CONTEXT_SOURCE)
  }

  async fn execute(&self, ctx: &NodeContext<'_>) -> NodeResult {
    let out = self.source.fetch(ctx.payload()).await?;
    log::debug!("retrieval event_id={} subtype={} category={:?}",
                ctx.state.event_id, out.event_type, out.category);
    Ok(serde_json::to_value(out)?)
  }
}
