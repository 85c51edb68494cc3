//! Dependencias externas consultadas por los nodos. Las implementaciones
//! por defecto son deterministas y trabajan sólo con el payload.
use crate::errors::WorkflowError;
use crate::nodes::RetrievalOutput;
use async_trait::async_trait;
use serde_json::Value as JsonValue;
use std::sync::Arc;

pub const CONTEXT_SOURCE: &str = "context-source";
pub const RISK_SCORER: &str = "risk-scorer";

/// Fuente de contexto del nodo `retrieval`.
#[async_trait]
pub trait ContextSource: Send + Sync {
  async fn fetch(&self, payload: &JsonValue) -> Result<RetrievalOutput, WorkflowError>;
}

/// Modelo de scoring del nodo `scoring`.
#[async_trait]
pub trait RiskScorer: Send + Sync {
  async fn score(&self, context: &RetrievalOutput, model_version: &str) -> Result<f64, WorkflowError>;
}

/// Extrae el contexto directamente del payload aceptado.
#[derive(Debug, Default, Clone)]
pub struct PayloadContextSource;

#[async_trait]
impl ContextSource for PayloadContextSource {
  async fn fetch(&self, payload: &JsonValue) -> Result<RetrievalOutput, WorkflowError> {
    let text = |v: Option<&JsonValue>| v.and_then(|v| v.as_str()).map(|s| s.to_string());
    let category = text(payload.get("metadata").and_then(|m| m.get("category"))).or_else(|| text(payload.get("category")));
    let regulatory_flags = payload.get("regulatory_flags")
                                  .and_then(|v| v.as_array())
                                  .map(|flags| flags.iter().filter_map(|f| f.as_str().map(|s| s.to_string())).collect())
                                  .unwrap_or_default();
    let risk_score = payload.get("risk_score").and_then(|v| v.as_f64());
    Ok(RetrievalOutput { event_type: text(payload.get("event_type")).unwrap_or_else(|| "standard".to_string()),
                         category,
                         source: "payload".to_string(),
                         regulatory_flags,
                         risk_score,
                         blocked: payload.get("blocked").and_then(|v| v.as_bool()).unwrap_or(false) })
  }
}

/// Scoring por reglas: el `risk_score` explícito manda; si no, un valor base
/// por subtipo de evento.
#[derive(Debug, Default, Clone)]
pub struct RuleBasedScorer;

impl RuleBasedScorer {
  pub fn base_score(event_type: &str) -> f64 {
    match event_type {
      "high_risk" => 85.0,
      "low_risk" => 15.0,
      _ => 30.0,
    }
  }
}

#[async_trait]
impl RiskScorer for RuleBasedScorer {
  async fn score(&self, context: &RetrievalOutput, _model_version: &str) -> Result<f64, WorkflowError> {
    Ok(context.risk_score.unwrap_or_else(|| Self::base_score(&context.event_type)))
  }
}

/// Dependencias inyectadas en el pipeline.
#[derive(Clone)]
pub struct WorkflowServices {
  pub context_source: Arc<dyn ContextSource>,
  pub scorer: Arc<dyn RiskScorer>,
}

impl Default for WorkflowServices {
  fn default() -> Self {
    Self { context_source: Arc::new(PayloadContextSource),
           scorer: Arc::new(RuleBasedScorer) }
  }
}
