#![allow(dead_code)]

use risk_domain::{EventRequest, InMemoryAuditRepository, InMemoryEventRepository};
use risk_governance::{InMemoryModelRegistry, InMemoryPromptRegistry, ModelApprovals, ModelRecord, PromptApprovals,
                      PromptRecord};
use risk_orchestrator::{AppContext, AppContextBuilder, InMemoryEventPublisher, RiskflowConfig, TransactionalOrchestrator};
use risk_workflow::WorkflowServices;
use serde_json::{json, Value as JsonValue};
use std::sync::Arc;
use std::time::Duration;

pub struct Harness {
  pub ctx: AppContext,
  pub orchestrator: Arc<TransactionalOrchestrator>,
  pub events: Arc<InMemoryEventRepository>,
  pub audit: Arc<InMemoryAuditRepository>,
  pub publisher: Arc<InMemoryEventPublisher>,
  pub models: Arc<InMemoryModelRegistry>,
}

/// Configuración de pruebas: esperas cortas para no ralentizar la suite.
pub fn test_config() -> RiskflowConfig {
  RiskflowConfig { idempotency_poll_interval: Duration::from_millis(5),
                   idempotency_wait_timeout: Duration::from_secs(5),
                   lock_ttl: Duration::from_secs(5),
                   ..RiskflowConfig::default() }
}

pub async fn approved_registries() -> (Arc<InMemoryModelRegistry>, Arc<InMemoryPromptRegistry>) {
  let models = Arc::new(InMemoryModelRegistry::new());
  let prompts = Arc::new(InMemoryPromptRegistry::new());
  for name in ["risk-model", "compliance-model"] {
    models.register(ModelRecord::new(name, "v1", name.as_bytes())).await.expect("register model");
    models.approve(name, "v1", "reviewer").await.expect("approve model");
  }
  for id in ["risk-prompt", "compliance-prompt"] {
    prompts.register(PromptRecord::new(id, "v1", "Evalua {payload}")).await.expect("register prompt");
    prompts.approve(id, "v1", "reviewer").await.expect("approve prompt");
  }
  (models, prompts)
}

/// Ajusta el builder antes de construir (disparador, servicios, etc.).
pub async fn harness_with<F>(config: RiskflowConfig, customize: F) -> Harness
  where F: FnOnce(AppContextBuilder) -> AppContextBuilder
{
  let (models, prompts) = approved_registries().await;
  let events = Arc::new(InMemoryEventRepository::new());
  let audit = Arc::new(InMemoryAuditRepository::new());
  let publisher = Arc::new(InMemoryEventPublisher::new());
  let builder = AppContextBuilder::new(config).with_events(events.clone())
                                              .with_audit(audit.clone())
                                              .with_publisher(publisher.clone())
                                              .with_model_registry(models.clone())
                                              .with_prompt_registry(prompts);
  let ctx = customize(builder).build();
  let orchestrator = Arc::new(ctx.orchestrator());
  Harness { ctx,
            orchestrator,
            events,
            audit,
            publisher,
            models }
}

pub async fn harness() -> Harness {
  harness_with(test_config(), |b| b.with_services(WorkflowServices::default())).await
}

pub fn risk_request(payload: JsonValue) -> EventRequest {
  EventRequest::new("risk", payload, "v1")
}

pub fn standard_request() -> EventRequest {
  risk_request(json!({"event_type": "standard", "metadata": {"category": "payments"}}))
}
