#![allow(dead_code)]

use flow::domain::WorkflowState;
use flow::stubs::InMemoryWorkflowStateStore;
use risk_audit::AuditLogger;
use risk_domain::InMemoryAuditRepository;
use risk_governance::{GovernanceGate, GovernanceMode, InMemoryModelRegistry, InMemoryPromptRegistry, ModelApprovals,
                      ModelRecord, PromptApprovals, PromptRecord};
use risk_resilience::{BulkheadConfig, CircuitBreakerConfig, GuardRegistry, InMemorySharedStore, RateLimitConfig,
                      RateLimiter, SharedStore, SystemClock};
use risk_workflow::{WorkflowEngine, WorkflowServices};
use serde_json::{json, Value as JsonValue};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

pub struct Harness {
  pub engine: WorkflowEngine,
  pub states: Arc<InMemoryWorkflowStateStore>,
  pub audit: Arc<InMemoryAuditRepository>,
  pub models: Arc<InMemoryModelRegistry>,
  pub guards: Arc<GuardRegistry>,
}

/// Registros con los cuatro activos por defecto aprobados en `v1`.
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

pub fn harness_with(models: Arc<InMemoryModelRegistry>,
                    prompts: Arc<InMemoryPromptRegistry>,
                    services: WorkflowServices,
                    breaker: CircuitBreakerConfig)
                    -> Harness {
  let states = Arc::new(InMemoryWorkflowStateStore::new());
  let audit = Arc::new(InMemoryAuditRepository::new());
  let shared: Arc<dyn SharedStore> = Arc::new(InMemorySharedStore::new());
  let clock = Arc::new(SystemClock);
  let guards = Arc::new(GuardRegistry::new(shared.clone(), clock.clone(), breaker, BulkheadConfig::default()));
  let limiter = RateLimiter::new(shared, clock, RateLimitConfig::default()).with_scope("workflow");
  let gate = Arc::new(GovernanceGate::new(models.clone(), prompts, GovernanceMode::Enforced));
  let engine = WorkflowEngine::new(states.clone(), gate, AuditLogger::new(audit.clone()), guards.clone(), limiter)
    .with_services(services);
  Harness { engine,
            states,
            audit,
            models,
            guards }
}

pub async fn harness() -> Harness {
  let (models, prompts) = approved_registries().await;
  harness_with(models, prompts, WorkflowServices::default(), CircuitBreakerConfig::default())
}

pub fn state_for(workflow_type: &str, payload: JsonValue) -> WorkflowState {
  let event_id = Uuid::new_v4();
  let raw = json!({ "event_id": event_id, "event_type": workflow_type, "payload": payload });
  WorkflowState::new(event_id, "acme", "corr-1", workflow_type, raw)
}

pub fn breaker_after(failures: u32) -> CircuitBreakerConfig {
  CircuitBreakerConfig { failure_threshold: failures,
                         failure_window: Duration::from_secs(60),
                         cooldown: Duration::from_secs(30) }
}
