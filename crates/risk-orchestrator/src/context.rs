// Archivo: context.rs
// Propósito: contexto explícito del proceso. Se construye una vez al
// arrancar y de él salen todos los componentes; no hay estado global.
use crate::config::RiskflowConfig;
use crate::errors::OrchestratorError;
use crate::health::HealthCheck;
use crate::orchestrator::{OrchestratorDeps, OrchestratorTimings, TransactionalOrchestrator, MESSAGING_DEPENDENCY};
use crate::publisher::{EventPublisher, InMemoryEventPublisher};
use flow::repository::WorkflowStateStore;
use flow::stubs::InMemoryWorkflowStateStore;
use risk_audit::{AuditLogger, FailureClassifier};
use risk_domain::{AuditRepository, EventRepository, InMemoryAuditRepository, InMemoryEventRepository};
use risk_governance::{GovernanceGate, InMemoryModelRegistry, InMemoryPromptRegistry, ModelApprovals, ModelRegistry,
                      PromptApprovals, PromptRegistry};
use risk_persistence::{Database, DieselAuditRepository, DieselEventRepository, DieselRegistry, DieselSharedStore,
                       DieselWorkflowStateStore};
use risk_resilience::{Clock, GuardRegistry, InMemorySharedStore, LockManager, RateLimiter, SharedStore, SystemClock};
use risk_workflow::{WorkflowEngine, WorkflowServices, WorkflowTrigger, CONTEXT_SOURCE, RISK_SCORER};
use std::sync::Arc;

/// Ámbito del limitador propio del motor de workflows.
pub const WORKFLOW_RATE_SCOPE: &str = "workflow";

pub struct AppContext {
  pub config: RiskflowConfig,
  pub clock: Arc<dyn Clock>,
  pub shared: Arc<dyn SharedStore>,
  pub events: Arc<dyn EventRepository>,
  pub audit_repo: Arc<dyn AuditRepository>,
  pub states: Arc<dyn WorkflowStateStore>,
  pub models: Arc<dyn ModelRegistry>,
  pub model_approvals: Arc<dyn ModelApprovals>,
  pub prompts: Arc<dyn PromptRegistry>,
  pub prompt_approvals: Arc<dyn PromptApprovals>,
  pub publisher: Arc<dyn EventPublisher>,
  pub guards: Arc<GuardRegistry>,
  pub classifier: Arc<FailureClassifier>,
  pub services: WorkflowServices,
  trigger: Option<Arc<dyn WorkflowTrigger>>,
}

impl AppContext {
  /// Todo en memoria: un único proceso, sin base de datos.
  pub fn in_memory(config: RiskflowConfig) -> Self {
    AppContextBuilder::new(config).build()
  }

  /// Elige el almacenamiento según `database_url`: Diesel si está
  /// configurada, memoria si no.
  pub fn from_config(config: RiskflowConfig) -> Result<Self, OrchestratorError> {
    let url = match config.database_url.clone() {
      Some(url) => url,
      None => {
        log::warn!("sin RISKFLOW_DB_URL: almacenamiento en memoria");
        return Ok(Self::in_memory(config));
      }
    };
    let db = Database::connect(&url, config.db_pool_size)?;
    log::info!("base de datos conectada pool_size={}", config.db_pool_size);
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let registry = Arc::new(DieselRegistry::new(db.clone()));
    Ok(AppContextBuilder::new(config).with_clock(clock.clone())
                                     .with_shared(Arc::new(DieselSharedStore::with_clock(db.clone(), clock)))
                                     .with_events(Arc::new(DieselEventRepository::new(db.clone())))
                                     .with_audit(Arc::new(DieselAuditRepository::new(db.clone())))
                                     .with_states(Arc::new(DieselWorkflowStateStore::new(db)))
                                     .with_model_registry(registry.clone())
                                     .with_prompt_registry(registry)
                                     .build())
  }

  pub fn from_env() -> Result<Self, OrchestratorError> {
    Self::from_config(RiskflowConfig::from_env()?)
  }

  pub fn audit_logger(&self) -> AuditLogger {
    AuditLogger::new(self.audit_repo.clone())
  }

  pub fn lock_manager(&self) -> LockManager {
    LockManager::new(self.shared.clone(), self.clock.clone())
  }

  pub fn ingress_limiter(&self) -> RateLimiter {
    RateLimiter::new(self.shared.clone(), self.clock.clone(), self.config.rate_limit)
  }

  pub fn workflow_limiter(&self) -> RateLimiter {
    RateLimiter::new(self.shared.clone(), self.clock.clone(), self.config.workflow_rate_limit)
      .with_scope(WORKFLOW_RATE_SCOPE)
  }

  pub fn governance_gate(&self) -> GovernanceGate {
    GovernanceGate::new(self.models.clone(), self.prompts.clone(), self.config.governance.clone())
  }

  pub fn workflow_engine(&self) -> WorkflowEngine {
    WorkflowEngine::new(self.states.clone(),
                        Arc::new(self.governance_gate()),
                        self.audit_logger(),
                        self.guards.clone(),
                        self.workflow_limiter()).with_services(self.services.clone())
  }

  /// Disparador configurado o, por defecto, el motor en proceso.
  pub fn trigger(&self) -> Arc<dyn WorkflowTrigger> {
    match &self.trigger {
      Some(t) => t.clone(),
      None => Arc::new(self.workflow_engine()),
    }
  }

  pub fn orchestrator(&self) -> TransactionalOrchestrator {
    let deps = OrchestratorDeps { events: self.events.clone(),
                                  publisher: self.publisher.clone(),
                                  trigger: self.trigger(),
                                  shared: self.shared.clone(),
                                  locks: self.lock_manager(),
                                  limiter: self.ingress_limiter(),
                                  audit: self.audit_logger(),
                                  classifier: self.classifier.clone(),
                                  publish_guard: self.guards.guard(MESSAGING_DEPENDENCY) };
    let timings = OrchestratorTimings { idempotency_ttl: self.config.idempotency_ttl,
                                        inflight_ttl: self.config.inflight_ttl,
                                        poll_interval: self.config.idempotency_poll_interval,
                                        wait_timeout: self.config.idempotency_wait_timeout,
                                        lock_ttl: self.config.lock_ttl };
    TransactionalOrchestrator::new(deps, timings)
  }

  pub fn health_check(&self) -> HealthCheck {
    HealthCheck::new(self.events.clone(),
                     self.audit_logger(),
                     self.states.clone(),
                     self.publisher.clone(),
                     self.shared.clone(),
                     self.guards.clone())
  }
}

/// Arma un `AppContext` sustituyendo sólo las piezas indicadas; el resto
/// usa las variantes en memoria.
pub struct AppContextBuilder {
  config: RiskflowConfig,
  clock: Option<Arc<dyn Clock>>,
  shared: Option<Arc<dyn SharedStore>>,
  events: Option<Arc<dyn EventRepository>>,
  audit_repo: Option<Arc<dyn AuditRepository>>,
  states: Option<Arc<dyn WorkflowStateStore>>,
  models: Option<(Arc<dyn ModelRegistry>, Arc<dyn ModelApprovals>)>,
  prompts: Option<(Arc<dyn PromptRegistry>, Arc<dyn PromptApprovals>)>,
  publisher: Option<Arc<dyn EventPublisher>>,
  services: WorkflowServices,
  trigger: Option<Arc<dyn WorkflowTrigger>>,
}

impl AppContextBuilder {
  pub fn new(config: RiskflowConfig) -> Self {
    Self { config,
           clock: None,
           shared: None,
           events: None,
           audit_repo: None,
           states: None,
           models: None,
           prompts: None,
           publisher: None,
           services: WorkflowServices::default(),
           trigger: None }
  }

  pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
    self.clock = Some(clock);
    self
  }

  pub fn with_shared(mut self, shared: Arc<dyn SharedStore>) -> Self {
    self.shared = Some(shared);
    self
  }

  pub fn with_events(mut self, events: Arc<dyn EventRepository>) -> Self {
    self.events = Some(events);
    self
  }

  pub fn with_audit(mut self, audit: Arc<dyn AuditRepository>) -> Self {
    self.audit_repo = Some(audit);
    self
  }

  pub fn with_states(mut self, states: Arc<dyn WorkflowStateStore>) -> Self {
    self.states = Some(states);
    self
  }

  pub fn with_model_registry<R>(mut self, registry: Arc<R>) -> Self
    where R: ModelApprovals + 'static
  {
    let read: Arc<dyn ModelRegistry> = registry.clone();
    let approvals: Arc<dyn ModelApprovals> = registry;
    self.models = Some((read, approvals));
    self
  }

  pub fn with_prompt_registry<R>(mut self, registry: Arc<R>) -> Self
    where R: PromptApprovals + 'static
  {
    let read: Arc<dyn PromptRegistry> = registry.clone();
    let approvals: Arc<dyn PromptApprovals> = registry;
    self.prompts = Some((read, approvals));
    self
  }

  pub fn with_publisher(mut self, publisher: Arc<dyn EventPublisher>) -> Self {
    self.publisher = Some(publisher);
    self
  }

  pub fn with_services(mut self, services: WorkflowServices) -> Self {
    self.services = services;
    self
  }

  /// Sustituye el motor en proceso por otro disparador.
  pub fn with_trigger(mut self, trigger: Arc<dyn WorkflowTrigger>) -> Self {
    self.trigger = Some(trigger);
    self
  }

  pub fn build(self) -> AppContext {
    let clock: Arc<dyn Clock> = match self.clock {
      Some(c) => c,
      None => Arc::new(SystemClock),
    };
    let shared: Arc<dyn SharedStore> = match self.shared {
      Some(s) => s,
      None => Arc::new(InMemorySharedStore::with_clock(clock.clone())),
    };
    let (models, model_approvals) = match self.models {
      Some(pair) => pair,
      None => {
        let r = Arc::new(InMemoryModelRegistry::new());
        let read: Arc<dyn ModelRegistry> = r.clone();
        let approvals: Arc<dyn ModelApprovals> = r;
        (read, approvals)
      }
    };
    let (prompts, prompt_approvals) = match self.prompts {
      Some(pair) => pair,
      None => {
        let r = Arc::new(InMemoryPromptRegistry::new());
        let read: Arc<dyn PromptRegistry> = r.clone();
        let approvals: Arc<dyn PromptApprovals> = r;
        (read, approvals)
      }
    };
    let guards = Arc::new(GuardRegistry::new(shared.clone(), clock.clone(), self.config.breaker, self.config.bulkhead));
    guards.register(&[MESSAGING_DEPENDENCY, CONTEXT_SOURCE, RISK_SCORER]);
    AppContext { events: self.events.unwrap_or_else(|| Arc::new(InMemoryEventRepository::new())),
                 audit_repo: self.audit_repo.unwrap_or_else(|| Arc::new(InMemoryAuditRepository::new())),
                 states: self.states.unwrap_or_else(|| Arc::new(InMemoryWorkflowStateStore::new())),
                 publisher: self.publisher.unwrap_or_else(|| Arc::new(InMemoryEventPublisher::new())),
                 config: self.config,
                 clock,
                 shared,
                 models,
                 model_approvals,
                 prompts,
                 prompt_approvals,
                 guards,
                 classifier: Arc::new(FailureClassifier::new()),
                 services: self.services,
                 trigger: self.trigger }
  }
}
