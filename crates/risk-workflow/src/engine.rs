// Archivo: engine.rs
// Propósito: ejecutar el pipeline de nodos sobre un `WorkflowState`
// persistido, con gobernanza previa y protecciones por dependencia.
use crate::errors::WorkflowError;
use crate::factory::WorkflowFactory;
use crate::node::NodeContext;
use crate::nodes::{Decision, DecisionOutput, DECISION};
use crate::services::WorkflowServices;
use crate::trigger::WorkflowTrigger;
use crate::workflow_type::{WorkflowAssets, WorkflowType};
use async_trait::async_trait;
use chrono::Utc;
use flow::domain::{WorkflowState, WorkflowStatus};
use flow::engine::FlowEngine;
use flow::repository::WorkflowStateStore;
use risk_audit::{actions, AuditLogger, SYSTEM_ACTOR};
use risk_domain::{AuditEntry, ErrorKind};
use risk_governance::{GovernanceGate, ResolvedAssets};
use risk_resilience::{GuardRegistry, RateLimiter, ResilienceError};
use serde_json::json;
use std::sync::Arc;

pub const GOVERNANCE_VIOLATION: &str = "GOVERNANCE_VIOLATION";
pub const REQUIRE_APPROVAL: &str = "REQUIRE_APPROVAL";

pub fn node_failed_reason(node: &str) -> String {
  format!("NODE_FAILED:{}", node)
}

/// Activos gobernados por tipo de workflow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkflowEngineConfig {
  pub risk: WorkflowAssets,
  pub compliance: WorkflowAssets,
}

impl Default for WorkflowEngineConfig {
  fn default() -> Self {
    Self { risk: WorkflowAssets::for_type(WorkflowType::Risk),
           compliance: WorkflowAssets::for_type(WorkflowType::Compliance) }
  }
}

impl WorkflowEngineConfig {
  pub fn assets(&self, workflow_type: WorkflowType) -> &WorkflowAssets {
    match workflow_type {
      WorkflowType::Risk => &self.risk,
      WorkflowType::Compliance => &self.compliance,
    }
  }
}

/// Motor determinista y reanudable.
///
/// - La gobernanza se resuelve una vez por ejecución, antes del primer nodo
///   pendiente. Una reanudación reutiliza las versiones persistidas.
/// - El estado se persiste tras cada nodo; un error transitorio deja el
///   estado en `Processing` con el cursor del último nodo completado.
/// - Un estado terminal se devuelve tal cual sin ejecutar nada.
pub struct WorkflowEngine {
  flow: FlowEngine<dyn WorkflowStateStore>,
  gate: Arc<GovernanceGate>,
  audit: AuditLogger,
  guards: Arc<GuardRegistry>,
  limiter: RateLimiter,
  services: WorkflowServices,
  config: WorkflowEngineConfig,
}

impl WorkflowEngine {
  pub fn new(store: Arc<dyn WorkflowStateStore>,
             gate: Arc<GovernanceGate>,
             audit: AuditLogger,
             guards: Arc<GuardRegistry>,
             limiter: RateLimiter)
             -> Self {
    Self { flow: FlowEngine::new(store),
           gate,
           audit,
           guards,
           limiter,
           services: WorkflowServices::default(),
           config: WorkflowEngineConfig::default() }
  }

  pub fn with_services(mut self, services: WorkflowServices) -> Self {
    self.services = services;
    self
  }

  pub fn with_config(mut self, config: WorkflowEngineConfig) -> Self {
    self.config = config;
    self
  }

  pub fn flow(&self) -> &FlowEngine<dyn WorkflowStateStore> {
    &self.flow
  }

  /// Resuelve modelo y prompt. Una violación se audita y deja el estado en
  /// `Failed`; un registro inaccesible no toca el estado.
  async fn resolve_assets(&self,
                          state: &mut WorkflowState,
                          workflow_type: WorkflowType)
                          -> Result<ResolvedAssets, WorkflowError> {
    let wanted = self.config.assets(workflow_type);
    // Al reanudar se fijan las versiones ya resueltas; siguen debiendo estar
    // aprobadas.
    let model_version = state.resolved_model_version.as_deref().or(wanted.model_version.as_deref());
    let prompt_version = state.resolved_prompt_version.as_deref().or(wanted.prompt_version.as_deref());
    let err = match self.gate
                        .resolve(&wanted.model_name, model_version, &wanted.prompt_id, prompt_version)
                        .await
    {
      Ok(assets) => return Ok(assets),
      Err(e) if e.kind() == ErrorKind::Infrastructure => return Err(e.into()),
      Err(e) => e,
    };

    log::warn!("violación de gobernanza event_id={} tenant_id={} correlation_id={} err={}",
               state.event_id, state.tenant_id, state.correlation_id, err);
    let entry = AuditEntry::new(SYSTEM_ACTOR,
                                actions::GOVERNANCE_VIOLATION,
                                err.resource_type(),
                                &err.resource_id(),
                                &state.correlation_id,
                                &state.tenant_id).with_reason(err.reason())
                                                 .with_metadata(json!({
                                                   "event_id": state.event_id,
                                                   "workflow_type": state.workflow_type,
                                                 }));
    let audited = self.audit.record(entry).await;
    self.flow
        .finish(state, WorkflowStatus::Failed, Some(GOVERNANCE_VIOLATION.to_string()))
        .await?;
    audited?;
    Err(err.into())
  }

  /// Registra la escalada cuando la decisión exige revisión humana.
  async fn escalate(&self, state: &WorkflowState, decision: &DecisionOutput) -> Result<(), WorkflowError> {
    let entry = AuditEntry::new(SYSTEM_ACTOR,
                                actions::ESCALATION_REQUESTED,
                                "event",
                                &state.event_id.to_string(),
                                &state.correlation_id,
                                &state.tenant_id).with_reason(REQUIRE_APPROVAL)
                                                 .with_metadata(json!({
                                                   "workflow_type": state.workflow_type,
                                                   "reasons": decision.reasons,
                                                 }));
    self.audit.record(entry).await?;
    Ok(())
  }

  async fn run_pipeline(&self, mut state: WorkflowState) -> Result<WorkflowStatus, WorkflowError> {
    let workflow_type: WorkflowType = state.workflow_type.parse()?;

    if !self.limiter.allow(&state.tenant_id).await? {
      return Err(ResilienceError::RateLimited(state.tenant_id.clone()).into());
    }

    let assets = self.resolve_assets(&mut state, workflow_type).await?;
    state.resolved_model_version = Some(assets.model_version.clone());
    state.resolved_prompt_version = Some(assets.prompt_version.clone());

    let pipeline = WorkflowFactory::pipeline(workflow_type, &self.services);
    let start = state.node_cursor.max(0) as usize;
    if start > 0 {
      log::info!("reanudando workflow event_id={} desde nodo {}", state.event_id, start);
    }

    for node in pipeline.iter().skip(start) {
      let result = {
        let ctx = NodeContext::new(&state, &assets, workflow_type);
        match node.validate(&ctx) {
          Err(e) => Err(e),
          Ok(()) => match node.dependency() {
            // Sólo los fallos de infraestructura cuentan contra el circuito.
            Some(dep) => {
              let guard = self.guards.guard(dep);
              guard.call_counting(node.execute(&ctx), |e: &WorkflowError| e.is_retriable()).await
            }
            None => node.execute(&ctx).await,
          },
        }
      };

      match result {
        Ok(output) => {
          let envelope = json!({
            "output": output,
            "completed_at": Utc::now(),
            "model_version": assets.model_version,
            "prompt_version": assets.prompt_version,
          });
          self.flow.append_node(&mut state, node.name(), envelope).await?;
          log::debug!("nodo completado event_id={} node={} cursor={}",
                      state.event_id, node.name(), state.node_cursor);
        }
        Err(e) if e.is_retriable() => {
          log::warn!("nodo interrumpido event_id={} node={} err={}", state.event_id, node.name(), e);
          return Err(e);
        }
        Err(e) => {
          log::error!("nodo fallido event_id={} node={} err={}", state.event_id, node.name(), e);
          self.flow
              .finish(&mut state, WorkflowStatus::Failed, Some(node_failed_reason(node.name())))
              .await?;
          return Err(e);
        }
      }
    }

    let ctx = NodeContext::new(&state, &assets, workflow_type);
    let decision: DecisionOutput = ctx.typed_output(DECISION)?;
    let status = decision.decision.terminal_status();
    let reason = match decision.decision {
      Decision::RequireApproval => {
        self.escalate(&state, &decision).await?;
        Some(REQUIRE_APPROVAL.to_string())
      }
      _ => None,
    };
    self.flow.finish(&mut state, status, reason).await?;
    log::info!("workflow terminado event_id={} tenant_id={} status={} correlation_id={}",
               state.event_id, state.tenant_id, status, state.correlation_id);
    Ok(status)
  }
}

#[async_trait]
impl WorkflowTrigger for WorkflowEngine {
  async fn run(&self, initial: WorkflowState) -> Result<WorkflowStatus, WorkflowError> {
    let state = match self.flow.load(&initial.tenant_id, &initial.event_id).await? {
      Some(existing) => existing,
      None => {
        let mut fresh = initial;
        fresh.version = 0;
        self.flow.persist(&mut fresh).await?;
        fresh
      }
    };
    if state.is_terminal() {
      log::debug!("estado terminal en caché event_id={} status={}", state.event_id, state.status);
      return Ok(state.status);
    }
    self.run_pipeline(state).await
  }
}
