use crate::errors::WorkflowError;
use async_trait::async_trait;
use flow::domain::{WorkflowState, WorkflowStatus};

/// Punto de entrada que usa el orquestador para disparar un workflow.
///
/// `run` recibe el estado inicial del evento; si ya existe un estado
/// persistido para ese evento se reanuda desde él. Devuelve el estado
/// terminal alcanzado.
#[async_trait]
pub trait WorkflowTrigger: Send + Sync {
  async fn run(&self, state: WorkflowState) -> Result<WorkflowStatus, WorkflowError>;
}

/// Disparador que sólo registra la petición. Útil cuando el procesamiento
/// vive en otro proceso que consume la cola.
#[derive(Debug, Default, Clone)]
pub struct NoopWorkflowTrigger;

#[async_trait]
impl WorkflowTrigger for NoopWorkflowTrigger {
  async fn run(&self, state: WorkflowState) -> Result<WorkflowStatus, WorkflowError> {
    log::info!("workflow delegado event_id={} tenant_id={} type={} correlation_id={}",
               state.event_id, state.tenant_id, state.workflow_type, state.correlation_id);
    Ok(state.status)
  }
}
