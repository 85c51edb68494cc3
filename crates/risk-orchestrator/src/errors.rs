use crate::publisher::PublishError;
use risk_audit::AuditError;
use risk_domain::{DomainError, ErrorKind};
use risk_persistence::PersistenceError;
use risk_resilience::ResilienceError;
use risk_workflow::WorkflowError;
use thiserror::Error;

/// Errores que ve quien llama al orquestador.
#[derive(Debug, Error)]
pub enum OrchestratorError {
  #[error(transparent)]
  Domain(#[from] DomainError),

  #[error(transparent)]
  Resilience(#[from] ResilienceError),

  #[error(transparent)]
  Audit(#[from] AuditError),

  #[error(transparent)]
  Workflow(#[from] WorkflowError),

  #[error("Persistencia no disponible: {0}")]
  Persistence(#[from] PersistenceError),

  #[error("Publicación fallida: {0}")]
  Publish(#[from] PublishError),

  /// Otra petición con la misma clave sigue en curso.
  #[error("Petición en curso para la clave {0}")]
  IdempotencyInProgress(String),

  #[error("Configuración inválida: {0}")]
  Config(String),

  #[error("Error de serialización: {0}")]
  Serialization(#[from] serde_json::Error),
}

impl OrchestratorError {
  pub fn kind(&self) -> ErrorKind {
    match self {
      OrchestratorError::Domain(e) => e.kind(),
      OrchestratorError::Workflow(e) => e.kind(),
      OrchestratorError::Resilience(_)
      | OrchestratorError::Audit(_)
      | OrchestratorError::Persistence(_)
      | OrchestratorError::Publish(_)
      | OrchestratorError::IdempotencyInProgress(_) => ErrorKind::Infrastructure,
      OrchestratorError::Config(_) | OrchestratorError::Serialization(_) => ErrorKind::Unexpected,
    }
  }

  /// `true` cuando repetir la misma petición con la misma clave es seguro.
  pub fn is_retriable(&self) -> bool {
    self.kind().is_retriable()
  }
}
