use risk_domain::ErrorKind;
use thiserror::Error;

// Errores comunes del motor de workflow.
//
// Este enum centraliza los errores que pueden ocurrir durante una
// ejecución: persistencia del estado (`FlowError`), gobernanza, primitivas
// de resiliencia, auditoría, dominio y fallos propios de un nodo.
#[derive(Error, Debug)]
pub enum WorkflowError {
  /// Errores originados por el almacén de estado (crate flow).
  #[error("Error de flujo: {0}")]
  Flow(#[from] flow::errors::FlowError),

  /// Modelo o prompt no aprobado, o registro inaccesible.
  #[error("Error de gobernanza: {0}")]
  Governance(#[from] risk_governance::GovernanceError),

  /// Circuito abierto, bulkhead lleno o límite de tasa.
  #[error("Error de resiliencia: {0}")]
  Resilience(#[from] risk_resilience::ResilienceError),

  #[error("Error de auditoría: {0}")]
  Audit(#[from] risk_audit::AuditError),

  /// Invariantes del dominio (por ejemplo score fuera de rango).
  #[error("Error de dominio: {0}")]
  Domain(#[from] risk_domain::DomainError),

  /// Fallo de un nodo concreto. `kind` indica si es transitorio.
  #[error("Nodo {node} falló: {message}")]
  Node { node: String, message: String, kind: ErrorKind },

  #[error("Error de serializacion: {0}")]
  Serialization(#[from] serde_json::Error),

  /// Errores de validacion local del workflow.
  #[error("Error de validacion: {0}")]
  Validation(String),
}

impl WorkflowError {
  pub fn node(node: &str, message: impl Into<String>, kind: ErrorKind) -> Self {
    WorkflowError::Node { node: node.to_string(),
                          message: message.into(),
                          kind }
  }

  pub fn kind(&self) -> ErrorKind {
    use flow::errors::FlowError;
    match self {
      WorkflowError::Flow(FlowError::TenantIsolation) => ErrorKind::TenantIsolation,
      WorkflowError::Flow(FlowError::NotFound(_)) => ErrorKind::Validation,
      WorkflowError::Flow(FlowError::Other(_)) => ErrorKind::Unexpected,
      WorkflowError::Flow(_) => ErrorKind::Infrastructure,
      WorkflowError::Governance(e) => e.kind(),
      WorkflowError::Resilience(_) | WorkflowError::Audit(_) => ErrorKind::Infrastructure,
      WorkflowError::Domain(e) => e.kind(),
      WorkflowError::Node { kind, .. } => *kind,
      WorkflowError::Serialization(_) => ErrorKind::Unexpected,
      WorkflowError::Validation(_) => ErrorKind::Validation,
    }
  }

  /// Un error transitorio deja el estado en `Processing` para reanudar.
  pub fn is_retriable(&self) -> bool {
    self.kind().is_retriable()
  }
}
