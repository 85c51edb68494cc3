// errors.rs
use crate::event::EventStatus;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Clasificación transversal de errores compartida por todas las capas.
///
/// Cada crate mapea sus errores propios a un `ErrorKind`; el clasificador de
/// fallos y la política de reintentos sólo razonan sobre este enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
  Validation,
  InvalidStatusTransition,
  TenantIsolation,
  ModelNotApproved,
  PromptNotApproved,
  RiskThresholdViolation,
  Infrastructure,
  WorkflowNode,
  IdempotencyConflict,
  Unexpected,
}

impl ErrorKind {
  /// Sólo los errores de infraestructura son seguros de reintentar.
  pub fn is_retriable(&self) -> bool {
    matches!(self, ErrorKind::Infrastructure)
  }
}

impl fmt::Display for ErrorKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let s = match self {
      ErrorKind::Validation => "VALIDATION",
      ErrorKind::InvalidStatusTransition => "INVALID_STATUS_TRANSITION",
      ErrorKind::TenantIsolation => "TENANT_ISOLATION",
      ErrorKind::ModelNotApproved => "MODEL_NOT_APPROVED",
      ErrorKind::PromptNotApproved => "PROMPT_NOT_APPROVED",
      ErrorKind::RiskThresholdViolation => "RISK_THRESHOLD_VIOLATION",
      ErrorKind::Infrastructure => "INFRASTRUCTURE",
      ErrorKind::WorkflowNode => "WORKFLOW_NODE",
      ErrorKind::IdempotencyConflict => "IDEMPOTENCY_CONFLICT",
      ErrorKind::Unexpected => "UNEXPECTED",
    };
    write!(f, "{}", s)
  }
}

#[derive(Debug, Error, Clone)]
pub enum DomainError {
  #[error("Error de validación: {0}")]
  ValidationError(String),
  #[error("Tenant inválido: {0}")]
  InvalidTenant(String),
  #[error("Transición de estado inválida: {from} -> {to}")]
  InvalidStatusTransition { from: EventStatus, to: EventStatus },
  /// Denegación genérica: nunca revela si el recurso existe en otro tenant.
  #[error("Acceso denegado")]
  TenantIsolation,
  #[error("risk_score {score} fuera del rango permitido [{min}, {max}]")]
  RiskThresholdViolation { score: f64, min: f64, max: f64 },
  #[error("Metadata inválida: {0}")]
  InvalidMetadata(String),
  #[error("No encontrado: {0}")]
  NotFound(String),
  #[error("Conflicto de idempotencia: {0}")]
  IdempotencyConflict(String),
  #[error("Error de repositorio: {0}")]
  Repository(String),
  #[error("Error de serialización: {0}")]
  SerializationError(String),
}

impl DomainError {
  pub fn kind(&self) -> ErrorKind {
    match self {
      DomainError::ValidationError(_)
      | DomainError::InvalidTenant(_)
      | DomainError::InvalidMetadata(_)
      | DomainError::NotFound(_) => ErrorKind::Validation,
      DomainError::InvalidStatusTransition { .. } => ErrorKind::InvalidStatusTransition,
      DomainError::TenantIsolation => ErrorKind::TenantIsolation,
      DomainError::RiskThresholdViolation { .. } => ErrorKind::RiskThresholdViolation,
      DomainError::IdempotencyConflict(_) => ErrorKind::IdempotencyConflict,
      DomainError::Repository(_) => ErrorKind::Infrastructure,
      DomainError::SerializationError(_) => ErrorKind::Unexpected,
    }
  }
}

impl From<serde_json::Error> for DomainError {
  fn from(e: serde_json::Error) -> Self {
    Self::SerializationError(e.to_string())
  }
}
