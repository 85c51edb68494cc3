use flow::errors::FlowError;
use risk_domain::DomainError;
use risk_governance::GovernanceError;
use risk_resilience::ResilienceError;
use thiserror::Error;

/// Errores del adaptador Diesel. Cada contrato del dominio recibe su propio
/// error mediante las conversiones de abajo.
#[derive(Debug, Error)]
pub enum PersistenceError {
  #[error("pool: {0}")]
  Pool(String),
  #[error("db: {0}")]
  Query(#[from] diesel::result::Error),
  #[error("migraciones: {0}")]
  Migration(String),
  #[error("tarea bloqueante: {0}")]
  Join(String),
  #[error("serialización: {0}")]
  Serialization(#[from] serde_json::Error),
  #[error("configuración: {0}")]
  Config(String),
  /// Fila ilegible (uuid, estado o JSON inválido).
  #[error("fila corrupta: {0}")]
  Corrupt(String),
}

impl From<PersistenceError> for DomainError {
  fn from(e: PersistenceError) -> Self {
    DomainError::Repository(e.to_string())
  }
}

impl From<PersistenceError> for FlowError {
  fn from(e: PersistenceError) -> Self {
    FlowError::Storage(e.to_string())
  }
}

impl From<PersistenceError> for GovernanceError {
  fn from(e: PersistenceError) -> Self {
    GovernanceError::Registry(e.to_string())
  }
}

impl From<PersistenceError> for ResilienceError {
  fn from(e: PersistenceError) -> Self {
    ResilienceError::Store(e.to_string())
  }
}
