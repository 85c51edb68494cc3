use risk_domain::{AuditEntry, AuditRecord, AuditRepository, DomainError, ErrorKind};
use std::sync::Arc;
use thiserror::Error;

/// Acciones registradas por el orquestador y el motor.
pub mod actions {
  pub const EVENT_ACCEPTED: &str = "EVENT_ACCEPTED";
  pub const STATUS_CHANGED: &str = "STATUS_CHANGED";
  pub const GOVERNANCE_VIOLATION: &str = "GOVERNANCE_VIOLATION";
  pub const WORKFLOW_FAILED: &str = "WORKFLOW_FAILED";
  pub const ESCALATION_REQUESTED: &str = "ESCALATION_REQUESTED";
}

pub const SYSTEM_ACTOR: &str = "system";

#[derive(Debug, Error, Clone)]
pub enum AuditError {
  /// Una escritura de auditoría fallida nunca se ignora.
  #[error("No se pudo escribir auditoría: {0}")]
  Write(#[from] DomainError),
}

impl AuditError {
  pub fn kind(&self) -> ErrorKind {
    ErrorKind::Infrastructure
  }
}

/// Escritor de auditoría sólo-anexar.
#[derive(Clone)]
pub struct AuditLogger {
  repo: Arc<dyn AuditRepository>,
}

impl AuditLogger {
  pub fn new(repo: Arc<dyn AuditRepository>) -> Self {
    Self { repo }
  }

  /// Sella y anexa la entrada. Devuelve el registro persistido.
  pub async fn record(&self, entry: AuditEntry) -> Result<AuditRecord, AuditError> {
    let record = entry.into_record();
    if let Err(e) = self.repo.append(&record).await {
      log::error!("auditoría fallida action={} resource={}:{} tenant_id={} correlation_id={} err={}",
                  record.action, record.resource_type, record.resource_id, record.tenant_id, record.correlation_id, e);
      return Err(AuditError::Write(e));
    }
    log::debug!("auditoría action={} resource={}:{} tenant_id={}",
                record.action, record.resource_type, record.resource_id, record.tenant_id);
    Ok(record)
  }

  pub async fn ping(&self) -> Result<(), AuditError> {
    Ok(self.repo.ping().await?)
  }
}
