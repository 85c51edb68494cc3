// validators.rs
//! Validadores puros reutilizados por `Event::accept` y por los adaptadores
//! que reciben datos desde fuera del proceso.
use crate::event::EventStatus;
use crate::DomainError;
use serde_json::Value as JsonValue;

pub const MIN_RISK_SCORE: f64 = 0.0;
pub const MAX_RISK_SCORE: f64 = 100.0;

/// Normaliza y valida el identificador de tenant.
pub fn validate_tenant_id(tenant_id: &str) -> Result<String, DomainError> {
  let t = tenant_id.trim();
  if t.is_empty() {
    return Err(DomainError::InvalidTenant("tenant_id no puede estar vacío".to_string()));
  }
  Ok(t.to_string())
}

pub fn validate_idempotency_key(key: &str) -> Result<(), DomainError> {
  if key.trim().is_empty() {
    return Err(DomainError::ValidationError("idempotency_key no puede estar vacío".to_string()));
  }
  Ok(())
}

pub fn validate_version(version: &str) -> Result<(), DomainError> {
  if version.trim().is_empty() {
    return Err(DomainError::ValidationError("version no puede estar vacía".to_string()));
  }
  Ok(())
}

pub fn validate_risk_score(score: f64) -> Result<f64, DomainError> {
  if !score.is_finite() || !(MIN_RISK_SCORE..=MAX_RISK_SCORE).contains(&score) {
    return Err(DomainError::RiskThresholdViolation { score,
                                                     min: MIN_RISK_SCORE,
                                                     max: MAX_RISK_SCORE });
  }
  Ok(score)
}

/// La metadata, si está presente, debe ser un objeto JSON.
pub fn validate_metadata(metadata: Option<&JsonValue>) -> Result<(), DomainError> {
  match metadata {
    None | Some(JsonValue::Null) | Some(JsonValue::Object(_)) => Ok(()),
    Some(other) => Err(DomainError::InvalidMetadata(format!("se esperaba un objeto, se recibió {}", other))),
  }
}

pub fn validate_payload(payload: &JsonValue) -> Result<(), DomainError> {
  if !payload.is_object() {
    return Err(DomainError::ValidationError("payload debe ser un objeto JSON".to_string()));
  }
  validate_metadata(payload.get("metadata"))
}

pub fn validate_status_transition(from: EventStatus, to: EventStatus) -> Result<(), DomainError> {
  if from.can_transition_to(to) {
    Ok(())
  } else {
    Err(DomainError::InvalidStatusTransition { from, to })
  }
}
