// event.rs
use crate::validators;
use crate::DomainError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Estados del ciclo de vida de un evento.
///
/// El grafo de transiciones es fijo y se consulta únicamente a través de
/// `EventStatus::can_transition_to`; `Approved`, `Rejected` y `Failed` son
/// terminales.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventStatus {
  Received,
  Created,
  Validated,
  Processing,
  Approved,
  Rejected,
  Failed,
}

impl EventStatus {
  pub const ALL: [EventStatus; 7] = [EventStatus::Received,
                                     EventStatus::Created,
                                     EventStatus::Validated,
                                     EventStatus::Processing,
                                     EventStatus::Approved,
                                     EventStatus::Rejected,
                                     EventStatus::Failed];

  /// Estados alcanzables desde `self` en un solo paso.
  pub fn allowed_transitions(&self) -> &'static [EventStatus] {
    match self {
      EventStatus::Received | EventStatus::Created => &[EventStatus::Validated, EventStatus::Rejected],
      EventStatus::Validated => &[EventStatus::Processing],
      EventStatus::Processing => &[EventStatus::Approved, EventStatus::Rejected, EventStatus::Failed],
      EventStatus::Approved | EventStatus::Rejected | EventStatus::Failed => &[],
    }
  }

  pub fn can_transition_to(&self, to: EventStatus) -> bool {
    self.allowed_transitions().contains(&to)
  }

  pub fn is_terminal(&self) -> bool {
    self.allowed_transitions().is_empty()
  }

  pub fn as_str(&self) -> &'static str {
    match self {
      EventStatus::Received => "received",
      EventStatus::Created => "created",
      EventStatus::Validated => "validated",
      EventStatus::Processing => "processing",
      EventStatus::Approved => "approved",
      EventStatus::Rejected => "rejected",
      EventStatus::Failed => "failed",
    }
  }
}

impl fmt::Display for EventStatus {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.as_str())
  }
}

impl FromStr for EventStatus {
  type Err = DomainError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    EventStatus::ALL.iter()
                    .copied()
                    .find(|st| st.as_str() == s.trim().to_lowercase())
                    .ok_or_else(|| DomainError::ValidationError(format!("estado desconocido: {}", s)))
  }
}

/// Tipo de evento; selecciona el workflow que lo procesa.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventType {
  Risk,
  Compliance,
}

impl EventType {
  pub fn as_str(&self) -> &'static str {
    match self {
      EventType::Risk => "risk",
      EventType::Compliance => "compliance",
    }
  }

  /// Clave de enrutamiento usada al publicar el evento.
  pub fn routing_key(&self) -> String {
    format!("event.{}", self.as_str())
  }
}

impl fmt::Display for EventType {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.as_str())
  }
}

impl FromStr for EventType {
  type Err = DomainError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.trim().to_lowercase().as_str() {
      "risk" => Ok(EventType::Risk),
      "compliance" => Ok(EventType::Compliance),
      other => Err(DomainError::ValidationError(format!("tipo de evento desconocido: {}", other))),
    }
  }
}

/// Solicitud de alta tal como la entrega el llamador, antes de validar.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventRequest {
  pub event_type: String,
  pub payload: JsonValue,
  pub version: String,
}

impl EventRequest {
  pub fn new(event_type: &str, payload: JsonValue, version: &str) -> Self {
    Self { event_type: event_type.to_string(),
           payload,
           version: version.to_string() }
  }
}

/// Evento aceptado. Unidad de idempotencia: `(tenant_id, idempotency_key)` es
/// único en todo repositorio.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
  pub tenant_id: String,
  pub event_id: Uuid,
  pub correlation_id: String,
  pub idempotency_key: String,
  pub event_type: EventType,
  pub payload: JsonValue,
  pub payload_hash: String,
  pub version: String,
  pub status: EventStatus,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

impl Event {
  /// Valida la solicitud y construye un evento nuevo en estado `Received`.
  pub fn accept(request: &EventRequest,
                tenant_id: &str,
                idempotency_key: &str,
                correlation_id: &str)
                -> Result<Self, DomainError> {
    let tenant_id = validators::validate_tenant_id(tenant_id)?;
    validators::validate_idempotency_key(idempotency_key)?;
    validators::validate_version(&request.version)?;
    let event_type: EventType = request.event_type.parse()?;
    validators::validate_payload(&request.payload)?;
    // `risk_score` se valida en cualquier tipo de evento que lo traiga.
    RiskDetails::from_payload(&request.payload)?;
    let now = Utc::now();
    Ok(Self { tenant_id,
              event_id: Uuid::new_v4(),
              correlation_id: correlation_id.to_string(),
              idempotency_key: idempotency_key.trim().to_string(),
              event_type,
              payload_hash: payload_fingerprint(&request.payload)?,
              payload: request.payload.clone(),
              version: request.version.trim().to_string(),
              status: EventStatus::Received,
              created_at: now,
              updated_at: now })
  }

  /// Única vía para cambiar el estado. Una transición ilegal falla sin
  /// modificar el evento.
  pub fn transition_to(&mut self, to: EventStatus) -> Result<(), DomainError> {
    validators::validate_status_transition(self.status, to)?;
    self.status = to;
    self.updated_at = Utc::now();
    Ok(())
  }

  pub fn risk_details(&self) -> Result<RiskDetails, DomainError> {
    RiskDetails::from_payload(&self.payload)
  }

  pub fn compliance_details(&self) -> ComplianceDetails {
    ComplianceDetails::from_payload(&self.payload)
  }
}

/// Campos específicos de eventos de riesgo dentro del payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskDetails {
  pub risk_score: Option<f64>,
  pub category: Option<String>,
}

impl RiskDetails {
  pub fn from_payload(payload: &JsonValue) -> Result<Self, DomainError> {
    let risk_score = match payload.get("risk_score") {
      None | Some(JsonValue::Null) => None,
      Some(v) => {
        let s = v.as_f64()
                 .ok_or_else(|| DomainError::ValidationError("risk_score debe ser numérico".to_string()))?;
        Some(validators::validate_risk_score(s)?)
      }
    };
    let category = payload.get("category").and_then(|v| v.as_str()).map(|s| s.to_string());
    Ok(Self { risk_score, category })
  }
}

/// Campos específicos de eventos de cumplimiento dentro del payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComplianceDetails {
  pub regulation_ref: Option<String>,
  pub compliance_type: Option<String>,
}

impl ComplianceDetails {
  pub fn from_payload(payload: &JsonValue) -> Self {
    let field = |k: &str| payload.get(k).and_then(|v| v.as_str()).map(|s| s.to_string());
    Self { regulation_ref: field("regulation_ref"),
           compliance_type: field("compliance_type") }
  }
}

/// Huella SHA-256 del payload serializado. Permite detectar reutilización de
/// una clave de idempotencia con un cuerpo distinto.
pub fn payload_fingerprint(payload: &JsonValue) -> Result<String, DomainError> {
  let bytes = serde_json::to_vec(payload)?;
  let digest = Sha256::digest(&bytes);
  Ok(digest.iter().map(|b| format!("{:02x}", b)).collect())
}
