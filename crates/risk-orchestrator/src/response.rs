use chrono::{DateTime, Utc};
use risk_domain::{Event, EventStatus};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Respuesta de aceptación. Se cachea como JSON para que todos los
/// llamadores con la misma clave reciban exactamente el mismo contenido.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventResponse {
  pub event_id: Uuid,
  pub tenant_id: String,
  pub correlation_id: String,
  pub idempotency_key: String,
  pub status: EventStatus,
  pub accepted_at: DateTime<Utc>,
}

impl EventResponse {
  pub fn from_event(event: &Event) -> Self {
    Self { event_id: event.event_id,
           tenant_id: event.tenant_id.clone(),
           correlation_id: event.correlation_id.clone(),
           idempotency_key: event.idempotency_key.clone(),
           status: event.status,
           accepted_at: event.created_at }
  }

  pub fn to_json(&self) -> Result<String, serde_json::Error> {
    serde_json::to_string(self)
  }

  pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
    serde_json::from_str(raw)
  }
}
