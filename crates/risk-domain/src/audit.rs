// audit.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

/// Registro de auditoría inmutable. No existe ruta de actualización ni
/// borrado en ninguna capa.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
  pub id: Uuid,
  pub actor: String,
  pub action: String,
  pub resource_type: String,
  pub resource_id: String,
  pub previous_state: Option<JsonValue>,
  pub new_state: Option<JsonValue>,
  pub reason: Option<String>,
  pub metadata: Option<JsonValue>,
  pub correlation_id: String,
  pub tenant_id: String,
  pub created_at: DateTime<Utc>,
}

/// Datos que aporta quien audita; `id` y `created_at` los asigna el escritor.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
  pub actor: String,
  pub action: String,
  pub resource_type: String,
  pub resource_id: String,
  pub correlation_id: String,
  pub tenant_id: String,
  pub previous_state: Option<JsonValue>,
  pub new_state: Option<JsonValue>,
  pub reason: Option<String>,
  pub metadata: Option<JsonValue>,
}

impl AuditEntry {
  pub fn new(actor: &str, action: &str, resource_type: &str, resource_id: &str, correlation_id: &str, tenant_id: &str) -> Self {
    Self { actor: actor.to_string(),
           action: action.to_string(),
           resource_type: resource_type.to_string(),
           resource_id: resource_id.to_string(),
           correlation_id: correlation_id.to_string(),
           tenant_id: tenant_id.to_string(),
           ..Default::default() }
  }

  pub fn with_states(mut self, previous: Option<JsonValue>, new: Option<JsonValue>) -> Self {
    self.previous_state = previous;
    self.new_state = new;
    self
  }

  pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
    self.reason = Some(reason.into());
    self
  }

  pub fn with_metadata(mut self, metadata: JsonValue) -> Self {
    self.metadata = Some(metadata);
    self
  }

  /// Sella la entrada con id y marca de tiempo UTC.
  pub fn into_record(self) -> AuditRecord {
    AuditRecord { id: Uuid::new_v4(),
                  actor: self.actor,
                  action: self.action,
                  resource_type: self.resource_type,
                  resource_id: self.resource_id,
                  previous_state: self.previous_state,
                  new_state: self.new_state,
                  reason: self.reason,
                  metadata: self.metadata,
                  correlation_id: self.correlation_id,
                  tenant_id: self.tenant_id,
                  created_at: Utc::now() }
  }
}
