// Archivo: domain.rs
// Propósito: tipos persistidos del motor de workflow. `WorkflowState` es la
// unidad de reanudación: se guarda después de cada nodo completado.
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Estado de una ejecución. `Processing` es el único estado activo.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkflowStatus {
    Processing,
    Approved,
    Rejected,
    Failed,
}

impl WorkflowStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, WorkflowStatus::Processing)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            WorkflowStatus::Processing => "processing",
            WorkflowStatus::Approved => "approved",
            WorkflowStatus::Rejected => "rejected",
            WorkflowStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for WorkflowStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for WorkflowStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "processing" => Ok(WorkflowStatus::Processing),
            "approved" => Ok(WorkflowStatus::Approved),
            "rejected" => Ok(WorkflowStatus::Rejected),
            "failed" => Ok(WorkflowStatus::Failed),
            other => Err(format!("estado de workflow desconocido: {}", other)),
        }
    }
}

/// Resultado del almacenamiento con control optimista.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PersistResult {
    Ok { new_version: i64 },
    Conflict,
}

/// Estado persistido de la ejecución de un evento.
///
/// - `node_cursor`: cantidad de nodos completados; el siguiente nodo a
///   ejecutar es el de índice `node_cursor`.
/// - `node_outputs`: salida de cada nodo en orden de ejecución.
/// - `version`: contador optimista; `0` indica que nunca se persistió.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowState {
    pub event_id: Uuid,
    pub tenant_id: String,
    pub correlation_id: String,
    pub workflow_type: String,
    pub raw_event: JsonValue,
    pub node_cursor: i64,
    pub node_outputs: IndexMap<String, JsonValue>,
    pub resolved_model_version: Option<String>,
    pub resolved_prompt_version: Option<String>,
    pub status: WorkflowStatus,
    pub failure_reason: Option<String>,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl WorkflowState {
    pub fn new(event_id: Uuid, tenant_id: &str, correlation_id: &str, workflow_type: &str, raw_event: JsonValue) -> Self {
        let now = Utc::now();
        Self { event_id,
               tenant_id: tenant_id.to_string(),
               correlation_id: correlation_id.to_string(),
               workflow_type: workflow_type.to_string(),
               raw_event,
               node_cursor: 0,
               node_outputs: IndexMap::new(),
               resolved_model_version: None,
               resolved_prompt_version: None,
               status: WorkflowStatus::Processing,
               failure_reason: None,
               version: 0,
               created_at: now,
               updated_at: now }
    }

    /// Registra la salida de un nodo y avanza el cursor.
    pub fn record_node(&mut self, node_id: &str, output: JsonValue) {
        self.node_outputs.insert(node_id.to_string(), output);
        self.node_cursor = self.node_outputs.len() as i64;
        self.updated_at = Utc::now();
    }

    /// Salida previa de un nodo, si ya se ejecutó.
    pub fn output(&self, node_id: &str) -> Option<&JsonValue> {
        self.node_outputs.get(node_id)
    }

    pub fn finish(&mut self, status: WorkflowStatus, reason: Option<String>) {
        self.status = status;
        self.failure_reason = reason;
        self.updated_at = Utc::now();
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}
