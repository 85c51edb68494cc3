use crate::errors::WorkflowError;
use crate::workflow_type::WorkflowType;
use flow::domain::WorkflowState;
use risk_governance::ResolvedAssets;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;

/// Vista de sólo lectura que recibe cada nodo: el evento original, las
/// salidas previas y los activos gobernados de la ejecución.
pub struct NodeContext<'a> {
  pub state: &'a WorkflowState,
  pub assets: &'a ResolvedAssets,
  pub workflow_type: WorkflowType,
}

impl<'a> NodeContext<'a> {
  pub fn new(state: &'a WorkflowState, assets: &'a ResolvedAssets, workflow_type: WorkflowType) -> Self {
    Self { state,
           assets,
           workflow_type }
  }

  /// Payload del evento tal como se aceptó.
  pub fn payload(&self) -> &JsonValue {
    self.state.raw_event.get("payload").unwrap_or(&JsonValue::Null)
  }

  /// Salida previa deserializada. Falla si el nodo aún no se ejecutó.
  pub fn typed_output<T: DeserializeOwned>(&self, node: &str) -> Result<T, WorkflowError> {
    let raw = self.state
                  .output(node)
                  .and_then(|v| v.get("output"))
                  .ok_or_else(|| WorkflowError::Validation(format!("falta la salida del nodo {}", node)))?;
    Ok(serde_json::from_value(raw.clone())?)
  }
}
