use crate::errors::WorkflowError;
use crate::node::NodeContext;
use async_trait::async_trait;
use serde_json::Value as JsonValue;

pub type NodeResult = Result<JsonValue, WorkflowError>;

/// Trait que representa un nodo del pipeline.
#[async_trait]
pub trait WorkflowNode: Send + Sync {
  /// Identificador del nodo; es la clave de su salida en `node_outputs`.
  fn name(&self) -> &str;

  /// Dependencia externa que consulta el nodo. Si existe, la ejecución
  /// pasa por el bulkhead y el circuito de esa dependencia.
  fn dependency(&self) -> Option<&str> {
    None
  }

  /// Validacion previa a la ejecucion.
  fn validate(&self, _ctx: &NodeContext<'_>) -> Result<(), WorkflowError> {
    Ok(())
  }

  /// Ejecuta la logica del nodo y devuelve su salida.
  async fn execute(&self, ctx: &NodeContext<'_>) -> NodeResult;
}
