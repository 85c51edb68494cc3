// Archivo: repository.rs
// Propósito: definir el contrato `WorkflowStateStore` que deben implementar
// las persistencias del estado de workflow (Diesel, in-memory, etc.).
use crate::domain::{PersistResult, WorkflowState};
use crate::errors::Result;
use async_trait::async_trait;
use uuid::Uuid;

/// Almacén del estado de ejecución por evento.
///
/// `put` aplica control optimista: el `version` del estado recibido debe
/// coincidir con el almacenado (o ser `0` si aún no existe). Si coincide, el
/// almacén guarda el estado con `version + 1` y devuelve
/// `PersistResult::Ok { new_version }`; si no, `PersistResult::Conflict`.
#[async_trait]
pub trait WorkflowStateStore: Send + Sync {
    /// Obtiene el estado del evento. Devuelve `FlowError::TenantIsolation` si
    /// existe bajo otro tenant.
    async fn get(&self, tenant_id: &str, event_id: &Uuid) -> Result<Option<WorkflowState>>;

    /// Persiste el estado con control de versión.
    async fn put(&self, state: &WorkflowState) -> Result<PersistResult>;

    /// Comprueba que el almacenamiento responde.
    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}
