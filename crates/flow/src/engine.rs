// Archivo: engine.rs
// Propósito: helpers de persistencia del estado de workflow.
//
// El motor aquí no ejecuta lógica de nodos: rehidrata el estado desde el
// almacén, registra salidas y delega la persistencia con control optimista.
// La ejecución concreta de nodos vive fuera de este crate.
use crate::domain::{PersistResult, WorkflowState, WorkflowStatus};
use crate::errors::{FlowError, Result};
use crate::repository::WorkflowStateStore;
use serde_json::Value as JsonValue;
use std::sync::Arc;
use uuid::Uuid;

/// Motor rehidratable y resumible.
///
/// - Los métodos que persisten retornan `FlowError::Conflict` cuando la
///   versión esperada no coincide; el llamador decide si recargar o abortar.
/// - Tras cada persistencia exitosa se actualiza `state.version` para que la
///   siguiente escritura sea aceptada.
pub struct FlowEngine<S>
    where S: WorkflowStateStore + ?Sized
{
    store: Arc<S>,
}

impl<S> Clone for FlowEngine<S> where S: WorkflowStateStore + ?Sized
{
    fn clone(&self) -> Self {
        Self { store: self.store.clone() }
    }
}

impl<S> FlowEngine<S> where S: WorkflowStateStore + ?Sized
{
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Rehidrata el estado persistido del evento o crea y persiste uno nuevo.
    pub async fn load_or_start(&self,
                               event_id: Uuid,
                               tenant_id: &str,
                               correlation_id: &str,
                               workflow_type: &str,
                               raw_event: JsonValue)
                               -> Result<WorkflowState> {
        if let Some(existing) = self.store.get(tenant_id, &event_id).await? {
            log::debug!("estado rehidratado event_id={} cursor={} status={}",
                        event_id, existing.node_cursor, existing.status);
            return Ok(existing);
        }
        let mut state = WorkflowState::new(event_id, tenant_id, correlation_id, workflow_type, raw_event);
        self.persist(&mut state).await?;
        Ok(state)
    }

    /// Lectura directa del estado persistido.
    pub async fn load(&self, tenant_id: &str, event_id: &Uuid) -> Result<Option<WorkflowState>> {
        self.store.get(tenant_id, event_id).await
    }

    /// Persiste el estado y avanza su versión local.
    pub async fn persist(&self, state: &mut WorkflowState) -> Result<()> {
        match self.store.put(state).await? {
            PersistResult::Ok { new_version } => {
                state.version = new_version;
                Ok(())
            }
            PersistResult::Conflict => Err(FlowError::Conflict(format!("workflow {} version {}",
                                                                       state.event_id, state.version))),
        }
    }

    /// Registra la salida de un nodo y persiste inmediatamente.
    pub async fn append_node(&self, state: &mut WorkflowState, node_id: &str, output: JsonValue) -> Result<()> {
        state.record_node(node_id, output);
        self.persist(state).await
    }

    /// Marca el estado como terminal y lo persiste.
    pub async fn finish(&self, state: &mut WorkflowState, status: WorkflowStatus, reason: Option<String>) -> Result<()> {
        state.finish(status, reason);
        self.persist(state).await
    }
}
