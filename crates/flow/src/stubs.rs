// Archivo: stubs.rs
// Propósito: implementación en memoria del almacén de estados para pruebas
// y wiring rápido. No es durable.
use crate::domain::{PersistResult, WorkflowState};
use crate::errors::{FlowError, Result};
use crate::repository::WorkflowStateStore;
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::Mutex;
use uuid::Uuid;

#[derive(Default)]
pub struct InMemoryWorkflowStateStore {
    /// Estados indexados por `event_id`.
    states: Mutex<HashMap<Uuid, WorkflowState>>,
    /// Número de escrituras aceptadas (útil para verificar reanudación).
    writes: Mutex<u64>,
}

impl InMemoryWorkflowStateStore {
    /// Crea una nueva instancia del almacén en memoria.
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn write_count(&self) -> u64 {
        *self.writes.lock().await
    }
}

#[async_trait]
impl WorkflowStateStore for InMemoryWorkflowStateStore {
    async fn get(&self, tenant_id: &str, event_id: &Uuid) -> Result<Option<WorkflowState>> {
        let states = self.states.lock().await;
        match states.get(event_id) {
            Some(st) if st.tenant_id == tenant_id => Ok(Some(st.clone())),
            Some(_) => Err(FlowError::TenantIsolation),
            None => Ok(None),
        }
    }

    async fn put(&self, state: &WorkflowState) -> Result<PersistResult> {
        let mut states = self.states.lock().await;
        let current = match states.get(&state.event_id) {
            Some(existing) if existing.tenant_id != state.tenant_id => return Err(FlowError::TenantIsolation),
            Some(existing) => existing.version,
            None => 0,
        };
        // Optimistic concurrency: la versión del llamador debe ser la actual
        if current != state.version {
            return Ok(PersistResult::Conflict);
        }
        let new_version = current.saturating_add(1);
        let mut stored = state.clone();
        stored.version = new_version;
        states.insert(state.event_id, stored);
        *self.writes.lock().await += 1;
        Ok(PersistResult::Ok { new_version })
    }
}
