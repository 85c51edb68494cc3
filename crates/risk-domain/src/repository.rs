use crate::{AuditRecord, DomainError, Event};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

/// Contrato de persistencia de eventos.
///
/// Toda lectura está acotada por tenant: si el recurso pertenece a otro
/// tenant la implementación debe responder `DomainError::TenantIsolation`
/// sin exponer ningún dato del recurso.
#[async_trait]
pub trait EventRepository: Send + Sync {
  /// Inserta o actualiza por `(tenant_id, event_id)`. Rechaza con
  /// `IdempotencyConflict` un segundo evento con el mismo
  /// `(tenant_id, idempotency_key)`.
  async fn save(&self, event: &Event) -> Result<(), DomainError>;

  /// Busca un evento del tenant.
  async fn find(&self, tenant_id: &str, event_id: &Uuid) -> Result<Option<Event>, DomainError>;

  /// Busca el evento aceptado para una clave de idempotencia.
  async fn find_by_idempotency(&self, tenant_id: &str, idempotency_key: &str) -> Result<Option<Event>, DomainError>;

  /// Comprueba que el almacenamiento responde.
  async fn ping(&self) -> Result<(), DomainError>;
}

/// Almacenamiento de auditoría: sólo admite anexar.
#[async_trait]
pub trait AuditRepository: Send + Sync {
  async fn append(&self, record: &AuditRecord) -> Result<(), DomainError>;

  async fn ping(&self) -> Result<(), DomainError>;
}

/// Implementación en memoria para tests y desarrollo.
#[derive(Default)]
pub struct InMemoryEventRepository {
  events: Arc<Mutex<HashMap<Uuid, Event>>>,
}

impl InMemoryEventRepository {
  pub fn new() -> Self {
    Self::default()
  }

  /// Número total de eventos, sin filtrar por tenant (sólo para tests).
  pub async fn len(&self) -> usize {
    self.events.lock().await.len()
  }

  pub async fn is_empty(&self) -> bool {
    self.len().await == 0
  }
}

#[async_trait]
impl EventRepository for InMemoryEventRepository {
  async fn save(&self, event: &Event) -> Result<(), DomainError> {
    let mut events = self.events.lock().await;
    if let Some(existing) = events.get(&event.event_id) {
      if existing.tenant_id != event.tenant_id {
        return Err(DomainError::TenantIsolation);
      }
    }
    let clash = events.values().any(|e| {
                                 e.tenant_id == event.tenant_id
                                 && e.idempotency_key == event.idempotency_key
                                 && e.event_id != event.event_id
                               });
    if clash {
      return Err(DomainError::IdempotencyConflict(format!("clave {} ya usada", event.idempotency_key)));
    }
    events.insert(event.event_id, event.clone());
    Ok(())
  }

  async fn find(&self, tenant_id: &str, event_id: &Uuid) -> Result<Option<Event>, DomainError> {
    let events = self.events.lock().await;
    match events.get(event_id) {
      Some(e) if e.tenant_id == tenant_id => Ok(Some(e.clone())),
      Some(_) => {
        log::warn!("acceso cruzado denegado tenant_id={} event_id={}", tenant_id, event_id);
        Err(DomainError::TenantIsolation)
      }
      None => Ok(None),
    }
  }

  async fn find_by_idempotency(&self, tenant_id: &str, idempotency_key: &str) -> Result<Option<Event>, DomainError> {
    let events = self.events.lock().await;
    Ok(events.values()
             .find(|e| e.tenant_id == tenant_id && e.idempotency_key == idempotency_key)
             .cloned())
  }

  async fn ping(&self) -> Result<(), DomainError> {
    Ok(())
  }
}

/// Auditoría en memoria. Expone lectura sólo para inspección en tests; no
/// existe forma de modificar ni borrar registros.
#[derive(Default)]
pub struct InMemoryAuditRepository {
  records: Arc<Mutex<Vec<AuditRecord>>>,
}

impl InMemoryAuditRepository {
  pub fn new() -> Self {
    Self::default()
  }

  pub async fn records(&self) -> Vec<AuditRecord> {
    self.records.lock().await.clone()
  }

  pub async fn records_with_action(&self, action: &str) -> Vec<AuditRecord> {
    self.records
        .lock()
        .await
        .iter()
        .filter(|r| r.action == action)
        .cloned()
        .collect()
  }
}

#[async_trait]
impl AuditRepository for InMemoryAuditRepository {
  async fn append(&self, record: &AuditRecord) -> Result<(), DomainError> {
    self.records.lock().await.push(record.clone());
    Ok(())
  }

  async fn ping(&self) -> Result<(), DomainError> {
    Ok(())
  }
}
