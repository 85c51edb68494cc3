use crate::db::{from_ms, to_ms, Database, DbConn};
use crate::errors::PersistenceError;
use crate::schema::{audit_logs, events};
use async_trait::async_trait;
use diesel::prelude::*;
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use risk_domain::{AuditRecord, AuditRepository, DomainError, Event, EventRepository};
use uuid::Uuid;

#[derive(Debug, Queryable, Insertable)]
#[diesel(table_name = events)]
struct EventRow {
  event_id: String,
  tenant_id: String,
  correlation_id: String,
  idempotency_key: String,
  event_type: String,
  payload: String,
  payload_hash: String,
  version: String,
  status: String,
  created_at_ms: i64,
  updated_at_ms: i64,
}

impl EventRow {
  fn from_event(e: &Event) -> Result<Self, PersistenceError> {
    Ok(Self { event_id: e.event_id.to_string(),
              tenant_id: e.tenant_id.clone(),
              correlation_id: e.correlation_id.clone(),
              idempotency_key: e.idempotency_key.clone(),
              event_type: e.event_type.to_string(),
              payload: serde_json::to_string(&e.payload)?,
              payload_hash: e.payload_hash.clone(),
              version: e.version.clone(),
              status: e.status.to_string(),
              created_at_ms: to_ms(e.created_at),
              updated_at_ms: to_ms(e.updated_at) })
  }

  fn into_event(self) -> Result<Event, PersistenceError> {
    let corrupt = |what: &str, err: String| PersistenceError::Corrupt(format!("evento {}: {} ({})", self.event_id, what, err));
    Ok(Event { event_id: Uuid::parse_str(&self.event_id).map_err(|e| corrupt("event_id", e.to_string()))?,
               event_type: self.event_type.parse().map_err(|e: DomainError| corrupt("event_type", e.to_string()))?,
               status: self.status.parse().map_err(|e: DomainError| corrupt("status", e.to_string()))?,
               payload: serde_json::from_str(&self.payload)?,
               created_at: from_ms(self.created_at_ms)?,
               updated_at: from_ms(self.updated_at_ms)?,
               tenant_id: self.tenant_id,
               correlation_id: self.correlation_id,
               idempotency_key: self.idempotency_key,
               payload_hash: self.payload_hash,
               version: self.version })
  }
}

enum SaveOutcome {
  Saved,
  OtherTenant,
  KeyTaken,
}

fn save_row(conn: &mut DbConn, row: &EventRow) -> Result<SaveOutcome, DieselError> {
  use crate::schema::events::dsl;
  conn.transaction::<_, DieselError, _>(|conn| {
        let owner = dsl::events.filter(dsl::event_id.eq(&row.event_id))
                               .select(dsl::tenant_id)
                               .first::<String>(conn)
                               .optional()?;
        match owner {
          Some(t) if t != row.tenant_id => Ok(SaveOutcome::OtherTenant),
          Some(_) => {
            // Sólo el estado cambia tras la aceptación.
            diesel::update(dsl::events.filter(dsl::event_id.eq(&row.event_id)))
              .set((dsl::status.eq(&row.status), dsl::updated_at_ms.eq(row.updated_at_ms)))
              .execute(conn)?;
            Ok(SaveOutcome::Saved)
          }
          None => match diesel::insert_into(dsl::events).values(row).execute(conn) {
            Ok(_) => Ok(SaveOutcome::Saved),
            Err(DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _)) => Ok(SaveOutcome::KeyTaken),
            Err(e) => Err(e),
          },
        }
      })
}

/// Repositorio Diesel de eventos.
#[derive(Clone)]
pub struct DieselEventRepository {
  db: Database,
}

impl DieselEventRepository {
  pub fn new(db: Database) -> Self {
    Self { db }
  }
}

#[async_trait]
impl EventRepository for DieselEventRepository {
  async fn save(&self, event: &Event) -> Result<(), DomainError> {
    let row = EventRow::from_event(event)?;
    let key = event.idempotency_key.clone();
    let outcome = self.db.run(move |conn| Ok(save_row(conn, &row)?)).await?;
    match outcome {
      SaveOutcome::Saved => Ok(()),
      SaveOutcome::OtherTenant => Err(DomainError::TenantIsolation),
      SaveOutcome::KeyTaken => Err(DomainError::IdempotencyConflict(format!("clave {} ya usada", key))),
    }
  }

  async fn find(&self, tenant_id: &str, event_id: &Uuid) -> Result<Option<Event>, DomainError> {
    use crate::schema::events::dsl;
    let id = event_id.to_string();
    let row = self.db
                  .run(move |conn| Ok(dsl::events.filter(dsl::event_id.eq(&id)).first::<EventRow>(conn).optional()?))
                  .await?;
    match row {
      Some(r) if r.tenant_id == tenant_id => Ok(Some(r.into_event()?)),
      Some(_) => {
        log::warn!("acceso cruzado denegado tenant_id={} event_id={}", tenant_id, event_id);
        Err(DomainError::TenantIsolation)
      }
      None => Ok(None),
    }
  }

  async fn find_by_idempotency(&self, tenant_id: &str, idempotency_key: &str) -> Result<Option<Event>, DomainError> {
    use crate::schema::events::dsl;
    let (tenant, key) = (tenant_id.to_string(), idempotency_key.to_string());
    let row = self.db
                  .run(move |conn| {
                    Ok(dsl::events.filter(dsl::tenant_id.eq(&tenant))
                                  .filter(dsl::idempotency_key.eq(&key))
                                  .first::<EventRow>(conn)
                                  .optional()?)
                  })
                  .await?;
    Ok(row.map(EventRow::into_event).transpose()?)
  }

  async fn ping(&self) -> Result<(), DomainError> {
    Ok(self.db.ping().await?)
  }
}

#[derive(Debug, Insertable)]
#[diesel(table_name = audit_logs)]
struct AuditRow {
  id: String,
  actor: String,
  action: String,
  resource_type: String,
  resource_id: String,
  previous_state: Option<String>,
  new_state: Option<String>,
  reason: Option<String>,
  metadata: Option<String>,
  correlation_id: String,
  tenant_id: String,
  created_at_ms: i64,
}

impl AuditRow {
  fn from_record(r: &AuditRecord) -> Result<Self, PersistenceError> {
    let json = |v: &Option<serde_json::Value>| v.as_ref().map(serde_json::to_string).transpose();
    Ok(Self { id: r.id.to_string(),
              actor: r.actor.clone(),
              action: r.action.clone(),
              resource_type: r.resource_type.clone(),
              resource_id: r.resource_id.clone(),
              previous_state: json(&r.previous_state)?,
              new_state: json(&r.new_state)?,
              reason: r.reason.clone(),
              metadata: json(&r.metadata)?,
              correlation_id: r.correlation_id.clone(),
              tenant_id: r.tenant_id.clone(),
              created_at_ms: to_ms(r.created_at) })
  }
}

/// Auditoría Diesel: sólo existe `INSERT` sobre `audit_logs`.
#[derive(Clone)]
pub struct DieselAuditRepository {
  db: Database,
}

impl DieselAuditRepository {
  pub fn new(db: Database) -> Self {
    Self { db }
  }

  /// Lectura por tenant para inspección, en orden de escritura.
  pub async fn list_for_tenant(&self, tenant_id: &str) -> Result<Vec<(String, String)>, DomainError> {
    use crate::schema::audit_logs::dsl;
    let tenant = tenant_id.to_string();
    Ok(self.db
           .run(move |conn| {
             Ok(dsl::audit_logs.filter(dsl::tenant_id.eq(&tenant))
                               .order(dsl::created_at_ms.asc())
                               .select((dsl::action, dsl::resource_id))
                               .load::<(String, String)>(conn)?)
           })
           .await?)
  }
}

#[async_trait]
impl AuditRepository for DieselAuditRepository {
  async fn append(&self, record: &AuditRecord) -> Result<(), DomainError> {
    let row = AuditRow::from_record(record)?;
    self.db
        .run(move |conn| {
          diesel::insert_into(audit_logs::table).values(&row).execute(conn)?;
          Ok(())
        })
        .await?;
    Ok(())
  }

  async fn ping(&self) -> Result<(), DomainError> {
    Ok(self.db.ping().await?)
  }
}
