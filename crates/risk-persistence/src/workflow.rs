use crate::db::{from_ms, to_ms, Database, DbConn};
use crate::errors::PersistenceError;
use crate::schema::workflow_states;
use async_trait::async_trait;
use diesel::prelude::*;
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use flow::domain::{PersistResult, WorkflowState};
use flow::errors::{FlowError, Result};
use flow::repository::WorkflowStateStore;
use uuid::Uuid;

#[derive(Debug, Queryable, Insertable)]
#[diesel(table_name = workflow_states)]
struct WorkflowStateRow {
  event_id: String,
  tenant_id: String,
  correlation_id: String,
  workflow_type: String,
  raw_event: String,
  node_cursor: i64,
  node_outputs: String,
  resolved_model_version: Option<String>,
  resolved_prompt_version: Option<String>,
  status: String,
  failure_reason: Option<String>,
  version: i64,
  created_at_ms: i64,
  updated_at_ms: i64,
}

impl WorkflowStateRow {
  fn from_state(s: &WorkflowState, version: i64) -> std::result::Result<Self, PersistenceError> {
    Ok(Self { event_id: s.event_id.to_string(),
              tenant_id: s.tenant_id.clone(),
              correlation_id: s.correlation_id.clone(),
              workflow_type: s.workflow_type.clone(),
              raw_event: serde_json::to_string(&s.raw_event)?,
              node_cursor: s.node_cursor,
              node_outputs: serde_json::to_string(&s.node_outputs)?,
              resolved_model_version: s.resolved_model_version.clone(),
              resolved_prompt_version: s.resolved_prompt_version.clone(),
              status: s.status.to_string(),
              failure_reason: s.failure_reason.clone(),
              version,
              created_at_ms: to_ms(s.created_at),
              updated_at_ms: to_ms(s.updated_at) })
  }

  fn into_state(self) -> std::result::Result<WorkflowState, PersistenceError> {
    Ok(WorkflowState { event_id: Uuid::parse_str(&self.event_id).map_err(|e| PersistenceError::Corrupt(e.to_string()))?,
                       raw_event: serde_json::from_str(&self.raw_event)?,
                       node_outputs: serde_json::from_str(&self.node_outputs)?,
                       status: self.status.parse().map_err(PersistenceError::Corrupt)?,
                       created_at: from_ms(self.created_at_ms)?,
                       updated_at: from_ms(self.updated_at_ms)?,
                       tenant_id: self.tenant_id,
                       correlation_id: self.correlation_id,
                       workflow_type: self.workflow_type,
                       node_cursor: self.node_cursor,
                       resolved_model_version: self.resolved_model_version,
                       resolved_prompt_version: self.resolved_prompt_version,
                       failure_reason: self.failure_reason,
                       version: self.version })
  }
}

enum PutOutcome {
  Written(i64),
  Conflict,
  OtherTenant,
}

fn put_row(conn: &mut DbConn, row: &WorkflowStateRow, expected: i64) -> std::result::Result<PutOutcome, DieselError> {
  use crate::schema::workflow_states::dsl;
  conn.transaction::<_, DieselError, _>(|conn| {
        let current = dsl::workflow_states.filter(dsl::event_id.eq(&row.event_id))
                                          .select((dsl::tenant_id, dsl::version))
                                          .first::<(String, i64)>(conn)
                                          .optional()?;
        match current {
          Some((tenant, _)) if tenant != row.tenant_id => Ok(PutOutcome::OtherTenant),
          Some((_, v)) if v == expected => {
            // La condición sobre `version` es la que garantiza el control
            // optimista entre réplicas.
            let n = diesel::update(dsl::workflow_states.filter(dsl::event_id.eq(&row.event_id))
                                                       .filter(dsl::version.eq(expected)))
                    .set((dsl::node_cursor.eq(row.node_cursor),
                          dsl::node_outputs.eq(&row.node_outputs),
                          dsl::resolved_model_version.eq(&row.resolved_model_version),
                          dsl::resolved_prompt_version.eq(&row.resolved_prompt_version),
                          dsl::status.eq(&row.status),
                          dsl::failure_reason.eq(&row.failure_reason),
                          dsl::version.eq(row.version),
                          dsl::updated_at_ms.eq(row.updated_at_ms)))
                    .execute(conn)?;
            Ok(if n == 1 { PutOutcome::Written(row.version) } else { PutOutcome::Conflict })
          }
          Some(_) => Ok(PutOutcome::Conflict),
          None if expected == 0 => match diesel::insert_into(dsl::workflow_states).values(row).execute(conn) {
            Ok(_) => Ok(PutOutcome::Written(row.version)),
            Err(DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _)) => Ok(PutOutcome::Conflict),
            Err(e) => Err(e),
          },
          None => Ok(PutOutcome::Conflict),
        }
      })
}

/// Almacén Diesel del estado de workflow con control optimista por versión.
#[derive(Clone)]
pub struct DieselWorkflowStateStore {
  db: Database,
}

impl DieselWorkflowStateStore {
  pub fn new(db: Database) -> Self {
    Self { db }
  }
}

#[async_trait]
impl WorkflowStateStore for DieselWorkflowStateStore {
  async fn get(&self, tenant_id: &str, event_id: &Uuid) -> Result<Option<WorkflowState>> {
    use crate::schema::workflow_states::dsl;
    let id = event_id.to_string();
    let row = self.db
                  .run(move |conn| {
                    Ok(dsl::workflow_states.filter(dsl::event_id.eq(&id))
                                           .first::<WorkflowStateRow>(conn)
                                           .optional()?)
                  })
                  .await?;
    match row {
      Some(r) if r.tenant_id == tenant_id => Ok(Some(r.into_state()?)),
      Some(_) => Err(FlowError::TenantIsolation),
      None => Ok(None),
    }
  }

  async fn put(&self, state: &WorkflowState) -> Result<PersistResult> {
    let expected = state.version;
    let row = WorkflowStateRow::from_state(state, expected.saturating_add(1))?;
    let outcome = self.db.run(move |conn| Ok(put_row(conn, &row, expected)?)).await?;
    match outcome {
      PutOutcome::Written(new_version) => Ok(PersistResult::Ok { new_version }),
      PutOutcome::Conflict => Ok(PersistResult::Conflict),
      PutOutcome::OtherTenant => Err(FlowError::TenantIsolation),
    }
  }

  async fn ping(&self) -> Result<()> {
    Ok(self.db.ping().await?)
  }
}
