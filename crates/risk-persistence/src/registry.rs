use crate::db::{from_ms, to_ms, Database, DbConn};
use crate::errors::PersistenceError;
use crate::schema::{model_records, prompt_records};
use async_trait::async_trait;
use chrono::Utc;
use diesel::dsl::max;
use diesel::prelude::*;
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use risk_governance::{ApprovalStatus, GovernanceError, ModelApprovals, ModelRecord, ModelRegistry, PromptApprovals,
                      PromptRecord, PromptRegistry};

#[derive(Debug, Queryable, Insertable)]
#[diesel(table_name = model_records)]
struct ModelRow {
  name: String,
  version: String,
  approval_status: String,
  approved_by: Option<String>,
  approved_at_ms: Option<i64>,
  checksum: String,
  registered_seq: i64,
  registered_at_ms: i64,
}

impl ModelRow {
  fn into_record(self) -> Result<ModelRecord, PersistenceError> {
    Ok(ModelRecord { approval_status: self.approval_status.parse().map_err(PersistenceError::Corrupt)?,
                     approved_at: self.approved_at_ms.map(from_ms).transpose()?,
                     registered_at: from_ms(self.registered_at_ms)?,
                     name: self.name,
                     version: self.version,
                     approved_by: self.approved_by,
                     checksum: self.checksum })
  }
}

#[derive(Debug, Queryable, Insertable)]
#[diesel(table_name = prompt_records)]
struct PromptRow {
  prompt_id: String,
  version: String,
  approval_status: String,
  approved_by: Option<String>,
  approved_at_ms: Option<i64>,
  template: String,
  registered_seq: i64,
  registered_at_ms: i64,
}

impl PromptRow {
  fn into_record(self) -> Result<PromptRecord, PersistenceError> {
    Ok(PromptRecord { approval_status: self.approval_status.parse().map_err(PersistenceError::Corrupt)?,
                      approved_at: self.approved_at_ms.map(from_ms).transpose()?,
                      registered_at: from_ms(self.registered_at_ms)?,
                      prompt_id: self.prompt_id,
                      version: self.version,
                      approved_by: self.approved_by,
                      template: self.template })
  }
}

enum Registered {
  Inserted,
  Duplicate,
}

/// Inserta con `registered_seq` creciente: "última versión" es la de mayor
/// secuencia, no la de mayor cadena de versión.
fn insert_model(conn: &mut DbConn, mut row: ModelRow) -> Result<Registered, DieselError> {
  use crate::schema::model_records::dsl;
  conn.transaction::<_, DieselError, _>(|conn| {
        let seq = dsl::model_records.filter(dsl::name.eq(&row.name))
                                    .select(max(dsl::registered_seq))
                                    .first::<Option<i64>>(conn)?;
        row.registered_seq = seq.unwrap_or(0) + 1;
        match diesel::insert_into(dsl::model_records).values(&row).execute(conn) {
          Ok(_) => Ok(Registered::Inserted),
          Err(DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _)) => Ok(Registered::Duplicate),
          Err(e) => Err(e),
        }
      })
}

fn insert_prompt(conn: &mut DbConn, mut row: PromptRow) -> Result<Registered, DieselError> {
  use crate::schema::prompt_records::dsl;
  conn.transaction::<_, DieselError, _>(|conn| {
        let seq = dsl::prompt_records.filter(dsl::prompt_id.eq(&row.prompt_id))
                                     .select(max(dsl::registered_seq))
                                     .first::<Option<i64>>(conn)?;
        row.registered_seq = seq.unwrap_or(0) + 1;
        match diesel::insert_into(dsl::prompt_records).values(&row).execute(conn) {
          Ok(_) => Ok(Registered::Inserted),
          Err(DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _)) => Ok(Registered::Duplicate),
          Err(e) => Err(e),
        }
      })
}

/// Registro Diesel de modelos y prompts. Las aprobaciones sólo cambian
/// estado, aprobador y fecha.
#[derive(Clone)]
pub struct DieselRegistry {
  db: Database,
}

impl DieselRegistry {
  pub fn new(db: Database) -> Self {
    Self { db }
  }
}

#[async_trait]
impl ModelRegistry for DieselRegistry {
  async fn get(&self, name: &str, version: &str) -> Result<Option<ModelRecord>, GovernanceError> {
    use crate::schema::model_records::dsl;
    let (n, v) = (name.to_string(), version.to_string());
    let row = self.db
                  .run(move |conn| {
                    Ok(dsl::model_records.filter(dsl::name.eq(&n))
                                         .filter(dsl::version.eq(&v))
                                         .first::<ModelRow>(conn)
                                         .optional()?)
                  })
                  .await?;
    Ok(row.map(ModelRow::into_record).transpose()?)
  }

  async fn get_latest(&self, name: &str) -> Result<Option<ModelRecord>, GovernanceError> {
    use crate::schema::model_records::dsl;
    let n = name.to_string();
    let row = self.db
                  .run(move |conn| {
                    Ok(dsl::model_records.filter(dsl::name.eq(&n))
                                         .order(dsl::registered_seq.desc())
                                         .first::<ModelRow>(conn)
                                         .optional()?)
                  })
                  .await?;
    Ok(row.map(ModelRow::into_record).transpose()?)
  }
}

#[async_trait]
impl ModelApprovals for DieselRegistry {
  async fn register(&self, record: ModelRecord) -> Result<(), GovernanceError> {
    let label = format!("{}@{}", record.name, record.version);
    let row = ModelRow { name: record.name,
                         version: record.version,
                         approval_status: record.approval_status.to_string(),
                         approved_by: record.approved_by,
                         approved_at_ms: record.approved_at.map(to_ms),
                         checksum: record.checksum,
                         registered_seq: 0,
                         registered_at_ms: to_ms(record.registered_at) };
    match self.db.run(move |conn| Ok(insert_model(conn, row)?)).await? {
      Registered::Inserted => Ok(()),
      Registered::Duplicate => Err(GovernanceError::Registry(format!("modelo {} ya registrado", label))),
    }
  }

  async fn set_status(&self,
                      name: &str,
                      version: &str,
                      status: ApprovalStatus,
                      actor: &str)
                      -> Result<ModelRecord, GovernanceError> {
    use crate::schema::model_records::dsl;
    let (n, v, who) = (name.to_string(), version.to_string(), actor.to_string());
    let now = to_ms(Utc::now());
    let updated = self.db
                      .run(move |conn| {
                        Ok(diesel::update(dsl::model_records.filter(dsl::name.eq(&n)).filter(dsl::version.eq(&v)))
                          .set((dsl::approval_status.eq(status.to_string()),
                                dsl::approved_by.eq(Some(who)),
                                dsl::approved_at_ms.eq(Some(now))))
                          .execute(conn)?)
                      })
                      .await?;
    if updated == 0 {
      return Err(GovernanceError::Registry(format!("modelo {}@{} no registrado", name, version)));
    }
    log::info!("modelo {}@{} -> {} por {}", name, version, status, actor);
    ModelRegistry::get(self, name, version).await?
                                           .ok_or_else(|| GovernanceError::Registry(format!("modelo {}@{} desapareció",
                                                                                           name, version)))
  }
}

#[async_trait]
impl PromptRegistry for DieselRegistry {
  async fn get(&self, prompt_id: &str, version: &str) -> Result<Option<PromptRecord>, GovernanceError> {
    use crate::schema::prompt_records::dsl;
    let (p, v) = (prompt_id.to_string(), version.to_string());
    let row = self.db
                  .run(move |conn| {
                    Ok(dsl::prompt_records.filter(dsl::prompt_id.eq(&p))
                                          .filter(dsl::version.eq(&v))
                                          .first::<PromptRow>(conn)
                                          .optional()?)
                  })
                  .await?;
    Ok(row.map(PromptRow::into_record).transpose()?)
  }

  async fn get_latest(&self, prompt_id: &str) -> Result<Option<PromptRecord>, GovernanceError> {
    use crate::schema::prompt_records::dsl;
    let p = prompt_id.to_string();
    let row = self.db
                  .run(move |conn| {
                    Ok(dsl::prompt_records.filter(dsl::prompt_id.eq(&p))
                                          .order(dsl::registered_seq.desc())
                                          .first::<PromptRow>(conn)
                                          .optional()?)
                  })
                  .await?;
    Ok(row.map(PromptRow::into_record).transpose()?)
  }
}

#[async_trait]
impl PromptApprovals for DieselRegistry {
  async fn register(&self, record: PromptRecord) -> Result<(), GovernanceError> {
    let label = format!("{}@{}", record.prompt_id, record.version);
    let row = PromptRow { prompt_id: record.prompt_id,
                          version: record.version,
                          approval_status: record.approval_status.to_string(),
                          approved_by: record.approved_by,
                          approved_at_ms: record.approved_at.map(to_ms),
                          template: record.template,
                          registered_seq: 0,
                          registered_at_ms: to_ms(record.registered_at) };
    match self.db.run(move |conn| Ok(insert_prompt(conn, row)?)).await? {
      Registered::Inserted => Ok(()),
      Registered::Duplicate => Err(GovernanceError::Registry(format!("prompt {} ya registrado", label))),
    }
  }

  async fn set_status(&self,
                      prompt_id: &str,
                      version: &str,
                      status: ApprovalStatus,
                      actor: &str)
                      -> Result<PromptRecord, GovernanceError> {
    use crate::schema::prompt_records::dsl;
    let (p, v, who) = (prompt_id.to_string(), version.to_string(), actor.to_string());
    let now = to_ms(Utc::now());
    let updated = self.db
                      .run(move |conn| {
                        Ok(diesel::update(dsl::prompt_records.filter(dsl::prompt_id.eq(&p)).filter(dsl::version.eq(&v)))
                          .set((dsl::approval_status.eq(status.to_string()),
                                dsl::approved_by.eq(Some(who)),
                                dsl::approved_at_ms.eq(Some(now))))
                          .execute(conn)?)
                      })
                      .await?;
    if updated == 0 {
      return Err(GovernanceError::Registry(format!("prompt {}@{} no registrado", prompt_id, version)));
    }
    log::info!("prompt {}@{} -> {} por {}", prompt_id, version, status, actor);
    PromptRegistry::get(self, prompt_id, version).await?
                                                 .ok_or_else(|| {
                                                   GovernanceError::Registry(format!("prompt {}@{} desapareció",
                                                                                     prompt_id, version))
                                                 })
  }
}
