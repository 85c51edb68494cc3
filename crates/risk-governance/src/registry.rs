use crate::records::{ApprovalStatus, ModelRecord, PromptRecord};
use crate::GovernanceError;
use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;

/// Lectura de modelos registrados. El motor sólo consume este contrato.
#[async_trait]
pub trait ModelRegistry: Send + Sync {
  async fn get(&self, name: &str, version: &str) -> Result<Option<ModelRecord>, GovernanceError>;

  /// Última versión registrada del modelo, cualquiera sea su estado.
  async fn get_latest(&self, name: &str) -> Result<Option<ModelRecord>, GovernanceError>;
}

#[async_trait]
pub trait PromptRegistry: Send + Sync {
  async fn get(&self, prompt_id: &str, version: &str) -> Result<Option<PromptRecord>, GovernanceError>;

  async fn get_latest(&self, prompt_id: &str) -> Result<Option<PromptRecord>, GovernanceError>;
}

/// Flujo de aprobación de modelos: única vía de mutación del registro.
#[async_trait]
pub trait ModelApprovals: ModelRegistry {
  async fn register(&self, record: ModelRecord) -> Result<(), GovernanceError>;

  async fn set_status(&self,
                      name: &str,
                      version: &str,
                      status: ApprovalStatus,
                      actor: &str)
                      -> Result<ModelRecord, GovernanceError>;

  async fn approve(&self, name: &str, version: &str, actor: &str) -> Result<ModelRecord, GovernanceError> {
    self.set_status(name, version, ApprovalStatus::Approved, actor).await
  }

  async fn reject(&self, name: &str, version: &str, actor: &str) -> Result<ModelRecord, GovernanceError> {
    self.set_status(name, version, ApprovalStatus::Rejected, actor).await
  }
}

#[async_trait]
pub trait PromptApprovals: PromptRegistry {
  async fn register(&self, record: PromptRecord) -> Result<(), GovernanceError>;

  async fn set_status(&self,
                      prompt_id: &str,
                      version: &str,
                      status: ApprovalStatus,
                      actor: &str)
                      -> Result<PromptRecord, GovernanceError>;

  async fn approve(&self, prompt_id: &str, version: &str, actor: &str) -> Result<PromptRecord, GovernanceError> {
    self.set_status(prompt_id, version, ApprovalStatus::Approved, actor).await
  }

  async fn reject(&self, prompt_id: &str, version: &str, actor: &str) -> Result<PromptRecord, GovernanceError> {
    self.set_status(prompt_id, version, ApprovalStatus::Rejected, actor).await
  }
}

/// Registro de modelos en memoria; conserva el orden de alta.
#[derive(Default)]
pub struct InMemoryModelRegistry {
  records: Mutex<Vec<ModelRecord>>,
}

impl InMemoryModelRegistry {
  pub fn new() -> Self {
    Self::default()
  }
}

#[async_trait]
impl ModelRegistry for InMemoryModelRegistry {
  async fn get(&self, name: &str, version: &str) -> Result<Option<ModelRecord>, GovernanceError> {
    let records = self.records.lock().await;
    Ok(records.iter().find(|r| r.name == name && r.version == version).cloned())
  }

  async fn get_latest(&self, name: &str) -> Result<Option<ModelRecord>, GovernanceError> {
    let records = self.records.lock().await;
    Ok(records.iter().rev().find(|r| r.name == name).cloned())
  }
}

#[async_trait]
impl ModelApprovals for InMemoryModelRegistry {
  async fn register(&self, record: ModelRecord) -> Result<(), GovernanceError> {
    let mut records = self.records.lock().await;
    if records.iter().any(|r| r.name == record.name && r.version == record.version) {
      return Err(GovernanceError::Registry(format!("modelo {}@{} ya registrado", record.name, record.version)));
    }
    records.push(record);
    Ok(())
  }

  async fn set_status(&self,
                      name: &str,
                      version: &str,
                      status: ApprovalStatus,
                      actor: &str)
                      -> Result<ModelRecord, GovernanceError> {
    let mut records = self.records.lock().await;
    let rec = records.iter_mut()
                     .find(|r| r.name == name && r.version == version)
                     .ok_or_else(|| GovernanceError::Registry(format!("modelo {}@{} no registrado", name, version)))?;
    rec.approval_status = status;
    rec.approved_by = Some(actor.to_string());
    rec.approved_at = Some(Utc::now());
    log::info!("modelo {}@{} -> {} por {}", name, version, status, actor);
    Ok(rec.clone())
  }
}

#[derive(Default)]
pub struct InMemoryPromptRegistry {
  records: Mutex<Vec<PromptRecord>>,
}

impl InMemoryPromptRegistry {
  pub fn new() -> Self {
    Self::default()
  }
}

#[async_trait]
impl PromptRegistry for InMemoryPromptRegistry {
  async fn get(&self, prompt_id: &str, version: &str) -> Result<Option<PromptRecord>, GovernanceError> {
    let records = self.records.lock().await;
    Ok(records.iter().find(|r| r.prompt_id == prompt_id && r.version == version).cloned())
  }

  async fn get_latest(&self, prompt_id: &str) -> Result<Option<PromptRecord>, GovernanceError> {
    let records = self.records.lock().await;
    Ok(records.iter().rev().find(|r| r.prompt_id == prompt_id).cloned())
  }
}

#[async_trait]
impl PromptApprovals for InMemoryPromptRegistry {
  async fn register(&self, record: PromptRecord) -> Result<(), GovernanceError> {
    let mut records = self.records.lock().await;
    if records.iter().any(|r| r.prompt_id == record.prompt_id && r.version == record.version) {
      return Err(GovernanceError::Registry(format!("prompt {}@{} ya registrado", record.prompt_id, record.version)));
    }
    records.push(record);
    Ok(())
  }

  async fn set_status(&self,
                      prompt_id: &str,
                      version: &str,
                      status: ApprovalStatus,
                      actor: &str)
                      -> Result<PromptRecord, GovernanceError> {
    let mut records = self.records.lock().await;
    let rec = records.iter_mut()
                     .find(|r| r.prompt_id == prompt_id && r.version == version)
                     .ok_or_else(|| {
                       GovernanceError::Registry(format!("prompt {}@{} no registrado", prompt_id, version))
                     })?;
    rec.approval_status = status;
    rec.approved_by = Some(actor.to_string());
    rec.approved_at = Some(Utc::now());
    log::info!("prompt {}@{} -> {} por {}", prompt_id, version, status, actor);
    Ok(rec.clone())
  }
}
