use crate::records::{ModelRecord, PromptRecord};
use crate::registry::{ModelRegistry, PromptRegistry};
use crate::GovernanceError;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Modo de gobernanza del entorno. Se decide por configuración al arrancar,
/// nunca por petición.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GovernanceMode {
  Enforced,
  /// Sin consultar registros: se usan las versiones estáticas configuradas.
  Disabled { default_model_version: String, default_prompt_version: String },
}

/// Versiones resueltas para una ejecución.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedAssets {
  pub model_name: String,
  pub model_version: String,
  pub prompt_id: String,
  pub prompt_version: String,
  /// `false` cuando la gobernanza está deshabilitada en el entorno.
  pub governed: bool,
}

/// Puerta de aprobación: sólo entrega registros `APPROVED` y nunca sustituye
/// un valor por defecto cuando la resolución falla.
pub struct GovernanceGate {
  models: Arc<dyn ModelRegistry>,
  prompts: Arc<dyn PromptRegistry>,
  mode: GovernanceMode,
}

impl GovernanceGate {
  pub fn new(models: Arc<dyn ModelRegistry>, prompts: Arc<dyn PromptRegistry>, mode: GovernanceMode) -> Self {
    Self { models, prompts, mode }
  }

  pub fn mode(&self) -> &GovernanceMode {
    &self.mode
  }

  /// Sin `version` se resuelve la última registrada; si esa no está
  /// aprobada el resultado es `ModelNotApproved`, aunque exista otra
  /// versión aprobada anterior.
  pub async fn get_approved_model(&self, name: &str, version: Option<&str>) -> Result<ModelRecord, GovernanceError> {
    let found = match version {
      Some(v) => self.models.get(name, v).await?,
      None => self.models.get_latest(name).await?,
    };
    let requested = version.unwrap_or("latest").to_string();
    match found {
      Some(rec) if rec.is_approved() => Ok(rec),
      Some(rec) => Err(GovernanceError::ModelNotApproved { name: name.to_string(),
                                                           version: rec.version.clone(),
                                                           reason: format!("modelo {} unapproved: estado {}",
                                                                           name, rec.approval_status) }),
      None => Err(GovernanceError::ModelNotApproved { name: name.to_string(),
                                                      version: requested,
                                                      reason: format!("modelo {} no registrado", name) }),
    }
  }

  pub async fn get_approved_prompt(&self, prompt_id: &str, version: Option<&str>) -> Result<PromptRecord, GovernanceError> {
    let found = match version {
      Some(v) => self.prompts.get(prompt_id, v).await?,
      None => self.prompts.get_latest(prompt_id).await?,
    };
    let requested = version.unwrap_or("latest").to_string();
    match found {
      Some(rec) if rec.is_approved() => Ok(rec),
      Some(rec) => Err(GovernanceError::PromptNotApproved { prompt_id: prompt_id.to_string(),
                                                            version: rec.version.clone(),
                                                            reason: format!("prompt {} unapproved: estado {}",
                                                                            prompt_id, rec.approval_status) }),
      None => Err(GovernanceError::PromptNotApproved { prompt_id: prompt_id.to_string(),
                                                       version: requested,
                                                       reason: format!("prompt {} no registrado", prompt_id) }),
    }
  }

  /// Resuelve modelo y prompt de una ejecución. El modelo se comprueba
  /// primero; el primer fallo corta la resolución.
  pub async fn resolve(&self,
                       model_name: &str,
                       model_version: Option<&str>,
                       prompt_id: &str,
                       prompt_version: Option<&str>)
                       -> Result<ResolvedAssets, GovernanceError> {
    match &self.mode {
      GovernanceMode::Disabled { default_model_version,
                                 default_prompt_version, } => {
        log::warn!("gobernanza deshabilitada: usando versiones estáticas model={}@{} prompt={}@{}",
                   model_name, default_model_version, prompt_id, default_prompt_version);
        Ok(ResolvedAssets { model_name: model_name.to_string(),
                            model_version: default_model_version.clone(),
                            prompt_id: prompt_id.to_string(),
                            prompt_version: default_prompt_version.clone(),
                            governed: false })
      }
      GovernanceMode::Enforced => {
        let model = self.get_approved_model(model_name, model_version).await?;
        let prompt = self.get_approved_prompt(prompt_id, prompt_version).await?;
        Ok(ResolvedAssets { model_name: model.name,
                            model_version: model.version,
                            prompt_id: prompt.prompt_id,
                            prompt_version: prompt.version,
                            governed: true })
      }
    }
  }
}
