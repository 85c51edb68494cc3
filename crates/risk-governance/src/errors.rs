use risk_domain::ErrorKind;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GovernanceError {
  #[error("Modelo no aprobado: {name}@{version} ({reason})")]
  ModelNotApproved { name: String, version: String, reason: String },
  #[error("Prompt no aprobado: {prompt_id}@{version} ({reason})")]
  PromptNotApproved { prompt_id: String, version: String, reason: String },
  #[error("Error del registro: {0}")]
  Registry(String),
}

impl GovernanceError {
  pub fn kind(&self) -> ErrorKind {
    match self {
      GovernanceError::ModelNotApproved { .. } => ErrorKind::ModelNotApproved,
      GovernanceError::PromptNotApproved { .. } => ErrorKind::PromptNotApproved,
      GovernanceError::Registry(_) => ErrorKind::Infrastructure,
    }
  }

  /// Tipo de recurso afectado, tal como se registra en auditoría.
  pub fn resource_type(&self) -> &'static str {
    match self {
      GovernanceError::ModelNotApproved { .. } => "model",
      GovernanceError::PromptNotApproved { .. } => "prompt",
      GovernanceError::Registry(_) => "registry",
    }
  }

  pub fn resource_id(&self) -> String {
    match self {
      GovernanceError::ModelNotApproved { name, .. } => name.clone(),
      GovernanceError::PromptNotApproved { prompt_id, .. } => prompt_id.clone(),
      GovernanceError::Registry(_) => String::new(),
    }
  }

  pub fn reason(&self) -> String {
    match self {
      GovernanceError::ModelNotApproved { reason, .. } | GovernanceError::PromptNotApproved { reason, .. } => reason.clone(),
      GovernanceError::Registry(msg) => msg.clone(),
    }
  }
}
