use crate::errors::WorkflowError;
use risk_domain::EventType;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Enum para identificar los tipos de workflow que soporta el crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkflowType {
  Risk,
  Compliance,
}

impl fmt::Display for WorkflowType {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let s = match self {
      WorkflowType::Risk => "risk",
      WorkflowType::Compliance => "compliance",
    };
    write!(f, "{}", s)
  }
}

impl FromStr for WorkflowType {
  type Err = WorkflowError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.to_lowercase().as_str() {
      "risk" => Ok(WorkflowType::Risk),
      "compliance" => Ok(WorkflowType::Compliance),
      other => Err(WorkflowError::Validation(format!("tipo de workflow desconocido: {}", other))),
    }
  }
}

impl From<EventType> for WorkflowType {
  fn from(t: EventType) -> Self {
    match t {
      EventType::Risk => WorkflowType::Risk,
      EventType::Compliance => WorkflowType::Compliance,
    }
  }
}

/// Activos gobernados que necesita un tipo de workflow. Sin versión se
/// resuelve la última registrada.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkflowAssets {
  pub model_name: String,
  pub model_version: Option<String>,
  pub prompt_id: String,
  pub prompt_version: Option<String>,
}

impl WorkflowAssets {
  pub fn latest(model_name: &str, prompt_id: &str) -> Self {
    Self { model_name: model_name.to_string(),
           model_version: None,
           prompt_id: prompt_id.to_string(),
           prompt_version: None }
  }

  pub fn for_type(workflow_type: WorkflowType) -> Self {
    match workflow_type {
      WorkflowType::Risk => Self::latest("risk-model", "risk-prompt"),
      WorkflowType::Compliance => Self::latest("compliance-model", "compliance-prompt"),
    }
  }
}
