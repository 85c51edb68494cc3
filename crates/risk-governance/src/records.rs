use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApprovalStatus {
  Pending,
  Approved,
  Rejected,
}

impl fmt::Display for ApprovalStatus {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let s = match self {
      ApprovalStatus::Pending => "PENDING",
      ApprovalStatus::Approved => "APPROVED",
      ApprovalStatus::Rejected => "REJECTED",
    };
    write!(f, "{}", s)
  }
}

impl FromStr for ApprovalStatus {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.to_uppercase().as_str() {
      "PENDING" => Ok(ApprovalStatus::Pending),
      "APPROVED" => Ok(ApprovalStatus::Approved),
      "REJECTED" => Ok(ApprovalStatus::Rejected),
      other => Err(format!("estado de aprobación desconocido: {}", other)),
    }
  }
}

/// Versión registrada de un modelo.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelRecord {
  pub name: String,
  pub version: String,
  pub approval_status: ApprovalStatus,
  pub approved_by: Option<String>,
  pub approved_at: Option<DateTime<Utc>>,
  /// SHA-256 del artefacto registrado.
  pub checksum: String,
  pub registered_at: DateTime<Utc>,
}

impl ModelRecord {
  /// Nuevo registro en estado `Pending`.
  pub fn new(name: &str, version: &str, artifact: &[u8]) -> Self {
    Self { name: name.to_string(),
           version: version.to_string(),
           approval_status: ApprovalStatus::Pending,
           approved_by: None,
           approved_at: None,
           checksum: checksum(artifact),
           registered_at: Utc::now() }
  }

  pub fn is_approved(&self) -> bool {
    self.approval_status == ApprovalStatus::Approved
  }

  pub fn verify_artifact(&self, artifact: &[u8]) -> bool {
    self.checksum == checksum(artifact)
  }
}

/// Versión registrada de un prompt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptRecord {
  pub prompt_id: String,
  pub version: String,
  pub approval_status: ApprovalStatus,
  pub approved_by: Option<String>,
  pub approved_at: Option<DateTime<Utc>>,
  pub template: String,
  pub registered_at: DateTime<Utc>,
}

impl PromptRecord {
  pub fn new(prompt_id: &str, version: &str, template: &str) -> Self {
    Self { prompt_id: prompt_id.to_string(),
           version: version.to_string(),
           approval_status: ApprovalStatus::Pending,
           approved_by: None,
           approved_at: None,
           template: template.to_string(),
           registered_at: Utc::now() }
  }

  pub fn is_approved(&self) -> bool {
    self.approval_status == ApprovalStatus::Approved
  }
}

pub fn checksum(bytes: &[u8]) -> String {
  Sha256::digest(bytes).iter().map(|b| format!("{:02x}", b)).collect()
}
