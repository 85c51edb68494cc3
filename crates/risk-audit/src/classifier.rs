use dashmap::DashMap;
use risk_domain::ErrorKind;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Categoría de fallo usada en auditoría y métricas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FailureCategory {
  ValidationError,
  PolicyViolation,
  HighRisk,
  WorkflowError,
  InfraError,
  UnexpectedError,
}

impl FailureCategory {
  pub fn as_str(&self) -> &'static str {
    match self {
      FailureCategory::ValidationError => "VALIDATION_ERROR",
      FailureCategory::PolicyViolation => "POLICY_VIOLATION",
      FailureCategory::HighRisk => "HIGH_RISK",
      FailureCategory::WorkflowError => "WORKFLOW_ERROR",
      FailureCategory::InfraError => "INFRA_ERROR",
      FailureCategory::UnexpectedError => "UNEXPECTED_ERROR",
    }
  }
}

impl fmt::Display for FailureCategory {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.as_str())
  }
}

/// Mapeo puro de `ErrorKind` a categoría, con contadores por categoría para
/// exportar como métricas. Nunca altera el flujo de control.
#[derive(Default)]
pub struct FailureClassifier {
  counts: DashMap<FailureCategory, u64>,
}

impl FailureClassifier {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn classify(kind: ErrorKind) -> FailureCategory {
    match kind {
      ErrorKind::Validation | ErrorKind::InvalidStatusTransition | ErrorKind::TenantIsolation => {
        FailureCategory::ValidationError
      }
      ErrorKind::ModelNotApproved | ErrorKind::PromptNotApproved => FailureCategory::PolicyViolation,
      ErrorKind::RiskThresholdViolation => FailureCategory::HighRisk,
      ErrorKind::WorkflowNode | ErrorKind::IdempotencyConflict => FailureCategory::WorkflowError,
      ErrorKind::Infrastructure => FailureCategory::InfraError,
      ErrorKind::Unexpected => FailureCategory::UnexpectedError,
    }
  }

  /// Clasifica e incrementa el contador de la categoría.
  pub fn record(&self, kind: ErrorKind) -> FailureCategory {
    let cat = Self::classify(kind);
    *self.counts.entry(cat).or_insert(0) += 1;
    cat
  }

  pub fn failure_count(&self, category: FailureCategory) -> u64 {
    self.counts.get(&category).map(|c| *c).unwrap_or(0)
  }

  /// Contadores ordenados por categoría.
  pub fn snapshot(&self) -> Vec<(FailureCategory, u64)> {
    let mut out: Vec<(FailureCategory, u64)> = self.counts.iter().map(|e| (*e.key(), *e.value())).collect();
    out.sort();
    out
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn mapping_covers_every_kind() {
    assert_eq!(FailureClassifier::classify(ErrorKind::Validation), FailureCategory::ValidationError);
    assert_eq!(FailureClassifier::classify(ErrorKind::TenantIsolation), FailureCategory::ValidationError);
    assert_eq!(FailureClassifier::classify(ErrorKind::ModelNotApproved), FailureCategory::PolicyViolation);
    assert_eq!(FailureClassifier::classify(ErrorKind::PromptNotApproved), FailureCategory::PolicyViolation);
    assert_eq!(FailureClassifier::classify(ErrorKind::RiskThresholdViolation), FailureCategory::HighRisk);
    assert_eq!(FailureClassifier::classify(ErrorKind::IdempotencyConflict), FailureCategory::WorkflowError);
    assert_eq!(FailureClassifier::classify(ErrorKind::WorkflowNode), FailureCategory::WorkflowError);
    assert_eq!(FailureClassifier::classify(ErrorKind::Infrastructure), FailureCategory::InfraError);
    assert_eq!(FailureClassifier::classify(ErrorKind::Unexpected), FailureCategory::UnexpectedError);
  }

  #[test]
  fn counters_accumulate_per_category() {
    let c = FailureClassifier::new();
    c.record(ErrorKind::Validation);
    c.record(ErrorKind::InvalidStatusTransition);
    c.record(ErrorKind::Infrastructure);
    assert_eq!(c.failure_count(FailureCategory::ValidationError), 2);
    assert_eq!(c.failure_count(FailureCategory::InfraError), 1);
    assert_eq!(c.failure_count(FailureCategory::HighRisk), 0);
    assert_eq!(c.snapshot(),
               vec![(FailureCategory::ValidationError, 2), (FailureCategory::InfraError, 1)]);
  }

  #[test]
  fn category_serializes_screaming() {
    let s = serde_json::to_string(&FailureCategory::PolicyViolation).unwrap();
    assert_eq!(s, "\"POLICY_VIOLATION\"");
  }
}
