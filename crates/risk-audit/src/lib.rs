//! risk-audit: escritor de auditoría sólo-anexar y clasificador de fallos.
mod classifier;
mod logger;

pub use classifier::{FailureCategory, FailureClassifier};
pub use logger::{actions, AuditError, AuditLogger, SYSTEM_ACTOR};
