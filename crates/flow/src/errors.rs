// Archivo: errors.rs
// Propósito: definir los errores del crate y el alias Result<T> usado por
// las APIs del estado de workflow.
use thiserror::Error;
/// Errores comunes del estado de workflow.
///
/// - `NotFound`: estado no encontrado.
/// - `Conflict`: conflicto de concurrencia o versión.
/// - `TenantIsolation`: el estado pertenece a otro tenant.
/// - `Storage`: error al acceder al almacenamiento externo.
/// - `Other`: cualquier otro error.
#[derive(Error, Debug)]
pub enum FlowError {
    /// Entidad no encontrada.
    #[error("No encontrado: {0}")]
    NotFound(String),
    /// Conflicto optimista (version/expected mismatch).
    #[error("Conflicto: {0}")]
    Conflict(String),
    /// Denegación genérica; no incluye datos del recurso.
    #[error("Acceso denegado")]
    TenantIsolation,
    /// Error genérico de almacenamiento (BD, red, etc.).
    #[error("Error de almacenamiento: {0}")]
    Storage(String),
    /// Otro tipo de error.
    #[error("Otro: {0}")]
    Other(String),
}

impl From<serde_json::Error> for FlowError {
    fn from(e: serde_json::Error) -> Self {
        FlowError::Other(format!("serde: {}", e))
    }
}

/// Alias de resultado usado por las APIs del crate.
pub type Result<T> = std::result::Result<T, FlowError>;
