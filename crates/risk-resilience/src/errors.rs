use thiserror::Error;

/// Errores de las primitivas de resiliencia. Todos son transitorios: el
/// llamador puede reintentar más tarde.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ResilienceError {
    #[error("Error del almacén compartido: {0}")]
    Store(String),
    #[error("Circuito abierto para {0}")]
    CircuitOpen(String),
    #[error("Bulkhead lleno para {0}")]
    BulkheadFull(String),
    #[error("Tiempo de espera agotado en bulkhead {0}")]
    BulkheadTimeout(String),
    #[error("Límite de tasa excedido para tenant {0}")]
    RateLimited(String),
    #[error("Error de serialización: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for ResilienceError {
    fn from(e: serde_json::Error) -> Self {
        ResilienceError::Serialization(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ResilienceError>;
