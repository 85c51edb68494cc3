//! Crate `flow` — estado persistido de ejecuciones de workflow
//!
//! Este crate define `WorkflowState` (la unidad de reanudación de un
//! evento), el contrato de persistencia `WorkflowStateStore` y una
//! implementación en memoria útil para pruebas
//! (`InMemoryWorkflowStateStore`). También expone `FlowEngine`, con helpers
//! para rehidratar, registrar salidas de nodos y persistir con control
//! optimista.
//!
//! Diseño resumido:
//! - El estado se guarda después de cada nodo; una re-ejecución reanuda en el
//!   primer nodo no ejecutado.
//! - Locking optimista: `version` debe coincidir con la almacenada
//!   (`PersistResult::Conflict` en caso contrario).
//!
//! Ejemplo rápido:
//! ```rust
//! use flow::stubs::InMemoryWorkflowStateStore;
//! use std::sync::Arc;
//! let store = Arc::new(InMemoryWorkflowStateStore::new());
//! let engine = flow::FlowEngine::new(store);
//! ```
pub mod domain;
pub mod engine;
pub mod errors;
pub mod repository;
pub mod stubs;

pub use domain::*;
pub use engine::*;
pub use errors::*;
pub use repository::*;
pub use stubs::*;
