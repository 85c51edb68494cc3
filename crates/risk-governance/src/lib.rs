//! risk-governance: registros de modelos y prompts con estado de aprobación
//! y la puerta que garantiza que sólo se usan versiones aprobadas.
mod errors;
mod gate;
mod records;
mod registry;

pub use errors::GovernanceError;
pub use gate::{GovernanceGate, GovernanceMode, ResolvedAssets};
pub use records::{checksum, ApprovalStatus, ModelRecord, PromptRecord};
pub use registry::{InMemoryModelRegistry, InMemoryPromptRegistry, ModelApprovals, ModelRegistry, PromptApprovals,
                   PromptRegistry};
