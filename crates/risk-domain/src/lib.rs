mod audit;
mod errors;
mod event;
mod repository;
pub mod validators;

pub use audit::{AuditEntry, AuditRecord};
pub use errors::{DomainError, ErrorKind};
pub use event::{payload_fingerprint, ComplianceDetails, Event, EventRequest, EventStatus, EventType, RiskDetails};
pub use repository::{AuditRepository, EventRepository, InMemoryAuditRepository, InMemoryEventRepository};
