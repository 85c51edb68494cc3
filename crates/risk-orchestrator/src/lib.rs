//! risk-orchestrator: aceptación idempotente de eventos y cableado del
//! proceso.
//!
//! `AppContext` reúne almacenamiento, resiliencia, gobernanza y mensajería;
//! de él se obtienen el `TransactionalOrchestrator` y el `HealthCheck`.
pub mod config;
pub mod context;
pub mod errors;
pub mod health;
pub mod orchestrator;
pub mod publisher;
pub mod response;

pub use config::RiskflowConfig;
pub use context::{AppContext, AppContextBuilder, WORKFLOW_RATE_SCOPE};
pub use errors::OrchestratorError;
pub use health::{DependencyHealth, HealthCheck, HealthReport};
pub use orchestrator::{idempotency_cache_key, published_key, OrchestratorDeps, OrchestratorTimings,
                       TransactionalOrchestrator, MESSAGING_DEPENDENCY};
pub use publisher::{ChannelPublisher, Delivery, EventPublisher, InMemoryEventPublisher, PublishError, PublishedMessage,
                    EVENTS_TOPIC};
pub use response::EventResponse;
