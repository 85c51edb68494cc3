//! Motor de workflows de riesgo y cumplimiento.
//!
//! Un workflow es un pipeline fijo de nodos (`retrieval`, `policy`,
//! `scoring`, `guardrails`, `decision`) que se ejecuta sobre un
//! `flow::WorkflowState`. El estado se persiste tras cada nodo, de modo que
//! una nueva ejecución continúa donde quedó la anterior.
pub mod engine;
pub mod errors;
pub mod factory;
pub mod node;
pub mod nodes;
pub mod services;
pub mod trigger;
pub mod workflow_type;

pub use engine::{node_failed_reason, WorkflowEngine, WorkflowEngineConfig, GOVERNANCE_VIOLATION, REQUIRE_APPROVAL};
pub use errors::WorkflowError;
pub use factory::WorkflowFactory;
pub use node::{NodeContext, NodeResult, WorkflowNode};
pub use services::{ContextSource, PayloadContextSource, RiskScorer, RuleBasedScorer, WorkflowServices, CONTEXT_SOURCE,
                   RISK_SCORER};
pub use trigger::{NoopWorkflowTrigger, WorkflowTrigger};
pub use workflow_type::{WorkflowAssets, WorkflowType};
