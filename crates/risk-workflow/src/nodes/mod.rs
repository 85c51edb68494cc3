mod decision;
mod guardrails;
mod policy;
mod retrieval;
mod scoring;

pub use decision::{Decision, DecisionNode, DecisionOutput, APPROVAL_SCORE_THRESHOLD};
pub use guardrails::{GuardrailResult, GuardrailsNode, GuardrailsOutput, BLOCK_SCORE_THRESHOLD};
pub use policy::{PolicyNode, PolicyOutput, PolicyResult, RESTRICTED_CATEGORIES};
pub use retrieval::{RetrievalNode, RetrievalOutput};
pub use scoring::{ScoringNode, ScoringOutput};

pub const RETRIEVAL: &str = "retrieval";
pub const POLICY: &str = "policy";
pub const SCORING: &str = "scoring";
pub const GUARDRAILS: &str = "guardrails";
pub const DECISION: &str = "decision";
