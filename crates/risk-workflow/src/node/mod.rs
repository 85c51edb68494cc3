mod context;
mod trait_node;

pub use context::NodeContext;
pub use trait_node::{NodeResult, WorkflowNode};
