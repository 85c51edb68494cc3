use crate::node::WorkflowNode;
use crate::nodes::{DecisionNode, GuardrailsNode, PolicyNode, RetrievalNode, ScoringNode};
use crate::services::WorkflowServices;
use crate::workflow_type::WorkflowType;

/// Fábrica de pipelines por tipo de workflow.
pub struct WorkflowFactory;

impl WorkflowFactory {
  /// Nodos en orden de ejecución. El orden es fijo: el cursor persistido
  /// indexa esta lista.
  pub fn pipeline(workflow_type: WorkflowType, services: &WorkflowServices) -> Vec<Box<dyn WorkflowNode>> {
    match workflow_type {
      // Ambos tipos comparten nodos; `decision` consulta el tipo para los
      // flags regulatorios.
      WorkflowType::Risk | WorkflowType::Compliance => {
        vec![Box::new(RetrievalNode::new(services.context_source.clone())),
             Box::new(PolicyNode),
             Box::new(ScoringNode::new(services.scorer.clone())),
             Box::new(GuardrailsNode),
             Box::new(DecisionNode)]
      }
    }
  }

  pub fn node_names(workflow_type: WorkflowType) -> Vec<String> {
    Self::pipeline(workflow_type, &WorkflowServices::default()).iter()
                                                               .map(|n| n.name().to_string())
                                                               .collect()
  }
}
