use crate::publisher::EventPublisher;
use flow::repository::WorkflowStateStore;
use risk_audit::AuditLogger;
use risk_domain::EventRepository;
use risk_resilience::{CircuitState, GuardRegistry, SharedStore};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyHealth {
  pub name: String,
  pub healthy: bool,
  pub detail: String,
}

impl DependencyHealth {
  fn from_result<E: std::fmt::Display>(name: &str, res: Result<(), E>) -> Self {
    match res {
      Ok(()) => Self { name: name.to_string(),
                       healthy: true,
                       detail: "ok".to_string() },
      Err(e) => Self { name: name.to_string(),
                       healthy: false,
                       detail: e.to_string() },
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthReport {
  pub healthy: bool,
  pub dependencies: Vec<DependencyHealth>,
}

impl HealthReport {
  pub fn dependency(&self, name: &str) -> Option<&DependencyHealth> {
    self.dependencies.iter().find(|d| d.name == name)
  }
}

/// Agrega alcance de almacenamiento, mensajería y almacén compartido junto
/// con el estado de cada circuito registrado. Un circuito `OPEN` marca su
/// dependencia como no sana.
pub struct HealthCheck {
  events: Arc<dyn EventRepository>,
  audit: AuditLogger,
  states: Arc<dyn WorkflowStateStore>,
  publisher: Arc<dyn EventPublisher>,
  shared: Arc<dyn SharedStore>,
  guards: Arc<GuardRegistry>,
}

impl HealthCheck {
  pub fn new(events: Arc<dyn EventRepository>,
             audit: AuditLogger,
             states: Arc<dyn WorkflowStateStore>,
             publisher: Arc<dyn EventPublisher>,
             shared: Arc<dyn SharedStore>,
             guards: Arc<GuardRegistry>)
             -> Self {
    Self { events,
           audit,
           states,
           publisher,
           shared,
           guards }
  }

  pub async fn check(&self) -> HealthReport {
    let mut dependencies = vec![DependencyHealth::from_result("events", self.events.ping().await),
                                DependencyHealth::from_result("audit", self.audit.ping().await),
                                DependencyHealth::from_result("workflow_state", self.states.ping().await),
                                DependencyHealth::from_result("messaging", self.publisher.ping().await),
                                DependencyHealth::from_result("shared_store", self.shared.ping().await),];

    for (dependency, state) in self.guards.breaker_states().await {
      let name = format!("breaker:{}", dependency);
      let entry = match state {
        Ok(CircuitState::Open) => DependencyHealth { name,
                                                     healthy: false,
                                                     detail: CircuitState::Open.to_string() },
        Ok(st) => DependencyHealth { name,
                                     healthy: true,
                                     detail: st.to_string() },
        Err(e) => DependencyHealth { name,
                                     healthy: false,
                                     detail: e.to_string() },
      };
      dependencies.push(entry);
    }

    let healthy = dependencies.iter().all(|d| d.healthy);
    if !healthy {
      let failing: Vec<&str> = dependencies.iter().filter(|d| !d.healthy).map(|d| d.name.as_str()).collect();
      log::warn!("health degradado dependencias={:?}", failing);
    }
    HealthReport { healthy, dependencies }
  }
}
