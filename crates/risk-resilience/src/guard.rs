//! Registro de protecciones por dependencia (circuito + bulkhead).
use crate::bulkhead::{Bulkhead, BulkheadConfig};
use crate::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState};
use crate::clock::Clock;
use crate::errors::{ResilienceError, Result};
use crate::store::SharedStore;
use dashmap::DashMap;
use std::future::Future;
use std::sync::Arc;

/// Protección completa de una dependencia: primero el bulkhead local, luego
/// el circuito compartido.
#[derive(Clone)]
pub struct DependencyGuard {
    pub breaker: CircuitBreaker,
    pub bulkhead: Arc<Bulkhead>,
}

impl DependencyGuard {
    pub async fn call<T, E, Fut>(&self, fut: Fut) -> std::result::Result<T, E>
        where Fut: Future<Output = std::result::Result<T, E>>,
              E: From<ResilienceError>
    {
        self.call_counting(fut, |_| true).await
    }

    pub async fn call_counting<T, E, Fut, F>(&self, fut: Fut, counts: F) -> std::result::Result<T, E>
        where Fut: Future<Output = std::result::Result<T, E>>,
              E: From<ResilienceError>,
              F: Fn(&E) -> bool
    {
        let _permit = self.bulkhead.acquire().await?;
        self.breaker.call_counting(fut, counts).await
    }
}

pub struct GuardRegistry {
    store: Arc<dyn SharedStore>,
    clock: Arc<dyn Clock>,
    breaker_config: CircuitBreakerConfig,
    bulkhead_config: BulkheadConfig,
    guards: DashMap<String, DependencyGuard>,
}

impl GuardRegistry {
    pub fn new(store: Arc<dyn SharedStore>,
               clock: Arc<dyn Clock>,
               breaker_config: CircuitBreakerConfig,
               bulkhead_config: BulkheadConfig)
               -> Self {
        Self { store,
               clock,
               breaker_config,
               bulkhead_config,
               guards: DashMap::new() }
    }

    /// Devuelve (creando si hace falta) la protección de `dependency`.
    pub fn guard(&self, dependency: &str) -> DependencyGuard {
        self.guards
            .entry(dependency.to_string())
            .or_insert_with(|| DependencyGuard { breaker: CircuitBreaker::new(dependency,
                                                                                self.store.clone(),
                                                                                self.clock.clone(),
                                                                                self.breaker_config),
                                                 bulkhead: Arc::new(Bulkhead::new(dependency, self.bulkhead_config)) })
            .clone()
    }

    /// Registra de antemano las dependencias conocidas para que su circuito
    /// compartido aparezca en `breaker_states` aunque esta réplica aún no
    /// las haya llamado.
    pub fn register(&self, dependencies: &[&str]) {
        for dep in dependencies {
            self.guard(dep);
        }
    }

    /// Estado de cada circuito registrado, ordenado por dependencia.
    pub async fn breaker_states(&self) -> Vec<(String, Result<CircuitState>)> {
        let mut breakers: Vec<CircuitBreaker> = self.guards.iter().map(|g| g.breaker.clone()).collect();
        breakers.sort_by(|a, b| a.dependency_key().cmp(b.dependency_key()));
        let mut out = Vec::with_capacity(breakers.len());
        for b in breakers {
            let st = b.state().await;
            out.push((b.dependency_key().to_string(), st));
        }
        out
    }
}
