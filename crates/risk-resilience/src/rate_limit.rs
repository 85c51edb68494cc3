//! Limitador de tasa por tenant con registro de ventana deslizante.
use crate::clock::Clock;
use crate::errors::Result;
use crate::store::SharedStore;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitConfig {
    /// Máximo de peticiones dentro de `window`.
    pub limit: u32,
    pub window: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self { limit: 100,
               window: Duration::from_secs(60) }
    }
}

/// Estado en el almacén compartido: el límite no se puede esquivar
/// enrutando a otra réplica.
#[derive(Clone)]
pub struct RateLimiter {
    store: Arc<dyn SharedStore>,
    clock: Arc<dyn Clock>,
    config: RateLimitConfig,
    scope: Option<String>,
}

impl RateLimiter {
    pub fn new(store: Arc<dyn SharedStore>, clock: Arc<dyn Clock>, config: RateLimitConfig) -> Self {
        Self { store,
               clock,
               config,
               scope: None }
    }

    /// Ventana independiente bajo `ratelimit:{scope}:{tenant_id}`.
    pub fn with_scope(mut self, scope: &str) -> Self {
        self.scope = Some(scope.to_string());
        self
    }

    fn key(&self, tenant_id: &str) -> String {
        match &self.scope {
            Some(scope) => format!("ratelimit:{}:{}", scope, tenant_id),
            None => format!("ratelimit:{}", tenant_id),
        }
    }

    pub fn config(&self) -> RateLimitConfig {
        self.config
    }

    pub async fn allow(&self, tenant_id: &str) -> Result<bool> {
        let key = self.key(tenant_id);
        let decision = self.store
                           .window_hit(&key, self.clock.now(), self.config.window, self.config.limit)
                           .await?;
        if !decision.allowed {
            log::warn!("límite de tasa alcanzado tenant_id={} count={}", tenant_id, decision.count);
        }
        Ok(decision.allowed)
    }
}
