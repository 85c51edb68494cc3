//! Lock distribuido con token de fencing sobre el `SharedStore`.
use crate::clock::{to_chrono, Clock};
use crate::errors::Result;
use crate::store::SharedStore;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use uuid::Uuid;

/// Prueba de posesión de un lock. Liberar o renovar exige presentar el
/// mismo `token`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockToken {
    pub resource_key: String,
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct LockManager {
    store: Arc<dyn SharedStore>,
    clock: Arc<dyn Clock>,
}

impl LockManager {
    pub fn new(store: Arc<dyn SharedStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    fn key(resource_key: &str) -> String {
        format!("lock:{}", resource_key)
    }

    /// Clave canónica del lock por evento.
    pub fn event_resource(tenant_id: &str, event_id: &str) -> String {
        format!("tenant:{}:event:{}", tenant_id, event_id)
    }

    /// Intenta tomar el lock. `Ok(None)` indica que otro poseedor lo tiene.
    pub async fn acquire(&self, resource_key: &str, ttl: Duration) -> Result<Option<LockToken>> {
        let token = Uuid::new_v4().to_string();
        if self.store.set_if_absent(&Self::key(resource_key), &token, ttl).await? {
            log::debug!("lock adquirido resource={}", resource_key);
            Ok(Some(LockToken { resource_key: resource_key.to_string(),
                                token,
                                expires_at: self.clock.now() + to_chrono(ttl) }))
        } else {
            log::debug!("lock ocupado resource={}", resource_key);
            Ok(None)
        }
    }

    /// Libera sólo si el token almacenado sigue siendo el nuestro.
    pub async fn release(&self, token: &LockToken) -> Result<bool> {
        let released = self.store
                           .compare_and_delete(&Self::key(&token.resource_key), &token.token)
                           .await?;
        if !released {
            log::warn!("liberación ignorada: token vencido resource={}", token.resource_key);
        }
        Ok(released)
    }

    /// Extiende el TTL si el token sigue vigente.
    pub async fn renew(&self, token: &mut LockToken, ttl: Duration) -> Result<bool> {
        let renewed = self.store
                          .compare_and_expire(&Self::key(&token.resource_key), &token.token, ttl)
                          .await?;
        if renewed {
            token.expires_at = self.clock.now() + to_chrono(ttl);
        }
        Ok(renewed)
    }

    /// Renueva el lock en segundo plano cada `ttl / 3` hasta que se detenga el
    /// `LockKeepAlive` devuelto.
    pub fn keep_alive(&self, token: LockToken, ttl: Duration) -> LockKeepAlive {
        let (cancel_tx, mut cancel_rx) = oneshot::channel::<()>();
        let manager = self.clone();
        let interval = (ttl / 3).max(Duration::from_millis(10));
        let handle = tokio::spawn(async move {
            let mut token = token;
            loop {
                tokio::select! {
                    _ = &mut cancel_rx => return true,
                    _ = tokio::time::sleep(interval) => {
                        match manager.renew(&mut token, ttl).await {
                            Ok(true) => {}
                            Ok(false) => {
                                log::error!("lock perdido durante la ejecución resource={}", token.resource_key);
                                return false;
                            }
                            Err(e) => log::warn!("renovación fallida resource={} err={}", token.resource_key, e),
                        }
                    }
                }
            }
        });
        LockKeepAlive { cancel: Some(cancel_tx),
                        handle }
    }
}

/// Tarea de renovación en curso; se cancela explícitamente con `stop`.
pub struct LockKeepAlive {
    cancel: Option<oneshot::Sender<()>>,
    handle: JoinHandle<bool>,
}

impl LockKeepAlive {
    /// Cancela la renovación. Devuelve `false` si el lock se perdió en algún
    /// momento mientras estaba activa.
    pub async fn stop(mut self) -> bool {
        if let Some(tx) = self.cancel.take() {
            let _ = tx.send(());
        }
        (&mut self.handle).await.unwrap_or(false)
    }
}

impl Drop for LockKeepAlive {
    fn drop(&mut self) {
        if self.cancel.is_some() {
            self.handle.abort();
        }
    }
}
