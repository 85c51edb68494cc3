//! Bulkhead: capacidad de trabajo local de una réplica para una dependencia.
//!
//! A diferencia del resto de primitivas, su estado es local al proceso: acota
//! los workers de esta réplica y no se comparte.
use crate::errors::{ResilienceError, Result};
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BulkheadConfig {
    pub max_concurrent: usize,
    /// Llamadas que pueden esperar un hueco; más allá se rechaza al instante.
    pub max_queue: usize,
    pub queue_timeout: Duration,
}

impl Default for BulkheadConfig {
    fn default() -> Self {
        Self { max_concurrent: 10,
               max_queue: 20,
               queue_timeout: Duration::from_secs(5) }
    }
}

/// Puesto reservado en la cola; se libera también si el llamante cancela la
/// espera.
struct QueueSlot<'a>(&'a AtomicUsize);

impl Drop for QueueSlot<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

pub struct Bulkhead {
    name: String,
    semaphore: Arc<Semaphore>,
    waiting: AtomicUsize,
    config: BulkheadConfig,
}

impl Bulkhead {
    pub fn new(name: &str, config: BulkheadConfig) -> Self {
        Self { name: name.to_string(),
               semaphore: Arc::new(Semaphore::new(config.max_concurrent)),
               waiting: AtomicUsize::new(0),
               config }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }

    pub fn waiting(&self) -> usize {
        self.waiting.load(Ordering::SeqCst)
    }

    pub async fn acquire(&self) -> Result<OwnedSemaphorePermit> {
        if let Ok(p) = self.semaphore.clone().try_acquire_owned() {
            return Ok(p);
        }
        // Reserva de un puesto en la cola sin superar `max_queue`.
        let reserved = self.waiting
                           .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |w| {
                               if w < self.config.max_queue {
                                   Some(w + 1)
                               } else {
                                   None
                               }
                           })
                           .is_ok();
        if !reserved {
            log::warn!("bulkhead lleno name={}", self.name);
            return Err(ResilienceError::BulkheadFull(self.name.clone()));
        }
        let _slot = QueueSlot(&self.waiting);
        let res = tokio::time::timeout(self.config.queue_timeout, self.semaphore.clone().acquire_owned()).await;
        match res {
            Ok(Ok(p)) => Ok(p),
            Ok(Err(_closed)) => Err(ResilienceError::BulkheadFull(self.name.clone())),
            Err(_elapsed) => Err(ResilienceError::BulkheadTimeout(self.name.clone())),
        }
    }

    pub async fn call<T, E, Fut>(&self, fut: Fut) -> std::result::Result<T, E>
        where Fut: Future<Output = std::result::Result<T, E>>,
              E: From<ResilienceError>
    {
        let _permit = self.acquire().await?;
        fut.await
    }
}
