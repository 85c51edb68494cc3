//! Almacén clave-valor compartido entre réplicas.
//!
//! Toda coordinación entre procesos (caché de idempotencia, locks, ventanas
//! de tasa, estado de circuitos) vive aquí y nunca en memoria local. Cada
//! operación es atómica respecto de su clave.
use crate::clock::{to_chrono, Clock, SystemClock};
use crate::errors::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

/// Resultado de registrar un intento en una ventana deslizante.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowDecision {
    pub allowed: bool,
    /// Intentos dentro de la ventana después de decidir.
    pub count: u32,
}

#[async_trait]
pub trait SharedStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Escribe incondicionalmente. `ttl = None` significa sin expiración.
    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<()>;

    /// Escribe sólo si la clave no existe (o expiró). Devuelve si escribió.
    async fn set_if_absent(&self, key: &str, value: &str, ttl: Duration) -> Result<bool>;

    /// Reemplaza el valor sólo si el actual coincide con `expected`
    /// (`None` = ausente).
    async fn compare_and_swap(&self, key: &str, expected: Option<&str>, new: &str, ttl: Option<Duration>) -> Result<bool>;

    /// Borra sólo si el valor actual coincide con `expected`.
    async fn compare_and_delete(&self, key: &str, expected: &str) -> Result<bool>;

    /// Extiende la expiración sólo si el valor actual coincide con `expected`.
    async fn compare_and_expire(&self, key: &str, expected: &str, ttl: Duration) -> Result<bool>;

    async fn delete(&self, key: &str) -> Result<()>;

    /// Registro de ventana deslizante: descarta marcas anteriores a
    /// `now - window` y, si quedan menos de `limit`, anota `now`.
    async fn window_hit(&self, key: &str, now: DateTime<Utc>, window: Duration, limit: u32) -> Result<WindowDecision>;

    async fn ping(&self) -> Result<()>;
}

#[derive(Debug, Clone)]
struct StoredValue {
    value: String,
    expires_at: Option<DateTime<Utc>>,
}

impl StoredValue {
    fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.map(|t| t > now).unwrap_or(true)
    }
}

/// Implementación en memoria sobre `DashMap`. Válida para un único proceso
/// y para pruebas; las réplicas reales usan el adaptador persistente.
pub struct InMemorySharedStore {
    entries: DashMap<String, StoredValue>,
    windows: DashMap<String, VecDeque<DateTime<Utc>>>,
    clock: Arc<dyn Clock>,
}

impl InMemorySharedStore {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self { entries: DashMap::new(),
               windows: DashMap::new(),
               clock }
    }

    fn expiry(&self, ttl: Option<Duration>) -> Option<DateTime<Utc>> {
        ttl.map(|d| self.clock.now() + to_chrono(d))
    }
}

impl Default for InMemorySharedStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SharedStore for InMemorySharedStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let now = self.clock.now();
        Ok(self.entries
               .get(key)
               .filter(|e| e.is_live(now))
               .map(|e| e.value.clone()))
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<()> {
        let stored = StoredValue { value: value.to_string(),
                                   expires_at: self.expiry(ttl) };
        self.entries.insert(key.to_string(), stored);
        Ok(())
    }

    async fn set_if_absent(&self, key: &str, value: &str, ttl: Duration) -> Result<bool> {
        self.compare_and_swap(key, None, value, Some(ttl)).await
    }

    async fn compare_and_swap(&self, key: &str, expected: Option<&str>, new: &str, ttl: Option<Duration>) -> Result<bool> {
        let now = self.clock.now();
        let stored = StoredValue { value: new.to_string(),
                                   expires_at: self.expiry(ttl) };
        let swapped = match self.entries.entry(key.to_string()) {
            Entry::Occupied(mut o) => {
                let current = Some(o.get()).filter(|e| e.is_live(now)).map(|e| e.value.as_str());
                if current == expected {
                    o.insert(stored);
                    true
                } else {
                    false
                }
            }
            Entry::Vacant(v) => {
                if expected.is_none() {
                    v.insert(stored);
                    true
                } else {
                    false
                }
            }
        };
        Ok(swapped)
    }

    async fn compare_and_delete(&self, key: &str, expected: &str) -> Result<bool> {
        let now = self.clock.now();
        Ok(self.entries
               .remove_if(key, |_, e| e.is_live(now) && e.value == expected)
               .is_some())
    }

    async fn compare_and_expire(&self, key: &str, expected: &str, ttl: Duration) -> Result<bool> {
        let now = self.clock.now();
        let new_expiry = now + to_chrono(ttl);
        match self.entries.get_mut(key) {
            Some(mut e) if e.is_live(now) && e.value == expected => {
                e.expires_at = Some(new_expiry);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.entries.remove(key);
        Ok(())
    }

    async fn window_hit(&self, key: &str, now: DateTime<Utc>, window: Duration, limit: u32) -> Result<WindowDecision> {
        let cutoff = now - to_chrono(window);
        let mut log = self.windows.entry(key.to_string()).or_default();
        while log.front().map(|t| *t <= cutoff).unwrap_or(false) {
            log.pop_front();
        }
        let allowed = (log.len() as u32) < limit;
        if allowed {
            log.push_back(now);
        }
        Ok(WindowDecision { allowed,
                            count: log.len() as u32 })
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}
