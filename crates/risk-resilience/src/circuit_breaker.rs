//! Circuit breaker por dependencia con estado en el almacén compartido.
//!
//! El estado es un registro JSON versionado implícitamente por su contenido:
//! cada cambio se aplica con `compare_and_swap` sobre el valor leído, de modo
//! que réplicas concurrentes nunca pisan la transición de otra.
use crate::clock::{to_chrono, Clock};
use crate::errors::{ResilienceError, Result};
use crate::store::SharedStore;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

const MAX_CAS_ATTEMPTS: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CircuitState::Closed => write!(f, "CLOSED"),
            CircuitState::Open => write!(f, "OPEN"),
            CircuitState::HalfOpen => write!(f, "HALF_OPEN"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CircuitBreakerConfig {
    /// Fallos consecutivos que abren el circuito.
    pub failure_threshold: u32,
    /// Los fallos sólo cuentan como consecutivos dentro de esta ventana.
    pub failure_window: Duration,
    /// Tiempo en `Open` antes de permitir la llamada de prueba.
    pub cooldown: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self { failure_threshold: 5,
               failure_window: Duration::from_secs(60),
               cooldown: Duration::from_secs(10) }
    }
}

/// Registro persistido en `breaker:{dependency_key}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CircuitBreakerState {
    pub dependency_key: String,
    pub state: CircuitState,
    pub consecutive_failures: u32,
    pub first_failure_at: Option<DateTime<Utc>>,
    pub opened_at: Option<DateTime<Utc>>,
    pub trial_in_flight: bool,
    pub trial_started_at: Option<DateTime<Utc>>,
}

impl CircuitBreakerState {
    fn closed(dependency_key: &str) -> Self {
        Self { dependency_key: dependency_key.to_string(),
               state: CircuitState::Closed,
               consecutive_failures: 0,
               first_failure_at: None,
               opened_at: None,
               trial_in_flight: false,
               trial_started_at: None }
    }

    fn transition_to_open(&mut self, now: DateTime<Utc>) {
        self.state = CircuitState::Open;
        self.opened_at = Some(now);
        self.trial_in_flight = false;
        self.trial_started_at = None;
    }

    fn transition_to_half_open(&mut self, now: DateTime<Utc>) {
        self.state = CircuitState::HalfOpen;
        self.trial_in_flight = true;
        self.trial_started_at = Some(now);
    }

    fn transition_to_closed(&mut self) {
        *self = Self::closed(&self.dependency_key);
    }

    fn cooldown_elapsed(&self, now: DateTime<Utc>, cooldown: Duration) -> bool {
        self.opened_at.map(|t| now - t >= to_chrono(cooldown)).unwrap_or(true)
    }
}

/// Tipo de permiso concedido por `try_acquire`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permit {
    Normal,
    Trial,
}

#[derive(Clone)]
pub struct CircuitBreaker {
    dependency_key: String,
    store: Arc<dyn SharedStore>,
    clock: Arc<dyn Clock>,
    config: CircuitBreakerConfig,
}

impl CircuitBreaker {
    pub fn new(dependency_key: &str, store: Arc<dyn SharedStore>, clock: Arc<dyn Clock>, config: CircuitBreakerConfig) -> Self {
        Self { dependency_key: dependency_key.to_string(),
               store,
               clock,
               config }
    }

    pub fn dependency_key(&self) -> &str {
        &self.dependency_key
    }

    fn key(&self) -> String {
        format!("breaker:{}", self.dependency_key)
    }

    async fn load(&self) -> Result<(Option<String>, CircuitBreakerState)> {
        match self.store.get(&self.key()).await? {
            Some(raw) => {
                let st: CircuitBreakerState = serde_json::from_str(&raw)?;
                Ok((Some(raw), st))
            }
            None => Ok((None, CircuitBreakerState::closed(&self.dependency_key))),
        }
    }

    /// Aplica `f` al estado con reintento optimista. `f` devuelve `false` en
    /// la primera posición si no hay cambio que escribir.
    async fn update<T, F>(&self, mut f: F) -> Result<T>
        where F: FnMut(&mut CircuitBreakerState, DateTime<Utc>) -> (bool, T)
    {
        for _ in 0..MAX_CAS_ATTEMPTS {
            let (raw, mut st) = self.load().await?;
            let (changed, out) = f(&mut st, self.clock.now());
            if !changed {
                return Ok(out);
            }
            let new_raw = serde_json::to_string(&st)?;
            if self.store
                   .compare_and_swap(&self.key(), raw.as_deref(), &new_raw, None)
                   .await?
            {
                return Ok(out);
            }
        }
        Err(ResilienceError::Store(format!("contención al actualizar breaker {}", self.dependency_key)))
    }

    /// Estado actual. Un circuito abierto cuyo enfriamiento ya venció se
    /// informa como `HalfOpen`.
    pub async fn state(&self) -> Result<CircuitState> {
        let (_, st) = self.load().await?;
        if st.state == CircuitState::Open && st.cooldown_elapsed(self.clock.now(), self.config.cooldown) {
            return Ok(CircuitState::HalfOpen);
        }
        Ok(st.state)
    }

    pub async fn snapshot(&self) -> Result<CircuitBreakerState> {
        Ok(self.load().await?.1)
    }

    /// Decide si una llamada puede pasar. En `HalfOpen` sólo se concede una
    /// llamada de prueba a la vez.
    pub async fn try_acquire(&self) -> Result<Permit> {
        let cooldown = self.config.cooldown;
        let decision = self.update(|st, now| match st.state {
                                       CircuitState::Closed => (false, Some(Permit::Normal)),
                                       CircuitState::Open => {
                                           if st.cooldown_elapsed(now, cooldown) {
                                               st.transition_to_half_open(now);
                                               (true, Some(Permit::Trial))
                                           } else {
                                               (false, None)
                                           }
                                       }
                                       CircuitState::HalfOpen => {
                                           // Una prueba abandonada (proceso caído) se reemplaza
                                           // tras otro enfriamiento completo.
                                           let stale = st.trial_started_at
                                                         .map(|t| now - t >= to_chrono(cooldown))
                                                         .unwrap_or(true);
                                           if !st.trial_in_flight || stale {
                                               st.transition_to_half_open(now);
                                               (true, Some(Permit::Trial))
                                           } else {
                                               (false, None)
                                           }
                                       }
                                   })
                           .await?;
        decision.ok_or_else(|| ResilienceError::CircuitOpen(self.dependency_key.clone()))
    }

    pub async fn on_success(&self, permit: Permit) -> Result<()> {
        let dep = self.dependency_key.clone();
        self.update(|st, _now| match (permit, st.state) {
                        (Permit::Trial, CircuitState::HalfOpen) => {
                            log::info!("circuito cerrado tras prueba exitosa dependency={}", dep);
                            st.transition_to_closed();
                            (true, ())
                        }
                        (_, CircuitState::Closed) if st.consecutive_failures > 0 => {
                            st.consecutive_failures = 0;
                            st.first_failure_at = None;
                            (true, ())
                        }
                        _ => (false, ()),
                    })
            .await
    }

    pub async fn on_failure(&self, permit: Permit) -> Result<()> {
        let cfg = self.config;
        let dep = self.dependency_key.clone();
        self.update(|st, now| match (permit, st.state) {
                        (Permit::Trial, CircuitState::HalfOpen) => {
                            log::warn!("prueba fallida, circuito reabierto dependency={}", dep);
                            st.transition_to_open(now);
                            (true, ())
                        }
                        (_, CircuitState::Closed) => {
                            let in_window = st.first_failure_at
                                              .map(|t| now - t <= to_chrono(cfg.failure_window))
                                              .unwrap_or(false);
                            if in_window {
                                st.consecutive_failures += 1;
                            } else {
                                st.consecutive_failures = 1;
                                st.first_failure_at = Some(now);
                            }
                            if st.consecutive_failures >= cfg.failure_threshold {
                                log::warn!("circuito abierto dependency={} failures={}", dep, st.consecutive_failures);
                                st.transition_to_open(now);
                            }
                            (true, ())
                        }
                        _ => (false, ()),
                    })
            .await
    }

    /// Ejecuta `fut` protegido por el circuito.
    pub async fn call<T, E, Fut>(&self, fut: Fut) -> std::result::Result<T, E>
        where Fut: Future<Output = std::result::Result<T, E>>,
              E: From<ResilienceError>
    {
        self.call_counting(fut, |_| true).await
    }

    /// Como `call`, pero sólo los errores para los que `counts` devuelve
    /// `true` suman como fallo de la dependencia. El resto prueba que la
    /// dependencia respondió y se registra como éxito.
    pub async fn call_counting<T, E, Fut, F>(&self, fut: Fut, counts: F) -> std::result::Result<T, E>
        where Fut: Future<Output = std::result::Result<T, E>>,
              E: From<ResilienceError>,
              F: Fn(&E) -> bool
    {
        let permit = self.try_acquire().await?;
        let res = fut.await;
        let recorded = match &res {
            Err(e) if counts(e) => self.on_failure(permit).await,
            _ => self.on_success(permit).await,
        };
        if let Err(e) = recorded {
            log::warn!("no se pudo registrar el resultado dependency={} err={}", self.dependency_key, e);
        }
        res
    }
}
