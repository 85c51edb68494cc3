// Archivo: config.rs
// Propósito: configuración del proceso leída de variables `RISKFLOW_*`.
use crate::errors::OrchestratorError;
use risk_governance::GovernanceMode;
use risk_resilience::{BulkheadConfig, CircuitBreakerConfig, RateLimitConfig};
use std::time::Duration;

/// Configuración completa de una réplica. Todos los tiempos son `Duration`
/// explícitos; los valores por defecto se documentan en `Default`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RiskflowConfig {
  /// Vida de una respuesta cacheada por clave de idempotencia (24 h).
  pub idempotency_ttl: Duration,
  /// Vida de la reclamación en curso de una clave (30 s).
  pub inflight_ttl: Duration,
  /// Espera entre consultas de quien perdió la reclamación (25 ms).
  pub idempotency_poll_interval: Duration,
  /// Espera máxima antes de `IdempotencyInProgress` (10 s).
  pub idempotency_wait_timeout: Duration,
  /// TTL del lock por evento; se renueva cada `lock_ttl / 3` (30 s).
  pub lock_ttl: Duration,
  /// Confirmación máxima del broker (5 s).
  pub publish_ack_timeout: Duration,
  /// Límite de entrada por tenant.
  pub rate_limit: RateLimitConfig,
  /// Límite de ejecuciones de workflow por tenant.
  pub workflow_rate_limit: RateLimitConfig,
  pub breaker: CircuitBreakerConfig,
  pub bulkhead: BulkheadConfig,
  pub governance: GovernanceMode,
  /// `None` usa almacenamiento en memoria.
  pub database_url: Option<String>,
  pub db_pool_size: u32,
}

impl Default for RiskflowConfig {
  fn default() -> Self {
    Self { idempotency_ttl: Duration::from_secs(24 * 60 * 60),
           inflight_ttl: Duration::from_secs(30),
           idempotency_poll_interval: Duration::from_millis(25),
           idempotency_wait_timeout: Duration::from_secs(10),
           lock_ttl: Duration::from_secs(30),
           publish_ack_timeout: Duration::from_secs(5),
           rate_limit: RateLimitConfig::default(),
           workflow_rate_limit: RateLimitConfig::default(),
           breaker: CircuitBreakerConfig::default(),
           bulkhead: BulkheadConfig::default(),
           governance: GovernanceMode::Enforced,
           database_url: None,
           db_pool_size: 8 }
  }
}

impl RiskflowConfig {
  /// Lee `.env` (si existe) y el entorno del proceso.
  pub fn from_env() -> Result<Self, OrchestratorError> {
    dotenvy::dotenv().ok();
    Self::from_lookup(|k| std::env::var(k).ok())
  }

  /// Construye la configuración a partir de una función de búsqueda. Las
  /// variables ausentes conservan su valor por defecto.
  pub fn from_lookup<F>(lookup: F) -> Result<Self, OrchestratorError>
    where F: Fn(&str) -> Option<String>
  {
    let d = Self::default();
    let get = |k: &str| lookup(k).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

    let millis = |k: &str, def: Duration| -> Result<Duration, OrchestratorError> {
      match get(k) {
        Some(v) => v.parse::<u64>()
                    .map(Duration::from_millis)
                    .map_err(|_| OrchestratorError::Config(format!("{} debe ser un entero en milisegundos: {}", k, v))),
        None => Ok(def),
      }
    };
    let secs = |k: &str, def: Duration| -> Result<Duration, OrchestratorError> {
      match get(k) {
        Some(v) => v.parse::<u64>()
                    .map(Duration::from_secs)
                    .map_err(|_| OrchestratorError::Config(format!("{} debe ser un entero en segundos: {}", k, v))),
        None => Ok(def),
      }
    };
    let number = |k: &str, def: u64| -> Result<u64, OrchestratorError> {
      match get(k) {
        Some(v) => v.parse::<u64>()
                    .map_err(|_| OrchestratorError::Config(format!("{} debe ser un entero: {}", k, v))),
        None => Ok(def),
      }
    };

    let rate_limit = RateLimitConfig { limit: number("RISKFLOW_RATE_LIMIT", d.rate_limit.limit as u64)? as u32,
                                       window: secs("RISKFLOW_RATE_WINDOW_SECS", d.rate_limit.window)? };
    let workflow_rate_limit =
      RateLimitConfig { limit: number("RISKFLOW_WORKFLOW_RATE_LIMIT", d.workflow_rate_limit.limit as u64)? as u32,
                        window: secs("RISKFLOW_WORKFLOW_RATE_WINDOW_SECS", d.workflow_rate_limit.window)? };
    let breaker =
      CircuitBreakerConfig { failure_threshold: number("RISKFLOW_BREAKER_FAILURES", d.breaker.failure_threshold as u64)? as u32,
                             failure_window: secs("RISKFLOW_BREAKER_WINDOW_SECS", d.breaker.failure_window)?,
                             cooldown: secs("RISKFLOW_BREAKER_COOLDOWN_SECS", d.breaker.cooldown)? };
    let bulkhead = BulkheadConfig { max_concurrent: number("RISKFLOW_BULKHEAD_MAX_CONCURRENT",
                                                           d.bulkhead.max_concurrent as u64)? as usize,
                                    max_queue: number("RISKFLOW_BULKHEAD_MAX_QUEUE", d.bulkhead.max_queue as u64)? as usize,
                                    queue_timeout: millis("RISKFLOW_BULKHEAD_QUEUE_TIMEOUT_MS", d.bulkhead.queue_timeout)? };
    if bulkhead.max_concurrent == 0 {
      return Err(OrchestratorError::Config("RISKFLOW_BULKHEAD_MAX_CONCURRENT debe ser mayor que 0".into()));
    }

    let governance = match get("RISKFLOW_GOVERNANCE_ENABLED").map(|v| v.to_lowercase()) {
      None => GovernanceMode::Enforced,
      Some(v) if v == "true" || v == "1" => GovernanceMode::Enforced,
      Some(v) if v == "false" || v == "0" => {
        let model = get("RISKFLOW_DEFAULT_MODEL_VERSION").ok_or_else(|| {
                      OrchestratorError::Config("gobernanza deshabilitada sin RISKFLOW_DEFAULT_MODEL_VERSION".into())
                    })?;
        let prompt = get("RISKFLOW_DEFAULT_PROMPT_VERSION").ok_or_else(|| {
                       OrchestratorError::Config("gobernanza deshabilitada sin RISKFLOW_DEFAULT_PROMPT_VERSION".into())
                     })?;
        GovernanceMode::Disabled { default_model_version: model,
                                   default_prompt_version: prompt }
      }
      Some(v) => {
        return Err(OrchestratorError::Config(format!("RISKFLOW_GOVERNANCE_ENABLED inválido: {}", v)));
      }
    };

    Ok(Self { idempotency_ttl: secs("RISKFLOW_IDEMPOTENCY_TTL_SECS", d.idempotency_ttl)?,
              inflight_ttl: secs("RISKFLOW_INFLIGHT_TTL_SECS", d.inflight_ttl)?,
              idempotency_poll_interval: millis("RISKFLOW_IDEMPOTENCY_POLL_MS", d.idempotency_poll_interval)?,
              idempotency_wait_timeout: millis("RISKFLOW_IDEMPOTENCY_WAIT_MS", d.idempotency_wait_timeout)?,
              lock_ttl: secs("RISKFLOW_LOCK_TTL_SECS", d.lock_ttl)?,
              publish_ack_timeout: millis("RISKFLOW_PUBLISH_ACK_TIMEOUT_MS", d.publish_ack_timeout)?,
              rate_limit,
              workflow_rate_limit,
              breaker,
              bulkhead,
              governance,
              database_url: get("RISKFLOW_DB_URL").or_else(|| get("DATABASE_URL")),
              db_pool_size: number("RISKFLOW_DB_POOL_SIZE", d.db_pool_size as u64)? as u32 })
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::collections::HashMap;

  fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map: HashMap<String, String> = vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
    move |k| map.get(k).cloned()
  }

  #[test]
  fn empty_environment_yields_defaults() {
    let cfg = RiskflowConfig::from_lookup(lookup(&[])).expect("config");
    assert_eq!(cfg, RiskflowConfig::default());
    assert_eq!(cfg.rate_limit.limit, 100);
    assert_eq!(cfg.breaker.failure_threshold, 5);
    assert_eq!(cfg.breaker.cooldown, Duration::from_secs(10));
  }

  #[test]
  fn overrides_are_parsed() {
    let cfg = RiskflowConfig::from_lookup(lookup(&[("RISKFLOW_LOCK_TTL_SECS", "12"),
                                                   ("RISKFLOW_RATE_LIMIT", "3"),
                                                   ("RISKFLOW_IDEMPOTENCY_POLL_MS", "5"),
                                                   ("DATABASE_URL", "sqlite://riskflow.db")])).expect("config");
    assert_eq!(cfg.lock_ttl, Duration::from_secs(12));
    assert_eq!(cfg.rate_limit.limit, 3);
    assert_eq!(cfg.idempotency_poll_interval, Duration::from_millis(5));
    assert_eq!(cfg.database_url.as_deref(), Some("sqlite://riskflow.db"));
  }

  #[test]
  fn disabled_governance_requires_default_versions() {
    let err = RiskflowConfig::from_lookup(lookup(&[("RISKFLOW_GOVERNANCE_ENABLED", "false")])).unwrap_err();
    assert!(matches!(err, OrchestratorError::Config(_)));

    let cfg = RiskflowConfig::from_lookup(lookup(&[("RISKFLOW_GOVERNANCE_ENABLED", "false"),
                                                   ("RISKFLOW_DEFAULT_MODEL_VERSION", "1.0.0"),
                                                   ("RISKFLOW_DEFAULT_PROMPT_VERSION", "2")])).expect("config");
    assert_eq!(cfg.governance,
               GovernanceMode::Disabled { default_model_version: "1.0.0".into(),
                                          default_prompt_version: "2".into() });
  }

  #[test]
  fn malformed_number_is_rejected() {
    let err = RiskflowConfig::from_lookup(lookup(&[("RISKFLOW_LOCK_TTL_SECS", "treinta")])).unwrap_err();
    assert!(err.to_string().contains("RISKFLOW_LOCK_TTL_SECS"));
  }
}
