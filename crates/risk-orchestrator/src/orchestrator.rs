// Archivo: orchestrator.rs
// Propósito: aceptación transaccional de eventos. Cada punto de suspensión
// (idempotencia, persistencia, publicación, lock, workflow) es un paso
// separado que puede fallar sin dejar efectos a medias.
use crate::errors::OrchestratorError;
use crate::publisher::{EventPublisher, EVENTS_TOPIC};
use crate::response::EventResponse;
use flow::domain::{WorkflowState, WorkflowStatus};
use risk_audit::{actions, AuditLogger, FailureClassifier, SYSTEM_ACTOR};
use risk_domain::{validators, AuditEntry, DomainError, Event, EventRepository, EventRequest, EventStatus};
use risk_resilience::{DependencyGuard, LockManager, RateLimiter, ResilienceError, SharedStore};
use risk_workflow::{WorkflowError, WorkflowTrigger};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use uuid::Uuid;

/// Dependencia protegida por circuito y bulkhead al publicar.
pub const MESSAGING_DEPENDENCY: &str = "messaging";

/// Tiempos del orquestador.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrchestratorTimings {
  pub idempotency_ttl: Duration,
  pub inflight_ttl: Duration,
  pub poll_interval: Duration,
  pub wait_timeout: Duration,
  pub lock_ttl: Duration,
}

impl Default for OrchestratorTimings {
  fn default() -> Self {
    Self { idempotency_ttl: Duration::from_secs(24 * 60 * 60),
           inflight_ttl: Duration::from_secs(30),
           poll_interval: Duration::from_millis(25),
           wait_timeout: Duration::from_secs(10),
           lock_ttl: Duration::from_secs(30) }
  }
}

pub fn idempotency_cache_key(tenant_id: &str, idempotency_key: &str) -> String {
  format!("idempotency:{}:{}", tenant_id, idempotency_key)
}

fn inflight_key(cache_key: &str) -> String {
  format!("{}:inflight", cache_key)
}

/// Marca de publicación confirmada; un reintento no vuelve a publicar.
pub fn published_key(tenant_id: &str, event_id: &Uuid) -> String {
  format!("published:{}:{}", tenant_id, event_id)
}

enum Claim {
  Cached(EventResponse),
  Owned { key: String, token: String },
}

/// Dependencias del orquestador, agrupadas para no arrastrar una lista de
/// argumentos posicionales.
pub struct OrchestratorDeps {
  pub events: Arc<dyn EventRepository>,
  pub publisher: Arc<dyn EventPublisher>,
  pub trigger: Arc<dyn WorkflowTrigger>,
  pub shared: Arc<dyn SharedStore>,
  pub locks: LockManager,
  pub limiter: RateLimiter,
  pub audit: AuditLogger,
  pub classifier: Arc<FailureClassifier>,
  pub publish_guard: DependencyGuard,
}

pub struct TransactionalOrchestrator {
  events: Arc<dyn EventRepository>,
  publisher: Arc<dyn EventPublisher>,
  trigger: Arc<dyn WorkflowTrigger>,
  shared: Arc<dyn SharedStore>,
  locks: LockManager,
  limiter: RateLimiter,
  audit: AuditLogger,
  classifier: Arc<FailureClassifier>,
  publish_guard: DependencyGuard,
  timings: OrchestratorTimings,
}

impl TransactionalOrchestrator {
  pub fn new(deps: OrchestratorDeps, timings: OrchestratorTimings) -> Self {
    Self { events: deps.events,
           publisher: deps.publisher,
           trigger: deps.trigger,
           shared: deps.shared,
           locks: deps.locks,
           limiter: deps.limiter,
           audit: deps.audit,
           classifier: deps.classifier,
           publish_guard: deps.publish_guard,
           timings }
  }

  /// Acepta un evento de forma idempotente.
  ///
  /// Con la misma `(tenant_id, idempotency_key)` todos los llamadores
  /// reciben la misma respuesta y el evento se persiste una sola vez. Un
  /// error devuelto antes de cachear la respuesta es seguro de reintentar
  /// si `is_retriable()`.
  pub async fn create_event(&self,
                            request: &EventRequest,
                            idempotency_key: &str,
                            tenant_id: &str,
                            correlation_id: &str)
                            -> Result<EventResponse, OrchestratorError> {
    let correlation_id = if correlation_id.trim().is_empty() {
      Uuid::new_v4().to_string()
    } else {
      correlation_id.trim().to_string()
    };
    let candidate = Event::accept(request, tenant_id, idempotency_key, &correlation_id)?;

    if !self.limiter.allow(&candidate.tenant_id).await? {
      return Err(ResilienceError::RateLimited(candidate.tenant_id.clone()).into());
    }

    let cache_key = idempotency_cache_key(&candidate.tenant_id, &candidate.idempotency_key);
    if let Some(cached) = self.cached(&cache_key).await? {
      log::debug!("respuesta cacheada tenant_id={} key={}", candidate.tenant_id, candidate.idempotency_key);
      return Ok(cached);
    }

    let (claim_key, claim_token) = match self.claim(&cache_key).await? {
      Claim::Cached(resp) => return Ok(resp),
      Claim::Owned { key, token } => (key, token),
    };

    let result = self.accept_claimed(candidate, &cache_key).await;
    if let Err(e) = self.shared.compare_and_delete(&claim_key, &claim_token).await {
      log::warn!("no se pudo liberar la reclamación key={} err={}", claim_key, e);
    }
    result
  }

  async fn cached(&self, cache_key: &str) -> Result<Option<EventResponse>, OrchestratorError> {
    match self.shared.get(cache_key).await? {
      Some(raw) => Ok(Some(EventResponse::from_json(&raw)?)),
      None => Ok(None),
    }
  }

  /// Reclama la clave o espera la respuesta de quien la tiene.
  async fn claim(&self, cache_key: &str) -> Result<Claim, OrchestratorError> {
    let key = inflight_key(cache_key);
    let token = Uuid::new_v4().to_string();
    let deadline = Instant::now() + self.timings.wait_timeout;
    loop {
      if self.shared.set_if_absent(&key, &token, self.timings.inflight_ttl).await? {
        // El ganador anterior pudo cachear y liberar entre la lectura y la reclamación.
        if let Some(cached) = self.cached(cache_key).await? {
          self.shared.compare_and_delete(&key, &token).await?;
          return Ok(Claim::Cached(cached));
        }
        return Ok(Claim::Owned { key, token });
      }
      if let Some(cached) = self.cached(cache_key).await? {
        return Ok(Claim::Cached(cached));
      }
      if Instant::now() >= deadline {
        log::warn!("espera de idempotencia agotada key={}", cache_key);
        return Err(OrchestratorError::IdempotencyInProgress(cache_key.to_string()));
      }
      tokio::time::sleep(self.timings.poll_interval).await;
    }
  }

  async fn accept_claimed(&self, candidate: Event, cache_key: &str) -> Result<EventResponse, OrchestratorError> {
    let mut event = self.persist_or_reuse(candidate).await?;

    if event.status == EventStatus::Received {
      self.publish(&event).await?;
      self.run_workflow(&mut event).await?;
    } else {
      log::info!("evento existente en estado {} event_id={}; se omite publicación", event.status, event.event_id);
    }

    let response = EventResponse::from_event(&event);
    let entry = AuditEntry::new(SYSTEM_ACTOR,
                                actions::EVENT_ACCEPTED,
                                "event",
                                &event.event_id.to_string(),
                                &event.correlation_id,
                                &event.tenant_id).with_states(None, Some(json!(event.status)))
                                                 .with_metadata(json!({
                                                   "event_type": event.event_type,
                                                   "idempotency_key": event.idempotency_key,
                                                 }));
    self.audit.record(entry).await?;

    let raw = response.to_json()?;
    self.shared.set(cache_key, &raw, Some(self.timings.idempotency_ttl)).await?;
    log::info!("evento aceptado event_id={} tenant_id={} status={} correlation_id={}",
               event.event_id, event.tenant_id, event.status, event.correlation_id);
    Ok(response)
  }

  /// Guarda el evento o reutiliza el de un intento anterior con la misma clave.
  async fn persist_or_reuse(&self, candidate: Event) -> Result<Event, OrchestratorError> {
    if let Some(existing) = self.reuse(&candidate).await? {
      return Ok(existing);
    }
    match self.events.save(&candidate).await {
      Ok(()) => Ok(candidate),
      // Otra réplica insertó tras vencer nuestra reclamación.
      Err(DomainError::IdempotencyConflict(_)) => self.reuse(&candidate)
                                                      .await?
                                                      .ok_or_else(|| {
                                                        OrchestratorError::from(DomainError::Repository("evento en conflicto no encontrado".into()))
                                                      }),
      Err(e) => Err(e.into()),
    }
  }

  async fn reuse(&self, candidate: &Event) -> Result<Option<Event>, OrchestratorError> {
    let existing = self.events
                       .find_by_idempotency(&candidate.tenant_id, &candidate.idempotency_key)
                       .await?;
    if let Some(ev) = &existing {
      if ev.payload_hash != candidate.payload_hash {
        log::warn!("clave reutilizada con otro payload tenant_id={} key={} event_id={}",
                   ev.tenant_id, ev.idempotency_key, ev.event_id);
      }
    }
    Ok(existing)
  }

  async fn publish(&self, event: &Event) -> Result<(), OrchestratorError> {
    let marker = published_key(&event.tenant_id, &event.event_id);
    if self.shared.get(&marker).await?.is_some() {
      log::debug!("evento ya publicado event_id={}; se omite", event.event_id);
      return Ok(());
    }
    let routing_key = event.event_type.routing_key();
    let publisher = self.publisher.clone();
    let fut = async move {
      publisher.publish(EVENTS_TOPIC, event, &routing_key)
               .await
               .map_err(OrchestratorError::from)
    };
    if let Err(e) = self.publish_guard.call(fut).await {
      log::warn!("publicación fallida event_id={} tenant_id={} correlation_id={} err={}",
                 event.event_id, event.tenant_id, event.correlation_id, e);
      return Err(e);
    }
    // Sin la marca un reintento publicaría de nuevo; el evento sigue adelante.
    if let Err(e) = self.shared.set(&marker, &event.event_id.to_string(), Some(self.timings.idempotency_ttl)).await {
      log::warn!("no se pudo registrar la publicación event_id={} err={}", event.event_id, e);
    }
    Ok(())
  }

  /// Ejecuta el workflow bajo el lock del evento. Si otra réplica tiene el
  /// lock no se hace nada.
  async fn run_workflow(&self, event: &mut Event) -> Result<(), OrchestratorError> {
    let resource = LockManager::event_resource(&event.tenant_id, &event.event_id.to_string());
    let token = match self.locks.acquire(&resource, self.timings.lock_ttl).await? {
      Some(token) => token,
      None => {
        log::info!("lock ocupado, otra réplica ejecuta event_id={}", event.event_id);
        return Ok(());
      }
    };
    let keep_alive = self.locks.keep_alive(token.clone(), self.timings.lock_ttl);
    let outcome = self.drive(event).await;
    if !keep_alive.stop().await {
      log::error!("lock perdido durante el workflow event_id={} tenant_id={}", event.event_id, event.tenant_id);
    }
    if let Err(e) = self.locks.release(&token).await {
      log::warn!("no se pudo liberar el lock resource={} err={}", resource, e);
    }
    outcome
  }

  async fn drive(&self, event: &mut Event) -> Result<(), OrchestratorError> {
    // Releer bajo el lock: otra réplica pudo avanzar el evento.
    if let Some(fresh) = self.events.find(&event.tenant_id, &event.event_id).await? {
      *event = fresh;
    }
    if event.status == EventStatus::Received {
      self.transition(event, EventStatus::Validated).await?;
    }
    if event.status == EventStatus::Validated {
      self.transition(event, EventStatus::Processing).await?;
    }
    if event.status != EventStatus::Processing {
      return Ok(());
    }

    let state = WorkflowState::new(event.event_id,
                                   &event.tenant_id,
                                   &event.correlation_id,
                                   event.event_type.as_str(),
                                   serde_json::to_value(&*event)?);
    match self.trigger.run(state).await {
      Ok(WorkflowStatus::Approved) => self.transition(event, EventStatus::Approved).await,
      Ok(WorkflowStatus::Rejected) => self.transition(event, EventStatus::Rejected).await,
      Ok(WorkflowStatus::Failed) => self.transition(event, EventStatus::Failed).await,
      Ok(WorkflowStatus::Processing) => {
        log::info!("workflow sin estado terminal event_id={}", event.event_id);
        Ok(())
      }
      Err(e) => self.workflow_failed(event, e).await,
    }
  }

  /// Clasifica y audita el fallo. Sólo un fallo no reintentable cierra el
  /// evento; uno transitorio lo deja en `Processing` para `resume_event`.
  async fn workflow_failed(&self, event: &mut Event, err: WorkflowError) -> Result<(), OrchestratorError> {
    let kind = err.kind();
    let category = self.classifier.record(kind);
    let retriable = err.is_retriable();
    log::warn!("workflow fallido event_id={} tenant_id={} correlation_id={} category={} retriable={} err={}",
               event.event_id, event.tenant_id, event.correlation_id, category, retriable, err);
    let entry = AuditEntry::new(SYSTEM_ACTOR,
                                actions::WORKFLOW_FAILED,
                                "event",
                                &event.event_id.to_string(),
                                &event.correlation_id,
                                &event.tenant_id).with_reason(err.to_string())
                                                 .with_metadata(json!({
                                                   "category": category,
                                                   "kind": kind,
                                                   "retriable": retriable,
                                                 }));
    self.audit.record(entry).await?;
    if !retriable {
      self.transition(event, EventStatus::Failed).await?;
    }
    Ok(())
  }

  async fn transition(&self, event: &mut Event, to: EventStatus) -> Result<(), OrchestratorError> {
    let from = event.status;
    event.transition_to(to)?;
    self.events.save(event).await?;
    let entry = AuditEntry::new(SYSTEM_ACTOR,
                                actions::STATUS_CHANGED,
                                "event",
                                &event.event_id.to_string(),
                                &event.correlation_id,
                                &event.tenant_id).with_states(Some(json!(from)), Some(json!(to)));
    self.audit.record(entry).await?;
    log::debug!("estado {} -> {} event_id={}", from, to, event.event_id);
    Ok(())
  }

  /// Reanuda el workflow de un evento que quedó en curso. Un evento
  /// terminal se devuelve sin cambios.
  pub async fn resume_event(&self, tenant_id: &str, event_id: &Uuid) -> Result<EventResponse, OrchestratorError> {
    let mut event = self.get_event(tenant_id, event_id).await?;
    if event.status.is_terminal() {
      return Ok(EventResponse::from_event(&event));
    }
    if event.status == EventStatus::Received {
      self.publish(&event).await?;
    }
    self.run_workflow(&mut event).await?;
    Ok(EventResponse::from_event(&event))
  }

  /// Lectura acotada al tenant.
  pub async fn get_event(&self, tenant_id: &str, event_id: &Uuid) -> Result<Event, OrchestratorError> {
    let tenant_id = validators::validate_tenant_id(tenant_id)?;
    self.events
        .find(&tenant_id, event_id)
        .await?
        .ok_or_else(|| OrchestratorError::from(DomainError::NotFound(format!("evento {}", event_id))))
  }
}
