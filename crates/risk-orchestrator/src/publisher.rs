// Archivo: publisher.rs
// Propósito: publicación de eventos aceptados hacia la mensajería.
use async_trait::async_trait;
use risk_domain::Event;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot, Mutex};

pub const EVENTS_TOPIC: &str = "events";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PublishError {
  #[error("broker no disponible: {0}")]
  Unavailable(String),
  #[error("sin confirmación del broker tras {0:?}")]
  AckTimeout(Duration),
  #[error("mensaje rechazado: {0}")]
  Nacked(String),
}

/// Mensaje tal como sale hacia el broker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublishedMessage {
  pub topic: String,
  pub routing_key: String,
  pub event: Event,
}

/// Contrato de mensajería. `publish` sólo devuelve `Ok` cuando el broker
/// confirmó la entrega.
#[async_trait]
pub trait EventPublisher: Send + Sync {
  async fn publish(&self, topic: &str, event: &Event, routing_key: &str) -> Result<(), PublishError>;

  async fn ping(&self) -> Result<(), PublishError>;
}

/// Publicador en memoria: guarda los mensajes y permite inyectar fallos.
#[derive(Default)]
pub struct InMemoryEventPublisher {
  messages: Mutex<Vec<PublishedMessage>>,
  fail_next: AtomicUsize,
  down: AtomicBool,
}

impl InMemoryEventPublisher {
  pub fn new() -> Self {
    Self::default()
  }

  /// Las próximas `n` publicaciones fallan con `Unavailable`.
  pub fn fail_next(&self, n: usize) {
    self.fail_next.store(n, Ordering::SeqCst);
  }

  /// Simula la caída del broker hasta que se vuelva a habilitar.
  pub fn set_available(&self, available: bool) {
    self.down.store(!available, Ordering::SeqCst);
  }

  pub async fn published(&self) -> Vec<PublishedMessage> {
    self.messages.lock().await.clone()
  }

  pub async fn count(&self) -> usize {
    self.messages.lock().await.len()
  }
}

#[async_trait]
impl EventPublisher for InMemoryEventPublisher {
  async fn publish(&self, topic: &str, event: &Event, routing_key: &str) -> Result<(), PublishError> {
    if self.down.load(Ordering::SeqCst) {
      return Err(PublishError::Unavailable("broker caído".into()));
    }
    let injected = self.fail_next
                       .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                       .is_ok();
    if injected {
      return Err(PublishError::Unavailable("fallo inyectado".into()));
    }
    self.messages.lock().await.push(PublishedMessage { topic: topic.to_string(),
                                                       routing_key: routing_key.to_string(),
                                                       event: event.clone() });
    Ok(())
  }

  async fn ping(&self) -> Result<(), PublishError> {
    if self.down.load(Ordering::SeqCst) {
      return Err(PublishError::Unavailable("broker caído".into()));
    }
    Ok(())
  }
}

/// Entrega pendiente de confirmación, tal como la recibe el consumidor.
pub struct Delivery {
  pub message: PublishedMessage,
  ack: oneshot::Sender<Result<(), String>>,
}

impl Delivery {
  pub fn ack(self) {
    let _ = self.ack.send(Ok(()));
  }

  pub fn nack(self, reason: &str) {
    let _ = self.ack.send(Err(reason.to_string()));
  }
}

/// Publicador sobre un canal acotado. Cada mensaje exige `ack` explícito
/// del consumidor dentro de `ack_timeout`; soltar la entrega sin confirmar
/// cuenta como rechazo.
#[derive(Clone)]
pub struct ChannelPublisher {
  tx: mpsc::Sender<Delivery>,
  ack_timeout: Duration,
}

impl ChannelPublisher {
  pub fn new(capacity: usize, ack_timeout: Duration) -> (Self, mpsc::Receiver<Delivery>) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (Self { tx, ack_timeout }, rx)
  }
}

#[async_trait]
impl EventPublisher for ChannelPublisher {
  async fn publish(&self, topic: &str, event: &Event, routing_key: &str) -> Result<(), PublishError> {
    let (ack_tx, ack_rx) = oneshot::channel();
    let delivery = Delivery { message: PublishedMessage { topic: topic.to_string(),
                                                          routing_key: routing_key.to_string(),
                                                          event: event.clone() },
                              ack: ack_tx };
    match tokio::time::timeout(self.ack_timeout, self.tx.send(delivery)).await {
      Ok(Ok(())) => {}
      Ok(Err(_)) => return Err(PublishError::Unavailable("canal cerrado".into())),
      Err(_) => return Err(PublishError::AckTimeout(self.ack_timeout)),
    }
    match tokio::time::timeout(self.ack_timeout, ack_rx).await {
      Ok(Ok(Ok(()))) => {
        log::debug!("publicación confirmada event_id={} routing_key={}", event.event_id, routing_key);
        Ok(())
      }
      Ok(Ok(Err(reason))) => Err(PublishError::Nacked(reason)),
      Ok(Err(_)) => Err(PublishError::Nacked("entrega descartada sin confirmar".into())),
      Err(_) => Err(PublishError::AckTimeout(self.ack_timeout)),
    }
  }

  async fn ping(&self) -> Result<(), PublishError> {
    if self.tx.is_closed() {
      return Err(PublishError::Unavailable("canal cerrado".into()));
    }
    Ok(())
  }
}
