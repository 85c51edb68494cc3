mod common;

use common::{harness, harness_with, standard_request, test_config};
use risk_domain::EventStatus;
use risk_orchestrator::{ChannelPublisher, OrchestratorError, RiskflowConfig, MESSAGING_DEPENDENCY};
use risk_resilience::{CircuitBreaker, CircuitBreakerConfig, ResilienceError};
use risk_workflow::{CONTEXT_SOURCE, RISK_SCORER};
use std::sync::Arc;
use std::time::Duration;

#[tokio::test]
async fn fresh_context_is_healthy() {
  let h = harness().await;
  h.orchestrator
   .create_event(&standard_request(), "key-1", "acme", "c")
   .await
   .expect("create");
  let report = h.ctx.health_check().check().await;
  assert!(report.healthy);
  for name in ["events", "audit", "workflow_state", "messaging", "shared_store"] {
    assert!(report.dependency(name).expect(name).healthy);
  }
  let breaker = report.dependency(&format!("breaker:{}", MESSAGING_DEPENDENCY)).expect("breaker");
  assert_eq!(breaker.detail, "CLOSED");
}

#[tokio::test]
async fn open_messaging_breaker_marks_health_degraded() {
  let config = RiskflowConfig { breaker: CircuitBreakerConfig { failure_threshold: 3,
                                                                failure_window: Duration::from_secs(60),
                                                                cooldown: Duration::from_secs(30) },
                                ..test_config() };
  let h = harness_with(config, |b| b).await;
  h.publisher.set_available(false);
  for i in 0..3 {
    let err = h.orchestrator
               .create_event(&standard_request(), &format!("k-{}", i), "acme", "c")
               .await
               .unwrap_err();
    assert!(matches!(err, OrchestratorError::Publish(_)));
  }

  let err = h.orchestrator
             .create_event(&standard_request(), "k-open", "acme", "c")
             .await
             .unwrap_err();
  assert!(matches!(err, OrchestratorError::Resilience(ResilienceError::CircuitOpen(_))));
  assert!(err.is_retriable());

  let report = h.ctx.health_check().check().await;
  assert!(!report.healthy);
  assert!(!report.dependency("messaging").expect("messaging").healthy);
  let breaker = report.dependency("breaker:messaging").expect("breaker");
  assert!(!breaker.healthy);
  assert_eq!(breaker.detail, "OPEN");
}

#[tokio::test]
async fn channel_publisher_requires_consumer_ack() {
  let (publisher, mut rx) = ChannelPublisher::new(8, Duration::from_secs(1));
  let h = harness_with(test_config(), move |b| b.with_publisher(Arc::new(publisher))).await;
  let consumer = tokio::spawn(async move {
    let delivery = rx.recv().await.expect("delivery");
    let routing_key = delivery.message.routing_key.clone();
    delivery.ack();
    routing_key
  });

  let resp = h.orchestrator
              .create_event(&standard_request(), "key-chan", "acme", "c")
              .await
              .expect("create");
  assert_eq!(resp.status, EventStatus::Approved);
  assert_eq!(consumer.await.expect("join"), "event.risk");
}

#[tokio::test]
async fn breaker_opened_by_another_replica_degrades_health() {
  let h = harness().await;
  let cfg = h.ctx.config.breaker;
  // Otra réplica comparte el almacén y abre el circuito del scorer.
  let remote = CircuitBreaker::new(RISK_SCORER, h.ctx.shared.clone(), h.ctx.clock.clone(), cfg);
  for _ in 0..cfg.failure_threshold {
    let out: Result<(), ResilienceError> = remote.call(async { Err(ResilienceError::Store("caído".into())) }).await;
    assert!(out.is_err());
  }

  let report = h.ctx.health_check().check().await;
  assert!(!report.healthy);
  let scorer = report.dependency(&format!("breaker:{}", RISK_SCORER)).expect("scorer breaker");
  assert!(!scorer.healthy);
  assert_eq!(scorer.detail, "OPEN");
  let source = report.dependency(&format!("breaker:{}", CONTEXT_SOURCE)).expect("source breaker");
  assert_eq!(source.detail, "CLOSED");
}
