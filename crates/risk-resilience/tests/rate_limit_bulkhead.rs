use risk_resilience::{Bulkhead, BulkheadConfig, InMemorySharedStore, ManualClock, RateLimitConfig, RateLimiter, ResilienceError,
                      SharedStore};
use std::sync::Arc;
use std::time::Duration;

#[tokio::test]
async fn hundred_and_first_request_is_rejected_then_one_slot_frees() {
    let clock = Arc::new(ManualClock::default());
    let store: Arc<dyn SharedStore> = Arc::new(InMemorySharedStore::with_clock(clock.clone()));
    let limiter = RateLimiter::new(store, clock.clone(), RateLimitConfig { limit: 100,
                                                                            window: Duration::from_secs(60) });
    // La primera petición queda sola en t=0; las 99 restantes en t=1s.
    assert!(limiter.allow("acme").await.expect("allow"));
    clock.advance(Duration::from_secs(1));
    for _ in 0..99 {
        assert!(limiter.allow("acme").await.expect("allow"));
    }
    assert!(!limiter.allow("acme").await.expect("101st"));
    // Otro tenant no comparte ventana.
    assert!(limiter.allow("globex").await.expect("other tenant"));

    // La ventana pasa la primera marca: exactamente un hueco libre.
    clock.advance(Duration::from_secs(59));
    assert!(limiter.allow("acme").await.expect("freed slot"));
    assert!(!limiter.allow("acme").await.expect("still full"));
}

#[tokio::test]
async fn bulkhead_rejects_beyond_capacity() {
    let bh = Arc::new(Bulkhead::new("scorer", BulkheadConfig { max_concurrent: 1,
                                                                max_queue: 1,
                                                                queue_timeout: Duration::from_millis(50) }));
    let held = bh.acquire().await.expect("first permit");

    // Un llamador espera en cola y agota el tiempo.
    let waiter = {
        let bh = bh.clone();
        tokio::spawn(async move { bh.acquire().await.map(|_| ()) })
    };
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(bh.waiting(), 1);

    // Con la cola llena, el siguiente se rechaza al instante.
    let err = bh.acquire().await.unwrap_err();
    assert_eq!(err, ResilienceError::BulkheadFull("scorer".into()));

    let waited = waiter.await.expect("join");
    assert_eq!(waited, Err(ResilienceError::BulkheadTimeout("scorer".into())));
    drop(held);
    assert_eq!(bh.available(), 1);
}

#[tokio::test]
async fn cancelled_waiter_frees_its_queue_slot() {
    let bh = Arc::new(Bulkhead::new("dep", BulkheadConfig { max_concurrent: 1,
                                                             max_queue: 1,
                                                             queue_timeout: Duration::from_secs(5) }));
    let held = bh.acquire().await.expect("first permit");

    let cancelled = {
        let bh = bh.clone();
        tokio::spawn(async move { bh.acquire().await.map(|_| ()) })
    };
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(bh.waiting(), 1);
    cancelled.abort();
    assert!(cancelled.await.expect_err("aborted").is_cancelled());
    assert_eq!(bh.waiting(), 0);

    // El puesto liberado vuelve a estar disponible para otro llamador.
    let next = {
        let bh = bh.clone();
        tokio::spawn(async move { bh.acquire().await.map(|_| ()) })
    };
    tokio::time::sleep(Duration::from_millis(10)).await;
    drop(held);
    assert_eq!(next.await.expect("join"), Ok(()));
    assert_eq!(bh.waiting(), 0);
}

#[tokio::test]
async fn bulkhead_call_runs_when_capacity_frees() {
    let bh = Bulkhead::new("ctx", BulkheadConfig::default());
    let out: Result<u8, ResilienceError> = bh.call(async { Ok(3) }).await;
    assert_eq!(out, Ok(3));
}

#[tokio::test]
async fn scoped_limiter_keeps_its_own_window() {
    let clock = Arc::new(ManualClock::default());
    let store: Arc<dyn SharedStore> = Arc::new(InMemorySharedStore::with_clock(clock.clone()));
    let cfg = RateLimitConfig { limit: 1,
                                window: Duration::from_secs(60) };
    let ingress = RateLimiter::new(store.clone(), clock.clone(), cfg);
    let workflow = RateLimiter::new(store, clock, cfg).with_scope("workflow");
    assert!(ingress.allow("acme").await.expect("ingress"));
    assert!(!ingress.allow("acme").await.expect("ingress full"));
    assert!(workflow.allow("acme").await.expect("workflow window"));
}
