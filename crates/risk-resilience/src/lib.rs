//! Primitivas de resiliencia: lock distribuido, limitador de tasa, circuit
//! breaker y bulkhead. Todas salvo el bulkhead guardan su estado en un
//! `SharedStore`, por lo que son coherentes entre réplicas.
pub mod bulkhead;
pub mod circuit_breaker;
pub mod clock;
pub mod errors;
pub mod guard;
pub mod lock;
pub mod rate_limit;
pub mod store;

pub use bulkhead::{Bulkhead, BulkheadConfig};
pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitBreakerState, CircuitState, Permit};
pub use clock::{Clock, ManualClock, SystemClock};
pub use errors::{ResilienceError, Result};
pub use guard::{DependencyGuard, GuardRegistry};
pub use lock::{LockKeepAlive, LockManager, LockToken};
pub use rate_limit::{RateLimitConfig, RateLimiter};
pub use store::{InMemorySharedStore, SharedStore, WindowDecision};
