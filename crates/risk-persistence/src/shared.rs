// Implementación persistente de `SharedStore` sobre las tablas `shared_kv`
// y `rate_windows`. Cada operación condicional es una única sentencia
// `UPDATE`/`DELETE` con la condición en el `WHERE`, por lo que es atómica
// en ambos backends.
use crate::db::{to_ms, Database, DbConn};
use crate::schema::{rate_windows, shared_kv};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel::result::Error as DieselError;
use risk_resilience::clock::to_chrono;
use risk_resilience::{Clock, Result, SharedStore, SystemClock, WindowDecision};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

#[derive(Debug, Insertable)]
#[diesel(table_name = shared_kv)]
struct KvRow {
  key: String,
  value: String,
  expires_at_ms: Option<i64>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = rate_windows)]
struct HitRow {
  id: String,
  window_key: String,
  hit_at_ms: i64,
}

/// Filtro de filas vigentes para `key` en el instante `now_ms`.
macro_rules! live {
  ($key:expr, $now_ms:expr) => {
    shared_kv::table.filter(shared_kv::key.eq($key))
                    .filter(shared_kv::expires_at_ms.is_null().or(shared_kv::expires_at_ms.gt($now_ms)))
  };
}

fn window_hit_tx(conn: &mut DbConn,
                 key: &str,
                 now: DateTime<Utc>,
                 window: Duration,
                 limit: u32)
                 -> std::result::Result<WindowDecision, DieselError> {
  let now_ms = to_ms(now);
  let cutoff_ms = to_ms(now - to_chrono(window));
  conn.transaction::<_, DieselError, _>(|conn| {
        // La fila guardián serializa los intentos concurrentes sobre la
        // misma ventana (bloqueo de fila en Postgres, de escritura en SQLite).
        let guard = KvRow { key: format!("window:{}", key),
                            value: now_ms.to_string(),
                            expires_at_ms: Some(now_ms + to_chrono(window).num_milliseconds()) };
        diesel::insert_into(shared_kv::table).values(&guard)
                                             .on_conflict(shared_kv::key)
                                             .do_update()
                                             .set((shared_kv::value.eq(&guard.value),
                                                   shared_kv::expires_at_ms.eq(guard.expires_at_ms)))
                                             .execute(conn)?;
        diesel::delete(rate_windows::table.filter(rate_windows::window_key.eq(key))
                                          .filter(rate_windows::hit_at_ms.le(cutoff_ms))).execute(conn)?;
        let count: i64 = rate_windows::table.filter(rate_windows::window_key.eq(key))
                                            .count()
                                            .get_result(conn)?;
        let allowed = count < i64::from(limit);
        if allowed {
          let hit = HitRow { id: Uuid::new_v4().to_string(),
                             window_key: key.to_string(),
                             hit_at_ms: now_ms };
          diesel::insert_into(rate_windows::table).values(&hit).execute(conn)?;
        }
        let count = if allowed { count + 1 } else { count };
        Ok(WindowDecision { allowed,
                            count: u32::try_from(count).unwrap_or(u32::MAX) })
      })
}

/// Almacén compartido respaldado por la base de datos. Es el que usan las
/// réplicas reales; las expiraciones se evalúan con el reloj inyectado.
#[derive(Clone)]
pub struct DieselSharedStore {
  db: Database,
  clock: Arc<dyn Clock>,
}

impl DieselSharedStore {
  pub fn new(db: Database) -> Self {
    Self::with_clock(db, Arc::new(SystemClock))
  }

  pub fn with_clock(db: Database, clock: Arc<dyn Clock>) -> Self {
    Self { db, clock }
  }

  fn now_ms(&self) -> i64 {
    to_ms(self.clock.now())
  }

  fn expiry(&self, ttl: Option<Duration>) -> Option<i64> {
    ttl.map(|d| to_ms(self.clock.now() + to_chrono(d)))
  }
}

#[async_trait]
impl SharedStore for DieselSharedStore {
  async fn get(&self, key: &str) -> Result<Option<String>> {
    let (k, now) = (key.to_string(), self.now_ms());
    Ok(self.db
           .run(move |conn| Ok(live!(&k, now).select(shared_kv::value).first::<String>(conn).optional()?))
           .await?)
  }

  async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<()> {
    let row = KvRow { key: key.to_string(),
                      value: value.to_string(),
                      expires_at_ms: self.expiry(ttl) };
    self.db
        .run(move |conn| {
          diesel::insert_into(shared_kv::table).values(&row)
                                               .on_conflict(shared_kv::key)
                                               .do_update()
                                               .set((shared_kv::value.eq(&row.value),
                                                     shared_kv::expires_at_ms.eq(row.expires_at_ms)))
                                               .execute(conn)?;
          Ok(())
        })
        .await?;
    Ok(())
  }

  async fn set_if_absent(&self, key: &str, value: &str, ttl: Duration) -> Result<bool> {
    self.compare_and_swap(key, None, value, Some(ttl)).await
  }

  async fn compare_and_swap(&self, key: &str, expected: Option<&str>, new: &str, ttl: Option<Duration>) -> Result<bool> {
    let now = self.now_ms();
    let row = KvRow { key: key.to_string(),
                      value: new.to_string(),
                      expires_at_ms: self.expiry(ttl) };
    let expected = expected.map(|s| s.to_string());
    Ok(self.db
           .run(move |conn| {
             let n = match expected {
               Some(exp) => diesel::update(live!(&row.key, now).filter(shared_kv::value.eq(&exp)))
                 .set((shared_kv::value.eq(&row.value), shared_kv::expires_at_ms.eq(row.expires_at_ms)))
                 .execute(conn)?,
               None => {
                 // Una fila vencida cuenta como ausente.
                 diesel::delete(shared_kv::table.filter(shared_kv::key.eq(&row.key))
                                                .filter(shared_kv::expires_at_ms.le(now))).execute(conn)?;
                 diesel::insert_into(shared_kv::table).values(&row)
                                                      .on_conflict_do_nothing()
                                                      .execute(conn)?
               }
             };
             Ok(n == 1)
           })
           .await?)
  }

  async fn compare_and_delete(&self, key: &str, expected: &str) -> Result<bool> {
    let (k, exp, now) = (key.to_string(), expected.to_string(), self.now_ms());
    Ok(self.db
           .run(move |conn| Ok(diesel::delete(live!(&k, now).filter(shared_kv::value.eq(&exp))).execute(conn)? == 1))
           .await?)
  }

  async fn compare_and_expire(&self, key: &str, expected: &str, ttl: Duration) -> Result<bool> {
    let (k, exp, now) = (key.to_string(), expected.to_string(), self.now_ms());
    let until = self.expiry(Some(ttl));
    Ok(self.db
           .run(move |conn| {
             Ok(diesel::update(live!(&k, now).filter(shared_kv::value.eq(&exp)))
               .set(shared_kv::expires_at_ms.eq(until))
               .execute(conn)?
                == 1)
           })
           .await?)
  }

  async fn delete(&self, key: &str) -> Result<()> {
    let k = key.to_string();
    self.db
        .run(move |conn| {
          diesel::delete(shared_kv::table.filter(shared_kv::key.eq(&k))).execute(conn)?;
          Ok(())
        })
        .await?;
    Ok(())
  }

  async fn window_hit(&self, key: &str, now: DateTime<Utc>, window: Duration, limit: u32) -> Result<WindowDecision> {
    let k = key.to_string();
    Ok(self.db.run(move |conn| Ok(window_hit_tx(conn, &k, now, window, limit)?)).await?)
  }

  async fn ping(&self) -> Result<()> {
    Ok(self.db.ping().await?)
  }
}
