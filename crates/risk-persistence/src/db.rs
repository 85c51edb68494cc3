// Pool de conexiones, migraciones embebidas y selección de backend.
//
// El backend se decide en compilación: SQLite por defecto, Postgres con la
// feature `pg`. Todas las consultas son bloqueantes y se ejecutan en
// `spawn_blocking` para no detener el runtime.
use crate::errors::PersistenceError;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool};
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use std::sync::Arc;

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("./migrations");

#[cfg(all(feature = "pg", not(test)))]
pub type DbConn = PgConnection;
#[cfg(any(test, not(feature = "pg")))]
pub type DbConn = SqliteConnection;

type DbPool = Pool<ConnectionManager<DbConn>>;

const DEFAULT_POOL_SIZE: u32 = 8;

/// Ajustes por conexión de SQLite: sin esto una escritura concurrente
/// falla con `database is locked` en lugar de esperar.
#[cfg(any(test, not(feature = "pg")))]
#[derive(Debug)]
struct SqlitePragmas;

#[cfg(any(test, not(feature = "pg")))]
impl diesel::r2d2::CustomizeConnection<SqliteConnection, diesel::r2d2::Error> for SqlitePragmas {
  fn on_acquire(&self, conn: &mut SqliteConnection) -> Result<(), diesel::r2d2::Error> {
    diesel::sql_query("PRAGMA busy_timeout = 5000;").execute(conn)
                                                    .map_err(diesel::r2d2::Error::QueryError)?;
    Ok(())
  }
}

/// Pool compartido por todos los repositorios Diesel.
#[derive(Clone)]
pub struct Database {
  pool: Arc<DbPool>,
}

impl Database {
  /// Abre el pool y aplica las migraciones pendientes.
  pub fn connect(database_url: &str, max_size: u32) -> Result<Self, PersistenceError> {
    let manager = ConnectionManager::<DbConn>::new(database_url);
    let builder = Pool::builder().max_size(max_size);
    #[cfg(any(test, not(feature = "pg")))]
    let builder = builder.connection_customizer(Box::new(SqlitePragmas));
    let pool = builder.build(manager).map_err(|e| PersistenceError::Pool(e.to_string()))?;
    let db = Self { pool: Arc::new(pool) };
    db.migrate()?;
    Ok(db)
  }

  fn migrate(&self) -> Result<(), PersistenceError> {
    let mut conn = self.pool.get().map_err(|e| PersistenceError::Pool(e.to_string()))?;
    #[cfg(any(test, not(feature = "pg")))]
    {
      // En memoria devuelve "memory"; no es un error.
      let _ = diesel::sql_query("PRAGMA journal_mode = WAL;").execute(&mut conn);
    }
    let applied = conn.run_pending_migrations(MIGRATIONS)
                      .map_err(|e| PersistenceError::Migration(e.to_string()))?;
    if !applied.is_empty() {
      log::info!("migraciones aplicadas: {}", applied.len());
    }
    Ok(())
  }

  /// Ejecuta `f` con una conexión del pool en un hilo bloqueante.
  pub async fn run<T, F>(&self, f: F) -> Result<T, PersistenceError>
    where F: FnOnce(&mut DbConn) -> Result<T, PersistenceError> + Send + 'static,
          T: Send + 'static
  {
    let pool = self.pool.clone();
    tokio::task::spawn_blocking(move || {
      let mut conn = pool.get().map_err(|e| PersistenceError::Pool(e.to_string()))?;
      f(&mut conn)
    }).await
      .map_err(|e| PersistenceError::Join(e.to_string()))?
  }

  pub async fn ping(&self) -> Result<(), PersistenceError> {
    self.run(|conn| {
          diesel::sql_query("SELECT 1").execute(conn)?;
          Ok(())
        })
        .await
  }
}

/// URL de la base según `RISKFLOW_DB_URL` o `DATABASE_URL` (admite `.env`).
pub fn database_url_from_env() -> Result<String, PersistenceError> {
  dotenvy::dotenv().ok();
  std::env::var("RISKFLOW_DB_URL").or_else(|_| std::env::var("DATABASE_URL"))
                                  .map_err(|_| PersistenceError::Config("RISKFLOW_DB_URL / DATABASE_URL no definido".into()))
}

fn looks_like_postgres(url: &str) -> bool {
  let u = url.to_lowercase();
  u.starts_with("postgres://") || u.starts_with("postgresql://")
}

/// Construye el pool desde el entorno. La URL debe corresponder al backend
/// con el que se compiló el crate.
#[cfg(all(feature = "pg", not(test)))]
pub fn new_from_env() -> Result<Database, PersistenceError> {
  let url = database_url_from_env()?;
  if !looks_like_postgres(&url) {
    return Err(PersistenceError::Config("RISKFLOW_DB_URL no parece una URL de Postgres".into()));
  }
  Database::connect(&url, pool_size_from_env())
}

#[cfg(any(test, not(feature = "pg")))]
pub fn new_from_env() -> Result<Database, PersistenceError> {
  let url = database_url_from_env()?;
  if looks_like_postgres(&url) {
    return Err(PersistenceError::Config("risk-persistence se compiló sin la feature 'pg'; actívala para usar \
                                         Postgres"
                                                  .into()));
  }
  Database::connect(&url, pool_size_from_env())
}

fn pool_size_from_env() -> u32 {
  std::env::var("RISKFLOW_DB_POOL_SIZE").ok()
                                        .and_then(|v| v.parse().ok())
                                        .unwrap_or(DEFAULT_POOL_SIZE)
}

/// Base SQLite explícita para tests, sin pasar por el entorno.
#[cfg(any(test, not(feature = "pg")))]
pub fn new_sqlite_for_test(path: &str) -> Result<Database, PersistenceError> {
  Database::connect(path, 4)
}

pub(crate) fn to_ms(t: DateTime<Utc>) -> i64 {
  t.timestamp_millis()
}

pub(crate) fn from_ms(ms: i64) -> Result<DateTime<Utc>, PersistenceError> {
  DateTime::<Utc>::from_timestamp_millis(ms).ok_or_else(|| PersistenceError::Corrupt(format!("marca de tiempo {}", ms)))
}
