use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use rusqlite::{params, Connection, ErrorCode, OptionalExtension, Row};
use tokio::runtime::{Handle, RuntimeFlavor};

use lockd_core::{DevicePatch, DeviceRecord, LockError, LockStatus};

use super::Directory;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS locks (
    id          TEXT PRIMARY KEY,
    mac_address TEXT NOT NULL,
    name        TEXT NOT NULL,
    status      TEXT NOT NULL,
    last_seen   INTEGER NOT NULL,
    connected   INTEGER NOT NULL
);
CREATE UNIQUE INDEX IF NOT EXISTS locks_mac_address ON locks (mac_address);
";

const COLUMNS: &str = "id, mac_address, name, status, last_seen, connected";

/// Connections opened against a file-backed store.
const POOL_SIZE: usize = 4;

/// How long a writer waits on another connection's lock before failing.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Durable directory backed by a SQLite file.
///
/// File stores run in WAL mode over a small pool of connections, so one
/// device's write does not hold up reads for the rest of the fleet. The
/// unique index on `mac_address` is what enforces one record per device;
/// a losing concurrent insert surfaces as `DuplicateKey` whichever
/// connection it went through.
pub struct SqliteDirectory {
    pool: Vec<Mutex<Connection>>,
    next: AtomicUsize,
}

impl SqliteDirectory {
    pub fn open(path: &Path) -> Result<Self, LockError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                LockError::PersistenceFailure(format!("create {}: {e}", parent.display()))
            })?;
        }
        let first = Connection::open(path).map_err(persistence)?;
        first
            .pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get::<_, String>(0))
            .map_err(persistence)?;
        first.execute_batch(SCHEMA).map_err(persistence)?;

        let mut pool = vec![first];
        for _ in 1..POOL_SIZE {
            pool.push(Connection::open(path).map_err(persistence)?);
        }
        for conn in &pool {
            conn.busy_timeout(BUSY_TIMEOUT).map_err(persistence)?;
        }
        tracing::debug!(path = %path.display(), connections = pool.len(), "sqlite directory opened");
        Ok(Self::from_pool(pool))
    }

    /// Single connection: each in-memory connection is its own database.
    pub fn open_in_memory() -> Result<Self, LockError> {
        let conn = Connection::open_in_memory().map_err(persistence)?;
        conn.execute_batch(SCHEMA).map_err(persistence)?;
        Ok(Self::from_pool(vec![conn]))
    }

    fn from_pool(pool: Vec<Connection>) -> Self {
        Self {
            pool: pool.into_iter().map(Mutex::new).collect(),
            next: AtomicUsize::new(0),
        }
    }

    /// First idle connection, starting from a rotating slot. Waits on that
    /// slot only when every connection is busy.
    fn conn(&self) -> Result<MutexGuard<'_, Connection>, LockError> {
        let start = self.next.fetch_add(1, Ordering::Relaxed) % self.pool.len();
        for i in 0..self.pool.len() {
            if let Ok(guard) = self.pool[(start + i) % self.pool.len()].try_lock() {
                return Ok(guard);
            }
        }
        self.pool[start]
            .lock()
            .map_err(|_| LockError::PersistenceFailure("directory connection poisoned".into()))
    }

    /// Run `f` on a pooled connection. On a multi-threaded runtime the
    /// worker is handed off first so other device tasks keep running.
    fn with_conn<T>(
        &self,
        f: impl FnOnce(&Connection) -> Result<T, LockError>,
    ) -> Result<T, LockError> {
        let run = || f(&*self.conn()?);
        match Handle::try_current() {
            Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::MultiThread => {
                tokio::task::block_in_place(run)
            }
            _ => run(),
        }
    }
}

impl Directory for SqliteDirectory {
    fn create(&self, record: DeviceRecord) -> Result<(), LockError> {
        self.with_conn(|conn| {
            let result = conn.execute(
                "INSERT INTO locks (id, mac_address, name, status, last_seen, connected)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    record.id,
                    record.mac_address,
                    record.name,
                    record.status.as_str(),
                    record.last_seen as i64,
                    record.connected,
                ],
            );
            match result {
                Ok(_) => Ok(()),
                Err(e) if is_mac_conflict(&e) => {
                    Err(LockError::DuplicateKey(record.mac_address.clone()))
                }
                Err(e) => Err(persistence(e)),
            }
        })
    }

    fn find(&self, mac_address: &str) -> Result<Option<DeviceRecord>, LockError> {
        self.with_conn(|conn| {
            conn.query_row(
                &format!("SELECT {COLUMNS} FROM locks WHERE mac_address = ?1"),
                params![mac_address],
                read_row,
            )
            .optional()
            .map_err(persistence)
        })
    }

    fn update(&self, mac_address: &str, patch: &DevicePatch) -> Result<(), LockError> {
        let changed = self.with_conn(|conn| {
            conn.execute(
                "UPDATE locks SET
                    name      = COALESCE(?1, name),
                    status    = COALESCE(?2, status),
                    last_seen = COALESCE(?3, last_seen),
                    connected = COALESCE(?4, connected)
                 WHERE mac_address = ?5",
                params![
                    patch.name,
                    patch.status.map(|s| s.as_str()),
                    patch.last_seen.map(|t| t as i64),
                    patch.connected,
                    mac_address,
                ],
            )
            .map_err(persistence)
        })?;
        if changed == 0 {
            return Err(LockError::NotFound(mac_address.to_string()));
        }
        Ok(())
    }

    fn delete(&self, mac_address: &str) -> Result<bool, LockError> {
        let removed = self.with_conn(|conn| {
            conn.execute("DELETE FROM locks WHERE mac_address = ?1", params![mac_address])
                .map_err(persistence)
        })?;
        Ok(removed > 0)
    }

    fn list(&self) -> Result<Vec<DeviceRecord>, LockError> {
        self.with_conn(|conn| {
            let mut stmt = conn
                .prepare(&format!("SELECT {COLUMNS} FROM locks ORDER BY mac_address"))
                .map_err(persistence)?;
            let records = stmt
                .query_map([], read_row)
                .map_err(persistence)?
                .collect::<Result<Vec<_>, _>>()
                .map_err(persistence)?;
            Ok(records)
        })
    }
}

fn read_row(row: &Row<'_>) -> rusqlite::Result<DeviceRecord> {
    let status: String = row.get(3)?;
    let status = LockStatus::parse(&status).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            3,
            rusqlite::types::Type::Text,
            format!("unknown lock status {status:?}").into(),
        )
    })?;
    Ok(DeviceRecord {
        id: row.get(0)?,
        mac_address: row.get(1)?,
        name: row.get(2)?,
        status,
        last_seen: row.get::<_, i64>(4)? as u64,
        connected: row.get(5)?,
    })
}

/// Unique violation on the address index, as opposed to an id collision.
fn is_mac_conflict(e: &rusqlite::Error) -> bool {
    match e {
        rusqlite::Error::SqliteFailure(err, msg) => {
            err.code == ErrorCode::ConstraintViolation
                && msg.as_deref().is_some_and(|m| m.contains("mac_address"))
        }
        _ => false,
    }
}

fn persistence(e: rusqlite::Error) -> LockError {
    LockError::PersistenceFailure(e.to_string())
}
