//! SQLite-backed reward store using the world table layout.
use rusqlite::{Connection, OptionalExtension, params};
use std::path::Path;
use std::sync::Mutex;

use crate::constants::{LOG_TAG, LOG_TARGET, TABLE_NAME};
use crate::numbers::u64_to_i64_saturating;
use crate::record::{ActorName, RewardRecord};
use crate::store::{RewardStore, StoreError};

/// Reward store over a single SQLite connection.
///
/// Rows follow `{keyname, dropped, last_drop_time, last_killer}`; one row per
/// reward key.
#[derive(Debug)]
pub struct SqliteRewardStore {
    conn: Mutex<Connection>,
}

impl SqliteRewardStore {
    /// Open (or create) a database file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        Ok(Self::from_connection(conn))
    }

    /// Private in-memory database, mostly for tests and dry runs.
    ///
    /// # Errors
    ///
    /// Returns an error if SQLite cannot allocate the database.
    pub fn in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        Ok(Self::from_connection(conn))
    }

    #[must_use]
    pub fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
        }
    }

    fn with_conn<T>(
        &self,
        f: impl FnOnce(&Connection) -> Result<T, rusqlite::Error>,
    ) -> Result<T, StoreError> {
        let conn = self.conn.lock().map_err(|_| StoreError::Poisoned)?;
        f(&conn).map_err(StoreError::from)
    }
}

/// Timestamp column as epoch seconds. An unusable value never touches the
/// granted flag: it reads as 1 on a granted row and 0 otherwise.
fn epoch_from_column(key: &str, value: Option<i64>, granted: bool) -> u64 {
    if let Some(epoch) = value.and_then(|raw| u64::try_from(raw).ok()) {
        return epoch;
    }
    log::warn!(
        target: LOG_TARGET,
        "{LOG_TAG} {key}: last_drop_time holds {value:?}; keeping dropped={}.",
        u8::from(granted)
    );
    u64::from(granted)
}

impl RewardStore for SqliteRewardStore {
    type Error = StoreError;

    fn ensure_schema(&self, key: &str) -> Result<(), Self::Error> {
        self.with_conn(|conn| {
            conn.execute_batch(&format!(
                "CREATE TABLE IF NOT EXISTS {TABLE_NAME} (
                    keyname        TEXT    NOT NULL PRIMARY KEY,
                    dropped        INTEGER NOT NULL DEFAULT 0,
                    last_drop_time INTEGER NOT NULL DEFAULT 0,
                    last_killer    TEXT             DEFAULT NULL
                )"
            ))?;
            conn.execute(
                &format!(
                    "INSERT OR IGNORE INTO {TABLE_NAME} (keyname, dropped, last_drop_time, last_killer)
                     VALUES (?1, 0, 0, NULL)"
                ),
                params![key],
            )?;
            Ok(())
        })
    }

    fn load(&self, key: &str) -> Result<RewardRecord, Self::Error> {
        let row = self.with_conn(|conn| {
            conn.query_row(
                &format!(
                    "SELECT dropped, last_drop_time, last_killer FROM {TABLE_NAME}
                     WHERE keyname = ?1 LIMIT 1"
                ),
                params![key],
                |row| {
                    Ok((
                        row.get::<_, Option<i64>>(0)?,
                        row.get::<_, Option<i64>>(1)?,
                        row.get::<_, Option<String>>(2)?,
                    ))
                },
            )
            .optional()
        })?;

        let Some((dropped, last_drop_time, last_killer)) = row else {
            return Ok(RewardRecord::ungranted(key));
        };
        let Some(dropped) = dropped else {
            return Err(StoreError::Corrupt {
                field: "dropped",
                value: String::from("NULL"),
            });
        };
        let granted = dropped != 0;
        Ok(RewardRecord {
            key: key.to_string(),
            granted,
            granted_at_epoch_seconds: epoch_from_column(key, last_drop_time, granted),
            last_actor: last_killer.as_deref().and_then(ActorName::sanitize),
        })
    }

    fn reset_to_ungranted(&self, key: &str) -> Result<(), Self::Error> {
        self.with_conn(|conn| {
            conn.execute(
                &format!(
                    "INSERT INTO {TABLE_NAME} (keyname, dropped, last_drop_time, last_killer)
                     VALUES (?1, 0, 0, NULL)
                     ON CONFLICT(keyname) DO UPDATE SET
                        dropped = 0, last_drop_time = 0, last_killer = NULL"
                ),
                params![key],
            )?;
            Ok(())
        })
    }

    fn record_grant(
        &self,
        key: &str,
        actor: Option<&ActorName>,
        at_epoch_seconds: u64,
    ) -> Result<(), Self::Error> {
        let at = u64_to_i64_saturating(at_epoch_seconds.max(1));
        let name = actor.map(ActorName::as_str);
        self.with_conn(|conn| {
            conn.execute(
                &format!(
                    "INSERT INTO {TABLE_NAME} (keyname, dropped, last_drop_time, last_killer)
                     VALUES (?1, 1, ?2, ?3)
                     ON CONFLICT(keyname) DO UPDATE SET
                        dropped = 1,
                        last_drop_time = excluded.last_drop_time,
                        last_killer = excluded.last_killer"
                ),
                params![key, at, name],
            )?;
            Ok(())
        })
    }

    fn record_collection_metadata(
        &self,
        key: &str,
        actor: &ActorName,
        at_epoch_seconds: u64,
    ) -> Result<(), Self::Error> {
        let at = u64_to_i64_saturating(at_epoch_seconds.max(1));
        self.with_conn(|conn| {
            conn.execute(
                &format!(
                    "INSERT INTO {TABLE_NAME} (keyname, dropped, last_drop_time, last_killer)
                     VALUES (?1, 0, ?2, ?3)
                     ON CONFLICT(keyname) DO UPDATE SET
                        last_drop_time = excluded.last_drop_time,
                        last_killer = excluded.last_killer"
                ),
                params![key, at, actor.as_str()],
            )?;
            Ok(())
        })
    }
}
