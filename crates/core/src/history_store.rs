//! SQLite persistence for the mission history ledger.
//!
//! The store keeps one image of the ledger:
//! - `mission_states`: mission identity -> lifecycle state
//! - `objective_states`: objective identity -> lifecycle state
//! - `active_missions`: active mission identities with their start position
//!
//! `save` replaces the whole image inside one transaction, so a crash leaves either the
//! previous image or the new one. `load` runs the ledger consistency check before handing
//! the ledger back.

use rusqlite::{params, Connection, OpenFlags};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{error, info};

use crate::history::{HistoryError, LifecycleState, MissionHistory, Result};
use crate::identity::{MissionId, ObjectiveId};

/// SQLite-backed ledger store.
pub struct HistoryStore {
    conn: Connection,
    path: PathBuf,
}

impl HistoryStore {
    /// Create or open a store at the specified path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        info!(path = %path.display(), "Opening mission history store");

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;

        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;

        Self::init_schema(&conn)?;

        Ok(Self {
            conn,
            path: path.to_path_buf(),
        })
    }

    fn init_schema(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS mission_states (
                mission_id TEXT PRIMARY KEY NOT NULL,
                state TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS objective_states (
                objective_id TEXT PRIMARY KEY NOT NULL,
                state TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS active_missions (
                position INTEGER PRIMARY KEY NOT NULL,
                mission_id TEXT NOT NULL UNIQUE
            );",
        )?;
        Ok(())
    }

    /// Replace the stored image with `history`.
    pub fn save(&mut self, history: &MissionHistory) -> Result<()> {
        let tx = self.conn.transaction()?;

        tx.execute("DELETE FROM mission_states", [])?;
        tx.execute("DELETE FROM objective_states", [])?;
        tx.execute("DELETE FROM active_missions", [])?;

        let snapshot = history.snapshot();
        {
            let mut insert = tx.prepare("INSERT INTO mission_states (mission_id, state) VALUES (?1, ?2)")?;
            for (id, state) in &snapshot.missions {
                insert.execute(params![id.to_string(), state.to_string()])?;
            }

            let mut insert =
                tx.prepare("INSERT INTO objective_states (objective_id, state) VALUES (?1, ?2)")?;
            for (id, state) in &snapshot.objectives {
                insert.execute(params![id.to_string(), state.to_string()])?;
            }

            let mut insert =
                tx.prepare("INSERT INTO active_missions (position, mission_id) VALUES (?1, ?2)")?;
            for (position, id) in snapshot.active_missions.iter().enumerate() {
                insert.execute(params![position as i64, id.to_string()])?;
            }
        }

        tx.commit()?;

        info!(
            missions = history.len(),
            active = snapshot.active_missions.len(),
            "Mission history saved"
        );

        Ok(())
    }

    /// Load the stored image. An empty store yields an empty ledger.
    pub fn load(&self) -> Result<MissionHistory> {
        let missions: BTreeMap<MissionId, LifecycleState> =
            self.read_states("SELECT mission_id, state FROM mission_states")?;
        let objectives: BTreeMap<ObjectiveId, LifecycleState> =
            self.read_states("SELECT objective_id, state FROM objective_states")?;

        let mut stmt = self
            .conn
            .prepare("SELECT mission_id FROM active_missions ORDER BY position ASC")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;

        let mut active_missions = Vec::new();
        for row in rows {
            active_missions.push(parse_id(&row?)?);
        }

        let history = match MissionHistory::from_parts(missions, objectives, active_missions) {
            Ok(history) => history,
            Err(e) => {
                error!(path = %self.path.display(), error = %e, "Mission history store is corrupted");
                return Err(e);
            }
        };

        info!(
            missions = history.len(),
            active = history.active_count(),
            "Mission history loaded"
        );

        Ok(history)
    }

    fn read_states<K>(&self, sql: &str) -> Result<BTreeMap<K, LifecycleState>>
    where
        K: std::str::FromStr + Ord,
    {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut states = BTreeMap::new();
        for row in rows {
            let (id, state) = row?;
            let id = parse_id(&id)?;
            let state = LifecycleState::parse(&state).ok_or_else(|| {
                HistoryError::Corrupted(format!("unknown lifecycle state '{}'", state))
            })?;
            states.insert(id, state);
        }

        Ok(states)
    }

    /// Get the database path
    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn parse_id<K: std::str::FromStr>(value: &str) -> Result<K> {
    value
        .parse()
        .map_err(|_| HistoryError::Corrupted(format!("invalid identity '{}'", value)))
}
