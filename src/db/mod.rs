//! Database module - SQLite storage for exercises, plans and session logs

mod models;

pub use models::{
    Exercise, Log, LogExercise, NewLog, NewPlan, Plan, PlanExercise, SetEntry, Snapshot,
    iso_millis,
};

use std::collections::{BTreeSet, HashSet};
use std::path::Path;

use chrono::SubsecRound;
use rusqlite::types::Type;
use rusqlite::{Connection, Row, params};
use serde::de::DeserializeOwned;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::metrics::unique_exercise_names;

/// Current schema version, stored in `PRAGMA user_version`
const SCHEMA_VERSION: i64 = 1;

/// Database wrapper
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open or create database
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path.as_ref())?;
        let db = Self { conn };
        db.init_schema()?;
        debug!("Opened database at {}", path.as_ref().display());
        Ok(db)
    }

    /// Open a throwaway database (tests, dry runs)
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.init_schema()?;
        Ok(db)
    }

    /// Initialize database schema
    fn init_schema(&self) -> Result<()> {
        let version: i64 = self
            .conn
            .pragma_query_value(None, "user_version", |row| row.get(0))?;

        if version < 1 {
            // Nested exercise lists are stored as JSON text: they are only
            // ever read and written whole.
            self.conn.execute_batch(
                "CREATE TABLE IF NOT EXISTS exercises (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    name TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS plans (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    title TEXT NOT NULL,
                    exercises TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS logs (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    plan_title TEXT NOT NULL,
                    date TEXT NOT NULL,
                    exercises TEXT NOT NULL
                );

                CREATE INDEX IF NOT EXISTS idx_logs_date ON logs(date);",
            )?;
        }

        if version < SCHEMA_VERSION {
            self.conn
                .pragma_update(None, "user_version", SCHEMA_VERSION)?;
            info!("Database schema migrated to version {}", SCHEMA_VERSION);
        }

        Ok(())
    }

    // ---- Exercises ----

    /// Add a custom exercise name
    pub fn create_exercise(&self, name: &str) -> Result<Exercise> {
        self.conn
            .execute("INSERT INTO exercises (name) VALUES (?1)", params![name])?;
        let id = self.conn.last_insert_rowid();
        debug!("Created exercise {} ({})", id, name);
        Ok(Exercise {
            id: Some(id),
            name: name.to_string(),
        })
    }

    pub fn list_exercises(&self) -> Result<Vec<Exercise>> {
        list_exercises(&self.conn)
    }

    pub fn clear_exercises(&self) -> Result<()> {
        self.conn.execute("DELETE FROM exercises", [])?;
        info!("Cleared exercises");
        Ok(())
    }

    /// Add every plan and log exercise name missing from the exercises
    /// collection. Returns how many names were added.
    pub fn sync_exercises(&self) -> Result<usize> {
        let known: HashSet<String> = self
            .list_exercises()?
            .into_iter()
            .map(|e| e.name)
            .collect();

        let mut names: BTreeSet<String> = unique_exercise_names(&self.list_plans()?)
            .into_iter()
            .collect();
        names.extend(unique_exercise_names(&self.list_logs()?));

        let mut added = 0;
        for name in names.iter().filter(|n| !known.contains(*n)) {
            self.create_exercise(name)?;
            added += 1;
        }

        if added > 0 {
            info!("Synced {} exercise names from plans and logs", added);
        }
        Ok(added)
    }

    // ---- Plans ----

    /// Store a new plan. The title must not be blank.
    pub fn create_plan(&self, plan: NewPlan) -> Result<Plan> {
        if plan.title.trim().is_empty() {
            return Err(Error::Validation("plan title must not be empty".to_string()));
        }

        self.conn.execute(
            "INSERT INTO plans (title, exercises) VALUES (?1, ?2)",
            params![plan.title, serde_json::to_string(&plan.exercises)?],
        )?;
        let id = self.conn.last_insert_rowid();
        info!("Created plan {} ({})", id, plan.title);

        Ok(Plan {
            id: Some(id),
            title: plan.title,
            exercises: plan.exercises,
        })
    }

    pub fn list_plans(&self) -> Result<Vec<Plan>> {
        list_plans(&self.conn)
    }

    /// Case-insensitive title lookup; the first stored match wins
    pub fn find_plan_by_title(&self, title: &str) -> Result<Option<Plan>> {
        let wanted = title.to_lowercase();
        Ok(self
            .list_plans()?
            .into_iter()
            .find(|p| p.title.to_lowercase() == wanted))
    }

    /// Delete a plan. Unknown ids are ignored.
    pub fn delete_plan(&self, id: i64) -> Result<()> {
        let removed = self
            .conn
            .execute("DELETE FROM plans WHERE id = ?1", params![id])?;
        if removed > 0 {
            info!("Deleted plan {}", id);
        }
        Ok(())
    }

    pub fn clear_plans(&self) -> Result<()> {
        self.conn.execute("DELETE FROM plans", [])?;
        info!("Cleared plans");
        Ok(())
    }

    // ---- Logs ----

    /// Append a finished session. Logs are never updated afterwards.
    pub fn append_log(&self, log: NewLog) -> Result<Log> {
        // Stored text keeps milliseconds only
        let date = log.date.trunc_subsecs(3);
        self.conn.execute(
            "INSERT INTO logs (plan_title, date, exercises) VALUES (?1, ?2, ?3)",
            params![
                log.plan_title,
                iso_millis::format(&date),
                serde_json::to_string(&log.exercises)?,
            ],
        )?;
        let id = self.conn.last_insert_rowid();
        info!("Appended log {} ({})", id, log.plan_title);

        Ok(Log {
            id: Some(id),
            plan_title: log.plan_title,
            date,
            exercises: log.exercises,
        })
    }

    /// All logs in stored order
    pub fn list_logs(&self) -> Result<Vec<Log>> {
        list_logs(&self.conn)
    }

    /// Latest logs, newest first
    pub fn recent_logs(&self, limit: usize) -> Result<Vec<Log>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, plan_title, date, exercises FROM logs ORDER BY date DESC, id DESC LIMIT ?1",
        )?;
        let logs = stmt
            .query_map(params![limit as i64], log_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(logs)
    }

    pub fn clear_logs(&self) -> Result<()> {
        self.conn.execute("DELETE FROM logs", [])?;
        info!("Cleared logs");
        Ok(())
    }

    // ---- Whole store ----

    /// Copy of all three collections, read inside one transaction
    pub fn export_snapshot(&self) -> Result<Snapshot> {
        let tx = self.conn.unchecked_transaction()?;
        let snapshot = Snapshot {
            logs: list_logs(&tx)?,
            plans: list_plans(&tx)?,
            exercises: list_exercises(&tx)?,
        };
        tx.commit()?;

        debug!(
            "Exported snapshot: {} logs, {} plans, {} exercises",
            snapshot.logs.len(),
            snapshot.plans.len(),
            snapshot.exercises.len()
        );
        Ok(snapshot)
    }

    /// Replace the whole store with `snapshot`.
    ///
    /// The snapshot is checked before anything is cleared, and the clear plus
    /// inserts run in one transaction, so a failed import leaves the previous
    /// contents in place. Records keep their ids; records without one get a
    /// fresh id after all explicit ids are in.
    pub fn import_snapshot(&self, snapshot: &Snapshot) -> Result<()> {
        validate_snapshot(snapshot)?;

        let tx = self.conn.unchecked_transaction()?;
        tx.execute_batch(
            "DELETE FROM exercises;
             DELETE FROM plans;
             DELETE FROM logs;",
        )?;

        {
            let mut insert = tx.prepare(
                "INSERT INTO logs (id, plan_title, date, exercises) VALUES (?1, ?2, ?3, ?4)",
            )?;
            for log in ids_first(&snapshot.logs, |l| l.id) {
                insert.execute(params![
                    log.id,
                    log.plan_title,
                    iso_millis::format(&log.date),
                    serde_json::to_string(&log.exercises)?,
                ])?;
            }

            let mut insert =
                tx.prepare("INSERT INTO plans (id, title, exercises) VALUES (?1, ?2, ?3)")?;
            for plan in ids_first(&snapshot.plans, |p| p.id) {
                insert.execute(params![
                    plan.id,
                    plan.title,
                    serde_json::to_string(&plan.exercises)?,
                ])?;
            }

            let mut insert = tx.prepare("INSERT INTO exercises (id, name) VALUES (?1, ?2)")?;
            for exercise in ids_first(&snapshot.exercises, |e| e.id) {
                insert.execute(params![exercise.id, exercise.name])?;
            }
        }

        tx.commit()?;
        info!(
            "Imported snapshot: {} logs, {} plans, {} exercises",
            snapshot.logs.len(),
            snapshot.plans.len(),
            snapshot.exercises.len()
        );
        Ok(())
    }

    /// Delete everything
    pub fn reset_all(&self) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute_batch(
            "DELETE FROM exercises;
             DELETE FROM plans;
             DELETE FROM logs;",
        )?;
        tx.commit()?;
        info!("Reset all data");
        Ok(())
    }
}

/// Reject snapshots that would fail halfway through an import
fn validate_snapshot(snapshot: &Snapshot) -> Result<()> {
    check_unique_ids("logs", snapshot.logs.iter().map(|l| l.id))?;
    check_unique_ids("plans", snapshot.plans.iter().map(|p| p.id))?;
    check_unique_ids("exercises", snapshot.exercises.iter().map(|e| e.id))?;
    Ok(())
}

/// Records with an explicit id, then the ones that need a fresh id
fn ids_first<T>(records: &[T], id: impl Fn(&T) -> Option<i64>) -> impl Iterator<Item = &T> {
    let (with_id, without_id): (Vec<&T>, Vec<&T>) =
        records.iter().partition(|r| id(*r).is_some());
    with_id.into_iter().chain(without_id)
}

fn check_unique_ids(collection: &str, ids: impl Iterator<Item = Option<i64>>) -> Result<()> {
    let mut seen = HashSet::new();
    for id in ids.flatten() {
        if !seen.insert(id) {
            return Err(Error::Import(format!("duplicate id {} in {}", id, collection)));
        }
    }
    Ok(())
}

fn list_exercises(conn: &Connection) -> Result<Vec<Exercise>> {
    let mut stmt = conn.prepare("SELECT id, name FROM exercises ORDER BY id")?;
    let exercises = stmt
        .query_map([], |row| {
            Ok(Exercise {
                id: Some(row.get(0)?),
                name: row.get(1)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(exercises)
}

fn list_plans(conn: &Connection) -> Result<Vec<Plan>> {
    let mut stmt = conn.prepare("SELECT id, title, exercises FROM plans ORDER BY id")?;
    let plans = stmt
        .query_map([], |row| {
            Ok(Plan {
                id: Some(row.get(0)?),
                title: row.get(1)?,
                exercises: json_column(row, 2)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(plans)
}

fn list_logs(conn: &Connection) -> Result<Vec<Log>> {
    let mut stmt =
        conn.prepare("SELECT id, plan_title, date, exercises FROM logs ORDER BY id")?;
    let logs = stmt
        .query_map([], log_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(logs)
}

fn log_from_row(row: &Row<'_>) -> rusqlite::Result<Log> {
    let date_str: String = row.get(2)?;
    let date = iso_millis::parse(&date_str)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(2, Type::Text, Box::new(e)))?;

    Ok(Log {
        id: Some(row.get(0)?),
        plan_title: row.get(1)?,
        date,
        exercises: json_column(row, 3)?,
    })
}

/// Decode a JSON text column
fn json_column<T: DeserializeOwned>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T> {
    let text: String = row.get(idx)?;
    serde_json::from_str(&text)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}
