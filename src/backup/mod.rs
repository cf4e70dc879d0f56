//! Backup module - JSON snapshot envelope and host file capabilities
//!
//! A backup is one JSON object with the keys `logs`, `plans` and
//! `exercises`, each holding the stored records verbatim (ids included).

mod host;

pub use host::{FileHost, LocalFileHost};

use std::path::PathBuf;

use chrono::Utc;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tracing::{info, warn};

use crate::db::{Database, Snapshot};
use crate::error::{Error, Result};

/// Encode a snapshot as UTF-8 JSON text
pub fn encode(snapshot: &Snapshot) -> Result<Vec<u8>> {
    Ok(serde_json::to_vec_pretty(snapshot)?)
}

/// Parse backup bytes. Anything but a JSON object whose present keys hold
/// valid record arrays is an import error. Missing keys mean empty
/// collections; unknown keys are ignored.
pub fn decode(bytes: &[u8]) -> Result<Snapshot> {
    let text = std::str::from_utf8(bytes)
        .map_err(|e| Error::Import(format!("backup is not valid UTF-8: {}", e)))?;
    let value: Value = serde_json::from_str(text)
        .map_err(|e| Error::Import(format!("backup is not valid JSON: {}", e)))?;
    let Value::Object(mut map) = value else {
        return Err(Error::Import("backup must be a JSON object".to_string()));
    };

    Ok(Snapshot {
        logs: take_collection(&mut map, "logs")?,
        plans: take_collection(&mut map, "plans")?,
        exercises: take_collection(&mut map, "exercises")?,
    })
}

fn take_collection<T: DeserializeOwned>(map: &mut Map<String, Value>, key: &str) -> Result<Vec<T>> {
    match map.remove(key) {
        None => Ok(Vec::new()),
        Some(value) => serde_json::from_value(value)
            .map_err(|e| Error::Import(format!("invalid \"{}\": {}", key, e))),
    }
}

/// Default name offered for a backup file
pub fn backup_file_name() -> String {
    format!("workout-backup-{}.json", Utc::now().format("%Y-%m-%d"))
}

/// Where an export ended up
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportOutcome {
    /// Written in place to the remembered handle
    Written(PathBuf),
    /// Handed to the host as a one-shot download
    Offered,
}

/// Runs exports and imports against a host, remembering the save handle
/// between exports.
pub struct BackupManager<H: FileHost> {
    host: H,
    handle: Option<PathBuf>,
}

impl<H: FileHost> BackupManager<H> {
    pub fn new(host: H) -> Self {
        Self { host, handle: None }
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    /// Write the snapshot to the persistent handle, asking the host for one
    /// the first time. Falls back to a download offer when no handle is
    /// available or writing to it fails.
    pub fn export(&mut self, snapshot: &Snapshot) -> Result<ExportOutcome> {
        let bytes = encode(snapshot)?;
        let name = backup_file_name();

        if self.handle.is_none() {
            match self.host.choose_save_handle(&name) {
                Ok(handle) => self.handle = handle,
                Err(e) => warn!("Save handle unavailable: {}", e),
            }
        }

        if let Some(handle) = self.handle.clone() {
            match self.host.write_handle(&handle, &bytes) {
                Ok(()) => {
                    info!("Backup written to {}", handle.display());
                    return Ok(ExportOutcome::Written(handle));
                }
                Err(e) => {
                    warn!("Backup write to {} failed, offering download: {}", handle.display(), e);
                    self.handle = None;
                }
            }
        }

        self.host.offer_download(&name, &bytes);
        info!("Backup offered as download {}", name);
        Ok(ExportOutcome::Offered)
    }

    /// Ask the host for a backup file and parse it
    pub fn import(&mut self) -> Result<Snapshot> {
        let bytes = self.host.choose_open_file()?.ok_or(Error::BackupCancelled)?;
        decode(&bytes)
    }
}

/// Export the whole store through `manager`
pub fn export_store<H: FileHost>(db: &Database, manager: &mut BackupManager<H>) -> Result<ExportOutcome> {
    let snapshot = db.export_snapshot()?;
    manager.export(&snapshot)
}

/// Replace the store with a backup chosen through `manager`. The store is
/// untouched unless the backup parses and validates.
pub fn restore_store<H: FileHost>(db: &Database, manager: &mut BackupManager<H>) -> Result<Snapshot> {
    let snapshot = manager.import()?;
    db.import_snapshot(&snapshot)?;
    Ok(snapshot)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{Exercise, Log, LogExercise, NewPlan, Plan, PlanExercise, SetEntry};
    use chrono::TimeZone;
    use std::path::Path;

    /// Scripted host: optional handle, optional file to open
    #[derive(Default)]
    struct FakeHost {
        handle: Option<PathBuf>,
        fail_writes: bool,
        open_file: Option<Vec<u8>>,
        handle_requests: usize,
        written: Vec<(PathBuf, Vec<u8>)>,
        downloads: Vec<(String, Vec<u8>)>,
    }

    impl FileHost for FakeHost {
        fn choose_save_handle(&mut self, _suggested_name: &str) -> Result<Option<PathBuf>> {
            self.handle_requests += 1;
            Ok(self.handle.clone())
        }

        fn write_handle(&mut self, handle: &Path, bytes: &[u8]) -> Result<()> {
            if self.fail_writes {
                return Err(Error::Io(std::io::Error::other("disk full")));
            }
            self.written.push((handle.to_path_buf(), bytes.to_vec()));
            Ok(())
        }

        fn offer_download(&mut self, suggested_name: &str, bytes: &[u8]) {
            self.downloads.push((suggested_name.to_string(), bytes.to_vec()));
        }

        fn choose_open_file(&mut self) -> Result<Option<Vec<u8>>> {
            Ok(self.open_file.clone())
        }
    }

    fn sample_snapshot() -> Snapshot {
        Snapshot {
            logs: vec![Log {
                id: Some(3),
                plan_title: "Push Day".to_string(),
                date: Utc.with_ymd_and_hms(2024, 5, 1, 18, 30, 0).unwrap(),
                exercises: vec![LogExercise {
                    name: "Bench Press".to_string(),
                    sets: vec![SetEntry::new("135", "8"), SetEntry::new("", "")],
                }],
            }],
            plans: vec![Plan {
                id: Some(1),
                title: "Push Day".to_string(),
                exercises: vec![PlanExercise::new("Bench Press", 3, "8-12")],
            }],
            exercises: vec![Exercise {
                id: Some(2),
                name: "Bench Press".to_string(),
            }],
        }
    }

    #[test]
    fn test_encode_decode_round_trip() {
        let snapshot = sample_snapshot();
        let decoded = decode(&encode(&snapshot).unwrap()).unwrap();
        assert_eq!(decoded, snapshot);
    }

    #[test]
    fn test_encode_key_order() {
        let text = String::from_utf8(encode(&sample_snapshot()).unwrap()).unwrap();
        let logs = text.find("\"logs\"").unwrap();
        let plans = text.find("\"plans\"").unwrap();
        let exercises = text.rfind("\"exercises\"").unwrap();
        assert!(logs < plans && plans < exercises);
    }

    #[test]
    fn test_decode_missing_keys_are_empty() {
        let snapshot = decode(br#"{"plans":[{"id":1,"title":"Legs","exercises":[]}]}"#).unwrap();
        assert!(snapshot.logs.is_empty());
        assert!(snapshot.exercises.is_empty());
        assert_eq!(snapshot.plans.len(), 1);
    }

    #[test]
    fn test_decode_rejects_malformed() {
        let cases: &[&[u8]] = &[
            b"",
            b"not json",
            b"[1, 2, 3]",
            b"\"text\"",
            br#"{"logs": 5}"#,
            br#"{"plans": [{"id": 1}]}"#,
            br#"{"logs": [{"id": 1, "planTitle": "A", "date": "yesterday", "exercises": []}]}"#,
            &[0xff, 0xfe, 0x7b, 0x7d],
        ];
        for bytes in cases {
            assert!(
                matches!(decode(bytes), Err(Error::Import(_))),
                "accepted {:?}",
                String::from_utf8_lossy(bytes)
            );
        }
    }

    #[test]
    fn test_export_remembers_handle() {
        let host = FakeHost {
            handle: Some(PathBuf::from("/backups/workouts.json")),
            ..FakeHost::default()
        };
        let mut manager = BackupManager::new(host);

        let first = manager.export(&sample_snapshot()).unwrap();
        let second = manager.export(&Snapshot::default()).unwrap();

        assert_eq!(first, ExportOutcome::Written(PathBuf::from("/backups/workouts.json")));
        assert_eq!(second, first);
        assert_eq!(manager.host().handle_requests, 1);
        assert_eq!(manager.host().written.len(), 2);
        assert!(manager.host().downloads.is_empty());
    }

    #[test]
    fn test_export_falls_back_to_download() {
        let mut manager = BackupManager::new(FakeHost::default());

        let outcome = manager.export(&sample_snapshot()).unwrap();

        assert_eq!(outcome, ExportOutcome::Offered);
        let (name, bytes) = &manager.host().downloads[0];
        assert!(name.starts_with("workout-backup-") && name.ends_with(".json"));
        assert_eq!(decode(bytes).unwrap(), sample_snapshot());
    }

    #[test]
    fn test_export_failed_write_forgets_handle() {
        let host = FakeHost {
            handle: Some(PathBuf::from("/readonly/workouts.json")),
            fail_writes: true,
            ..FakeHost::default()
        };
        let mut manager = BackupManager::new(host);

        assert_eq!(manager.export(&sample_snapshot()).unwrap(), ExportOutcome::Offered);
        assert_eq!(manager.host().downloads.len(), 1);

        // the failed handle was dropped, so the next export asks again
        manager.export(&sample_snapshot()).unwrap();
        assert_eq!(manager.host().handle_requests, 2);
    }

    #[test]
    fn test_import_cancelled() {
        let mut manager = BackupManager::new(FakeHost::default());
        assert!(matches!(manager.import(), Err(Error::BackupCancelled)));
    }

    #[test]
    fn test_restore_store_replaces_contents() {
        let db = Database::open_in_memory().unwrap();
        db.create_plan(NewPlan {
            title: "Old plan".to_string(),
            exercises: vec![],
        })
        .unwrap();

        let host = FakeHost {
            open_file: Some(encode(&sample_snapshot()).unwrap()),
            ..FakeHost::default()
        };
        let mut manager = BackupManager::new(host);
        restore_store(&db, &mut manager).unwrap();

        assert_eq!(db.export_snapshot().unwrap(), sample_snapshot());
    }

    #[test]
    fn test_restore_malformed_leaves_store() {
        let db = Database::open_in_memory().unwrap();
        db.create_plan(NewPlan {
            title: "Keep me".to_string(),
            exercises: vec![],
        })
        .unwrap();
        let before = db.export_snapshot().unwrap();

        let host = FakeHost {
            open_file: Some(b"{\"logs\": oops".to_vec()),
            ..FakeHost::default()
        };
        let mut manager = BackupManager::new(host);

        assert!(matches!(restore_store(&db, &mut manager), Err(Error::Import(_))));
        assert_eq!(db.export_snapshot().unwrap(), before);
    }

    #[test]
    fn test_export_store_then_restore_round_trip() {
        let db = Database::open_in_memory().unwrap();
        db.import_snapshot(&sample_snapshot()).unwrap();

        let mut manager = BackupManager::new(FakeHost::default());
        export_store(&db, &mut manager).unwrap();
        let bytes = manager.host().downloads[0].1.clone();

        let other = Database::open_in_memory().unwrap();
        let mut manager = BackupManager::new(FakeHost {
            open_file: Some(bytes),
            ..FakeHost::default()
        });
        restore_store(&other, &mut manager).unwrap();

        assert_eq!(other.export_snapshot().unwrap(), sample_snapshot());
    }
}
