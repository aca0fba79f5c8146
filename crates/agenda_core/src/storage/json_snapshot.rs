use crate::clock::{Timestamp, local_in, truncate_to_minute};
use crate::engine::{RecordKind, Rejected};
use crate::error::AppError;
use crate::model::{Alarm, RemoteAlarm, TaskRecord};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use time::{PrimitiveDateTime, UtcOffset};

pub const SCHEMA_VERSION: u32 = 1;
const SNAPSHOT_FILE_NAME: &str = "snapshot.json";
const SNAPSHOT_ENV_VAR: &str = "AGENDA_SNAPSHOT_PATH";

/// One recorded firing of a one-shot alarm.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FiredAlarm {
    pub alarm_id: i64,
    pub fired_at: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct StoredSnapshot {
    schema_version: u32,
    #[serde(default)]
    tasks: Vec<TaskRecord>,
    #[serde(default)]
    alarms: Vec<RemoteAlarm>,
    #[serde(default)]
    fired_alarms: Vec<FiredAlarm>,
}

/// Records handed over by the external store, plus the one-shot fire log.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    pub tasks: Vec<TaskRecord>,
    pub alarms: Vec<RemoteAlarm>,
    pub fired_alarms: Vec<FiredAlarm>,
}

impl Snapshot {
    /// Local fire minute per alarm id. Absolute entries are read in `offset`.
    /// Unreadable entries are set aside so the rest of the log still applies.
    pub fn fired_log(&self, offset: UtcOffset) -> (HashMap<i64, PrimitiveDateTime>, Vec<Rejected>) {
        let mut log = HashMap::new();
        let mut rejected = Vec::new();
        for entry in &self.fired_alarms {
            match read_fired_at(&entry.fired_at, offset) {
                Ok(local) => {
                    log.insert(entry.alarm_id, truncate_to_minute(local));
                }
                Err(error) => {
                    tracing::warn!(alarm_id = entry.alarm_id, %error, "fire log entry rejected");
                    rejected.push(Rejected {
                        kind: RecordKind::FiredAlarm,
                        id: entry.alarm_id,
                        user_id: None,
                        error,
                    });
                }
            }
        }
        (log, rejected)
    }

    /// Attaches recorded fire times to validated alarms.
    pub fn apply_fired_log(&self, alarms: Vec<Alarm>, offset: UtcOffset) -> (Vec<Alarm>, Vec<Rejected>) {
        let (log, rejected) = self.fired_log(offset);
        let alarms = alarms
            .into_iter()
            .map(|alarm| {
                let fired_at = log.get(&alarm.id).copied();
                alarm.with_fired_at(fired_at)
            })
            .collect();
        (alarms, rejected)
    }
}

fn read_fired_at(raw: &str, offset: UtcOffset) -> Result<PrimitiveDateTime, AppError> {
    match Timestamp::parse(raw).map_err(|reason| AppError::validation("fired_at", reason))? {
        Timestamp::Local(local) => Ok(local),
        Timestamp::Fixed(fixed) => local_in(fixed, offset)
            .ok_or_else(|| AppError::validation("fired_at", format!("'{raw}' is out of range"))),
    }
}

pub fn snapshot_path() -> Result<PathBuf, AppError> {
    if let Ok(path) = std::env::var(SNAPSHOT_ENV_VAR)
        && !path.trim().is_empty()
    {
        return Ok(PathBuf::from(path));
    }

    if cfg!(windows) {
        let appdata =
            std::env::var("APPDATA").map_err(|_| AppError::invalid_data("APPDATA is not set"))?;
        Ok(PathBuf::from(appdata).join("agenda").join(SNAPSHOT_FILE_NAME))
    } else {
        let home = std::env::var("HOME").map_err(|_| AppError::invalid_data("HOME is not set"))?;
        Ok(PathBuf::from(home)
            .join(".config")
            .join("agenda")
            .join(SNAPSHOT_FILE_NAME))
    }
}

pub fn load_snapshot(path: &Path) -> Result<Snapshot, AppError> {
    if !path.exists() {
        return Ok(Snapshot::default());
    }

    let content = std::fs::read_to_string(path)
        .map_err(|err| AppError::io(format!("{}: {}", path.display(), err)))?;
    let stored: StoredSnapshot =
        serde_json::from_str(&content).map_err(|err| AppError::invalid_data(err.to_string()))?;

    if stored.schema_version != SCHEMA_VERSION {
        return Err(AppError::invalid_data(format!(
            "unsupported schema_version {}",
            stored.schema_version
        )));
    }

    Ok(Snapshot {
        tasks: stored.tasks,
        alarms: stored.alarms,
        fired_alarms: stored.fired_alarms,
    })
}

pub fn save_snapshot(path: &Path, snapshot: &Snapshot) -> Result<(), AppError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|err| AppError::io(err.to_string()))?;
    }

    let stored = StoredSnapshot {
        schema_version: SCHEMA_VERSION,
        tasks: snapshot.tasks.clone(),
        alarms: snapshot.alarms.clone(),
        fired_alarms: snapshot.fired_alarms.clone(),
    };
    let content = serde_json::to_string_pretty(&stored)
        .map_err(|err| AppError::invalid_data(err.to_string()))?;
    std::fs::write(path, content).map_err(|err| AppError::io(err.to_string()))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let permissions = std::fs::Permissions::from_mode(0o600);
        std::fs::set_permissions(path, permissions).map_err(|err| AppError::io(err.to_string()))?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{FiredAlarm, SCHEMA_VERSION, Snapshot, load_snapshot, save_snapshot};
    use crate::engine::RecordKind;
    use crate::model::{RemoteAlarm, TaskRecord, validate_alarm};
    use std::fs;
    use std::path::PathBuf;
    use std::time::{SystemTime, UNIX_EPOCH};
    use time::macros::{datetime, offset};

    fn temp_path(file_name: &str) -> PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        std::env::temp_dir().join(format!("agenda-{nanos}-{file_name}"))
    }

    fn alarm_record(id: i64) -> RemoteAlarm {
        RemoteAlarm {
            id,
            user_id: "user-1".to_string(),
            hour: 6,
            minute: 45,
            is_am: true,
            repeat_days: "0000000".to_string(),
            puzzle_mode: true,
            music_path: "sounds/birds.mp3".to_string(),
            created_at: "2024-01-01T00:00:00Z".to_string(),
        }
    }

    #[test]
    fn missing_file_is_an_empty_snapshot() {
        let path = temp_path("missing.json");
        assert_eq!(load_snapshot(&path).unwrap(), Snapshot::default());
    }

    #[test]
    fn save_and_load_keeps_records() {
        let path = temp_path("snapshot.json");
        let snapshot = Snapshot {
            tasks: vec![TaskRecord {
                id: 1,
                user_id: "user-1".to_string(),
                title: "stretch".to_string(),
                start_time: "2024-01-01T09:00".to_string(),
                end_time: "2024-01-01T09:15".to_string(),
                is_completed: false,
            }],
            alarms: vec![alarm_record(2)],
            fired_alarms: vec![FiredAlarm {
                alarm_id: 2,
                fired_at: "2024-01-02T06:45:00".to_string(),
            }],
        };

        save_snapshot(&path, &snapshot).unwrap();
        let loaded = load_snapshot(&path).unwrap();
        fs::remove_file(&path).ok();

        assert_eq!(loaded, snapshot);
    }

    #[test]
    fn accepts_snapshot_without_fired_log() {
        let path = temp_path("no-fired.json");
        let content = serde_json::json!({
            "schema_version": 1,
            "tasks": [],
            "alarms": [alarm_record(3)]
        });
        fs::write(&path, content.to_string()).unwrap();

        let loaded = load_snapshot(&path).unwrap();
        fs::remove_file(&path).ok();

        assert_eq!(loaded.alarms.len(), 1);
        assert!(loaded.fired_alarms.is_empty());
    }

    #[test]
    fn rejects_unknown_schema_version() {
        let path = temp_path("bad-schema.json");
        let content = format!(
            "{{\n  \"schema_version\": {},\n  \"tasks\": []\n}}",
            SCHEMA_VERSION + 1
        );
        fs::write(&path, content).unwrap();

        let err = load_snapshot(&path).unwrap_err();
        fs::remove_file(&path).ok();

        assert_eq!(err.code(), "invalid_data");
    }

    #[test]
    fn rejects_non_integer_alarm_hour() {
        let path = temp_path("bad-hour.json");
        let mut alarm = serde_json::to_value(alarm_record(4)).unwrap();
        alarm["hour"] = serde_json::json!("seven");
        let content = serde_json::json!({ "schema_version": 1, "alarms": [alarm] });
        fs::write(&path, content.to_string()).unwrap();

        let err = load_snapshot(&path).unwrap_err();
        fs::remove_file(&path).ok();

        assert_eq!(err.code(), "invalid_data");
    }

    #[test]
    fn fired_log_marks_one_shot_alarms() {
        let snapshot = Snapshot {
            tasks: Vec::new(),
            alarms: vec![alarm_record(5), alarm_record(6)],
            fired_alarms: vec![FiredAlarm {
                alarm_id: 5,
                fired_at: "2024-01-02T04:45:30Z".to_string(),
            }],
        };
        let alarms = snapshot
            .alarms
            .iter()
            .map(|record| validate_alarm(record).unwrap())
            .collect();

        let (applied, rejected) = snapshot.apply_fired_log(alarms, offset!(+2));

        assert!(rejected.is_empty());
        assert_eq!(applied[0].fired_at, Some(datetime!(2024-01-02 06:45)));
        assert_eq!(applied[1].fired_at, None);
    }

    #[test]
    fn fired_log_sets_aside_unreadable_entries() {
        let snapshot = Snapshot {
            fired_alarms: vec![
                FiredAlarm {
                    alarm_id: 1,
                    fired_at: "earlier".to_string(),
                },
                FiredAlarm {
                    alarm_id: 2,
                    fired_at: "9999-12-31T23:59:00Z".to_string(),
                },
                FiredAlarm {
                    alarm_id: 3,
                    fired_at: "2024-01-02T06:45:00".to_string(),
                },
            ],
            ..Snapshot::default()
        };

        let (log, rejected) = snapshot.fired_log(offset!(+1));

        assert_eq!(log.len(), 1);
        assert_eq!(log.get(&3), Some(&datetime!(2024-01-02 06:45)));
        let ids: Vec<i64> = rejected.iter().map(|entry| entry.id).collect();
        assert_eq!(ids, vec![1, 2]);
        assert!(rejected.iter().all(|entry| entry.kind == RecordKind::FiredAlarm));
        assert_eq!(rejected[0].error.field(), Some("fired_at"));
    }
}
