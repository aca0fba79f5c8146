use crate::clock::{FixedZone, ReferenceInstant, format_local};
use crate::config::Config;
use crate::engine::{self, Agenda, Ingested, RecordKind, Rejected, UpcomingAlarm};
use crate::error::AppError;
use crate::model::{Alarm, Task};
use crate::recurrence::{self, NextFire};
use crate::storage::json_snapshot::{self, FiredAlarm};
use crate::window::{TaskWindow, classify_task};
use std::path::Path;
use time::{OffsetDateTime, UtcOffset};

#[derive(Debug, Clone)]
pub struct AgendaReport {
    pub agenda: Agenda,
    pub rejected: Vec<Rejected>,
}

#[derive(Debug, Clone)]
pub struct NextFireReport {
    pub alarm: Alarm,
    pub next: NextFire,
    pub instant: Option<OffsetDateTime>,
}

#[derive(Debug, Clone)]
pub struct RingOutcome {
    pub reference: ReferenceInstant,
    pub alarms: Vec<Alarm>,
    /// One-shot alarms whose firing was written to the snapshot by this call.
    pub recorded: Vec<i64>,
}

pub fn agenda(user_id: Option<&str>, at: Option<&str>, config: &Config) -> Result<AgendaReport, AppError> {
    let path = json_snapshot::snapshot_path()?;
    agenda_with_path(&path, user_id, at, config)
}

pub fn completed(user_id: Option<&str>, config: &Config) -> Result<Vec<Task>, AppError> {
    let path = json_snapshot::snapshot_path()?;
    completed_with_path(&path, user_id, config)
}

pub fn upcoming(
    user_id: Option<&str>,
    at: Option<&str>,
    config: &Config,
) -> Result<Vec<UpcomingAlarm>, AppError> {
    let path = json_snapshot::snapshot_path()?;
    upcoming_with_path(&path, user_id, at, config)
}

pub fn task_status(
    user_id: Option<&str>,
    id: i64,
    at: Option<&str>,
    config: &Config,
) -> Result<(Task, TaskWindow), AppError> {
    let path = json_snapshot::snapshot_path()?;
    task_status_with_path(&path, user_id, id, at, config)
}

pub fn next_fire(
    user_id: Option<&str>,
    id: i64,
    at: Option<&str>,
    config: &Config,
) -> Result<NextFireReport, AppError> {
    let path = json_snapshot::snapshot_path()?;
    next_fire_with_path(&path, user_id, id, at, config)
}

pub fn ring(at: Option<&str>, config: &Config) -> Result<RingOutcome, AppError> {
    let path = json_snapshot::snapshot_path()?;
    ring_with_path(&path, at, config)
}

pub fn check(config: &Config) -> Result<Ingested, AppError> {
    let path = json_snapshot::snapshot_path()?;
    check_with_path(&path, config)
}

fn agenda_with_path(
    path: &Path,
    user_id: Option<&str>,
    at: Option<&str>,
    config: &Config,
) -> Result<AgendaReport, AppError> {
    let user_id = resolve_user(user_id, config)?;
    let reference = resolve_reference(at, config)?;
    let records = load_records(path, reference.offset())?;

    let agenda = engine::build_agenda(&user_id, &records.tasks, &records.alarms, &reference);
    Ok(AgendaReport {
        agenda,
        rejected: records.rejected,
    })
}

fn completed_with_path(path: &Path, user_id: Option<&str>, config: &Config) -> Result<Vec<Task>, AppError> {
    let user_id = resolve_user(user_id, config)?;
    let offset = config.offset()?;
    let records = load_records(path, offset)?;
    Ok(engine::completed_tasks(&user_id, &records.tasks, offset))
}

fn upcoming_with_path(
    path: &Path,
    user_id: Option<&str>,
    at: Option<&str>,
    config: &Config,
) -> Result<Vec<UpcomingAlarm>, AppError> {
    let user_id = resolve_user(user_id, config)?;
    let reference = resolve_reference(at, config)?;
    let records = load_records(path, reference.offset())?;
    Ok(engine::upcoming_alarms(&user_id, &records.alarms, &reference))
}

fn task_status_with_path(
    path: &Path,
    user_id: Option<&str>,
    id: i64,
    at: Option<&str>,
    config: &Config,
) -> Result<(Task, TaskWindow), AppError> {
    let user_id = resolve_user(user_id, config)?;
    let reference = resolve_reference(at, config)?;
    let records = load_records(path, reference.offset())?;

    if let Some(task) = records
        .tasks
        .into_iter()
        .find(|task| task.id == id && task.user_id == user_id)
    {
        let window = classify_task(&task, &reference);
        return Ok((task, window));
    }
    Err(rejection_or_missing(&records.rejected, RecordKind::Task, &user_id, id))
}

fn next_fire_with_path(
    path: &Path,
    user_id: Option<&str>,
    id: i64,
    at: Option<&str>,
    config: &Config,
) -> Result<NextFireReport, AppError> {
    let user_id = resolve_user(user_id, config)?;
    let reference = resolve_reference(at, config)?;
    let records = load_records(path, reference.offset())?;

    let Some(alarm) = records
        .alarms
        .into_iter()
        .find(|alarm| alarm.id == id && alarm.user_id == user_id)
    else {
        return Err(rejection_or_missing(&records.rejected, RecordKind::Alarm, &user_id, id));
    };
    let zone = FixedZone(reference.offset());
    let next = recurrence::next_fire_after(&alarm, &reference);
    let instant = recurrence::next_fire_instant(&alarm, &reference, &zone)?;

    Ok(NextFireReport {
        alarm,
        next,
        instant,
    })
}

fn ring_with_path(path: &Path, at: Option<&str>, config: &Config) -> Result<RingOutcome, AppError> {
    let reference = resolve_reference(at, config)?;
    let mut snapshot = json_snapshot::load_snapshot(path)?;
    let records = ingest_snapshot(&snapshot, reference.offset());
    let alarms = engine::due_alarms(&records.alarms, &reference);

    let fired_at = format_local(reference.minute())?;
    let recorded: Vec<i64> = alarms
        .iter()
        .filter(|alarm| alarm.is_one_shot() && alarm.fired_at.is_none())
        .map(|alarm| alarm.id)
        .collect();

    if !recorded.is_empty() {
        snapshot
            .fired_alarms
            .extend(recorded.iter().map(|alarm_id| FiredAlarm {
                alarm_id: *alarm_id,
                fired_at: fired_at.clone(),
            }));
        json_snapshot::save_snapshot(path, &snapshot)?;
        tracing::info!(count = recorded.len(), fired_at = %fired_at, "one-shot alarms spent");
    }

    Ok(RingOutcome {
        reference,
        alarms,
        recorded,
    })
}

fn check_with_path(path: &Path, config: &Config) -> Result<Ingested, AppError> {
    load_records(path, config.offset()?)
}

fn load_records(path: &Path, offset: UtcOffset) -> Result<Ingested, AppError> {
    let snapshot = json_snapshot::load_snapshot(path)?;
    Ok(ingest_snapshot(&snapshot, offset))
}

fn ingest_snapshot(snapshot: &json_snapshot::Snapshot, offset: UtcOffset) -> Ingested {
    let mut ingested = engine::ingest(&snapshot.tasks, &snapshot.alarms);
    let alarms = std::mem::take(&mut ingested.alarms);
    let (alarms, rejected) = snapshot.apply_fired_log(alarms, offset);
    ingested.alarms = alarms;
    ingested.rejected.extend(rejected);
    ingested
}

fn rejection_or_missing(rejected: &[Rejected], kind: RecordKind, user_id: &str, id: i64) -> AppError {
    rejected
        .iter()
        .find(|entry| {
            entry.kind == kind && entry.id == id && entry.user_id.as_deref() == Some(user_id)
        })
        .map(|entry| entry.error.clone())
        .unwrap_or_else(|| AppError::invalid_input(format!("{} not found", kind.label())))
}

fn resolve_user(user_id: Option<&str>, config: &Config) -> Result<String, AppError> {
    user_id
        .or(config.default_user.as_deref())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
        .ok_or_else(|| AppError::invalid_input("user is required"))
}

fn resolve_reference(at: Option<&str>, config: &Config) -> Result<ReferenceInstant, AppError> {
    let offset = config.offset()?;
    match at {
        Some(raw) => ReferenceInstant::parse(raw, offset),
        None => Ok(ReferenceInstant::now(offset)),
    }
}
