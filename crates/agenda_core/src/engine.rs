//! Agenda assembly over a user's tasks and alarms.
//!
//! Everything here is a reduction over the slices handed in: no I/O, no
//! caches, so the same inputs and reference instant always produce the same
//! agenda, and calls can run side by side on any thread.

use crate::clock::ReferenceInstant;
use crate::error::AppError;
use crate::model::{Alarm, RemoteAlarm, Task, TaskRecord, validate_alarm, validate_task};
use crate::recurrence::{NextFire, fire_order, is_due_at, next_fire_after};
use crate::window::{TaskWindow, classify_task};
use std::cmp::Ordering;
use std::collections::HashSet;
use time::UtcOffset;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgendaItem {
    Alarm(Alarm),
    Task { task: Task, window: TaskWindow },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Agenda {
    pub user_id: String,
    pub reference: ReferenceInstant,
    pub items: Vec<AgendaItem>,
}

impl Agenda {
    pub fn due_alarms(&self) -> impl Iterator<Item = &Alarm> {
        self.items.iter().filter_map(|item| match item {
            AgendaItem::Alarm(alarm) => Some(alarm),
            AgendaItem::Task { .. } => None,
        })
    }

    pub fn tasks(&self) -> impl Iterator<Item = (&Task, TaskWindow)> {
        self.items.iter().filter_map(|item| match item {
            AgendaItem::Task { task, window } => Some((task, *window)),
            AgendaItem::Alarm(_) => None,
        })
    }
}

/// Due alarms first, then open tasks from most to least pressing. Completed
/// tasks are left out; see [`completed_tasks`].
pub fn build_agenda(
    user_id: &str,
    tasks: &[Task],
    alarms: &[Alarm],
    reference: &ReferenceInstant,
) -> Agenda {
    let owned_alarms: Vec<Alarm> = alarms
        .iter()
        .filter(|alarm| alarm.user_id == user_id)
        .cloned()
        .collect();
    let mut items: Vec<AgendaItem> = due_alarms(&owned_alarms, reference)
        .into_iter()
        .map(AgendaItem::Alarm)
        .collect();

    let mut open: Vec<(Task, TaskWindow)> = tasks
        .iter()
        .filter(|task| task.user_id == user_id)
        .map(|task| (task.clone(), classify_task(task, reference)))
        .filter(|(_, window)| *window != TaskWindow::Completed)
        .collect();
    open.sort_by(|(left, left_window), (right, right_window)| {
        left_window
            .urgency_rank()
            .cmp(&right_window.urgency_rank())
            .then_with(|| {
                left.start
                    .resolve(reference.offset())
                    .cmp(&right.start.resolve(reference.offset()))
            })
            .then_with(|| left.id.cmp(&right.id))
    });
    items.extend(
        open.into_iter()
            .map(|(task, window)| AgendaItem::Task { task, window }),
    );

    tracing::debug!(
        user_id,
        reference = %reference,
        items = items.len(),
        "agenda built"
    );

    Agenda {
        user_id: user_id.to_string(),
        reference: *reference,
        items,
    }
}

/// Alarms due at `reference`, in firing order. No ownership filter.
pub fn due_alarms(alarms: &[Alarm], reference: &ReferenceInstant) -> Vec<Alarm> {
    let mut due: Vec<Alarm> = alarms
        .iter()
        .filter(|alarm| is_due_at(alarm, reference))
        .cloned()
        .collect();
    due.sort_by(fire_order);
    due
}

/// Completed tasks of the user by end time, naive ends read in `offset`.
pub fn completed_tasks(user_id: &str, tasks: &[Task], offset: UtcOffset) -> Vec<Task> {
    let mut completed: Vec<Task> = tasks
        .iter()
        .filter(|task| task.user_id == user_id && task.is_completed)
        .cloned()
        .collect();
    completed.sort_by_key(|task| (task.end.resolve(offset), task.id));
    completed
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpcomingAlarm {
    pub alarm: Alarm,
    pub next: NextFire,
}

/// Every alarm of the user with its next fire, soonest first. Spent one-shot
/// alarms sort last.
pub fn upcoming_alarms(
    user_id: &str,
    alarms: &[Alarm],
    reference: &ReferenceInstant,
) -> Vec<UpcomingAlarm> {
    let mut upcoming: Vec<UpcomingAlarm> = alarms
        .iter()
        .filter(|alarm| alarm.user_id == user_id)
        .map(|alarm| UpcomingAlarm {
            alarm: alarm.clone(),
            next: next_fire_after(alarm, reference),
        })
        .collect();
    upcoming.sort_by(|left, right| {
        compare_next(&left.next, &right.next)
            .then_with(|| {
                left.alarm
                    .created_at
                    .resolve(reference.offset())
                    .cmp(&right.alarm.created_at.resolve(reference.offset()))
            })
            .then_with(|| left.alarm.id.cmp(&right.alarm.id))
    });
    upcoming
}

fn compare_next(left: &NextFire, right: &NextFire) -> Ordering {
    match (left, right) {
        (NextFire::At(left), NextFire::At(right)) => left.cmp(right),
        (NextFire::At(_), NextFire::NoFutureFire) => Ordering::Less,
        (NextFire::NoFutureFire, NextFire::At(_)) => Ordering::Greater,
        (NextFire::NoFutureFire, NextFire::NoFutureFire) => Ordering::Equal,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    Task,
    Alarm,
    /// Entry of the one-shot fire log; the id is the alarm's.
    FiredAlarm,
}

impl RecordKind {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Task => "task",
            Self::Alarm => "alarm",
            Self::FiredAlarm => "fired_alarm",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejected {
    pub kind: RecordKind,
    pub id: i64,
    /// Owner as written in the raw record; fire log entries carry none.
    pub user_id: Option<String>,
    pub error: AppError,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Ingested {
    pub tasks: Vec<Task>,
    pub alarms: Vec<Alarm>,
    pub rejected: Vec<Rejected>,
}

/// Validates a raw batch record by record. A bad record is set aside and the
/// rest still go through; the first record with a given id wins.
pub fn ingest(tasks: &[TaskRecord], alarms: &[RemoteAlarm]) -> Ingested {
    let mut ingested = Ingested::default();

    let mut task_ids = HashSet::new();
    for record in tasks {
        let outcome = if task_ids.contains(&record.id) {
            Err(AppError::validation("id", "duplicate task id"))
        } else {
            validate_task(record)
        };
        match outcome {
            Ok(task) => {
                task_ids.insert(task.id);
                ingested.tasks.push(task);
            }
            Err(error) => reject(&mut ingested, RecordKind::Task, record.id, &record.user_id, error),
        }
    }

    let mut alarm_ids = HashSet::new();
    for record in alarms {
        let outcome = if alarm_ids.contains(&record.id) {
            Err(AppError::validation("id", "duplicate alarm id"))
        } else {
            validate_alarm(record)
        };
        match outcome {
            Ok(alarm) => {
                alarm_ids.insert(alarm.id);
                ingested.alarms.push(alarm);
            }
            Err(error) => reject(&mut ingested, RecordKind::Alarm, record.id, &record.user_id, error),
        }
    }

    ingested
}

fn reject(ingested: &mut Ingested, kind: RecordKind, id: i64, user_id: &str, error: AppError) {
    tracing::warn!(kind = kind.label(), id, %error, "record rejected");
    ingested.rejected.push(Rejected {
        kind,
        id,
        user_id: Some(user_id.to_string()),
        error,
    });
}
