use crate::clock::ReferenceInstant;
use crate::model::Task;
use serde::Serialize;
use std::fmt;

/// Where a task stands relative to a reference instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskWindow {
    Upcoming,
    Active,
    Overdue,
    Completed,
}

impl TaskWindow {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Upcoming => "upcoming",
            Self::Active => "active",
            Self::Overdue => "overdue",
            Self::Completed => "completed",
        }
    }

    /// Agenda rank: overdue work first, then active, then upcoming.
    pub(crate) fn urgency_rank(&self) -> u8 {
        match self {
            Self::Overdue => 0,
            Self::Active => 1,
            Self::Upcoming => 2,
            Self::Completed => 3,
        }
    }
}

impl fmt::Display for TaskWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Completion wins over any time-based state. Window bounds are inclusive.
pub fn classify_task(task: &Task, reference: &ReferenceInstant) -> TaskWindow {
    if task.is_completed {
        return TaskWindow::Completed;
    }

    let now = reference.instant();
    if now < task.start.resolve(reference.offset()) {
        TaskWindow::Upcoming
    } else if now > task.end.resolve(reference.offset()) {
        TaskWindow::Overdue
    } else {
        TaskWindow::Active
    }
}
