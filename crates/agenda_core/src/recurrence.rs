//! Alarm recurrence: due checks and next-fire search.
//!
//! Matching happens on the user's wall clock at minute precision. A poller
//! that samples less often than once a minute can skip a firing; callers are
//! expected to poll every minute.

use crate::clock::{LocalResolution, LocalZone, ReferenceInstant, format_local, truncate_to_minute};
use crate::error::AppError;
use crate::model::Alarm;
use std::cmp::Ordering;
use time::{Duration, OffsetDateTime, PrimitiveDateTime, Time};

/// Days searched ahead of the reference date for a recurring alarm. Seven
/// days past today reaches the same weekday again.
const RECURRING_HORIZON_DAYS: i64 = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NextFire {
    At(PrimitiveDateTime),
    /// Terminal state of a one-shot alarm that already went off.
    NoFutureFire,
}

impl NextFire {
    pub fn local(&self) -> Option<PrimitiveDateTime> {
        match self {
            Self::At(local) => Some(*local),
            Self::NoFutureFire => None,
        }
    }
}

pub fn is_due_at(alarm: &Alarm, reference: &ReferenceInstant) -> bool {
    let local = reference.local();
    if local.hour() != alarm.time.hour() || local.minute() != alarm.time.minute() {
        return false;
    }

    if alarm.is_one_shot() {
        // Polls repeated within the firing minute keep reporting it.
        return match alarm.fired_at {
            None => true,
            Some(fired_at) => truncate_to_minute(fired_at) == reference.minute(),
        };
    }

    alarm.repeat.contains(reference.weekday())
}

pub fn next_fire_after(alarm: &Alarm, reference: &ReferenceInstant) -> NextFire {
    if alarm.is_one_shot() && alarm.fired_at.is_some() {
        tracing::debug!(alarm_id = alarm.id, "one-shot alarm already spent");
        return NextFire::NoFutureFire;
    }

    let at = time_of_day(alarm);
    let now = reference.local();
    let horizon = if alarm.is_one_shot() {
        1
    } else {
        RECURRING_HORIZON_DAYS
    };

    for offset in 0..=horizon {
        let Some(date) = now.date().checked_add(Duration::days(offset)) else {
            break;
        };
        let candidate = PrimitiveDateTime::new(date, at);
        if candidate <= now {
            continue;
        }
        if alarm.is_one_shot() || alarm.repeat.contains(date.weekday()) {
            return NextFire::At(candidate);
        }
    }

    NextFire::NoFutureFire
}

/// Maps a local fire time onto an absolute instant. Wall-clock times that a
/// zone skips or repeats are reported instead of guessed.
pub fn resolve_fire(local: PrimitiveDateTime, zone: &dyn LocalZone) -> Result<OffsetDateTime, AppError> {
    match zone.resolve(local) {
        LocalResolution::Single(instant) => Ok(instant),
        LocalResolution::Ambiguous(..) | LocalResolution::Nonexistent => {
            let rendered = format_local(local)?;
            tracing::warn!(local = %rendered, "fire time does not map to a single instant");
            Err(AppError::ambiguous_time(rendered))
        }
    }
}

pub fn next_fire_instant(
    alarm: &Alarm,
    reference: &ReferenceInstant,
    zone: &dyn LocalZone,
) -> Result<Option<OffsetDateTime>, AppError> {
    match next_fire_after(alarm, reference) {
        NextFire::At(local) => resolve_fire(local, zone).map(Some),
        NextFire::NoFutureFire => Ok(None),
    }
}

/// Order of alarms due in the same minute: time of day, then id.
pub fn fire_order(left: &Alarm, right: &Alarm) -> Ordering {
    left.time
        .cmp(&right.time)
        .then_with(|| left.id.cmp(&right.id))
}

fn time_of_day(alarm: &Alarm) -> Time {
    let minutes = i64::from(alarm.time.hour()) * 60 + i64::from(alarm.time.minute());
    Time::MIDNIGHT + Duration::minutes(minutes)
}
