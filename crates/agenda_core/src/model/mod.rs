mod alarm;
mod task;

pub use alarm::{Alarm, AlarmTime, RemoteAlarm, RepeatDays, validate_alarm};
pub use task::{Task, TaskRecord, validate_task};
