use crate::clock::Timestamp;
use crate::error::AppError;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Task as it travels between the store and the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskRecord {
    pub id: i64,
    pub user_id: String,
    pub title: String,
    pub start_time: String,
    pub end_time: String,
    pub is_completed: bool,
}

/// A task that passed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
    pub id: i64,
    pub user_id: String,
    pub title: String,
    pub start: Timestamp,
    pub end: Timestamp,
    pub is_completed: bool,
}

pub fn validate_task(record: &TaskRecord) -> Result<Task, AppError> {
    if record.user_id.trim().is_empty() {
        return Err(AppError::validation("user_id", "user_id is required"));
    }

    let title = record.title.trim();
    if title.is_empty() {
        return Err(AppError::validation("title", "title is required"));
    }

    let start = Timestamp::parse(&record.start_time)
        .map_err(|reason| AppError::validation("start_time", reason))?;
    let end = Timestamp::parse(&record.end_time)
        .map_err(|reason| AppError::validation("end_time", reason))?;
    check_window(&start, &end)?;

    Ok(Task {
        id: record.id,
        user_id: record.user_id.clone(),
        title: title.to_string(),
        start,
        end,
        is_completed: record.is_completed,
    })
}

fn check_window(start: &Timestamp, end: &Timestamp) -> Result<(), AppError> {
    if start.compare(end) == Ordering::Greater {
        return Err(AppError::validation(
            "start_time",
            "start_time must not be after end_time",
        ));
    }
    Ok(())
}

impl Task {
    pub fn mark_completed(&mut self) -> Result<(), AppError> {
        if self.is_completed {
            return Err(AppError::invalid_input("task already completed"));
        }
        self.is_completed = true;
        Ok(())
    }

    /// Replaces the active window. The task is left untouched on error.
    pub fn edit_window(&mut self, start_time: &str, end_time: &str) -> Result<(), AppError> {
        let start = Timestamp::parse(start_time)
            .map_err(|reason| AppError::validation("start_time", reason))?;
        let end = Timestamp::parse(end_time)
            .map_err(|reason| AppError::validation("end_time", reason))?;
        check_window(&start, &end)?;

        self.start = start;
        self.end = end;
        Ok(())
    }

    pub fn to_record(&self) -> Result<TaskRecord, AppError> {
        Ok(TaskRecord {
            id: self.id,
            user_id: self.user_id.clone(),
            title: self.title.clone(),
            start_time: self.start.format()?,
            end_time: self.end.format()?,
            is_completed: self.is_completed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::{TaskRecord, validate_task};
    use crate::clock::Timestamp;
    use time::macros::datetime;

    fn record(start_time: &str, end_time: &str) -> TaskRecord {
        TaskRecord {
            id: 1,
            user_id: "user-1".to_string(),
            title: "standup".to_string(),
            start_time: start_time.to_string(),
            end_time: end_time.to_string(),
            is_completed: false,
        }
    }

    #[test]
    fn validate_task_accepts_well_formed_record() {
        let task = validate_task(&record("2024-01-01T09:00", "2024-01-01T10:00")).unwrap();

        assert_eq!(task.id, 1);
        assert_eq!(task.title, "standup");
        assert_eq!(task.start, Timestamp::Local(datetime!(2024-01-01 09:00)));
        assert_eq!(task.end, Timestamp::Local(datetime!(2024-01-01 10:00)));
        assert!(!task.is_completed);
    }

    #[test]
    fn validate_task_accepts_zero_length_window() {
        assert!(validate_task(&record("2024-01-01T09:00", "2024-01-01T09:00")).is_ok());
    }

    #[test]
    fn validate_task_rejects_inverted_window() {
        let err = validate_task(&record("2024-01-01T10:00", "2024-01-01T09:00")).unwrap_err();
        assert_eq!(err.code(), "validation_error");
        assert_eq!(err.field(), Some("start_time"));
    }

    #[test]
    fn validate_task_rejects_inverted_mixed_window() {
        let err =
            validate_task(&record("2024-01-01T10:00", "2024-01-01T09:00:00+00:00")).unwrap_err();
        assert_eq!(err.field(), Some("start_time"));
    }

    #[test]
    fn validate_task_rejects_blank_title() {
        let mut raw = record("2024-01-01T09:00", "2024-01-01T10:00");
        raw.title = "   ".to_string();
        let err = validate_task(&raw).unwrap_err();
        assert_eq!(err.field(), Some("title"));
    }

    #[test]
    fn validate_task_rejects_blank_user() {
        let mut raw = record("2024-01-01T09:00", "2024-01-01T10:00");
        raw.user_id = String::new();
        let err = validate_task(&raw).unwrap_err();
        assert_eq!(err.field(), Some("user_id"));
    }

    #[test]
    fn validate_task_keeps_owner_verbatim() {
        let mut raw = record("2024-01-01T09:00", "2024-01-01T10:00");
        raw.user_id = " user-1 ".to_string();
        let task = validate_task(&raw).unwrap();

        assert_eq!(task.user_id, " user-1 ");
        assert_eq!(task.to_record().unwrap().user_id, raw.user_id);
    }

    #[test]
    fn validate_task_rejects_malformed_end_time() {
        let err = validate_task(&record("2024-01-01T09:00", "soon")).unwrap_err();
        assert_eq!(err.field(), Some("end_time"));
    }

    #[test]
    fn mark_completed_only_once() {
        let mut task = validate_task(&record("2024-01-01T09:00", "2024-01-01T10:00")).unwrap();
        task.mark_completed().unwrap();
        assert!(task.is_completed);

        let err = task.mark_completed().unwrap_err();
        assert_eq!(err.code(), "invalid_input");
        assert!(task.is_completed);
    }

    #[test]
    fn edit_window_keeps_task_on_invalid_window() {
        let mut task = validate_task(&record("2024-01-01T09:00", "2024-01-01T10:00")).unwrap();
        let before = task.clone();

        assert!(task.edit_window("2024-01-02T10:00", "2024-01-02T09:00").is_err());
        assert_eq!(task, before);

        task.edit_window("2024-01-02T09:00", "2024-01-02T11:00").unwrap();
        assert_eq!(task.end, Timestamp::Local(datetime!(2024-01-02 11:00)));
    }

    #[test]
    fn to_record_uses_wire_field_names() {
        let task = validate_task(&record("2024-01-01T09:00", "2024-01-01T10:00:00Z")).unwrap();
        let value = serde_json::to_value(task.to_record().unwrap()).unwrap();

        assert_eq!(value["start_time"], "2024-01-01T09:00:00");
        assert_eq!(value["end_time"], "2024-01-01T10:00:00Z");
        assert_eq!(value["is_completed"], false);
    }
}
