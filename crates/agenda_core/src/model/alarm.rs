use crate::clock::Timestamp;
use crate::error::AppError;
use serde::{Deserialize, Serialize};
use std::fmt;
use time::{PrimitiveDateTime, Weekday};

const WEEKDAYS: [Weekday; 7] = [
    Weekday::Sunday,
    Weekday::Monday,
    Weekday::Tuesday,
    Weekday::Wednesday,
    Weekday::Thursday,
    Weekday::Friday,
    Weekday::Saturday,
];

/// Alarm as it travels between the store and the engine. `hour` is on the
/// 12-hour clock and only meaningful together with `is_am`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteAlarm {
    pub id: i64,
    pub user_id: String,
    pub hour: u8,
    pub minute: u8,
    pub is_am: bool,
    pub repeat_days: String,
    pub puzzle_mode: bool,
    pub music_path: String,
    pub created_at: String,
}

/// Time of day on the 24-hour clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AlarmTime {
    hour: u8,
    minute: u8,
}

impl AlarmTime {
    pub fn new(hour: u8, minute: u8) -> Option<Self> {
        (hour < 24 && minute < 60).then_some(Self { hour, minute })
    }

    /// 12 AM is midnight (00:MM), 12 PM is noon (12:MM).
    pub fn from_twelve_hour(hour: u8, minute: u8, is_am: bool) -> Result<Self, AppError> {
        if !(1..=12).contains(&hour) {
            return Err(AppError::validation("hour", "hour must be between 1 and 12"));
        }
        if minute > 59 {
            return Err(AppError::validation(
                "minute",
                "minute must be between 0 and 59",
            ));
        }

        let hour = match (hour, is_am) {
            (12, true) => 0,
            (12, false) => 12,
            (hour, true) => hour,
            (hour, false) => hour + 12,
        };
        Ok(Self { hour, minute })
    }

    /// Returns `(hour, minute, is_am)` for the wire record.
    pub fn to_twelve_hour(&self) -> (u8, u8, bool) {
        let is_am = self.hour < 12;
        let hour = match self.hour % 12 {
            0 => 12,
            other => other,
        };
        (hour, self.minute, is_am)
    }

    pub fn hour(&self) -> u8 {
        self.hour
    }

    pub fn minute(&self) -> u8 {
        self.minute
    }
}

impl fmt::Display for AlarmTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

/// Weekday set, bit 0 is Sunday.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct RepeatDays(u8);

impl RepeatDays {
    pub const NONE: Self = Self(0);

    /// Parses the positional `Sunday..Saturday` string of `'0'`/`'1'`.
    pub fn parse(raw: &str) -> Result<Self, String> {
        if raw.chars().count() != 7 {
            return Err(format!(
                "repeat_days must be 7 characters (Sunday..Saturday), got '{raw}'"
            ));
        }

        let mut bits = 0u8;
        for (index, ch) in raw.chars().enumerate() {
            match ch {
                '1' => bits |= 1 << index,
                '0' => {}
                other => {
                    return Err(format!(
                        "repeat_days may only contain '0' or '1', got '{other}'"
                    ));
                }
            }
        }
        Ok(Self(bits))
    }

    pub fn from_days(days: &[Weekday]) -> Self {
        days.iter().fold(Self::NONE, |set, day| {
            Self(set.0 | 1 << day.number_days_from_sunday())
        })
    }

    pub fn contains(&self, day: Weekday) -> bool {
        self.0 & (1 << day.number_days_from_sunday()) != 0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn days(&self) -> impl Iterator<Item = Weekday> + '_ {
        WEEKDAYS.into_iter().filter(|day| self.contains(*day))
    }

    pub fn encode(&self) -> String {
        WEEKDAYS
            .iter()
            .map(|day| if self.contains(*day) { '1' } else { '0' })
            .collect()
    }
}

impl fmt::Display for RepeatDays {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("once");
        }
        let names: Vec<String> = self
            .days()
            .map(|day| day.to_string()[..3].to_string())
            .collect();
        f.write_str(&names.join(","))
    }
}

/// An alarm that passed validation, on the 24-hour clock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alarm {
    pub id: i64,
    pub user_id: String,
    pub time: AlarmTime,
    pub repeat: RepeatDays,
    pub puzzle_mode: bool,
    pub music_path: String,
    pub created_at: Timestamp,
    /// Local minute a one-shot alarm went off, as recorded by the store.
    pub fired_at: Option<PrimitiveDateTime>,
}

impl Alarm {
    pub fn is_one_shot(&self) -> bool {
        self.repeat.is_empty()
    }

    pub fn with_fired_at(mut self, fired_at: Option<PrimitiveDateTime>) -> Self {
        self.fired_at = fired_at;
        self
    }

    pub fn to_record(&self) -> Result<RemoteAlarm, AppError> {
        let (hour, minute, is_am) = self.time.to_twelve_hour();
        Ok(RemoteAlarm {
            id: self.id,
            user_id: self.user_id.clone(),
            hour,
            minute,
            is_am,
            repeat_days: self.repeat.encode(),
            puzzle_mode: self.puzzle_mode,
            music_path: self.music_path.clone(),
            created_at: self.created_at.format()?,
        })
    }
}

pub fn validate_alarm(record: &RemoteAlarm) -> Result<Alarm, AppError> {
    if record.user_id.trim().is_empty() {
        return Err(AppError::validation("user_id", "user_id is required"));
    }

    let time = AlarmTime::from_twelve_hour(record.hour, record.minute, record.is_am)?;
    let repeat = RepeatDays::parse(&record.repeat_days)
        .map_err(|reason| AppError::validation("repeat_days", reason))?;
    let created_at = Timestamp::parse(&record.created_at)
        .map_err(|reason| AppError::validation("created_at", reason))?;

    Ok(Alarm {
        id: record.id,
        user_id: record.user_id.clone(),
        time,
        repeat,
        puzzle_mode: record.puzzle_mode,
        music_path: record.music_path.clone(),
        created_at,
        fired_at: None,
    })
}

#[cfg(test)]
mod tests {
    use super::{AlarmTime, RemoteAlarm, RepeatDays, validate_alarm};
    use time::Weekday;

    fn record(hour: u8, minute: u8, is_am: bool, repeat_days: &str) -> RemoteAlarm {
        RemoteAlarm {
            id: 7,
            user_id: "user-1".to_string(),
            hour,
            minute,
            is_am,
            repeat_days: repeat_days.to_string(),
            puzzle_mode: true,
            music_path: "sounds/rooster.mp3".to_string(),
            created_at: "2024-01-01T00:00:00Z".to_string(),
        }
    }

    #[test]
    fn noon_and_midnight_resolve_both_ways() {
        let noon = AlarmTime::from_twelve_hour(12, 15, false).unwrap();
        assert_eq!((noon.hour(), noon.minute()), (12, 15));
        assert_eq!(noon.to_twelve_hour(), (12, 15, false));

        let midnight = AlarmTime::from_twelve_hour(12, 15, true).unwrap();
        assert_eq!((midnight.hour(), midnight.minute()), (0, 15));
        assert_eq!(midnight.to_twelve_hour(), (12, 15, true));

        let evening = AlarmTime::from_twelve_hour(11, 59, false).unwrap();
        assert_eq!(evening.to_string(), "23:59");
        assert_eq!(evening.to_twelve_hour(), (11, 59, false));
    }

    #[test]
    fn hour_and_minute_bounds() {
        assert_eq!(
            AlarmTime::from_twelve_hour(0, 0, true).unwrap_err().field(),
            Some("hour")
        );
        assert_eq!(
            AlarmTime::from_twelve_hour(13, 0, true).unwrap_err().field(),
            Some("hour")
        );
        assert_eq!(
            AlarmTime::from_twelve_hour(1, 60, true).unwrap_err().field(),
            Some("minute")
        );
        assert!(AlarmTime::from_twelve_hour(1, 59, true).is_ok());
    }

    #[test]
    fn repeat_days_are_sunday_first() {
        let days = RepeatDays::parse("1000001").unwrap();
        assert!(days.contains(Weekday::Sunday));
        assert!(days.contains(Weekday::Saturday));
        assert!(!days.contains(Weekday::Monday));
        assert_eq!(days.encode(), "1000001");
        assert_eq!(days.to_string(), "Sun,Sat");

        let weekdays = RepeatDays::from_days(&[
            Weekday::Monday,
            Weekday::Tuesday,
            Weekday::Wednesday,
            Weekday::Thursday,
            Weekday::Friday,
        ]);
        assert_eq!(weekdays.encode(), "0111110");
    }

    #[test]
    fn repeat_days_rejects_malformed_encoding() {
        assert!(RepeatDays::parse("").is_err());
        assert!(RepeatDays::parse("111110").is_err());
        assert!(RepeatDays::parse("11111000").is_err());
        assert!(RepeatDays::parse("mon,tue").is_err());
        assert!(RepeatDays::parse("11111x0").is_err());
        assert!(RepeatDays::parse("0000000").unwrap().is_empty());
    }

    #[test]
    fn validate_alarm_converts_to_twenty_four_hours() {
        let alarm = validate_alarm(&record(7, 30, false, "1111100")).unwrap();

        assert_eq!(alarm.time, AlarmTime::new(19, 30).unwrap());
        assert!(!alarm.is_one_shot());
        assert!(alarm.fired_at.is_none());
    }

    #[test]
    fn validate_alarm_reports_offending_field() {
        let err = validate_alarm(&record(7, 30, true, "weekdays")).unwrap_err();
        assert_eq!(err.code(), "validation_error");
        assert_eq!(err.field(), Some("repeat_days"));

        let mut bad_created = record(7, 30, true, "1111100");
        bad_created.created_at = "yesterday".to_string();
        assert_eq!(
            validate_alarm(&bad_created).unwrap_err().field(),
            Some("created_at")
        );
    }

    #[test]
    fn validate_alarm_keeps_owner_verbatim() {
        let mut raw = record(7, 30, true, "1111100");
        raw.user_id = "user-1\t".to_string();
        let alarm = validate_alarm(&raw).unwrap();
        assert_eq!(alarm.to_record().unwrap(), raw);

        raw.user_id = "  ".to_string();
        assert_eq!(validate_alarm(&raw).unwrap_err().field(), Some("user_id"));
    }

    #[test]
    fn to_record_restores_wire_shape() {
        let raw = record(12, 0, true, "0000000");
        let alarm = validate_alarm(&raw).unwrap();
        let restored = alarm.to_record().unwrap();

        assert_eq!(restored.hour, 12);
        assert!(restored.is_am);
        assert_eq!(restored.repeat_days, "0000000");
        assert_eq!(restored.created_at, "2024-01-01T00:00:00Z");
    }
}
