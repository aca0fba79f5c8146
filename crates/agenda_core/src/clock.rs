//! Time primitives shared by the evaluators.
//!
//! Record timestamps come in two flavours: RFC 3339 strings that pin an
//! absolute instant, and offset-less wall-clock strings that mean "whatever
//! the user's clock says". Both are compared against a [`ReferenceInstant`],
//! which carries the caller's wall clock together with the UTC offset in
//! effect at that moment.

use crate::error::AppError;
use std::cmp::Ordering;
use std::fmt;
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{Date, OffsetDateTime, PrimitiveDateTime, UtcOffset, Weekday};

/// A parsed record timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Timestamp {
    /// Wall-clock time without an offset, read in the user's local time.
    Local(PrimitiveDateTime),
    /// Absolute instant with an explicit offset.
    Fixed(OffsetDateTime),
}

impl Timestamp {
    /// Parses RFC 3339, `YYYY-MM-DDTHH:MM[:SS]` (space separator allowed) or
    /// a bare `YYYY-MM-DD`, which means local midnight.
    pub fn parse(raw: &str) -> Result<Self, String> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err("timestamp is required".to_string());
        }

        if let Ok(fixed) = OffsetDateTime::parse(trimmed, &Rfc3339) {
            return Ok(Self::Fixed(fixed));
        }

        let normalized = normalize_separator(trimmed);
        if let Ok(local) = PrimitiveDateTime::parse(
            &normalized,
            format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]"),
        ) {
            return Ok(Self::Local(local));
        }
        if let Ok(local) = PrimitiveDateTime::parse(
            &normalized,
            format_description!("[year]-[month]-[day]T[hour]:[minute]"),
        ) {
            return Ok(Self::Local(local));
        }
        if let Ok(date) = Date::parse(&normalized, format_description!("[year]-[month]-[day]")) {
            return Ok(Self::Local(date.midnight()));
        }

        Err(format!("'{trimmed}' is not an ISO-8601 timestamp"))
    }

    /// Pins the timestamp to an absolute instant, reading local wall-clock
    /// values in `offset`.
    pub fn resolve(&self, offset: UtcOffset) -> OffsetDateTime {
        match self {
            Self::Local(local) => local.assume_offset(offset),
            Self::Fixed(fixed) => *fixed,
        }
    }

    pub fn format(&self) -> Result<String, AppError> {
        match self {
            Self::Local(local) => format_local(*local),
            Self::Fixed(fixed) => fixed
                .format(&Rfc3339)
                .map_err(|err| AppError::invalid_data(err.to_string())),
        }
    }

    /// Orders two record timestamps. When only one side carries an offset the
    /// other is read in that offset; two local values compare as wall clocks.
    /// Not transitive across mixed values: sort on [`Timestamp::resolve`].
    pub fn compare(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Local(left), Self::Local(right)) => left.cmp(right),
            (Self::Fixed(left), Self::Fixed(right)) => left.cmp(right),
            (Self::Local(left), Self::Fixed(right)) => {
                left.assume_offset(right.offset()).cmp(right)
            }
            (Self::Fixed(left), Self::Local(right)) => {
                left.cmp(&right.assume_offset(left.offset()))
            }
        }
    }
}

fn normalize_separator(value: &str) -> String {
    let mut normalized = value.to_string();
    if normalized.len() > 10 && normalized.as_bytes()[10] == b' ' {
        normalized.replace_range(10..11, "T");
    }
    normalized
}

pub fn format_local(local: PrimitiveDateTime) -> Result<String, AppError> {
    local
        .format(format_description!(
            "[year]-[month]-[day]T[hour]:[minute]:[second]"
        ))
        .map_err(|err| AppError::invalid_data(err.to_string()))
}

/// The caller-supplied "now": a local wall clock plus the offset in effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReferenceInstant {
    local: PrimitiveDateTime,
    offset: UtcOffset,
}

impl ReferenceInstant {
    pub fn new(local: PrimitiveDateTime, offset: UtcOffset) -> Self {
        Self { local, offset }
    }

    /// Wall-clock reference read as UTC. Handy when every record is local.
    pub fn naive(local: PrimitiveDateTime) -> Self {
        Self::new(local, UtcOffset::UTC)
    }

    pub fn from_instant(instant: OffsetDateTime) -> Self {
        Self::new(
            PrimitiveDateTime::new(instant.date(), instant.time()),
            instant.offset(),
        )
    }

    pub fn now(offset: UtcOffset) -> Self {
        Self::from_instant(OffsetDateTime::now_utc().to_offset(offset))
    }

    /// Parses a reference from user input. Absolute values are shifted into
    /// `offset` so the wall clock reflects the user's local time.
    pub fn parse(raw: &str, offset: UtcOffset) -> Result<Self, AppError> {
        match Timestamp::parse(raw).map_err(AppError::invalid_input)? {
            Timestamp::Local(local) => Ok(Self::new(local, offset)),
            Timestamp::Fixed(fixed) => {
                let local = local_in(fixed, offset).ok_or_else(|| {
                    AppError::invalid_input(format!("'{}' is out of range", raw.trim()))
                })?;
                Ok(Self::new(local, offset))
            }
        }
    }

    pub fn local(&self) -> PrimitiveDateTime {
        self.local
    }

    pub fn offset(&self) -> UtcOffset {
        self.offset
    }

    pub fn weekday(&self) -> Weekday {
        self.local.weekday()
    }

    pub fn instant(&self) -> OffsetDateTime {
        self.local.assume_offset(self.offset)
    }

    /// Local wall clock truncated to the minute.
    pub fn minute(&self) -> PrimitiveDateTime {
        truncate_to_minute(self.local)
    }
}

impl fmt::Display for ReferenceInstant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.local, self.offset)
    }
}

/// Wall clock of `instant` in `offset`, or `None` past the supported date range.
pub fn local_in(instant: OffsetDateTime, offset: UtcOffset) -> Option<PrimitiveDateTime> {
    instant
        .checked_to_offset(offset)
        .map(|shifted| PrimitiveDateTime::new(shifted.date(), shifted.time()))
}

pub fn truncate_to_minute(local: PrimitiveDateTime) -> PrimitiveDateTime {
    local
        .replace_nanosecond(0)
        .and_then(|value| value.replace_second(0))
        .unwrap_or(local)
}

/// Parses `±HH:MM`, `Z`/`UTC` or `local`.
pub fn parse_utc_offset(raw: &str) -> Result<UtcOffset, AppError> {
    let trimmed = raw.trim();
    if trimmed.eq_ignore_ascii_case("local") {
        return Ok(current_local_offset());
    }
    if trimmed.eq_ignore_ascii_case("z") || trimmed.eq_ignore_ascii_case("utc") {
        return Ok(UtcOffset::UTC);
    }

    UtcOffset::parse(
        trimmed,
        format_description!("[offset_hour sign:mandatory]:[offset_minute]"),
    )
    .map_err(|_| AppError::invalid_input(format!("'{trimmed}' is not a UTC offset")))
}

pub fn current_local_offset() -> UtcOffset {
    UtcOffset::current_local_offset().unwrap_or(UtcOffset::UTC)
}

/// How a local wall-clock time maps onto absolute instants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocalResolution {
    Single(OffsetDateTime),
    /// Repeated wall-clock time (clocks turned back); earlier instant first.
    Ambiguous(OffsetDateTime, OffsetDateTime),
    /// Skipped wall-clock time (clocks turned forward).
    Nonexistent,
}

/// Rules for turning the user's wall clock into absolute instants.
pub trait LocalZone {
    fn resolve(&self, local: PrimitiveDateTime) -> LocalResolution;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedZone(pub UtcOffset);

impl LocalZone for FixedZone {
    fn resolve(&self, local: PrimitiveDateTime) -> LocalResolution {
        LocalResolution::Single(local.assume_offset(self.0))
    }
}

/// A zone with a single offset change at `at`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransitionZone {
    pub at: OffsetDateTime,
    pub before: UtcOffset,
    pub after: UtcOffset,
}

impl LocalZone for TransitionZone {
    fn resolve(&self, local: PrimitiveDateTime) -> LocalResolution {
        let early = local.assume_offset(self.before);
        let late = local.assume_offset(self.after);
        let early_valid = early < self.at;
        let late_valid = late >= self.at;

        match (early_valid, late_valid) {
            (true, true) if early == late => LocalResolution::Single(early),
            (true, true) => {
                let (first, second) = if early < late {
                    (early, late)
                } else {
                    (late, early)
                };
                LocalResolution::Ambiguous(first, second)
            }
            (true, false) => LocalResolution::Single(early),
            (false, true) => LocalResolution::Single(late),
            (false, false) => LocalResolution::Nonexistent,
        }
    }
}
