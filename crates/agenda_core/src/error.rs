use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AppError {
    #[error("validation_error - {field}: {reason}")]
    Validation { field: &'static str, reason: String },
    #[error("ambiguous_time - {local} does not map to exactly one instant")]
    AmbiguousTime { local: String },
    #[error("invalid_input - {0}")]
    InvalidInput(String),
    #[error("invalid_data - {0}")]
    InvalidData(String),
    #[error("io_error - {0}")]
    Io(String),
}

impl AppError {
    pub fn validation<R: Into<String>>(field: &'static str, reason: R) -> Self {
        Self::Validation {
            field,
            reason: reason.into(),
        }
    }

    pub fn ambiguous_time<L: Into<String>>(local: L) -> Self {
        Self::AmbiguousTime {
            local: local.into(),
        }
    }

    pub fn invalid_input<M: Into<String>>(message: M) -> Self {
        Self::InvalidInput(message.into())
    }

    pub fn invalid_data<M: Into<String>>(message: M) -> Self {
        Self::InvalidData(message.into())
    }

    pub fn io<M: Into<String>>(message: M) -> Self {
        Self::Io(message.into())
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation { .. } => "validation_error",
            Self::AmbiguousTime { .. } => "ambiguous_time",
            Self::InvalidInput(_) => "invalid_input",
            Self::InvalidData(_) => "invalid_data",
            Self::Io(_) => "io_error",
        }
    }

    /// Offending field of a rejected record, if any.
    pub fn field(&self) -> Option<&'static str> {
        match self {
            Self::Validation { field, .. } => Some(field),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::AppError;

    #[test]
    fn validation_error_reports_field_and_code() {
        let err = AppError::validation("minute", "must be between 0 and 59");
        assert_eq!(err.code(), "validation_error");
        assert_eq!(err.field(), Some("minute"));
        assert_eq!(
            err.to_string(),
            "validation_error - minute: must be between 0 and 59"
        );
    }

    #[test]
    fn display_prefixes_code() {
        let err = AppError::invalid_input("task not found");
        assert_eq!(err.to_string(), "invalid_input - task not found");
        assert_eq!(err.field(), None);
    }
}
