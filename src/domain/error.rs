//! Domain error types.

/// Top-level error type for barscope.
#[derive(Debug, thiserror::Error)]
pub enum BarscopeError {
    #[error("insufficient data for {context}: have {bars} bars, need {minimum}")]
    InsufficientData {
        context: String,
        bars: usize,
        minimum: usize,
    },

    #[error("invalid parameter {name}: {reason}")]
    InvalidParameter { name: String, reason: String },

    #[error("unknown strategy: {name}")]
    UnknownStrategy { name: String },

    #[error("unknown statistic: {name}")]
    UnknownStatistic { name: String },

    #[error("optimization cancelled after {completed} of {total} runs")]
    Cancelled { completed: usize, total: usize },

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("data source error: {reason}")]
    DataSource { reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl BarscopeError {
    pub(crate) fn invalid(name: impl Into<String>, reason: impl Into<String>) -> Self {
        BarscopeError::InvalidParameter {
            name: name.into(),
            reason: reason.into(),
        }
    }
}

impl From<&BarscopeError> for std::process::ExitCode {
    fn from(err: &BarscopeError) -> Self {
        let code: u8 = match err {
            BarscopeError::Io(_) => 1,
            BarscopeError::ConfigParse { .. }
            | BarscopeError::ConfigMissing { .. }
            | BarscopeError::ConfigInvalid { .. } => 2,
            BarscopeError::DataSource { .. } => 3,
            BarscopeError::InvalidParameter { .. }
            | BarscopeError::UnknownStrategy { .. }
            | BarscopeError::UnknownStatistic { .. } => 4,
            BarscopeError::InsufficientData { .. } => 5,
            BarscopeError::Cancelled { .. } => 6,
        };
        std::process::ExitCode::from(code)
    }
}
