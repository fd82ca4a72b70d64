//! Domain error types.

/// Broad classification used by batch callers and the CLI exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad configuration, raised before any computation.
    Configuration,
    /// Empty or malformed input data.
    Data,
    Io,
}

/// Top-level error type for quantsig.
#[derive(Debug, thiserror::Error)]
pub enum QuantsigError {
    #[error("unknown indicator kind: {kind}")]
    UnknownIndicator { kind: String },

    #[error("unknown strategy: {kind}{}", subtype_suffix(.subtype))]
    UnknownStrategy {
        kind: String,
        subtype: Option<String>,
    },

    #[error("invalid parameter {name}: {reason}")]
    InvalidParameter { name: String, reason: String },

    #[error("invalid grid: {reason}")]
    InvalidGrid { reason: String },

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

    #[error("no data for {symbol}")]
    NoData { symbol: String },

    #[error("malformed series: {reason}")]
    MalformedSeries { reason: String },

    #[error("missing column {column}")]
    MissingColumn { column: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

fn subtype_suffix(subtype: &Option<String>) -> String {
    subtype.as_deref().map(|s| format!("/{s}")).unwrap_or_default()
}

impl QuantsigError {
    pub fn invalid_parameter(name: &str, reason: impl Into<String>) -> Self {
        QuantsigError::InvalidParameter {
            name: name.to_string(),
            reason: reason.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            QuantsigError::UnknownIndicator { .. }
            | QuantsigError::UnknownStrategy { .. }
            | QuantsigError::InvalidParameter { .. }
            | QuantsigError::InvalidGrid { .. }
            | QuantsigError::ConfigParse { .. }
            | QuantsigError::ConfigMissing { .. }
            | QuantsigError::ConfigInvalid { .. } => ErrorKind::Configuration,
            QuantsigError::NoData { .. }
            | QuantsigError::MalformedSeries { .. }
            | QuantsigError::MissingColumn { .. } => ErrorKind::Data,
            QuantsigError::Io(_) => ErrorKind::Io,
        }
    }

    pub fn is_configuration(&self) -> bool {
        self.kind() == ErrorKind::Configuration
    }
}

impl From<&QuantsigError> for std::process::ExitCode {
    fn from(err: &QuantsigError) -> Self {
        let code: u8 = match err.kind() {
            ErrorKind::Io => 1,
            ErrorKind::Configuration => 2,
            ErrorKind::Data => 5,
        };
        std::process::ExitCode::from(code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_strategy_message_includes_subtype() {
        let err = QuantsigError::UnknownStrategy {
            kind: "breakout".into(),
            subtype: Some("donchian".into()),
        };
        assert_eq!(err.to_string(), "unknown strategy: breakout/donchian");

        let err = QuantsigError::UnknownStrategy {
            kind: "martingale".into(),
            subtype: None,
        };
        assert_eq!(err.to_string(), "unknown strategy: martingale");
    }

    #[test]
    fn kinds_follow_taxonomy() {
        assert!(QuantsigError::InvalidGrid {
            reason: "x".into()
        }
        .is_configuration());
        assert_eq!(
            QuantsigError::NoData {
                symbol: "AAPL".into()
            }
            .kind(),
            ErrorKind::Data
        );
        assert_eq!(
            QuantsigError::Io(std::io::Error::other("boom")).kind(),
            ErrorKind::Io
        );
    }
}
