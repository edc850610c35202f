/// Errors surfaced by the filter engine.
///
/// Malformed filter rules never produce an error during evaluation; they
/// degrade to "does not narrow" or "never matches". Only programming errors
/// in the page request and unparseable rule strings are reported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    Configuration { field: &'static str, reason: String },
    Parse(String),
}

impl EngineError {
    pub(crate) fn configuration(field: &'static str, reason: impl Into<String>) -> Self {
        EngineError::Configuration {
            field,
            reason: reason.into(),
        }
    }
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineError::Configuration { field, reason } => {
                write!(f, "Configuration error: {} {}", field, reason)
            }
            EngineError::Parse(msg) => write!(f, "Parse error: {}", msg),
        }
    }
}

impl std::error::Error for EngineError {}
