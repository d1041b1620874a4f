//! Error types with fix suggestions
//!
//! Error code ranges:
//! - DIAG-001-009: Construction errors
//! - DIAG-010-019: Malformed event data
//! - DIAG-020-029: Dispatch errors
//! - DIAG-030-039: Configuration/logging errors

use thiserror::Error;

pub type Result<T> = std::result::Result<T, AnalysisError>;

/// Trait for errors that provide fix suggestions
pub trait FixSuggestion {
    fn fix_suggestion(&self) -> Option<&str>;
}

/// All error variants are part of the public API.
#[derive(Error, Debug)]
pub enum AnalysisError {
    // ═══════════════════════════════════════════
    // CONSTRUCTION ERRORS (001-009)
    // ═══════════════════════════════════════════
    #[error("[DIAG-001] {component} cannot be constructed without {collaborator}")]
    MissingCollaborator {
        component: &'static str,
        collaborator: &'static str,
    },

    // ═══════════════════════════════════════════
    // MALFORMED EVENT DATA (010-019)
    // ═══════════════════════════════════════════
    #[error("[DIAG-010] Resolve operation {operation} completed without a root instance lookup")]
    MissingRootLookup { operation: String },

    #[error("[DIAG-011] Instance lookup graph contains a cycle through component '{component}'")]
    GraphCycle { component: String },

    #[error("[DIAG-012] Root instance lookup already set for resolve operation {operation}")]
    RootAlreadySet { operation: String },

    // ═══════════════════════════════════════════
    // DISPATCH ERRORS (020-029)
    // ═══════════════════════════════════════════
    #[error("[DIAG-020] Handler '{handler}' panicked: {message}")]
    HandlerPanicked { handler: String, message: String },

    // ═══════════════════════════════════════════
    // CONFIGURATION ERRORS (030-039)
    // ═══════════════════════════════════════════
    #[error("[DIAG-030] Invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    #[error("[DIAG-031] Failed to read config file '{path}': {source}")]
    ConfigRead {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("[DIAG-032] Failed to parse config: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("[DIAG-033] Failed to initialize logging: {reason}")]
    LoggingInit { reason: String },
}

impl AnalysisError {
    /// Stable error code (e.g. `DIAG-011`)
    pub fn code(&self) -> &'static str {
        match self {
            Self::MissingCollaborator { .. } => "DIAG-001",
            Self::MissingRootLookup { .. } => "DIAG-010",
            Self::GraphCycle { .. } => "DIAG-011",
            Self::RootAlreadySet { .. } => "DIAG-012",
            Self::HandlerPanicked { .. } => "DIAG-020",
            Self::InvalidConfig { .. } => "DIAG-030",
            Self::ConfigRead { .. } => "DIAG-031",
            Self::ConfigParse(_) => "DIAG-032",
            Self::LoggingInit { .. } => "DIAG-033",
        }
    }
}

impl FixSuggestion for AnalysisError {
    fn fix_suggestion(&self) -> Option<&str> {
        match self {
            Self::MissingCollaborator { .. } => {
                Some("Pass the event bus and log sink to the builder before calling build()")
            }
            Self::MissingRootLookup { .. } => {
                Some("Set the root instance lookup before publishing the completion event")
            }
            Self::GraphCycle { .. } => {
                Some("A lookup was added as a dependency of itself or of one of its dependencies")
            }
            Self::RootAlreadySet { .. } => Some("Complete each resolve operation exactly once"),
            Self::HandlerPanicked { .. } => None,
            Self::InvalidConfig { .. } => Some("short_id_length must be between 1 and 32"),
            Self::ConfigRead { .. } => Some("Check file path and permissions"),
            Self::ConfigParse(_) => Some("Check TOML syntax and field names"),
            Self::LoggingInit { .. } => {
                Some("Check the log filter syntax, and initialize logging only once per process")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_messages_carry_codes() {
        let err = AnalysisError::GraphCycle {
            component: "OrderService".into(),
        };
        assert_eq!(err.code(), "DIAG-011");
        assert!(err.to_string().starts_with("[DIAG-011]"));
        assert!(err.to_string().contains("OrderService"));
    }

    #[test]
    fn missing_collaborator_names_both_sides() {
        let err = AnalysisError::MissingCollaborator {
            component: "EventWriter",
            collaborator: "an event bus",
        };
        let msg = err.to_string();
        assert!(msg.contains("EventWriter"));
        assert!(msg.contains("an event bus"));
        assert!(err.fix_suggestion().is_some());
    }

    #[test]
    fn toml_errors_convert() {
        let parse: std::result::Result<toml::Value, _> = toml::from_str("= nope");
        let err: AnalysisError = parse.unwrap_err().into();
        assert_eq!(err.code(), "DIAG-032");
    }

    #[test]
    fn handler_panics_have_no_generic_fix() {
        let err = AnalysisError::HandlerPanicked {
            handler: "EventWriter".into(),
            message: "boom".into(),
        };
        assert!(err.fix_suggestion().is_none());
    }
}
