//! Diagnostics returned alongside state

use crate::error::Error;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

/// One message for the operator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Diagnostic {
    pub severity: Severity,
    pub summary: String,
    pub detail: String,
}

impl Diagnostic {
    pub fn error(summary: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            summary: summary.into(),
            detail: detail.into(),
        }
    }

    pub fn warning(summary: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            summary: summary.into(),
            detail: detail.into(),
        }
    }

    /// Error diagnostic carrying the full error message as detail
    pub fn from_error(summary: impl Into<String>, err: &Error) -> Self {
        Self::error(summary, err.to_string())
    }
}

/// State produced by a mutating lifecycle step, with anything worth reporting.
///
/// A partial update yields both a re-synced state and an error diagnostic.
#[derive(Debug, Clone, PartialEq)]
pub struct Applied<M> {
    pub state: M,
    pub diagnostics: Vec<Diagnostic>,
}

impl<M> Applied<M> {
    /// State with nothing to report
    pub fn clean(state: M) -> Self {
        Self {
            state,
            diagnostics: Vec::new(),
        }
    }

    pub fn with_diagnostics(state: M, diagnostics: Vec<Diagnostic>) -> Self {
        Self { state, diagnostics }
    }

    pub fn has_errors(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|diagnostic| diagnostic.severity == Severity::Error)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics
            .iter()
            .filter(|diagnostic| diagnostic.severity == Severity::Warning)
    }

    pub fn map<N>(self, f: impl FnOnce(M) -> N) -> Applied<N> {
        Applied {
            state: f(self.state),
            diagnostics: self.diagnostics,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_applied_severity_helpers() {
        let applied = Applied::with_diagnostics(
            1,
            vec![
                Diagnostic::warning("Failed to add volumes", "volume 00123 does not exist"),
                Diagnostic::from_error("Failed to update", &Error::remote("set_srp", "busy")),
            ],
        );
        assert!(applied.has_errors());
        assert_eq!(applied.warnings().count(), 1);
        assert_eq!(applied.diagnostics[1].detail, "set_srp failed: busy");

        let mapped = Applied::clean(2).map(|n| n * 10);
        assert_eq!(mapped.state, 20);
        assert!(!mapped.has_errors());
    }

    #[test]
    fn test_severity_serializes_lowercase() {
        let json = serde_json::to_value(Diagnostic::warning("a", "b")).unwrap();
        assert_eq!(json["severity"], "warning");
    }
}
