//! Load/validation diagnostics
//!
//! Diagnostics are accumulated across the whole corpus and reported as one
//! deterministic list, sorted by model name then field path.

use std::fmt;

/// Diagnostic severity. Errors block generation; warnings do not.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Warning,
    Error,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Warning => "warning",
            Severity::Error => "error",
        }
    }
}

/// A single load or validation finding
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub severity: Severity,
    /// Model the finding belongs to (file stem for pre-merge load failures)
    pub model: String,
    /// Offending field path, e.g. `columns[3].reference_table`
    pub path: String,
    pub message: String,
}

impl Diagnostic {
    pub fn error(model: impl Into<String>, path: impl Into<String>, message: impl Into<String>) -> Self {
        Diagnostic {
            severity: Severity::Error,
            model: model.into(),
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn warning(
        model: impl Into<String>,
        path: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Diagnostic {
            severity: Severity::Warning,
            model: model.into(),
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }

    /// Deterministic report ordering: model name, then field path.
    pub fn sort_key(&self) -> (&str, &str, &str) {
        (&self.model, &self.path, &self.message)
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.path.is_empty() {
            write!(f, "{}: {}: {}", self.severity.as_str(), self.model, self.message)
        } else {
            write!(
                f,
                "{}: {}: {}: {}",
                self.severity.as_str(),
                self.model,
                self.path,
                self.message
            )
        }
    }
}

/// Sort diagnostics into report order.
pub fn sort_diagnostics(diagnostics: &mut [Diagnostic]) {
    diagnostics.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
}

/// Whether any diagnostic blocks generation.
pub fn has_errors(diagnostics: &[Diagnostic]) -> bool {
    diagnostics.iter().any(Diagnostic::is_error)
}
