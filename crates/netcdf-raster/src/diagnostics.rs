//! Secondary diagnostic channel for degraded-but-successful outcomes.

use serde::{Deserialize, Serialize};
use tracing::{error, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Warning,
    Failure,
}

/// Area a diagnostic originates from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticDomain {
    Open,
    Georeference,
    Attributes,
    BlockIo,
    Emission,
    Vector,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub domain: DiagnosticDomain,
    pub message: String,
}

/// Collected diagnostics of one dataset.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Diagnostics {
    entries: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn warn(&mut self, domain: DiagnosticDomain, message: impl Into<String>) {
        let message = message.into();
        warn!(domain = ?domain, "{}", message);
        self.entries.push(Diagnostic {
            severity: Severity::Warning,
            domain,
            message,
        });
    }

    pub fn fail(&mut self, domain: DiagnosticDomain, message: impl Into<String>) {
        let message = message.into();
        error!(domain = ?domain, "{}", message);
        self.entries.push(Diagnostic {
            severity: Severity::Failure,
            domain,
            message,
        });
    }

    pub fn extend(&mut self, other: Diagnostics) {
        self.entries.extend(other.entries);
    }

    pub fn entries(&self) -> &[Diagnostic] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Diagnostic> {
        self.entries
            .iter()
            .filter(|d| d.severity == Severity::Warning)
    }

    /// Whether any entry of `domain` mentions `needle`.
    pub fn contains(&self, domain: DiagnosticDomain, needle: &str) -> bool {
        self.entries
            .iter()
            .any(|d| d.domain == domain && d.message.contains(needle))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collects_in_order() {
        let mut diags = Diagnostics::new();
        diags.warn(DiagnosticDomain::Georeference, "unknown grid mapping");
        diags.fail(DiagnosticDomain::Attributes, "fill value rejected");
        assert_eq!(diags.entries().len(), 2);
        assert_eq!(diags.warnings().count(), 1);
        assert!(diags.contains(DiagnosticDomain::Georeference, "grid mapping"));
        assert!(!diags.contains(DiagnosticDomain::Open, "grid mapping"));
    }

    #[test]
    fn test_serializes() {
        let mut diags = Diagnostics::new();
        diags.warn(DiagnosticDomain::BlockIo, "late fill");
        let json = serde_json::to_string(&diags).unwrap();
        assert!(json.contains(r#""severity":"warning""#));
        assert!(json.contains(r#""domain":"block_io""#));
    }
}
