use serde::{Deserialize, Serialize};

/// Severity of a GPU driver message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Notification,
    Low,
    Medium,
    High,
}

/// Drops driver messages below a severity threshold.
///
/// Reported messages are logged and never abort the frame loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiagnosticFilter {
    pub threshold: Severity,
}

impl Default for DiagnosticFilter {
    fn default() -> Self {
        Self {
            threshold: Severity::High,
        }
    }
}

impl DiagnosticFilter {
    pub fn new(threshold: Severity) -> Self {
        Self { threshold }
    }

    pub fn should_report(&self, severity: Severity) -> bool {
        severity >= self.threshold
    }

    /// Log `message` if it passes the threshold. Returns whether it was logged.
    pub fn report(&self, severity: Severity, source: &str, message: &str) -> bool {
        if !self.should_report(severity) {
            return false;
        }
        match severity {
            Severity::High => tracing::error!(source, ?severity, "{message}"),
            _ => tracing::warn!(source, ?severity, "{message}"),
        }
        true
    }
}
