//! Quota-exhaustion detection.
//!
//! The generation service reports its daily creation limit only through
//! free-form error text. [`QuotaDetector`] is the single place that text is
//! inspected; the state machine only ever sees the resulting [`FailureKind`].

use crate::state_machine::FailureKind;

/// Marker the service puts in its daily-limit errors.
pub const DEFAULT_QUOTA_MARKER: &str = "try again later";

/// Case-insensitive substring match against a list of known markers.
#[derive(Debug, Clone)]
pub struct QuotaDetector {
    markers: Vec<String>,
}

impl Default for QuotaDetector {
    fn default() -> Self {
        Self::new([DEFAULT_QUOTA_MARKER])
    }
}

impl QuotaDetector {
    pub fn new<I, S>(markers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            markers: markers
                .into_iter()
                .map(|m| m.as_ref().trim().to_lowercase())
                .filter(|m| !m.is_empty())
                .collect(),
        }
    }

    pub fn is_quota_exhausted(&self, message: &str) -> bool {
        let lower = message.to_lowercase();
        self.markers.iter().any(|m| lower.contains(m.as_str()))
    }

    pub fn classify(&self, message: &str) -> FailureKind {
        if self.is_quota_exhausted(message) {
            FailureKind::QuotaExhausted(message.to_string())
        } else {
            FailureKind::Transient(message.to_string())
        }
    }
}
