use thiserror::Error;

/// Failures surfaced by acquisition, configuration and the alert workflow.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum MonitorError {
    /// Feed unavailable, disconnected, exhausted or timed out. Retry-able.
    #[error("acquisition failed: {0}")]
    AcquisitionFailed(String),
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),
    #[error("malformed waveform: {0}")]
    MalformedWaveform(String),
    #[error("cannot apply {event} while {state}")]
    IllegalTransition {
        state: &'static str,
        event: &'static str,
    },
}

impl MonitorError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, MonitorError::AcquisitionFailed(_))
    }
}
