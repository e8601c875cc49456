use crate::domain::descriptor::LayoutError;
use crate::domain::models::SessionState;
use thiserror::Error;

/// Failures reported by a transport adapter.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// Radio or platform stack not present, or the link to it is gone.
    #[error("bluetooth transport unavailable: {0}")]
    Unavailable(String),

    /// A notification could not be taken without blocking.
    #[error("link busy")]
    Busy,

    /// The stack refused the command.
    #[error("bluetooth stack rejected command: {0}")]
    Rejected(String),

    #[error("bluetooth command timed out")]
    Timeout,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("bluetooth adapter unavailable: {0}")]
    AdapterUnavailable(String),

    #[error("operation not valid while session is {state}")]
    InvalidState { state: SessionState },

    #[error("link busy, report dropped")]
    LinkBusy,

    #[error("HID descriptor does not match report layout: {0}")]
    ConfigurationMismatch(#[from] LayoutError),

    #[error("start cancelled by a concurrent stop")]
    Cancelled,
}

impl From<TransportError> for SessionError {
    fn from(e: TransportError) -> Self {
        match e {
            TransportError::Busy => SessionError::LinkBusy,
            other => SessionError::AdapterUnavailable(other.to_string()),
        }
    }
}
