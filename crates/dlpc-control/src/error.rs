//! Error types for register control and exposure sequencing.

use dlpc_frame::FrameError;
use dlpc_transport::TransportError;

/// Errors that can occur while driving the controller.
#[derive(Debug, thiserror::Error)]
pub enum ControlError {
    /// Register or stream bus failure. Never retried.
    #[error("bus error: {0}")]
    Bus(#[from] TransportError),

    /// Frame could not be built or verified.
    #[error("frame error: {0}")]
    Frame(FrameError),

    /// Caller-supplied configuration rejected before any bus traffic.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),
}

impl ControlError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidConfiguration(msg.into())
    }

    /// Returns true if the controller did not answer on the bus.
    pub fn is_not_responding(&self) -> bool {
        matches!(self, Self::Bus(err) if err.is_not_responding())
    }
}

impl From<FrameError> for ControlError {
    fn from(err: FrameError) -> Self {
        match err {
            FrameError::Transport(err) => Self::Bus(err),
            FrameError::InvalidWindow(_)
            | FrameError::InvalidLength { .. }
            | FrameError::PayloadTooLarge { .. } => Self::InvalidConfiguration(err.to_string()),
            other => Self::Frame(other),
        }
    }
}

/// Convenience alias for control results.
pub type Result<T> = std::result::Result<T, ControlError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_validation_maps_to_invalid_configuration() {
        let err: ControlError = FrameError::InvalidLength {
            len: 3,
            row_bytes: 4,
        }
        .into();
        assert!(matches!(err, ControlError::InvalidConfiguration(_)));
    }

    #[test]
    fn frame_transport_maps_to_bus() {
        let err: ControlError =
            FrameError::Transport(TransportError::NotResponding { address: 27 }).into();
        assert!(err.is_not_responding());
    }

    #[test]
    fn crc_mismatch_stays_a_frame_error() {
        let err: ControlError = FrameError::CrcMismatch {
            expected: 1,
            actual: 2,
        }
        .into();
        assert!(matches!(err, ControlError::Frame(_)));
    }
}
