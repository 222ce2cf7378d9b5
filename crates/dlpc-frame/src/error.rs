/// Errors that can occur while building, sending, or checking image frames.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The address window does not fit the frame memory.
    #[error("invalid address window: {0}")]
    InvalidWindow(String),

    /// The payload is not a whole number of window rows.
    #[error("payload length {len} is not a non-zero multiple of the window row size ({row_bytes} bytes)")]
    InvalidLength { len: usize, row_bytes: usize },

    /// The payload exceeds the configured maximum size.
    #[error("payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// The frame is shorter than header + metadata + CRC.
    #[error("truncated frame ({len} bytes, need at least {min})")]
    Truncated { len: usize, min: usize },

    /// The frame does not start with the expected command header.
    #[error("unexpected frame header {actual:#04x} (expected {expected:#04x})")]
    UnexpectedHeader { expected: u8, actual: u8 },

    /// The CRC trailer does not match the frame contents.
    #[error("CRC mismatch (frame carries {expected:#06x}, computed {actual:#06x})")]
    CrcMismatch { expected: u16, actual: u16 },

    /// The streaming bus failed.
    #[error("stream transport error: {0}")]
    Transport(#[from] dlpc_transport::TransportError),
}

pub type Result<T> = std::result::Result<T, FrameError>;
