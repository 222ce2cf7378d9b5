use std::path::PathBuf;

/// Errors that can occur on the register or streaming bus.
///
/// Every variant is a bus-level failure. Callers decide whether a retry is
/// safe; nothing in this crate retries on its own.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The target address did not acknowledge (device absent, remote I/O).
    #[error("device at address {address:#04x} did not respond")]
    NotResponding { address: u8 },

    /// The bus transaction did not complete in time.
    #[error("bus transaction timed out")]
    Timeout,

    /// Failed to open the bus device node.
    #[error("failed to open {path}: {source}")]
    Open {
        path: PathBuf,
        source: std::io::Error,
    },

    /// A bus-level fault reported by the driver (arbitration loss, overrun, ...).
    #[error("bus fault: {0}")]
    Bus(String),

    /// An I/O error occurred on the bus handle.
    #[error("bus I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl TransportError {
    /// True when the error means the device is absent or not acknowledging.
    pub fn is_not_responding(&self) -> bool {
        matches!(self, TransportError::NotResponding { .. })
    }
}

pub type Result<T> = std::result::Result<T, TransportError>;
