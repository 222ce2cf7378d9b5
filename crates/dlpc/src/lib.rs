//! Exposure control for DLPC1438 maskless lithography.
//!
//! # Crate Structure
//!
//! - [`transport`]: register bus (I2C) and stream bus (SPI) abstraction
//! - [`frame`]: CRC16, pixel buffers and image frame encoding
//! - [`control`]: register map, mode control, exposure sequencing

/// Re-export transport types.
pub mod transport {
    pub use dlpc_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use dlpc_frame::*;
}

/// Re-export control types.
pub mod control {
    pub use dlpc_control::*;
}
