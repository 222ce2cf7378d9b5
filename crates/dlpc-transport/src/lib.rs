//! Bus abstraction for DLPC display controllers.
//!
//! The controller is reached over two independent buses:
//! - a two-wire addressable register bus (I2C / SMBus-style register access)
//! - a four-wire synchronous streaming bus (SPI) carrying image data
//!
//! This is the lowest layer of dlpc. Everything else builds on top of the
//! [`RegisterBus`] and [`StreamBus`] traits provided here.

pub mod error;
pub mod hal;
pub mod traits;

#[cfg(all(feature = "linux", target_os = "linux"))]
pub mod linux;

pub use error::{Result, TransportError};
pub use hal::{I2cRegisterBus, SpiStreamBus, DEFAULT_MAX_CHUNK};
pub use traits::{RegisterBus, StreamBus};

#[cfg(all(feature = "linux", target_os = "linux"))]
pub use linux::{open_i2c, open_spi, LinuxRegisterBus, LinuxStreamBus, SpiSettings};
