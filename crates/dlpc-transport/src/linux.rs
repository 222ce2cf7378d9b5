//! Linux bus backends (`/dev/i2c-*`, `/dev/spidev*`).

use std::path::Path;

use linux_embedded_hal::spidev::{SpiModeFlags, SpidevOptions};
use linux_embedded_hal::{I2cdev, SpidevDevice};
use tracing::info;

use crate::error::{Result, TransportError};
use crate::hal::{I2cRegisterBus, SpiStreamBus, DEFAULT_MAX_CHUNK};

/// Register bus backed by a Linux I2C character device.
pub type LinuxRegisterBus = I2cRegisterBus<I2cdev>;

/// Streaming bus backed by a Linux spidev device.
pub type LinuxStreamBus = SpiStreamBus<SpidevDevice>;

/// Clock and framing settings for the streaming bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpiSettings {
    /// SCLK frequency in Hz.
    pub max_speed_hz: u32,
    /// SPI mode 0..=3 (CPOL/CPHA).
    pub mode: u8,
    /// Largest chunk handed to the kernel in one operation.
    pub max_chunk: usize,
}

impl Default for SpiSettings {
    fn default() -> Self {
        Self {
            max_speed_hz: 1_000_000,
            mode: 0,
            max_chunk: DEFAULT_MAX_CHUNK,
        }
    }
}

/// Open an I2C character device and bind it to `address`.
pub fn open_i2c(path: impl AsRef<Path>, address: u8) -> Result<LinuxRegisterBus> {
    let path = path.as_ref();
    let dev = I2cdev::new(path).map_err(|err| TransportError::Open {
        path: path.to_path_buf(),
        source: std::io::Error::other(format!("{err:?}")),
    })?;
    info!(?path, address, "opened register bus");
    Ok(I2cRegisterBus::new(dev, address))
}

/// Open and configure a spidev device.
pub fn open_spi(path: impl AsRef<Path>, settings: SpiSettings) -> Result<LinuxStreamBus> {
    let path = path.as_ref();
    let mut dev = SpidevDevice::open(path).map_err(|err| TransportError::Open {
        path: path.to_path_buf(),
        source: std::io::Error::other(format!("{err:?}")),
    })?;

    let mode = match settings.mode {
        0 => SpiModeFlags::SPI_MODE_0,
        1 => SpiModeFlags::SPI_MODE_1,
        2 => SpiModeFlags::SPI_MODE_2,
        3 => SpiModeFlags::SPI_MODE_3,
        other => {
            return Err(TransportError::Bus(format!(
                "invalid SPI mode {other} (expected 0..=3)"
            )))
        }
    };
    let options = SpidevOptions::new()
        .bits_per_word(8)
        .max_speed_hz(settings.max_speed_hz)
        .mode(mode)
        .build();
    dev.0.configure(&options).map_err(|err| TransportError::Open {
        path: path.to_path_buf(),
        source: err,
    })?;

    info!(?path, hz = settings.max_speed_hz, mode = settings.mode, "opened streaming bus");
    Ok(SpiStreamBus::with_max_chunk(dev, settings.max_chunk))
}
