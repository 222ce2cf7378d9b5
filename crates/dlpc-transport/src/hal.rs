//! Adapters from `embedded-hal` 1.0 bus traits to [`RegisterBus`] / [`StreamBus`].
//!
//! - [`I2cRegisterBus`] turns any blocking `I2c` implementation into an
//!   SMBus-style register bus bound to one device address.
//! - [`SpiStreamBus`] turns any blocking `SpiDevice` into a streaming bus that
//!   keeps chip-select asserted across driver-sized chunks.

use embedded_hal::i2c::{self, I2c};
use embedded_hal::spi::{self, Operation, SpiDevice};
use tracing::trace;

use crate::error::{Result, TransportError};
use crate::traits::{RegisterBus, StreamBus};

/// Default largest single SPI chunk (Linux `spidev` default `bufsiz`).
pub const DEFAULT_MAX_CHUNK: usize = 4096;

/// Register bus over an `embedded-hal` I2C implementation.
pub struct I2cRegisterBus<I> {
    i2c: I,
    address: u8,
}

impl<I: I2c> I2cRegisterBus<I> {
    /// Bind an I2C bus to a 7-bit device address.
    pub fn new(i2c: I, address: u8) -> Self {
        Self { i2c, address }
    }

    /// Release the underlying I2C bus.
    pub fn free(self) -> I {
        self.i2c
    }
}

impl<I: I2c> RegisterBus for I2cRegisterBus<I> {
    fn read_byte(&mut self, reg: u8) -> Result<u8> {
        let mut buf = [0u8; 1];
        self.read_block(reg, &mut buf)?;
        Ok(buf[0])
    }

    fn read_block(&mut self, reg: u8, buf: &mut [u8]) -> Result<()> {
        let address = self.address;
        trace!(address, reg, len = buf.len(), "i2c read");
        self.i2c
            .write_read(address, &[reg], buf)
            .map_err(|err| i2c_error(address, err))
    }

    fn write_byte(&mut self, reg: u8, value: u8) -> Result<()> {
        let address = self.address;
        trace!(address, reg, value, "i2c write byte");
        self.i2c
            .write(address, &[reg, value])
            .map_err(|err| i2c_error(address, err))
    }

    fn write_block(&mut self, reg: u8, data: &[u8]) -> Result<()> {
        let address = self.address;
        trace!(address, reg, len = data.len(), "i2c write block");
        // SMBus block writes carry the command byte and payload in one message.
        let mut message = Vec::with_capacity(data.len() + 1);
        message.push(reg);
        message.extend_from_slice(data);
        self.i2c
            .write(address, &message)
            .map_err(|err| i2c_error(address, err))
    }

    fn probe(&mut self) -> Result<()> {
        let address = self.address;
        self.i2c
            .write(address, &[0x00])
            .map_err(|err| i2c_error(address, err))
    }

    fn address(&self) -> u8 {
        self.address
    }
}

fn i2c_error<E: i2c::Error>(address: u8, err: E) -> TransportError {
    match err.kind() {
        i2c::ErrorKind::NoAcknowledge(_) => TransportError::NotResponding { address },
        kind => TransportError::Bus(format!("{kind}: {err:?}")),
    }
}

/// Streaming bus over an `embedded-hal` SPI device.
pub struct SpiStreamBus<S> {
    spi: S,
    max_chunk: usize,
}

impl<S: SpiDevice> SpiStreamBus<S> {
    /// Wrap an SPI device using [`DEFAULT_MAX_CHUNK`].
    pub fn new(spi: S) -> Self {
        Self::with_max_chunk(spi, DEFAULT_MAX_CHUNK)
    }

    /// Wrap an SPI device with an explicit per-operation chunk limit.
    pub fn with_max_chunk(spi: S, max_chunk: usize) -> Self {
        Self {
            spi,
            max_chunk: max_chunk.max(1),
        }
    }

    /// Largest number of bytes handed to the driver in one operation.
    pub fn max_chunk(&self) -> usize {
        self.max_chunk
    }

    /// Release the underlying SPI device.
    pub fn free(self) -> S {
        self.spi
    }
}

impl<S: SpiDevice> StreamBus for SpiStreamBus<S> {
    fn transfer(&mut self, tx: &[u8]) -> Result<Vec<u8>> {
        let mut buf = tx.to_vec();
        {
            // One transaction: chip-select stays asserted across every chunk.
            let mut ops: Vec<Operation<'_, u8>> = buf
                .chunks_mut(self.max_chunk)
                .map(Operation::TransferInPlace)
                .collect();
            trace!(len = tx.len(), chunks = ops.len(), "spi transfer");
            self.spi.transaction(&mut ops).map_err(spi_error)?;
        }
        Ok(buf)
    }
}

fn spi_error<E: spi::Error>(err: E) -> TransportError {
    TransportError::Bus(format!("{}: {err:?}", err.kind()))
}
