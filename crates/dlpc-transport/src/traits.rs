use crate::error::Result;

/// Addressable register bus (two-wire, SMBus-style).
///
/// The device address is bound when the bus handle is created; every method
/// takes only the register address. Each call is exactly one bus transaction.
pub trait RegisterBus {
    /// Read a single byte from register `reg`.
    fn read_byte(&mut self, reg: u8) -> Result<u8>;

    /// Read `buf.len()` bytes starting at register `reg`.
    fn read_block(&mut self, reg: u8, buf: &mut [u8]) -> Result<()>;

    /// Write a single byte to register `reg`.
    fn write_byte(&mut self, reg: u8, value: u8) -> Result<()>;

    /// Write `data` as one block starting at register `reg`.
    fn write_block(&mut self, reg: u8, data: &[u8]) -> Result<()>;

    /// Check that the device acknowledges its address.
    ///
    /// Sends a single dummy zero byte. A missing device surfaces as
    /// [`TransportError::NotResponding`](crate::TransportError::NotResponding).
    fn probe(&mut self) -> Result<()>;

    /// The 7-bit device address this handle talks to.
    fn address(&self) -> u8;
}

/// Full-duplex synchronous streaming bus (four-wire, SPI).
pub trait StreamBus {
    /// Clock out `tx` as a single transaction and return the bytes clocked in.
    ///
    /// The returned vector has the same length as `tx`. Splitting large
    /// transfers into driver-sized chunks is the implementation's job.
    fn transfer(&mut self, tx: &[u8]) -> Result<Vec<u8>>;
}

impl<T: RegisterBus + ?Sized> RegisterBus for &mut T {
    fn read_byte(&mut self, reg: u8) -> Result<u8> {
        (**self).read_byte(reg)
    }

    fn read_block(&mut self, reg: u8, buf: &mut [u8]) -> Result<()> {
        (**self).read_block(reg, buf)
    }

    fn write_byte(&mut self, reg: u8, value: u8) -> Result<()> {
        (**self).write_byte(reg, value)
    }

    fn write_block(&mut self, reg: u8, data: &[u8]) -> Result<()> {
        (**self).write_block(reg, data)
    }

    fn probe(&mut self) -> Result<()> {
        (**self).probe()
    }

    fn address(&self) -> u8 {
        (**self).address()
    }
}

impl<T: RegisterBus + ?Sized> RegisterBus for Box<T> {
    fn read_byte(&mut self, reg: u8) -> Result<u8> {
        (**self).read_byte(reg)
    }

    fn read_block(&mut self, reg: u8, buf: &mut [u8]) -> Result<()> {
        (**self).read_block(reg, buf)
    }

    fn write_byte(&mut self, reg: u8, value: u8) -> Result<()> {
        (**self).write_byte(reg, value)
    }

    fn write_block(&mut self, reg: u8, data: &[u8]) -> Result<()> {
        (**self).write_block(reg, data)
    }

    fn probe(&mut self) -> Result<()> {
        (**self).probe()
    }

    fn address(&self) -> u8 {
        (**self).address()
    }
}

impl<T: StreamBus + ?Sized> StreamBus for &mut T {
    fn transfer(&mut self, tx: &[u8]) -> Result<Vec<u8>> {
        (**self).transfer(tx)
    }
}

impl<T: StreamBus + ?Sized> StreamBus for Box<T> {
    fn transfer(&mut self, tx: &[u8]) -> Result<Vec<u8>> {
        (**self).transfer(tx)
    }
}
