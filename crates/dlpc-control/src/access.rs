//! Register access layer.
//!
//! [`RegisterAccess`] wraps a [`RegisterBus`] with register-level read,
//! write and read-modify-write. Each primitive is one bus transaction and
//! errors surface immediately; nothing here retries.

use std::fmt;

use dlpc_transport::RegisterBus;
use serde::Serialize;
use tracing::warn;

use crate::error::{ControlError, Result};
use crate::events::{AccessKind, RegisterEvent, RegisterObserver, TracingObserver};
use crate::registers::Register;

/// `(old & !mask) | (value & mask)`: bits outside `mask` keep their old value.
pub fn apply_mask(old: u8, mask: u8, value: u8) -> u8 {
    (old & !mask) | (value & mask)
}

/// Result of a read-modify-write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RmwOutcome {
    pub old: u8,
    pub new: u8,
}

impl RmwOutcome {
    pub fn changed(&self) -> bool {
        self.old != self.new
    }
}

/// A readback that did not match what was written.
///
/// Some controller registers do not reflect a write right away. This is a
/// warning, never an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StaleReadback {
    pub register: &'static str,
    pub address: u8,
    pub expected: Vec<u8>,
    pub observed: Vec<u8>,
}

impl fmt::Display for StaleReadback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({:#04x}) reads back {:02x?}, expected {:02x?}",
            self.register, self.address, self.observed, self.expected
        )
    }
}

/// Register-level access to the controller.
pub struct RegisterAccess<B> {
    bus: B,
    observer: Box<dyn RegisterObserver>,
}

impl<B: fmt::Debug> fmt::Debug for RegisterAccess<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisterAccess")
            .field("bus", &self.bus)
            .finish_non_exhaustive()
    }
}

impl<B: RegisterBus> RegisterAccess<B> {
    /// Wrap a bus, logging every access through `tracing`.
    pub fn new(bus: B) -> Self {
        Self::with_observer(bus, TracingObserver)
    }

    pub fn with_observer(bus: B, observer: impl RegisterObserver + 'static) -> Self {
        Self {
            bus,
            observer: Box::new(observer),
        }
    }

    /// Replace the observer; later accesses go to the new one only.
    pub fn set_observer(&mut self, observer: impl RegisterObserver + 'static) {
        self.observer = Box::new(observer);
    }

    /// Check the controller acknowledges its address.
    pub fn probe(&mut self) -> Result<()> {
        self.bus.probe()?;
        Ok(())
    }

    /// Read `reg.width` bytes from the register's read address.
    pub fn read_register(&mut self, reg: &Register) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; reg.width];
        if reg.width == 1 {
            buf[0] = self.bus.read_byte(reg.read_addr)?;
        } else {
            self.bus.read_block(reg.read_addr, &mut buf)?;
        }
        self.emit(reg, reg.read_addr, AccessKind::Read, None, Some(buf.clone()));
        Ok(buf)
    }

    pub fn read_byte(&mut self, reg: &Register) -> Result<u8> {
        let value = self.read_register(reg)?;
        value
            .first()
            .copied()
            .ok_or_else(|| ControlError::invalid(format!("{} has zero width", reg.name)))
    }

    /// Write `data` to the register's write address.
    ///
    /// `data` must be exactly `reg.width` bytes.
    pub fn write_register(&mut self, reg: &Register, data: &[u8]) -> Result<()> {
        let addr = Self::write_addr(reg)?;
        Self::check_width(reg, data)?;
        self.raw_write(reg, addr, data)?;
        self.emit(reg, addr, AccessKind::Write, None, Some(data.to_vec()));
        Ok(())
    }

    pub fn write_byte(&mut self, reg: &Register, value: u8) -> Result<()> {
        self.write_register(reg, &[value])
    }

    /// Write a register whose effect cannot be undone.
    ///
    /// The observer sees the event before the bus write is attempted.
    pub fn write_irreversible(
        &mut self,
        reg: &Register,
        data: &[u8],
        previous: Option<Vec<u8>>,
    ) -> Result<()> {
        let addr = Self::write_addr(reg)?;
        Self::check_width(reg, data)?;
        self.emit(reg, addr, AccessKind::Irreversible, previous, Some(data.to_vec()));
        self.raw_write(reg, addr, data)
    }

    /// Read the register, replace the bits selected by `mask` with those of
    /// `value`, write the result back.
    ///
    /// Only 1-byte registers qualify; wider ones are rejected before any
    /// bus traffic. Multi-byte blocks are written whole with
    /// [`write_register`](Self::write_register).
    pub fn read_modify_write(&mut self, reg: &Register, mask: u8, value: u8) -> Result<RmwOutcome> {
        if reg.width != 1 {
            return Err(ControlError::invalid(format!(
                "read-modify-write needs a 1-byte register, {} is {} bytes",
                reg.name, reg.width
            )));
        }
        let addr = Self::write_addr(reg)?;
        let old = self.bus.read_byte(reg.read_addr)?;
        let new = apply_mask(old, mask, value);
        self.raw_write(reg, addr, &[new])?;
        self.emit(
            reg,
            addr,
            AccessKind::ReadModifyWrite,
            Some(vec![old]),
            Some(vec![new]),
        );
        Ok(RmwOutcome { old, new })
    }

    /// Read the register back and compare with `expected`.
    ///
    /// A mismatch is logged and returned as a warning value.
    pub fn verify_readback(&mut self, reg: &Register, expected: &[u8]) -> Result<Option<StaleReadback>> {
        let observed = self.read_register(reg)?;
        if observed == expected {
            return Ok(None);
        }
        let stale = StaleReadback {
            register: reg.name,
            address: reg.read_addr,
            expected: expected.to_vec(),
            observed,
        };
        warn!(
            register = stale.register,
            address = stale.address,
            expected = ?stale.expected,
            observed = ?stale.observed,
            known_quirk = reg.stale_readback,
            "register readback does not match write"
        );
        Ok(Some(stale))
    }

    pub fn bus(&self) -> &B {
        &self.bus
    }

    pub fn bus_mut(&mut self) -> &mut B {
        &mut self.bus
    }

    pub fn into_inner(self) -> B {
        self.bus
    }

    fn raw_write(&mut self, reg: &Register, addr: u8, data: &[u8]) -> Result<()> {
        if reg.width == 1 {
            self.bus.write_byte(addr, data[0])?;
        } else {
            self.bus.write_block(addr, data)?;
        }
        Ok(())
    }

    fn write_addr(reg: &Register) -> Result<u8> {
        reg.write_addr
            .ok_or_else(|| ControlError::invalid(format!("{} is read-only", reg.name)))
    }

    fn check_width(reg: &Register, data: &[u8]) -> Result<()> {
        if data.len() != reg.width {
            return Err(ControlError::invalid(format!(
                "{} takes {} bytes, got {}",
                reg.name,
                reg.width,
                data.len()
            )));
        }
        Ok(())
    }

    fn emit(
        &mut self,
        reg: &Register,
        address: u8,
        kind: AccessKind,
        old: Option<Vec<u8>>,
        new: Option<Vec<u8>>,
    ) {
        self.observer.on_event(&RegisterEvent {
            register: reg.name,
            address,
            kind,
            old,
            new,
        });
    }
}
