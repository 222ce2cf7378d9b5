//! Operating mode state machine.
//!
//! The controller reports its mode at the mode read address and accepts
//! requests at the mode write address. Any mode can be requested from any
//! other; a request for the current mode issues no write.

use std::fmt;
use std::str::FromStr;

use dlpc_transport::RegisterBus;
use serde::Serialize;
use tracing::debug;

use crate::access::RegisterAccess;
use crate::error::{ControlError, Result};
use crate::registers::MODE;

/// Controller operating mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperatingMode {
    Standby,
    TestPattern,
    ExternalPrint,
    /// A code the controller reported that is not one of the above.
    Unknown(u8),
}

impl OperatingMode {
    pub const STANDBY_CODE: u8 = 0xFF;
    pub const TEST_PATTERN_CODE: u8 = 0x01;
    pub const EXTERNAL_PRINT_CODE: u8 = 0x06;

    pub fn from_code(code: u8) -> Self {
        match code {
            Self::STANDBY_CODE => Self::Standby,
            Self::TEST_PATTERN_CODE => Self::TestPattern,
            Self::EXTERNAL_PRINT_CODE => Self::ExternalPrint,
            other => Self::Unknown(other),
        }
    }

    pub fn code(self) -> u8 {
        match self {
            Self::Standby => Self::STANDBY_CODE,
            Self::TestPattern => Self::TEST_PATTERN_CODE,
            Self::ExternalPrint => Self::EXTERNAL_PRINT_CODE,
            Self::Unknown(code) => code,
        }
    }

    pub fn is_known(self) -> bool {
        !matches!(self, Self::Unknown(_))
    }
}

impl fmt::Display for OperatingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Standby => f.write_str("standby"),
            Self::TestPattern => f.write_str("test-pattern"),
            Self::ExternalPrint => f.write_str("external-print"),
            Self::Unknown(code) => write!(f, "unknown({code:#04x})"),
        }
    }
}

impl FromStr for OperatingMode {
    type Err = ControlError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().replace('_', "-").as_str() {
            "standby" => Ok(Self::Standby),
            "test-pattern" => Ok(Self::TestPattern),
            "external-print" => Ok(Self::ExternalPrint),
            other => Err(ControlError::invalid(format!("unknown operating mode: {other}"))),
        }
    }
}

impl Serialize for OperatingMode {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Outcome of a mode request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ModeTransition {
    pub from: OperatingMode,
    pub to: OperatingMode,
    /// False when the controller was already in the target mode.
    pub written: bool,
}

/// Reads and requests the controller operating mode.
#[derive(Debug)]
pub struct ModeController<'a, B> {
    regs: &'a mut RegisterAccess<B>,
}

impl<'a, B: RegisterBus> ModeController<'a, B> {
    pub fn new(regs: &'a mut RegisterAccess<B>) -> Self {
        Self { regs }
    }

    /// Fresh read of the mode register.
    pub fn current_mode(&mut self) -> Result<OperatingMode> {
        Ok(OperatingMode::from_code(self.regs.read_byte(&MODE)?))
    }

    /// Request `target`.
    ///
    /// Writes the mode code only when the controller reports a different
    /// mode, and returns without waiting for the transition to complete.
    pub fn request_mode(&mut self, target: OperatingMode) -> Result<ModeTransition> {
        if !target.is_known() {
            return Err(ControlError::invalid(format!("cannot request mode {target}")));
        }
        let from = self.current_mode()?;
        if from == target {
            debug!(mode = %target, "already in requested mode");
            return Ok(ModeTransition {
                from,
                to: target,
                written: false,
            });
        }
        self.regs.write_byte(&MODE, target.code())?;
        Ok(ModeTransition {
            from,
            to: target,
            written: true,
        })
    }
}
