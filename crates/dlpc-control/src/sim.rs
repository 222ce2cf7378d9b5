//! In-memory stand-in for a DLPC controller.
//!
//! [`SimulatedController`] implements both [`RegisterBus`] and
//! [`StreamBus`] over one shared state, so a clone can be handed to the
//! register side and another to the stream side of a session while the
//! test keeps a third for assertions.
//!
//! Register model: a write to a write address commits to the paired read
//! address. Registers marked stale accept the write but keep reporting the
//! old value, matching controllers whose readback lags. Streamed frames are
//! decoded and their CRC is latched into the CRC result register.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use dlpc_frame::{crc16, crc16_to_wire, decode_frame, DecodedFrame, CRC_SIZE};
use dlpc_transport::{RegisterBus, Result, StreamBus, TransportError};
use tracing::debug;

use crate::mode::OperatingMode;
use crate::registers::{self, DEVICE_ADDRESS};

/// One recorded bus operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BusOp {
    ReadByte { reg: u8 },
    ReadBlock { reg: u8, len: usize },
    WriteByte { reg: u8, value: u8 },
    WriteBlock { reg: u8, data: Vec<u8> },
    Probe,
    Transfer { len: usize },
}

impl BusOp {
    /// The register written by this operation, if it is a write.
    pub fn written_register(&self) -> Option<u8> {
        match self {
            Self::WriteByte { reg, .. } | Self::WriteBlock { reg, .. } => Some(*reg),
            _ => None,
        }
    }
}

#[derive(Debug)]
struct SimState {
    address: u8,
    present: bool,
    registers: HashMap<u8, Vec<u8>>,
    stale: HashSet<u8>,
    failing_writes: HashSet<u8>,
    failing_reads: HashSet<u8>,
    drop_off_after: Option<usize>,
    ignore_mode_writes: bool,
    corrupt_stream: bool,
    log: Vec<BusOp>,
    frames: Vec<DecodedFrame>,
    rejected_frames: usize,
    exposures: usize,
}

impl SimState {
    fn power_on() -> Self {
        let registers = HashMap::from([
            (registers::MODE.read_addr, vec![OperatingMode::ExternalPrint.code()]),
            (registers::TEST_PATTERN.read_addr, vec![0; 6]),
            (registers::EXTERNAL_PRINT_CONFIG.read_addr, vec![0x01, 0x07]),
            (registers::DARK_EXPOSED_FRAMES.read_addr, vec![0; 5]),
            (registers::VIDEO_INTERFACE.read_addr, vec![0x00]),
            (registers::ACTIVE_BUFFER.read_addr, vec![0x00]),
            (registers::FPGA_CONTROL.read_addr, vec![0x01]),
            (registers::CRC_RESULT.read_addr, vec![0x00, 0x00]),
        ]);
        Self {
            address: DEVICE_ADDRESS,
            present: true,
            registers,
            stale: HashSet::new(),
            failing_writes: HashSet::new(),
            failing_reads: HashSet::new(),
            drop_off_after: None,
            ignore_mode_writes: false,
            corrupt_stream: false,
            log: Vec::new(),
            frames: Vec::new(),
            rejected_frames: 0,
            exposures: 0,
        }
    }

    fn check_present(&self) -> Result<()> {
        if self.present {
            Ok(())
        } else {
            Err(TransportError::NotResponding {
                address: self.address,
            })
        }
    }

    fn read(&self, reg: u8, buf: &mut [u8]) -> Result<()> {
        if self.failing_reads.contains(&reg) {
            return Err(TransportError::Timeout);
        }
        buf.fill(0);
        if let Some(value) = self.registers.get(&reg) {
            let n = value.len().min(buf.len());
            buf[..n].copy_from_slice(&value[..n]);
        }
        Ok(())
    }

    fn write(&mut self, reg: u8, data: &[u8]) -> Result<()> {
        if self.failing_writes.contains(&reg) {
            return Err(TransportError::Bus(format!(
                "injected write fault at {reg:#04x}"
            )));
        }
        if registers::DARK_EXPOSED_FRAMES.write_addr == Some(reg) {
            self.exposures += 1;
            if self.drop_off_after.is_some_and(|limit| self.exposures >= limit) {
                self.present = false;
            }
        }
        if self.ignore_mode_writes && registers::MODE.write_addr == Some(reg) {
            return Ok(());
        }
        if self.stale.contains(&reg) {
            return Ok(());
        }
        let target = registers::readback_for(reg).unwrap_or(reg);
        self.registers.insert(target, data.to_vec());
        Ok(())
    }
}

/// Simulated controller. Clones share state.
#[derive(Debug, Clone)]
pub struct SimulatedController {
    state: Rc<RefCell<SimState>>,
}

impl Default for SimulatedController {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedController {
    /// A responsive controller in its power-on state (external print mode).
    pub fn new() -> Self {
        Self {
            state: Rc::new(RefCell::new(SimState::power_on())),
        }
    }

    /// Mark the FPGA control, active buffer and video interface registers as
    /// stale, like real silicon.
    pub fn with_hardware_quirks(self) -> Self {
        for reg in [
            registers::FPGA_CONTROL,
            registers::ACTIVE_BUFFER,
            registers::VIDEO_INTERFACE,
        ] {
            if let Some(addr) = reg.write_addr {
                self.state.borrow_mut().stale.insert(addr);
            }
        }
        self
    }

    /// Writes to `write_addr` are accepted but never reach the readback.
    pub fn with_stale_register(self, write_addr: u8) -> Self {
        self.state.borrow_mut().stale.insert(write_addr);
        self
    }

    /// Set the raw content behind a read address.
    pub fn with_register(self, read_addr: u8, value: &[u8]) -> Self {
        self.set_register(read_addr, value);
        self
    }

    /// Writes to `write_addr` fail with a bus fault.
    pub fn with_failing_write(self, write_addr: u8) -> Self {
        self.state.borrow_mut().failing_writes.insert(write_addr);
        self
    }

    /// Reads from `read_addr` time out.
    pub fn with_failing_read(self, read_addr: u8) -> Self {
        self.state.borrow_mut().failing_reads.insert(read_addr);
        self
    }

    /// The device stops answering on the register bus right after its
    /// `exposures`-th trigger write.
    pub fn dropping_off_after(self, exposures: usize) -> Self {
        self.state.borrow_mut().drop_off_after = Some(exposures);
        self
    }

    /// Mode writes are accepted but the mode never changes.
    pub fn ignoring_mode_writes(self) -> Self {
        self.state.borrow_mut().ignore_mode_writes = true;
        self
    }

    /// Stream transfers arrive with the first byte flipped, so the latched
    /// CRC no longer matches the frame that was sent.
    pub fn with_corrupted_stream(self) -> Self {
        self.state.borrow_mut().corrupt_stream = true;
        self
    }

    /// Simulate the device dropping off (or returning to) the bus.
    pub fn set_present(&self, present: bool) {
        self.state.borrow_mut().present = present;
    }

    pub fn set_register(&self, read_addr: u8, value: &[u8]) {
        self.state
            .borrow_mut()
            .registers
            .insert(read_addr, value.to_vec());
    }

    /// Current content behind a read address (empty if never set).
    pub fn register(&self, read_addr: u8) -> Vec<u8> {
        self.state
            .borrow()
            .registers
            .get(&read_addr)
            .cloned()
            .unwrap_or_default()
    }

    pub fn mode(&self) -> OperatingMode {
        let raw = self.register(registers::MODE.read_addr);
        OperatingMode::from_code(raw.first().copied().unwrap_or(0))
    }

    /// Every bus operation since creation (or the last [`clear_log`](Self::clear_log)).
    pub fn log(&self) -> Vec<BusOp> {
        self.state.borrow().log.clone()
    }

    pub fn clear_log(&self) {
        self.state.borrow_mut().log.clear();
    }

    /// Payloads written to `write_addr`, in order, including writes that
    /// failed with an injected fault.
    pub fn writes_to(&self, write_addr: u8) -> Vec<Vec<u8>> {
        self.state
            .borrow()
            .log
            .iter()
            .filter_map(|op| match op {
                BusOp::WriteByte { reg, value } if *reg == write_addr => Some(vec![*value]),
                BusOp::WriteBlock { reg, data } if *reg == write_addr => Some(data.clone()),
                _ => None,
            })
            .collect()
    }

    /// Frames received intact over the stream bus.
    pub fn frames(&self) -> Vec<DecodedFrame> {
        self.state.borrow().frames.clone()
    }

    /// Stream transfers that did not decode as a valid frame.
    pub fn rejected_frames(&self) -> usize {
        self.state.borrow().rejected_frames
    }

    /// Number of exposure trigger writes received.
    pub fn exposures(&self) -> usize {
        self.state.borrow().exposures
    }
}

impl RegisterBus for SimulatedController {
    fn read_byte(&mut self, reg: u8) -> Result<u8> {
        let mut state = self.state.borrow_mut();
        state.check_present()?;
        state.log.push(BusOp::ReadByte { reg });
        let mut buf = [0u8; 1];
        state.read(reg, &mut buf)?;
        Ok(buf[0])
    }

    fn read_block(&mut self, reg: u8, buf: &mut [u8]) -> Result<()> {
        let mut state = self.state.borrow_mut();
        state.check_present()?;
        state.log.push(BusOp::ReadBlock {
            reg,
            len: buf.len(),
        });
        state.read(reg, buf)
    }

    fn write_byte(&mut self, reg: u8, value: u8) -> Result<()> {
        let mut state = self.state.borrow_mut();
        state.check_present()?;
        state.log.push(BusOp::WriteByte { reg, value });
        state.write(reg, &[value])
    }

    fn write_block(&mut self, reg: u8, data: &[u8]) -> Result<()> {
        let mut state = self.state.borrow_mut();
        state.check_present()?;
        state.log.push(BusOp::WriteBlock {
            reg,
            data: data.to_vec(),
        });
        state.write(reg, data)
    }

    fn probe(&mut self) -> Result<()> {
        let mut state = self.state.borrow_mut();
        state.check_present()?;
        state.log.push(BusOp::Probe);
        Ok(())
    }

    fn address(&self) -> u8 {
        self.state.borrow().address
    }
}

impl StreamBus for SimulatedController {
    fn transfer(&mut self, tx: &[u8]) -> Result<Vec<u8>> {
        let mut state = self.state.borrow_mut();
        state.log.push(BusOp::Transfer { len: tx.len() });

        let mut received = tx.to_vec();
        if state.corrupt_stream {
            if let Some(first) = received.first_mut() {
                *first ^= 0xFF;
            }
        }
        let tx = received.as_slice();
        if tx.len() >= CRC_SIZE {
            let crc = crc16(&tx[..tx.len() - CRC_SIZE]);
            state
                .registers
                .insert(registers::CRC_RESULT.read_addr, crc16_to_wire(crc).to_vec());
        }
        match decode_frame(tx, None) {
            Ok(frame) => state.frames.push(frame),
            Err(err) => {
                debug!(error = %err, len = tx.len(), "simulated controller rejected frame");
                state.rejected_frames += 1;
            }
        }
        Ok(vec![0; tx.len()])
    }
}
