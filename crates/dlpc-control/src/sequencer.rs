//! Exposure setup and trigger sequencing.
//!
//! [`ExposureSequencer::prepare_exposure`] brings the controller into a
//! known state: standby, CRC checking on, buffer 0, linear external print
//! configuration. [`ExposureSequencer::trigger_exposure`] writes the
//! dark/exposed frame counts, which starts the exposure. Steps run strictly
//! in order and the first bus error aborts the sequence.

use std::thread;
use std::time::Duration;

use dlpc_frame::{crc16_from_wire, BufferIndex};
use dlpc_transport::RegisterBus;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::access::{RegisterAccess, RmwOutcome, StaleReadback};
use crate::error::{ControlError, Result};
use crate::mode::{ModeController, ModeTransition, OperatingMode};
use crate::registers::{
    Register, ACTIVE_BUFFER, CRC_RESULT, DARK_EXPOSED_FRAMES, EXTERNAL_PRINT_CONFIG,
    FPGA_CONTROL, FPGA_CRC16_ENABLE, TEST_PATTERN, VIDEO_INTERFACE, VIDEO_INTERFACE_ENABLE,
};

/// Largest dark or exposed frame count the controller accepts.
pub const MAX_FRAME_COUNT: u32 = u16::MAX as u32;

/// Sequencer tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SequencerConfig {
    /// Wait after writes whose effect is not visible immediately.
    pub settle_delay: Duration,
    /// Wait between loading the test pattern block and switching mode.
    pub pattern_settle: Duration,
    /// Read quirky registers back after writing them.
    pub verify_readback: bool,
    /// Read the CRC result register after the trigger write.
    pub read_crc_after_trigger: bool,
    /// External print degamma select (0 = linear).
    pub degamma: u8,
    /// External print illuminator enable mask.
    pub illuminator_mask: u8,
}

impl Default for SequencerConfig {
    fn default() -> Self {
        Self {
            settle_delay: Duration::from_secs(1),
            pattern_settle: Duration::from_millis(300),
            verify_readback: true,
            read_crc_after_trigger: true,
            degamma: 0x00,
            illuminator_mask: 0x00,
        }
    }
}

impl SequencerConfig {
    /// Default configuration with no delays.
    pub fn immediate() -> Self {
        Self {
            settle_delay: Duration::ZERO,
            pattern_settle: Duration::ZERO,
            ..Self::default()
        }
    }
}

/// Dark and exposed frame counts for one exposure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExposureConfig {
    pub dark_frames: u32,
    pub exposed_frames: u32,
    /// Print settings byte; `None` keeps the value the controller reports.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub print_settings: Option<u8>,
}

impl ExposureConfig {
    pub fn new(dark_frames: u32, exposed_frames: u32) -> Self {
        Self {
            dark_frames,
            exposed_frames,
            print_settings: None,
        }
    }

    pub fn with_print_settings(mut self, print_settings: u8) -> Self {
        self.print_settings = Some(print_settings);
        self
    }

    /// Both counts as 16-bit values.
    pub fn validate(&self) -> Result<(u16, u16)> {
        let narrow = |name: &str, count: u32| {
            u16::try_from(count).map_err(|_| {
                ControlError::invalid(format!(
                    "{name} frame count {count} exceeds {MAX_FRAME_COUNT}"
                ))
            })
        };
        Ok((
            narrow("dark", self.dark_frames)?,
            narrow("exposed", self.exposed_frames)?,
        ))
    }

    /// Trigger payload: `[print, dark hi, dark lo, exposed hi, exposed lo]`.
    pub fn encode(&self, print_settings: u8) -> Result<[u8; 5]> {
        let (dark, exposed) = self.validate()?;
        let [dark_hi, dark_lo] = dark.to_be_bytes();
        let [exp_hi, exp_lo] = exposed.to_be_bytes();
        Ok([print_settings, dark_hi, dark_lo, exp_hi, exp_lo])
    }
}

/// Test pattern generator configuration block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestPatternConfig {
    pub bytes: [u8; 6],
}

impl Default for TestPatternConfig {
    /// Line pattern with 8-pixel spacing.
    fn default() -> Self {
        Self {
            bytes: [0b1000_0110, 0x00, 0x08, 0x08, 0x08, 0x08],
        }
    }
}

/// One read-modify-write step with its readback check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepOutcome {
    #[serde(flatten)]
    pub rmw: RmwOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<StaleReadback>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PrepareReport {
    pub mode: ModeTransition,
    pub crc_enable: StepOutcome,
    pub active_buffer: StepOutcome,
    pub print_config: [u8; 2],
}

impl PrepareReport {
    pub fn warnings(&self) -> Vec<&StaleReadback> {
        [&self.crc_enable, &self.active_buffer]
            .into_iter()
            .filter_map(|step| step.warning.as_ref())
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TriggerReport {
    /// Dark/exposed block before the trigger.
    pub previous: Vec<u8>,
    /// Bytes written to start the exposure.
    pub payload: [u8; 5],
    /// CRC result read after the trigger, if requested.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub crc: Option<u16>,
    /// Why the CRC read after the trigger failed. The exposure still ran.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub crc_error: Option<String>,
}

/// Drives the controller through exposure setup and trigger.
#[derive(Debug)]
pub struct ExposureSequencer<B> {
    regs: RegisterAccess<B>,
    config: SequencerConfig,
}

impl<B: RegisterBus> ExposureSequencer<B> {
    pub fn new(regs: RegisterAccess<B>) -> Self {
        Self::with_config(regs, SequencerConfig::default())
    }

    pub fn with_config(regs: RegisterAccess<B>, config: SequencerConfig) -> Self {
        Self { regs, config }
    }

    pub fn config(&self) -> &SequencerConfig {
        &self.config
    }

    pub fn registers(&mut self) -> &mut RegisterAccess<B> {
        &mut self.regs
    }

    pub fn into_inner(self) -> RegisterAccess<B> {
        self.regs
    }

    pub fn modes(&mut self) -> ModeController<'_, B> {
        ModeController::new(&mut self.regs)
    }

    pub fn current_mode(&mut self) -> Result<OperatingMode> {
        self.modes().current_mode()
    }

    pub fn request_mode(&mut self, target: OperatingMode) -> Result<ModeTransition> {
        self.modes().request_mode(target)
    }

    /// Sleep for the configured settle delay.
    pub fn settle(&self) {
        pause(self.config.settle_delay);
    }

    /// Bring the controller into a known state ready for streaming.
    ///
    /// The controller is left in standby.
    pub fn prepare_exposure(&mut self) -> Result<PrepareReport> {
        info!("preparing exposure");
        let mode = self.request_mode(OperatingMode::Standby)?;
        let crc_enable = self.enable_crc16()?;
        let active_buffer = self.set_active_buffer(BufferIndex::Zero)?;
        let print_config = self.configure_external_print()?;

        let report = PrepareReport {
            mode,
            crc_enable,
            active_buffer,
            print_config,
        };
        info!(warnings = report.warnings().len(), "exposure prepared");
        Ok(report)
    }

    /// Turn on CRC16 checking of the image stream.
    pub fn enable_crc16(&mut self) -> Result<StepOutcome> {
        self.rmw_step(&FPGA_CONTROL, FPGA_CRC16_ENABLE, FPGA_CRC16_ENABLE)
    }

    /// Select the image buffer the controller displays.
    pub fn set_active_buffer(&mut self, index: BufferIndex) -> Result<StepOutcome> {
        self.rmw_step(&ACTIVE_BUFFER, 0xFF, index.as_u8())
    }

    /// Turn on the parallel video interface.
    pub fn enable_video_interface(&mut self) -> Result<StepOutcome> {
        self.rmw_step(&VIDEO_INTERFACE, VIDEO_INTERFACE_ENABLE, VIDEO_INTERFACE_ENABLE)
    }

    /// Write the external print configuration (degamma, illuminator mask).
    pub fn configure_external_print(&mut self) -> Result<[u8; 2]> {
        let value = [self.config.degamma, self.config.illuminator_mask];
        self.regs.write_register(&EXTERNAL_PRINT_CONFIG, &value)?;
        Ok(value)
    }

    /// Write the test pattern block and switch to test pattern mode.
    pub fn configure_test_pattern(&mut self, pattern: &TestPatternConfig) -> Result<ModeTransition> {
        self.regs.write_register(&TEST_PATTERN, &pattern.bytes)?;
        pause(self.config.pattern_settle);
        self.request_mode(OperatingMode::TestPattern)
    }

    /// CRC16 the controller computed over the last image stream.
    pub fn read_crc(&mut self) -> Result<u16> {
        let raw = self.regs.read_register(&CRC_RESULT)?;
        match raw.as_slice() {
            [lo, hi] => Ok(crc16_from_wire([*lo, *hi])),
            _ => Err(ControlError::invalid(format!(
                "crc result is {} bytes",
                raw.len()
            ))),
        }
    }

    /// Start an exposure.
    ///
    /// Counts are validated before any bus traffic. The trigger write is
    /// issued once and never retried. Once it succeeds this returns `Ok`;
    /// a failed CRC read afterwards lands in [`TriggerReport::crc_error`].
    pub fn trigger_exposure(&mut self, config: &ExposureConfig) -> Result<TriggerReport> {
        config.validate()?;
        let previous = self.regs.read_register(&DARK_EXPOSED_FRAMES)?;
        let print_settings = config
            .print_settings
            .or_else(|| previous.first().copied())
            .unwrap_or_default();
        let payload = config.encode(print_settings)?;

        info!(
            dark_frames = config.dark_frames,
            exposed_frames = config.exposed_frames,
            print_settings,
            "triggering exposure"
        );
        self.regs
            .write_irreversible(&DARK_EXPOSED_FRAMES, &payload, Some(previous.clone()))?;

        let mut report = TriggerReport {
            previous,
            payload,
            crc: None,
            crc_error: None,
        };
        if self.config.read_crc_after_trigger {
            self.settle();
            match self.read_crc() {
                Ok(crc) => {
                    debug!(crc, "controller crc after trigger");
                    report.crc = Some(crc);
                }
                Err(err) => {
                    warn!(error = %err, "crc read after trigger failed; exposure was started");
                    report.crc_error = Some(err.to_string());
                }
            }
        }
        Ok(report)
    }

    fn rmw_step(&mut self, reg: &Register, mask: u8, value: u8) -> Result<StepOutcome> {
        let rmw = self.regs.read_modify_write(reg, mask, value)?;
        self.settle();
        let warning = if self.config.verify_readback {
            self.regs.verify_readback(reg, &[rmw.new])?
        } else {
            None
        };
        Ok(StepOutcome { rmw, warning })
    }
}

fn pause(delay: Duration) {
    if !delay.is_zero() {
        thread::sleep(delay);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventLog;
    use crate::sim::{BusOp, SimulatedController};

    fn sequencer(sim: &SimulatedController) -> ExposureSequencer<SimulatedController> {
        ExposureSequencer::with_config(
            RegisterAccess::new(sim.clone()),
            SequencerConfig::immediate(),
        )
    }

    #[test]
    fn count_encoding_is_big_endian() {
        let payload = ExposureConfig::new(32, 512).encode(0x5A).unwrap();
        assert_eq!(payload, [0x5A, 0x00, 0x20, 0x02, 0x00]);
    }

    #[test]
    fn count_boundaries() {
        assert_eq!(
            ExposureConfig::new(65535, 65535).encode(0).unwrap(),
            [0, 0xFF, 0xFF, 0xFF, 0xFF]
        );
        for config in [ExposureConfig::new(65536, 0), ExposureConfig::new(0, 65536)] {
            assert!(matches!(
                config.validate(),
                Err(ControlError::InvalidConfiguration(_))
            ));
        }
    }

    #[test]
    fn prepare_from_unknown_mode() {
        let sim = SimulatedController::new()
            .with_register(0x06, &[0x42])
            .with_register(0xCB, &[0b0000_1001])
            .with_register(0xC6, &[0x01]);
        let report = sequencer(&sim).prepare_exposure().unwrap();

        assert_eq!(report.mode.from, OperatingMode::Unknown(0x42));
        assert!(report.mode.written);
        assert_eq!(sim.mode(), OperatingMode::Standby);
        assert_eq!(sim.register(0xCB), vec![0b0000_1101]);
        assert_eq!(sim.register(0xC6), vec![0x00]);
        assert_eq!(sim.writes_to(0xA8), vec![vec![0x00, 0x00]]);
        assert!(report.warnings().is_empty());
        assert!(sim.writes_to(0xC1).is_empty());
    }

    #[test]
    fn prepare_steps_run_in_order() {
        let sim = SimulatedController::new();
        sequencer(&sim).prepare_exposure().unwrap();
        let writes: Vec<u8> = sim.log().iter().filter_map(BusOp::written_register).collect();
        assert_eq!(writes, vec![0x05, 0xCA, 0xC5, 0xA8]);
    }

    #[test]
    fn stale_readback_is_a_warning() {
        let sim = SimulatedController::new()
            .with_hardware_quirks()
            .with_register(0xC6, &[0xC6]);
        let report = sequencer(&sim).prepare_exposure().unwrap();

        let warned: Vec<_> = report.warnings().iter().map(|w| w.register).collect();
        assert_eq!(warned, vec!["fpga_control", "active_buffer"]);
        assert_eq!(sim.writes_to(0xCA).len(), 1);
        assert_eq!(sim.writes_to(0xC5).len(), 1);
    }

    #[test]
    fn readback_check_can_be_disabled() {
        let sim = SimulatedController::new().with_hardware_quirks();
        let config = SequencerConfig {
            verify_readback: false,
            ..SequencerConfig::immediate()
        };
        let mut seq = ExposureSequencer::with_config(RegisterAccess::new(sim.clone()), config);
        let step = seq.enable_crc16().unwrap();
        assert!(step.warning.is_none());
        assert_eq!(sim.log().len(), 2);
    }

    #[test]
    fn bus_error_aborts_prepare() {
        let sim = SimulatedController::new().with_failing_write(0xCA);
        let err = sequencer(&sim).prepare_exposure().unwrap_err();
        assert!(matches!(err, ControlError::Bus(_)));
        assert!(sim.writes_to(0xC5).is_empty());
        assert!(sim.writes_to(0xA8).is_empty());
    }

    #[test]
    fn trigger_writes_once_and_keeps_print_settings() {
        let sim = SimulatedController::new().with_register(0xC2, &[0x5A, 0, 0, 0, 0]);
        let log = EventLog::new();
        let mut seq = ExposureSequencer::with_config(
            RegisterAccess::with_observer(sim.clone(), log.clone()),
            SequencerConfig::immediate(),
        );
        let report = seq.trigger_exposure(&ExposureConfig::new(32, 512)).unwrap();

        assert_eq!(report.payload, [0x5A, 0x00, 0x20, 0x02, 0x00]);
        assert_eq!(report.previous, vec![0x5A, 0, 0, 0, 0]);
        assert_eq!(sim.writes_to(0xC1), vec![vec![0x5A, 0x00, 0x20, 0x02, 0x00]]);
        assert_eq!(sim.exposures(), 1);
        assert_eq!(log.writes_to(0xC1), 1);
    }

    #[test]
    fn trigger_print_settings_override() {
        let sim = SimulatedController::new().with_register(0xC2, &[0x5A, 0, 0, 0, 0]);
        let report = sequencer(&sim)
            .trigger_exposure(&ExposureConfig::new(1, 2).with_print_settings(0x03))
            .unwrap();
        assert_eq!(report.payload, [0x03, 0x00, 0x01, 0x00, 0x02]);
    }

    #[test]
    fn invalid_counts_issue_no_bus_traffic() {
        let sim = SimulatedController::new();
        let err = sequencer(&sim)
            .trigger_exposure(&ExposureConfig::new(65536, 1))
            .unwrap_err();
        assert!(matches!(err, ControlError::InvalidConfiguration(_)));
        assert!(sim.log().is_empty());
    }

    #[test]
    fn failed_trigger_is_not_retried() {
        let sim = SimulatedController::new().with_failing_write(0xC1);
        let err = sequencer(&sim)
            .trigger_exposure(&ExposureConfig::new(1, 1))
            .unwrap_err();
        assert!(matches!(err, ControlError::Bus(_)));
        let attempts = sim
            .log()
            .iter()
            .filter(|op| op.written_register() == Some(0xC1))
            .count();
        assert_eq!(attempts, 1);
        assert_eq!(sim.exposures(), 0);
    }

    #[test]
    fn crc_read_after_trigger() {
        let sim = SimulatedController::new().with_register(0xCE, &[0x34, 0x12]);
        let report = sequencer(&sim)
            .trigger_exposure(&ExposureConfig::new(0, 1))
            .unwrap();
        assert_eq!(report.crc, Some(0x1234));

        let sim = SimulatedController::new();
        let config = SequencerConfig {
            read_crc_after_trigger: false,
            ..SequencerConfig::immediate()
        };
        let mut seq = ExposureSequencer::with_config(RegisterAccess::new(sim.clone()), config);
        let report = seq.trigger_exposure(&ExposureConfig::new(0, 1)).unwrap();
        assert_eq!(report.crc, None);
        assert!(!sim.log().contains(&BusOp::ReadBlock { reg: 0xCE, len: 2 }));
    }

    #[test]
    fn crc_read_failure_after_trigger_still_reports_exposure() {
        let sim = SimulatedController::new().with_failing_read(0xCE);
        let report = sequencer(&sim)
            .trigger_exposure(&ExposureConfig::new(32, 512))
            .unwrap();

        assert_eq!(sim.exposures(), 1);
        assert_eq!(report.payload, [0x00, 0x00, 0x20, 0x02, 0x00]);
        assert_eq!(report.crc, None);
        assert!(report.crc_error.is_some());
        assert_eq!(sim.writes_to(0xC1).len(), 1);
    }

    #[test]
    fn video_interface_and_buffer_select() {
        let sim = SimulatedController::new().with_register(0xC4, &[0b1000_0000]);
        let mut seq = sequencer(&sim);
        let video = seq.enable_video_interface().unwrap();
        assert_eq!(video.rmw.new, 0b1000_0001);
        let buffer = seq.set_active_buffer(BufferIndex::One).unwrap();
        assert_eq!(buffer.rmw.new, 0x01);
        assert_eq!(sim.register(0xC6), vec![0x01]);
    }

    #[test]
    fn test_pattern_writes_block_then_mode() {
        let sim = SimulatedController::new();
        let transition = sequencer(&sim)
            .configure_test_pattern(&TestPatternConfig::default())
            .unwrap();
        assert_eq!(transition.to, OperatingMode::TestPattern);
        assert_eq!(
            sim.writes_to(0x0B),
            vec![vec![0b1000_0110, 0, 8, 8, 8, 8]]
        );
        assert_eq!(sim.mode(), OperatingMode::TestPattern);
    }

    #[test]
    fn test_pattern_waits_before_mode_switch() {
        let sim = SimulatedController::new();
        let config = SequencerConfig {
            pattern_settle: Duration::from_millis(20),
            ..SequencerConfig::immediate()
        };
        let mut seq = ExposureSequencer::with_config(RegisterAccess::new(sim.clone()), config);
        let started = std::time::Instant::now();
        seq.configure_test_pattern(&TestPatternConfig::default())
            .unwrap();
        assert!(started.elapsed() >= Duration::from_millis(20));

        let writes: Vec<u8> = sim.log().iter().filter_map(BusOp::written_register).collect();
        assert_eq!(writes, vec![0x0B, 0x05]);
    }
}
