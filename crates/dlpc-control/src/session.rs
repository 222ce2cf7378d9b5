//! Full exposure cycles.
//!
//! [`ExposureSession`] owns both buses and runs the complete cycle for each
//! frame: stream the image into the write buffer, advance the buffer index,
//! enable the video interface, switch to external print, settle, trigger.
//! Consecutive exposures alternate between the two image buffers.

use dlpc_frame::{AddressWindow, BufferIndex, DeviceResponse, FrameWriter, PixelBuffer};
use dlpc_transport::{RegisterBus, StreamBus};
use serde::Serialize;
use tracing::{info, warn};

use crate::error::{ControlError, Result};
use crate::mode::{ModeTransition, OperatingMode};
use crate::sequencer::{
    ExposureConfig, ExposureSequencer, PrepareReport, StepOutcome, TriggerReport,
};

/// What happened during one exposure cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExposureReport {
    /// Buffer the frame was written into.
    pub buffer: u8,
    pub frame_crc: u16,
    pub frame_len: usize,
    pub rows: usize,
    pub buffer_switch: StepOutcome,
    pub video_interface: StepOutcome,
    pub mode: ModeTransition,
    pub trigger: TriggerReport,
    /// Whether the controller CRC matched the frame CRC, when it was read.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub crc_match: Option<bool>,
}

/// A batch of exposures that stopped part way through.
///
/// Every report in `completed` belongs to a cycle whose trigger was written,
/// so those exposures physically happened.
#[derive(Debug, thiserror::Error)]
#[error("exposure {} failed after {} completed: {source}", .completed.len() + 1, .completed.len())]
pub struct BatchError {
    pub completed: Vec<ExposureReport>,
    #[source]
    pub source: ControlError,
}

/// Register and stream buses driven together through exposure cycles.
#[derive(Debug)]
pub struct ExposureSession<B, S> {
    sequencer: ExposureSequencer<B>,
    writer: FrameWriter<S>,
    placement: AddressWindow,
    write_buffer: BufferIndex,
    last_known_mode: Option<OperatingMode>,
    prepared: bool,
}

impl<B: RegisterBus, S: StreamBus> ExposureSession<B, S> {
    /// `placement` fixes where frames land; its buffer index is managed by
    /// the session.
    pub fn new(sequencer: ExposureSequencer<B>, writer: FrameWriter<S>, placement: AddressWindow) -> Self {
        Self {
            sequencer,
            writer,
            placement,
            write_buffer: BufferIndex::Zero,
            last_known_mode: None,
            prepared: false,
        }
    }

    /// Buffer the next frame will be written into.
    pub fn write_buffer(&self) -> BufferIndex {
        self.write_buffer
    }

    /// Mode seen at the last mode request. Advisory only: every mode
    /// decision re-reads the controller.
    pub fn last_known_mode(&self) -> Option<OperatingMode> {
        self.last_known_mode
    }

    pub fn is_prepared(&self) -> bool {
        self.prepared
    }

    pub fn placement(&self) -> &AddressWindow {
        &self.placement
    }

    pub fn sequencer_mut(&mut self) -> &mut ExposureSequencer<B> {
        &mut self.sequencer
    }

    pub fn writer_mut(&mut self) -> &mut FrameWriter<S> {
        &mut self.writer
    }

    pub fn into_parts(self) -> (ExposureSequencer<B>, FrameWriter<S>) {
        (self.sequencer, self.writer)
    }

    /// Run the preparation sequence and restart buffer alternation at 0.
    pub fn prepare(&mut self) -> Result<PrepareReport> {
        let report = self.sequencer.prepare_exposure()?;
        self.last_known_mode = Some(report.mode.to);
        self.write_buffer = BufferIndex::Zero;
        self.prepared = true;
        Ok(report)
    }

    /// Stream one frame into the write buffer and advance the buffer index.
    pub fn stream(&mut self, pixels: &PixelBuffer) -> Result<(DeviceResponse, StepOutcome)> {
        let window = self.placement.with_buffer(self.write_buffer);
        let response = self.writer.send_frame(pixels, &window)?;
        let next = self.write_buffer.toggle();
        let switch = self.sequencer.set_active_buffer(next)?;
        self.write_buffer = next;
        Ok((response, switch))
    }

    /// Run one full exposure cycle for `pixels`.
    ///
    /// Prepares the controller first if this session has not done so.
    /// Frame geometry and counts are checked before any bus traffic.
    pub fn expose(&mut self, pixels: &PixelBuffer, exposure: &ExposureConfig) -> Result<ExposureReport> {
        exposure.validate()?;
        self.placement
            .with_buffer(self.write_buffer)
            .rows_for(pixels.len())?;
        if !self.prepared {
            self.prepare()?;
        }

        let buffer = self.write_buffer;
        let (response, buffer_switch) = self.stream(pixels)?;
        let video_interface = self.sequencer.enable_video_interface()?;
        let mode = self.sequencer.request_mode(OperatingMode::ExternalPrint)?;
        self.last_known_mode = Some(mode.to);
        self.sequencer.settle();
        let trigger = self.sequencer.trigger_exposure(exposure)?;

        let crc_match = trigger.crc.map(|crc| crc == response.crc);
        if crc_match == Some(false) {
            warn!(
                frame_crc = response.crc,
                controller_crc = trigger.crc,
                "controller crc does not match streamed frame"
            );
        }
        info!(
            buffer = buffer.as_u8(),
            rows = response.rows,
            dark_frames = exposure.dark_frames,
            exposed_frames = exposure.exposed_frames,
            "exposure complete"
        );

        Ok(ExposureReport {
            buffer: buffer.as_u8(),
            frame_crc: response.crc,
            frame_len: response.frame_len,
            rows: response.rows,
            buffer_switch,
            video_interface,
            mode,
            trigger,
            crc_match,
        })
    }

    /// Expose each frame in turn, alternating buffers.
    ///
    /// Stops at the first failing cycle. The error carries the reports of
    /// the cycles that already ran.
    pub fn expose_all<'p>(
        &mut self,
        frames: impl IntoIterator<Item = &'p PixelBuffer>,
        exposure: &ExposureConfig,
    ) -> std::result::Result<Vec<ExposureReport>, BatchError> {
        let mut completed = Vec::new();
        for pixels in frames {
            match self.expose(pixels, exposure) {
                Ok(report) => completed.push(report),
                Err(source) => {
                    warn!(
                        completed = completed.len(),
                        error = %source,
                        "exposure batch stopped"
                    );
                    return Err(BatchError { completed, source });
                }
            }
        }
        Ok(completed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::RegisterAccess;
    use crate::sequencer::SequencerConfig;
    use crate::sim::{BusOp, SimulatedController};

    fn session(
        sim: &SimulatedController,
    ) -> ExposureSession<SimulatedController, SimulatedController> {
        let sequencer = ExposureSequencer::with_config(
            RegisterAccess::new(sim.clone()),
            SequencerConfig::immediate(),
        );
        ExposureSession::new(
            sequencer,
            FrameWriter::new(sim.clone()),
            AddressWindow::new(BufferIndex::Zero, 180, 5, 6),
        )
    }

    fn pixels() -> PixelBuffer {
        PixelBuffer::filled(8 * 4, 0xFF)
    }

    #[test]
    fn full_cycle_from_unknown_mode() {
        let sim = SimulatedController::new().with_register(0x06, &[0x42]);
        let mut session = session(&sim);
        let report = session.expose(&pixels(), &ExposureConfig::new(32, 512)).unwrap();

        assert_eq!(report.buffer, 0);
        assert_eq!(report.rows, 4);
        assert_eq!(report.mode.from, OperatingMode::Standby);
        assert_eq!(report.crc_match, Some(true));
        assert_eq!(sim.mode(), OperatingMode::ExternalPrint);
        assert_eq!(sim.writes_to(0xC1).len(), 1);
        assert_eq!(sim.exposures(), 1);
        assert_eq!(session.write_buffer(), BufferIndex::One);
        assert_eq!(session.last_known_mode(), Some(OperatingMode::ExternalPrint));

        let frames = sim.frames();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].window.row_start, 180);
        assert_eq!(frames[0].window.active_buffer, BufferIndex::Zero);
    }

    #[test]
    fn cycle_order() {
        let sim = SimulatedController::new();
        let mut session = session(&sim);
        session.prepare().unwrap();
        sim.clear_log();
        session.expose(&pixels(), &ExposureConfig::new(1, 1)).unwrap();

        let steps: Vec<String> = sim
            .log()
            .iter()
            .filter_map(|op| match op {
                BusOp::Transfer { .. } => Some("stream".to_string()),
                op => op.written_register().map(|reg| format!("{reg:#04x}")),
            })
            .collect();
        assert_eq!(steps, vec!["stream", "0xc5", "0xc3", "0x05", "0xc1"]);
    }

    #[test]
    fn repeated_exposures_alternate_buffers() {
        let sim = SimulatedController::new();
        let mut session = session(&sim);
        let frames = [pixels(), pixels(), pixels()];
        let reports = session
            .expose_all(&frames, &ExposureConfig::new(0, 10))
            .unwrap();

        let buffers: Vec<u8> = reports.iter().map(|r| r.buffer).collect();
        assert_eq!(buffers, vec![0, 1, 0]);
        assert_eq!(sim.writes_to(0xC5), vec![vec![0], vec![1], vec![0], vec![1]]);
        assert_eq!(sim.exposures(), 3);
        assert_eq!(sim.writes_to(0xA8).len(), 1);
        assert!(!reports[1].mode.written);
    }

    #[test]
    fn invalid_frame_rejected_before_bus_traffic() {
        let sim = SimulatedController::new();
        let mut session = session(&sim);
        let err = session
            .expose(&PixelBuffer::filled(7, 0), &ExposureConfig::new(1, 1))
            .unwrap_err();
        assert!(matches!(err, ControlError::InvalidConfiguration(_)));
        assert!(sim.log().is_empty());
    }

    #[test]
    fn crc_mismatch_is_reported_not_fatal() {
        let sim = SimulatedController::new().with_corrupted_stream();
        let report = session(&sim)
            .expose(&pixels(), &ExposureConfig::new(1, 1))
            .unwrap();
        assert_eq!(report.crc_match, Some(false));
        assert_ne!(report.trigger.crc, Some(report.frame_crc));
        assert_eq!(sim.rejected_frames(), 1);
        assert_eq!(sim.exposures(), 1);
    }

    #[test]
    fn batch_failure_keeps_completed_reports() {
        let sim = SimulatedController::new().dropping_off_after(1);
        let mut session = session(&sim);
        let frames = [pixels(), pixels()];
        let err = session
            .expose_all(&frames, &ExposureConfig::new(0, 10))
            .unwrap_err();

        assert_eq!(err.completed.len(), 1);
        assert_eq!(sim.exposures(), 1);
        assert!(err.source.is_not_responding());
        assert!(err.to_string().contains("after 1 completed"));

        let first = &err.completed[0];
        assert_eq!(first.buffer, 0);
        assert_eq!(first.crc_match, None);
        assert!(first.trigger.crc_error.is_some());
    }

    #[test]
    fn absent_controller_fails_fast() {
        let sim = SimulatedController::new();
        sim.set_present(false);
        let err = session(&sim)
            .expose(&pixels(), &ExposureConfig::new(1, 1))
            .unwrap_err();
        assert!(err.is_not_responding());
    }
}
