//! Register-level control and exposure sequencing for DLPC display controllers.
//!
//! This is the protocol layer. It owns the register map, the operating-mode
//! state machine, and the ordered setup/trigger steps of a lithographic
//! exposure, and it drives image streaming through `dlpc-frame`.

pub mod access;
pub mod config;
pub mod error;
pub mod events;
pub mod mode;
pub mod registers;
pub mod sequencer;
pub mod session;
pub mod sim;

pub use access::{apply_mask, RegisterAccess, RmwOutcome, StaleReadback};
pub use config::{ConfigError, ControllerConfig, WindowConfig};
pub use error::{ControlError, Result};
pub use events::{AccessKind, EventLog, RegisterEvent, RegisterObserver, TracingObserver};
pub use mode::{ModeController, ModeTransition, OperatingMode};
pub use registers::{Register, DEVICE_ADDRESS};
pub use sequencer::{
    ExposureConfig, ExposureSequencer, PrepareReport, SequencerConfig, StepOutcome,
    TestPatternConfig, TriggerReport, MAX_FRAME_COUNT,
};
pub use session::{BatchError, ExposureReport, ExposureSession};
pub use sim::{BusOp, SimulatedController};
