//! Controller configuration file.
//!
//! JSON, every field optional. Missing fields take the defaults below.

use std::path::{Path, PathBuf};
use std::time::Duration;

use dlpc_frame::{AddressWindow, BufferIndex, FramerConfig, WRITE_IMAGE_COMMAND};
use serde::{Deserialize, Serialize};

use crate::registers::DEVICE_ADDRESS;
use crate::sequencer::{ExposureConfig, SequencerConfig};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Where frames land on the display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WindowConfig {
    pub row_start: u16,
    pub col_start: u8,
    pub col_end: u8,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            row_start: 180,
            col_start: 5,
            col_end: 6,
        }
    }
}

impl WindowConfig {
    pub fn to_window(self, buffer: BufferIndex) -> AddressWindow {
        AddressWindow::new(buffer, self.row_start, self.col_start, self.col_end)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ControllerConfig {
    pub i2c_path: PathBuf,
    pub device_address: u8,
    pub spi_path: PathBuf,
    pub spi_speed_hz: u32,
    pub spi_mode: u8,
    pub spi_max_chunk: usize,
    pub settle_delay_ms: u64,
    pub pattern_settle_ms: u64,
    pub verify_readback: bool,
    pub read_crc_after_trigger: bool,
    pub frame_header: u8,
    pub window: WindowConfig,
    pub dark_frames: u32,
    pub exposed_frames: u32,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            i2c_path: PathBuf::from("/dev/i2c-1"),
            device_address: DEVICE_ADDRESS,
            spi_path: PathBuf::from("/dev/spidev0.0"),
            spi_speed_hz: 1_000_000,
            spi_mode: 0,
            spi_max_chunk: 4096,
            settle_delay_ms: 1000,
            pattern_settle_ms: 300,
            verify_readback: true,
            read_crc_after_trigger: true,
            frame_header: WRITE_IMAGE_COMMAND,
            window: WindowConfig::default(),
            dark_frames: 32,
            exposed_frames: 512,
        }
    }
}

impl ControllerConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&raw)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn sequencer_config(&self) -> SequencerConfig {
        SequencerConfig {
            settle_delay: self.settle_delay(),
            pattern_settle: Duration::from_millis(self.pattern_settle_ms),
            verify_readback: self.verify_readback,
            read_crc_after_trigger: self.read_crc_after_trigger,
            ..SequencerConfig::default()
        }
    }

    pub fn framer_config(&self) -> FramerConfig {
        FramerConfig {
            header: self.frame_header,
            ..FramerConfig::default()
        }
    }

    pub fn exposure(&self) -> ExposureConfig {
        ExposureConfig::new(self.dark_frames, self.exposed_frames)
    }

    pub fn placement(&self) -> AddressWindow {
        self.window.to_window(BufferIndex::Zero)
    }
}
