//! Frame-memory geometry and the addressed sub-window of a transfer.

use std::fmt;

use crate::error::{FrameError, Result};

/// Horizontal resolution of the controller's frame memory.
pub const FRAME_WIDTH: usize = 1280;

/// Vertical resolution of the controller's frame memory.
pub const FRAME_HEIGHT: usize = 720;

/// Pixels addressed by one column index (1 bit per pixel).
pub const COLUMN_BLOCK_PIXELS: usize = 32;

/// Bytes per row covered by one column index.
pub const COLUMN_BLOCK_BYTES: usize = COLUMN_BLOCK_PIXELS / 8;

/// Number of column indices across a full row.
pub const COLUMN_BLOCKS: usize = FRAME_WIDTH / COLUMN_BLOCK_PIXELS;

/// Size of a full packed 1-bit frame.
pub const FULL_FRAME_BYTES: usize = FRAME_WIDTH * FRAME_HEIGHT / 8;

/// One of the controller's two image buffers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BufferIndex {
    #[default]
    Zero,
    One,
}

impl BufferIndex {
    /// The other buffer.
    pub fn toggle(self) -> Self {
        match self {
            BufferIndex::Zero => BufferIndex::One,
            BufferIndex::One => BufferIndex::Zero,
        }
    }

    pub fn as_u8(self) -> u8 {
        match self {
            BufferIndex::Zero => 0,
            BufferIndex::One => 1,
        }
    }
}

impl TryFrom<u8> for BufferIndex {
    type Error = FrameError;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0 => Ok(BufferIndex::Zero),
            1 => Ok(BufferIndex::One),
            other => Err(FrameError::InvalidWindow(format!(
                "buffer index {other} (expected 0 or 1)"
            ))),
        }
    }
}

impl fmt::Display for BufferIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_u8())
    }
}

/// The region of frame memory a transfer writes to.
///
/// Rows are addressed individually; columns in blocks of
/// [`COLUMN_BLOCK_PIXELS`]. `col_end` is inclusive. The number of rows is
/// implied by the payload length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddressWindow {
    pub active_buffer: BufferIndex,
    pub row_start: u16,
    pub col_start: u8,
    pub col_end: u8,
}

impl AddressWindow {
    pub fn new(active_buffer: BufferIndex, row_start: u16, col_start: u8, col_end: u8) -> Self {
        Self {
            active_buffer,
            row_start,
            col_start,
            col_end,
        }
    }

    /// Window covering the whole frame memory.
    pub fn full_frame(active_buffer: BufferIndex) -> Self {
        Self::new(active_buffer, 0, 0, (COLUMN_BLOCKS - 1) as u8)
    }

    /// Same window, targeting another buffer.
    pub fn with_buffer(self, active_buffer: BufferIndex) -> Self {
        Self {
            active_buffer,
            ..self
        }
    }

    /// Bytes per addressed row.
    pub fn row_bytes(&self) -> usize {
        (self.col_end.saturating_sub(self.col_start) as usize + 1) * COLUMN_BLOCK_BYTES
    }

    /// Check the column range against the frame geometry.
    pub fn validate(&self) -> Result<()> {
        if self.col_start > self.col_end {
            return Err(FrameError::InvalidWindow(format!(
                "column start {} is after column end {}",
                self.col_start, self.col_end
            )));
        }
        if self.col_end as usize >= COLUMN_BLOCKS {
            return Err(FrameError::InvalidWindow(format!(
                "column end {} out of range (max {})",
                self.col_end,
                COLUMN_BLOCKS - 1
            )));
        }
        if self.row_start as usize >= FRAME_HEIGHT {
            return Err(FrameError::InvalidWindow(format!(
                "row start {} out of range (max {})",
                self.row_start,
                FRAME_HEIGHT - 1
            )));
        }
        Ok(())
    }

    /// Validate a payload length against this window and return the row count.
    pub fn rows_for(&self, payload_len: usize) -> Result<usize> {
        self.validate()?;
        let row_bytes = self.row_bytes();
        if payload_len == 0 || payload_len % row_bytes != 0 {
            return Err(FrameError::InvalidLength {
                len: payload_len,
                row_bytes,
            });
        }
        let rows = payload_len / row_bytes;
        if self.row_start as usize + rows > FRAME_HEIGHT {
            return Err(FrameError::InvalidWindow(format!(
                "{rows} rows from row {} overrun the frame ({FRAME_HEIGHT} rows)",
                self.row_start
            )));
        }
        Ok(rows)
    }
}
