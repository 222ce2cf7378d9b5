use bytes::{BufMut, Bytes, BytesMut};

use crate::crc::{crc16, crc16_from_wire, crc16_to_wire, Crc16Digest};
use crate::error::{FrameError, Result};
use crate::pixel::PixelBuffer;
use crate::window::{AddressWindow, BufferIndex, FULL_FRAME_BYTES};

/// Command header: 1 byte.
pub const HEADER_SIZE: usize = 1;

/// Addressing metadata: buffer (1) + row start (2, BE) + column start (1) + column end (1).
pub const METADATA_SIZE: usize = 5;

/// CRC16 trailer: 2 bytes, low byte first.
pub const CRC_SIZE: usize = 2;

/// Default command header for an image-data write.
pub const WRITE_IMAGE_COMMAND: u8 = 0x01;

/// Configuration for frame encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FramerConfig {
    /// Command header placed in front of every frame.
    pub header: u8,
    /// Maximum payload size in bytes. Default: one full frame.
    pub max_payload_size: usize,
}

impl Default for FramerConfig {
    fn default() -> Self {
        Self {
            header: WRITE_IMAGE_COMMAND,
            max_payload_size: FULL_FRAME_BYTES,
        }
    }
}

/// A wire-ready frame and the CRC it carries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrcFrame {
    pub bytes: Bytes,
    pub crc: u16,
    pub rows: usize,
}

impl CrcFrame {
    /// Build a frame for `buffer` addressed at `window`.
    pub fn build(config: &FramerConfig, buffer: &PixelBuffer, window: &AddressWindow) -> Result<Self> {
        let mut dst = BytesMut::new();
        let rows = window.rows_for(buffer.len())?;
        let crc = encode_frame(config, window, buffer.as_bytes(), &mut dst)?;
        Ok(Self {
            bytes: dst.freeze(),
            crc,
            rows,
        })
    }

    /// Total wire size of this frame.
    pub fn wire_size(&self) -> usize {
        self.bytes.len()
    }
}

/// Encode a frame into the wire format and return its CRC.
///
/// Wire format:
/// ```text
/// ┌────────┬────────┬────────────┬───────────┬─────────┬───────────┬────────────┐
/// │ Header │ Buffer │ Row start  │ Col start │ Col end │ Payload   │ CRC16      │
/// │ (1B)   │ (1B)   │ (2B BE)    │ (1B)      │ (1B)    │ (N bytes) │ (2B LE)    │
/// └────────┴────────┴────────────┴───────────┴─────────┴───────────┴────────────┘
/// ```
/// The CRC covers every byte before it.
pub fn encode_frame(
    config: &FramerConfig,
    window: &AddressWindow,
    payload: &[u8],
    dst: &mut BytesMut,
) -> Result<u16> {
    if payload.len() > config.max_payload_size {
        return Err(FrameError::PayloadTooLarge {
            size: payload.len(),
            max: config.max_payload_size,
        });
    }
    window.rows_for(payload.len())?;

    let start = dst.len();
    dst.reserve(HEADER_SIZE + METADATA_SIZE + payload.len() + CRC_SIZE);
    dst.put_u8(config.header);
    dst.put_u8(window.active_buffer.as_u8());
    dst.put_u16(window.row_start);
    dst.put_u8(window.col_start);
    dst.put_u8(window.col_end);

    let mut digest = Crc16Digest::new();
    digest.update(&dst[start..]);
    digest.update(payload);
    let crc = digest.finalize();

    dst.put_slice(payload);
    dst.put_slice(&crc16_to_wire(crc));
    Ok(crc)
}

/// A frame parsed back from wire bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedFrame {
    pub header: u8,
    pub window: AddressWindow,
    pub payload: Bytes,
    pub crc: u16,
}

/// Parse and verify a frame.
///
/// Checks, in order: minimum length, header (when `expected_header` is set),
/// CRC trailer, buffer index, window/payload geometry.
pub fn decode_frame(src: &[u8], expected_header: Option<u8>) -> Result<DecodedFrame> {
    let min = HEADER_SIZE + METADATA_SIZE + CRC_SIZE;
    if src.len() < min {
        return Err(FrameError::Truncated {
            len: src.len(),
            min,
        });
    }

    let header = src[0];
    if let Some(expected) = expected_header {
        if header != expected {
            return Err(FrameError::UnexpectedHeader {
                expected,
                actual: header,
            });
        }
    }

    let (body, trailer) = src.split_at(src.len() - CRC_SIZE);
    let carried = crc16_from_wire([trailer[0], trailer[1]]);
    let computed = crc16(body);
    if carried != computed {
        return Err(FrameError::CrcMismatch {
            expected: carried,
            actual: computed,
        });
    }

    let window = AddressWindow {
        active_buffer: BufferIndex::try_from(body[1])?,
        row_start: u16::from_be_bytes([body[2], body[3]]),
        col_start: body[4],
        col_end: body[5],
    };
    let payload = Bytes::copy_from_slice(&body[HEADER_SIZE + METADATA_SIZE..]);
    window.rows_for(payload.len())?;

    Ok(DecodedFrame {
        header,
        window,
        payload,
        crc: carried,
    })
}
