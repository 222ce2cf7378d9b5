//! CRC16-protected image framing for the DLPC streaming bus.
//!
//! Every image transfer is one frame:
//! - a 1-byte command header
//! - 5 bytes of addressing metadata (buffer, row start, column window)
//! - the packed pixel payload
//! - a CRC16 trailer, low byte first
//!
//! The controller checks the trailer against its own CRC16 of the received
//! bytes and reports the result in its CRC register.

pub mod codec;
pub mod crc;
pub mod error;
pub mod pixel;
pub mod window;
pub mod writer;

pub use codec::{
    decode_frame, encode_frame, CrcFrame, DecodedFrame, FramerConfig, CRC_SIZE, HEADER_SIZE,
    METADATA_SIZE, WRITE_IMAGE_COMMAND,
};
pub use crc::{crc16, crc16_from_wire, crc16_to_wire, Crc16Digest};
pub use error::{FrameError, Result};
pub use pixel::PixelBuffer;
pub use window::{
    AddressWindow, BufferIndex, COLUMN_BLOCKS, COLUMN_BLOCK_BYTES, COLUMN_BLOCK_PIXELS,
    FRAME_HEIGHT, FRAME_WIDTH, FULL_FRAME_BYTES,
};
pub use writer::{DeviceResponse, FrameWriter};
