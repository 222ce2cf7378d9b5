//! CRC16 engine matching the controller's image-stream checksum.
//!
//! Parameters: polynomial 0x8005 (0x18005 with the implicit top bit), initial
//! value 0xFFFF, no input or output reflection, no final XOR. This is the
//! CRC-16/CMS catalogue entry.

use ::crc::{Algorithm, Crc, Digest};

/// CRC parameters used by the controller.
pub const DLPC_CRC16: Algorithm<u16> = Algorithm {
    width: 16,
    poly: 0x8005,
    init: 0xFFFF,
    refin: false,
    refout: false,
    xorout: 0x0000,
    check: 0xAEE7,
    residue: 0x0000,
};

static CRC16: Crc<u16> = Crc::<u16>::new(&DLPC_CRC16);

/// Compute the CRC16 of `data`.
pub fn crc16(data: &[u8]) -> u16 {
    CRC16.checksum(data)
}

/// Wire encoding of a CRC value: low byte first.
pub fn crc16_to_wire(crc: u16) -> [u8; 2] {
    crc.to_le_bytes()
}

/// Decode a CRC value sent or reported low byte first.
pub fn crc16_from_wire(bytes: [u8; 2]) -> u16 {
    u16::from_le_bytes(bytes)
}

/// Incremental CRC16 over several slices.
pub struct Crc16Digest {
    inner: Digest<'static, u16>,
}

impl Crc16Digest {
    pub fn new() -> Self {
        Self {
            inner: CRC16.digest(),
        }
    }

    pub fn update(&mut self, data: &[u8]) {
        self.inner.update(data);
    }

    pub fn finalize(self) -> u16 {
        self.inner.finalize()
    }
}

impl Default for Crc16Digest {
    fn default() -> Self {
        Self::new()
    }
}
