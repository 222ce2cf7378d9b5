//! Packed 1-bit pixel payloads.
//!
//! Pixels are packed eight to a byte, least significant bit first, row by
//! row. The core never looks inside a buffer beyond its length; the
//! constructors here exist for test patterns and simple tooling.

use bytes::Bytes;

use crate::window::{AddressWindow, COLUMN_BLOCK_PIXELS};

/// An opaque packed pixel payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelBuffer {
    data: Bytes,
}

impl PixelBuffer {
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self { data: data.into() }
    }

    /// Every byte set to `value`.
    pub fn filled(len: usize, value: u8) -> Self {
        Self::new(vec![value; len])
    }

    /// All pixels off.
    pub fn dark(len: usize) -> Self {
        Self::filled(len, 0x00)
    }

    /// Pack boolean pixels, eight per byte, first pixel in bit 0.
    ///
    /// A trailing partial byte is zero-padded.
    pub fn pack(pixels: &[bool]) -> Self {
        let data: Vec<u8> = pixels
            .chunks(8)
            .map(|chunk| {
                chunk
                    .iter()
                    .enumerate()
                    .fold(0u8, |acc, (bit, on)| acc | ((*on as u8) << bit))
            })
            .collect();
        Self::new(data)
    }

    /// Checkerboard of `cell`-pixel squares sized for `rows` rows of `window`.
    pub fn checkerboard(window: &AddressWindow, rows: usize, cell: usize) -> Self {
        let cell = cell.max(1);
        let width = window.row_bytes() * 8;
        let x0 = window.col_start as usize * COLUMN_BLOCK_PIXELS;
        let y0 = window.row_start as usize;
        let pixels: Vec<bool> = (0..rows)
            .flat_map(|y| (0..width).map(move |x| ((x0 + x) / cell + (y0 + y) / cell) % 2 == 0))
            .collect();
        Self::pack(&pixels)
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn into_bytes(self) -> Bytes {
        self.data
    }
}

impl From<Vec<u8>> for PixelBuffer {
    fn from(data: Vec<u8>) -> Self {
        Self::new(data)
    }
}

impl From<&'static [u8]> for PixelBuffer {
    fn from(data: &'static [u8]) -> Self {
        Self::new(Bytes::from_static(data))
    }
}

impl AsRef<[u8]> for PixelBuffer {
    fn as_ref(&self) -> &[u8] {
        &self.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::window::BufferIndex;

    #[test]
    fn pack_is_lsb_first() {
        let pixels = [false, false, true, true, false, true, false, true];
        assert_eq!(PixelBuffer::pack(&pixels).as_bytes(), &[0b1010_1100]);
    }

    #[test]
    fn pack_pads_partial_byte() {
        let buf = PixelBuffer::pack(&[true; 10]);
        assert_eq!(buf.as_bytes(), &[0xFF, 0x03]);
    }

    #[test]
    fn checkerboard_fills_window_rows() {
        let window = AddressWindow::new(BufferIndex::Zero, 0, 0, 1);
        let buf = PixelBuffer::checkerboard(&window, 2, 8);
        assert_eq!(buf.len(), 16);
        // Row 0: 8 on, 8 off, ...; cell height 8 keeps row 1 identical.
        assert_eq!(&buf.as_bytes()[..2], &[0xFF, 0x00]);
        assert_eq!(&buf.as_bytes()[..8], &buf.as_bytes()[8..]);
        assert_eq!(window.rows_for(buf.len()).unwrap(), 2);
    }

    #[test]
    fn filled_and_dark() {
        assert_eq!(PixelBuffer::filled(3, 0x80).as_bytes(), &[0x80; 3]);
        assert!(PixelBuffer::dark(4).as_bytes().iter().all(|b| *b == 0));
        assert!(PixelBuffer::new(Vec::new()).is_empty());
    }
}
