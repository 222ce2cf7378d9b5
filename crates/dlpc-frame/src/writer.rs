use bytes::BytesMut;
use dlpc_transport::StreamBus;
use tracing::debug;

use crate::codec::{encode_frame, FramerConfig, CRC_SIZE, HEADER_SIZE, METADATA_SIZE};
use crate::error::Result;
use crate::pixel::PixelBuffer;
use crate::window::AddressWindow;

const INITIAL_BUFFER_CAPACITY: usize = 8 * 1024;

/// What came back from the streaming bus while a frame was clocked out.
///
/// The controller has no application-level acknowledgement; `response` is
/// opaque diagnostic data returned verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceResponse {
    /// CRC16 carried in the frame trailer.
    pub crc: u16,
    /// Total bytes sent.
    pub frame_len: usize,
    /// Rows written by the frame.
    pub rows: usize,
    /// Bytes clocked in during the transfer.
    pub response: Vec<u8>,
}

/// Sends complete image frames over any [`StreamBus`].
///
/// Holds no buffer-index state: the caller chooses the target buffer through
/// the [`AddressWindow`] of each frame.
#[derive(Debug)]
pub struct FrameWriter<S> {
    inner: S,
    buf: BytesMut,
    config: FramerConfig,
}

impl<S: StreamBus> FrameWriter<S> {
    /// Create a new frame writer with default configuration.
    pub fn new(inner: S) -> Self {
        Self::with_config(inner, FramerConfig::default())
    }

    /// Create a new frame writer with explicit configuration.
    pub fn with_config(inner: S, config: FramerConfig) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            config,
        }
    }

    /// Frame `buffer` for `window` and send it as one bus transaction.
    pub fn send_frame(
        &mut self,
        buffer: &PixelBuffer,
        window: &AddressWindow,
    ) -> Result<DeviceResponse> {
        self.buf.clear();
        let rows = window.rows_for(buffer.len())?;
        let crc = encode_frame(&self.config, window, buffer.as_bytes(), &mut self.buf)?;
        debug_assert_eq!(
            self.buf.len(),
            HEADER_SIZE + METADATA_SIZE + buffer.len() + CRC_SIZE
        );

        debug!(
            buffer = %window.active_buffer,
            row_start = window.row_start,
            col_start = window.col_start,
            col_end = window.col_end,
            rows,
            len = self.buf.len(),
            crc,
            "sending image frame"
        );
        let response = self.inner.transfer(&self.buf)?;

        Ok(DeviceResponse {
            crc,
            frame_len: self.buf.len(),
            rows,
            response,
        })
    }

    /// Borrow the underlying bus.
    pub fn get_ref(&self) -> &S {
        &self.inner
    }

    /// Mutably borrow the underlying bus.
    pub fn get_mut(&mut self) -> &mut S {
        &mut self.inner
    }

    /// Consume the writer and return the inner bus.
    pub fn into_inner(self) -> S {
        self.inner
    }

    /// Current frame writer configuration.
    pub fn config(&self) -> &FramerConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use dlpc_transport::TransportError;

    use super::*;
    use crate::codec::{decode_frame, CrcFrame};
    use crate::crc::crc16;
    use crate::error::FrameError;
    use crate::window::BufferIndex;

    #[derive(Default)]
    struct RecordingBus {
        sent: Vec<Vec<u8>>,
    }

    impl StreamBus for RecordingBus {
        fn transfer(&mut self, tx: &[u8]) -> dlpc_transport::Result<Vec<u8>> {
            self.sent.push(tx.to_vec());
            Ok(vec![0xFF; tx.len()])
        }
    }

    struct DeadBus;

    impl StreamBus for DeadBus {
        fn transfer(&mut self, _tx: &[u8]) -> dlpc_transport::Result<Vec<u8>> {
            Err(TransportError::Timeout)
        }
    }

    fn window() -> AddressWindow {
        AddressWindow::new(BufferIndex::Zero, 180, 5, 6)
    }

    #[test]
    fn sends_one_transaction_per_frame() {
        let mut writer = FrameWriter::new(RecordingBus::default());
        let buffer = PixelBuffer::filled(8, 0x80);

        let response = writer.send_frame(&buffer, &window()).unwrap();

        let bus = writer.into_inner();
        assert_eq!(bus.sent.len(), 1);
        assert_eq!(bus.sent[0].len(), response.frame_len);
        assert_eq!(response.response, vec![0xFF; response.frame_len]);
        assert_eq!(response.rows, 1);

        let decoded = decode_frame(&bus.sent[0], None).unwrap();
        assert_eq!(decoded.crc, response.crc);
    }

    #[test]
    fn repeated_sends_are_byte_identical() {
        let mut writer = FrameWriter::new(RecordingBus::default());
        let buffer = PixelBuffer::filled(16, 0x3C);
        writer.send_frame(&buffer, &window()).unwrap();
        writer.send_frame(&buffer, &window()).unwrap();

        let bus = writer.into_inner();
        assert_eq!(bus.sent[0], bus.sent[1]);

        let expected = CrcFrame::build(&FramerConfig::default(), &buffer, &window()).unwrap();
        assert_eq!(bus.sent[0], expected.bytes.to_vec());

        let frame = &bus.sent[0];
        let body = &frame[..frame.len() - 2];
        assert_eq!(&frame[frame.len() - 2..], &crc16(body).to_le_bytes());
    }

    #[test]
    fn invalid_window_sends_nothing() {
        let mut writer = FrameWriter::new(RecordingBus::default());
        let err = writer
            .send_frame(&PixelBuffer::filled(7, 0), &window())
            .unwrap_err();
        assert!(matches!(err, FrameError::InvalidLength { .. }));
        assert!(writer.get_ref().sent.is_empty());
    }

    #[test]
    fn bus_failure_propagates() {
        let mut writer = FrameWriter::new(DeadBus);
        let err = writer
            .send_frame(&PixelBuffer::filled(8, 0), &window())
            .unwrap_err();
        assert!(matches!(err, FrameError::Transport(TransportError::Timeout)));
    }
}
