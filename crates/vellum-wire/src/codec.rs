use crate::channel::ByteChannel;
use crate::error::ProtocolError;
use crate::order::ByteOrder;

/// Typed reader/writer over a [`ByteChannel`].
///
/// Read methods live in `decoder.rs`, write methods in `encoder.rs`. All of
/// them account for bytes exactly: a fixed-size value is either transferred
/// whole or reported as a [`ProtocolError`].
pub struct WireCodec<C> {
    pub(crate) channel: C,
    pub(crate) order: ByteOrder,
}

impl<C: ByteChannel> WireCodec<C> {
    pub fn new(channel: C) -> Self {
        Self::with_byte_order(channel, ByteOrder::Native)
    }

    pub fn with_byte_order(channel: C, order: ByteOrder) -> Self {
        Self { channel, order }
    }

    pub fn byte_order(&self) -> ByteOrder {
        self.order
    }

    pub fn channel(&self) -> &C {
        &self.channel
    }

    pub fn channel_mut(&mut self) -> &mut C {
        &mut self.channel
    }

    pub fn into_inner(self) -> C {
        self.channel
    }

    pub fn accept_connection(&mut self) -> Result<bool, ProtocolError> {
        self.channel
            .accept_connection()
            .map_err(|e| ProtocolError::io("accept connection", e))
    }

    pub fn data_available(&mut self) -> Result<bool, ProtocolError> {
        self.channel
            .data_available()
            .map_err(|e| ProtocolError::io("poll channel", e))
    }

    /// Reads exactly `dest.len()` bytes.
    pub(crate) fn read_exact_into(
        &mut self,
        what: &'static str,
        dest: &mut [u8],
    ) -> Result<(), ProtocolError> {
        let expected = dest.len();
        let actual = self
            .channel
            .read_bytes(dest)
            .map_err(|e| ProtocolError::io(what, e))?;
        if actual != expected {
            return Err(ProtocolError::ShortRead { what, expected, actual });
        }
        Ok(())
    }

    pub(crate) fn read_array<const N: usize>(
        &mut self,
        what: &'static str,
    ) -> Result<[u8; N], ProtocolError> {
        let mut buf = [0u8; N];
        self.read_exact_into(what, &mut buf)?;
        Ok(buf)
    }

    /// Sends all of `src`; anything less is a desync.
    pub(crate) fn write_exact(&mut self, what: &'static str, src: &[u8]) -> Result<(), ProtocolError> {
        let expected = src.len();
        let actual = self
            .channel
            .send_bytes(src)
            .map_err(|e| ProtocolError::io(what, e))?;
        if actual != expected {
            return Err(ProtocolError::ShortWrite { what, expected, actual });
        }
        Ok(())
    }
}
