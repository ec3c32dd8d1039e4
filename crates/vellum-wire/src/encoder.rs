use crate::channel::ByteChannel;
use crate::codec::WireCodec;
use crate::error::ProtocolError;
use crate::types::{CommandCode, ImageHeader, Rgb, Transform};

impl<C: ByteChannel> WireCodec<C> {
    pub fn write_command(&mut self, code: CommandCode) -> Result<(), ProtocolError> {
        let b = self.order.u16_to(code.0);
        self.write_exact("command code", &b)
    }

    pub fn write_u32(&mut self, value: u32) -> Result<(), ProtocolError> {
        let b = self.order.u32_to(value);
        self.write_exact("u32", &b)
    }

    pub fn write_f32(&mut self, value: f32) -> Result<(), ProtocolError> {
        let b = self.order.u32_to(value.to_bits());
        self.write_exact("f32", &b)
    }

    pub fn write_f64(&mut self, value: f64) -> Result<(), ProtocolError> {
        let b = self.order.u64_to(value.to_bits());
        self.write_exact("f64", &b)
    }

    pub fn write_color(&mut self, color: Rgb) -> Result<(), ProtocolError> {
        let bytes = self.float_bytes(&[color.r, color.g, color.b]);
        self.write_exact("color", &bytes)
    }

    pub fn write_transform(&mut self, xform: &Transform) -> Result<(), ProtocolError> {
        let bytes = self.float_bytes(&xform.to_column_major());
        self.write_exact("transform", &bytes)
    }

    /// Sends a run of floats in one write (e.g. a vertex payload).
    pub fn write_floats(&mut self, values: &[f32]) -> Result<(), ProtocolError> {
        let bytes = self.float_bytes(values);
        self.write_exact("float array", &bytes)
    }

    /// Sends `[width][height]` followed by `height` rows of `width × 16` bytes,
    /// one send per row. Row `r` is taken from `bytes[r × row_stride..]`, so
    /// storage padding never reaches the wire.
    ///
    /// Header fields must go out whole. A short row is logged and the
    /// remaining rows are still sent; the return value is the number of row
    /// bytes actually delivered.
    pub fn write_image_rows(
        &mut self,
        width: u32,
        height: u32,
        bytes: &[u8],
        row_stride: usize,
    ) -> Result<usize, ProtocolError> {
        let header = ImageHeader { width, height };
        let row_bytes = header.row_bytes()?;
        if row_stride < row_bytes {
            return Err(ProtocolError::DestinationSize {
                what: "image row stride",
                expected: row_bytes,
                actual: row_stride,
            });
        }
        let needed = header.strided_len(row_stride)?;
        if bytes.len() < needed {
            return Err(ProtocolError::DestinationSize {
                what: "image",
                expected: needed,
                actual: bytes.len(),
            });
        }

        self.write_u32(width)?;
        self.write_u32(height)?;
        if row_bytes == 0 {
            return Ok(0);
        }

        let rows = height as usize;
        let mut scratch = Vec::new();
        let mut total = 0;
        for row in 0..rows {
            let start = row * row_stride;
            let src = &bytes[start..start + row_bytes];
            let src = if self.order.is_native() {
                src
            } else {
                scratch.clear();
                scratch.extend_from_slice(src);
                self.order.swap_words_in_place(&mut scratch);
                &scratch[..]
            };

            let sent = match self.channel.send_bytes(src) {
                Ok(n) => n,
                Err(e) => {
                    log::warn!("image row {row} of {rows}: send failed: {e}");
                    0
                }
            };
            if sent != row_bytes {
                log::warn!(
                    "image row {row} of {rows}: expected to send {row_bytes} bytes but sent {sent}"
                );
            }
            total += sent;
        }
        Ok(total)
    }

    /// Replies to an image request that cannot be served: zero width and height.
    pub fn write_unavailable_image(&mut self) -> Result<(), ProtocolError> {
        self.write_u32(0)?;
        self.write_u32(0)
    }

    fn float_bytes(&self, values: &[f32]) -> Vec<u8> {
        values
            .iter()
            .flat_map(|v| self.order.u32_to(v.to_bits()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use crate::channel::LoopbackChannel;
    use crate::codec::WireCodec;
    use crate::error::ProtocolError;
    use crate::order::ByteOrder;
    use crate::types::{CommandCode, Rgb, Transform};

    /// Writes with one codec, then decodes the bytes with a fresh one.
    fn round_trip(
        order: ByteOrder,
        write: impl FnOnce(&mut WireCodec<LoopbackChannel>),
    ) -> WireCodec<LoopbackChannel> {
        let mut tx = WireCodec::with_byte_order(LoopbackChannel::new(), order);
        write(&mut tx);
        let bytes = tx.channel_mut().take_outgoing();
        WireCodec::with_byte_order(LoopbackChannel::with_incoming(bytes), order)
    }

    #[test]
    fn scalars_round_trip_bit_exact() {
        let odd = [0.1f32, -0.0, f32::MIN_POSITIVE, f32::MAX, f32::NAN];
        for order in [ByteOrder::Native, ByteOrder::Little, ByteOrder::Big] {
            let mut rx = round_trip(order, |tx| {
                tx.write_command(CommandCode(0xBEEF)).unwrap();
                tx.write_u32(0xDEAD_BEEF).unwrap();
                for v in odd {
                    tx.write_f32(v).unwrap();
                }
                tx.write_f64(std::f64::consts::PI).unwrap();
                tx.write_f64(-1.0e-300).unwrap();
            });

            assert_eq!(rx.read_command().unwrap(), CommandCode(0xBEEF));
            assert_eq!(rx.read_u32().unwrap(), 0xDEAD_BEEF);
            for v in odd {
                assert_eq!(rx.read_f32().unwrap().to_bits(), v.to_bits());
            }
            assert_eq!(rx.read_f64().unwrap().to_bits(), std::f64::consts::PI.to_bits());
            assert_eq!(rx.read_f64().unwrap().to_bits(), (-1.0e-300f64).to_bits());
            assert_eq!(rx.channel().remaining(), 0);
        }
    }

    #[test]
    fn color_and_transform_round_trip() {
        let color = Rgb::new(0.25, 1.0 / 3.0, -7.5);
        let xform = Transform::from_column_major(std::array::from_fn(|i| i as f32 * 0.7 - 3.1));

        let mut rx = round_trip(ByteOrder::Big, |tx| {
            tx.write_color(color).unwrap();
            tx.write_transform(&xform).unwrap();
        });

        let c = rx.read_color().unwrap();
        assert_eq!(
            [c.r.to_bits(), c.g.to_bits(), c.b.to_bits()],
            [color.r.to_bits(), color.g.to_bits(), color.b.to_bits()]
        );
        let t = rx.read_transform().unwrap();
        for (a, b) in t.to_column_major().iter().zip(xform.to_column_major().iter()) {
            assert_eq!(a.to_bits(), b.to_bits());
        }
        assert_eq!(rx.channel().bytes_consumed(), 12 + 64);
    }

    #[test]
    fn foreign_order_vertex_payload_arrives_in_host_order() {
        let mut rx = round_trip(ByteOrder::Big, |tx| {
            tx.write_u32(1).unwrap();
            tx.write_floats(&[1.5, -2.0, 3.25, 9.0]).unwrap();
        });
        let array = rx.read_vertex_array(1).unwrap();
        assert_eq!(array.data, vec![1.5, -2.0, 3.25, 9.0]);
    }

    #[test]
    fn image_rows_skip_storage_padding() {
        let stride = 48;
        let mut storage = vec![0xFFu8; stride + 32];
        let row0: Vec<u8> = (0..8).flat_map(|i| (i as f32).to_ne_bytes()).collect();
        let row1: Vec<u8> = (8..16).flat_map(|i| (i as f32).to_ne_bytes()).collect();
        storage[..32].copy_from_slice(&row0);
        storage[stride..stride + 32].copy_from_slice(&row1);

        let mut rx = round_trip(ByteOrder::Native, |tx| {
            let sent = tx.write_image_rows(2, 2, &storage, stride).unwrap();
            assert_eq!(sent, 64);
            assert_eq!(tx.channel().send_calls(), &[4, 4, 32, 32]);
        });

        let image = rx.read_image().unwrap();
        assert_eq!((image.width, image.height), (2, 2));
        let expected: Vec<f32> = (0..16).map(|i| i as f32).collect();
        assert_eq!(image.pixels, expected);
    }

    #[test]
    fn short_row_write_keeps_going() {
        let mut tx = WireCodec::new(LoopbackChannel::new());
        // Header plus one and a half rows of a 1 x 3 image.
        tx.channel_mut().limit_sends(8 + 16 + 8);

        let storage = vec![0u8; 3 * 16];
        let sent = tx.write_image_rows(1, 3, &storage, 16).unwrap();

        assert_eq!(sent, 24);
        // Every row was still attempted.
        assert_eq!(tx.channel().send_calls(), &[4, 4, 16, 16, 16]);
    }

    #[test]
    fn short_header_write_is_fatal() {
        let mut tx = WireCodec::new(LoopbackChannel::new());
        tx.channel_mut().limit_sends(2);
        let err = tx.write_image_rows(1, 1, &[0u8; 16], 16).unwrap_err();
        assert!(matches!(err, ProtocolError::ShortWrite { expected: 4, actual: 2, .. }));
    }

    #[test]
    fn unavailable_image_is_two_zeros() {
        let mut rx = round_trip(ByteOrder::Native, |tx| tx.write_unavailable_image().unwrap());
        let header = rx.read_image_header().unwrap();
        assert!(header.is_empty());
        assert_eq!(rx.channel().remaining(), 0);
    }
}
