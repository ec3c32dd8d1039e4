use crate::channel::ByteChannel;
use crate::codec::WireCodec;
use crate::error::ProtocolError;
use crate::types::{
    COLOR_SIZE, CommandCode, HostImage, ImageHeader, RGBA_F32_PIXEL_SIZE, Rgb, TRANSFORM_SIZE,
    Transform, VertexArray, VertexArrayHeader,
};

impl<C: ByteChannel> WireCodec<C> {
    pub fn read_command(&mut self) -> Result<CommandCode, ProtocolError> {
        let b = self.read_array::<2>("command code")?;
        Ok(CommandCode(self.order.u16_from(b)))
    }

    pub fn read_u32(&mut self) -> Result<u32, ProtocolError> {
        let b = self.read_array::<4>("u32")?;
        Ok(self.order.u32_from(b))
    }

    pub fn read_f32(&mut self) -> Result<f32, ProtocolError> {
        let b = self.read_array::<4>("f32")?;
        Ok(f32::from_bits(self.order.u32_from(b)))
    }

    pub fn read_f64(&mut self) -> Result<f64, ProtocolError> {
        let b = self.read_array::<8>("f64")?;
        Ok(f64::from_bits(self.order.u64_from(b)))
    }

    pub fn read_color(&mut self) -> Result<Rgb, ProtocolError> {
        let b = self.read_array::<COLOR_SIZE>("color")?;
        let c = self.floats_from::<3>(&b);
        Ok(Rgb::new(c[0], c[1], c[2]))
    }

    pub fn read_transform(&mut self) -> Result<Transform, ProtocolError> {
        let b = self.read_array::<TRANSFORM_SIZE>("transform")?;
        Ok(Transform::from_column_major(self.floats_from::<16>(&b)))
    }

    /// Reads the vertex count that opens a vertex array message.
    ///
    /// `extra_floats` is supplied by the caller: the wire does not say how many
    /// attribute floats follow each position.
    pub fn read_vertex_header(&mut self, extra_floats: u32) -> Result<VertexArrayHeader, ProtocolError> {
        let vertex_count = self.read_u32()?;
        let header = VertexArrayHeader { vertex_count, extra_floats };
        log::debug!(
            "vertex array: {vertex_count} vertices x {} floats",
            header.floats_per_vertex()
        );
        Ok(header)
    }

    /// Reads the vertex payload in one bulk read straight into `dest`.
    ///
    /// `dest` must be exactly `header.byte_len()` bytes. On return it holds
    /// host-order floats.
    pub fn read_vertex_payload(
        &mut self,
        header: &VertexArrayHeader,
        dest: &mut [u8],
    ) -> Result<(), ProtocolError> {
        let expected = header.byte_len()?;
        if dest.len() != expected {
            return Err(ProtocolError::DestinationSize {
                what: "vertex array",
                expected,
                actual: dest.len(),
            });
        }
        if expected == 0 {
            return Ok(());
        }
        self.read_exact_into("vertex array", dest)?;
        self.order.swap_words_in_place(dest);
        Ok(())
    }

    /// Reads a whole vertex array into host memory.
    pub fn read_vertex_array(&mut self, extra_floats: u32) -> Result<VertexArray, ProtocolError> {
        let header = self.read_vertex_header(extra_floats)?;
        let mut bytes = vec![0u8; header.byte_len()?];
        self.read_vertex_payload(&header, &mut bytes)?;
        Ok(VertexArray {
            header,
            data: bytemuck::pod_collect_to_vec(&bytes),
        })
    }

    pub fn read_image_header(&mut self) -> Result<ImageHeader, ProtocolError> {
        let width = self.read_u32()?;
        let height = self.read_u32()?;
        log::debug!("image: {width} x {height}");
        Ok(ImageHeader { width, height })
    }

    /// Reads `height` rows, one read call per row, placing row `r` at
    /// `r × row_stride` in `dest`.
    ///
    /// Bytes between the end of a row and the next stride boundary are left
    /// untouched. A short row is fatal: later rows would be misaligned.
    pub fn read_image_into(
        &mut self,
        header: &ImageHeader,
        dest: &mut [u8],
        row_stride: usize,
    ) -> Result<(), ProtocolError> {
        let row_bytes = header.row_bytes()?;
        if row_stride < row_bytes {
            return Err(ProtocolError::DestinationSize {
                what: "image row stride",
                expected: row_bytes,
                actual: row_stride,
            });
        }
        let needed = header.strided_len(row_stride)?;
        if dest.len() < needed {
            return Err(ProtocolError::DestinationSize {
                what: "image",
                expected: needed,
                actual: dest.len(),
            });
        }
        if row_bytes == 0 {
            return Ok(());
        }

        let rows = header.height as usize;
        for row in 0..rows {
            let start = row * row_stride;
            let slot = &mut dest[start..start + row_bytes];
            let actual = self
                .channel
                .read_bytes(slot)
                .map_err(|e| ProtocolError::io("image row", e))?;
            if actual != row_bytes {
                return Err(ProtocolError::ShortRowRead {
                    row,
                    rows,
                    expected: row_bytes,
                    actual,
                });
            }
            self.order.swap_words_in_place(slot);
        }
        Ok(())
    }

    /// Reads a whole image into tightly packed host memory.
    pub fn read_image(&mut self) -> Result<HostImage, ProtocolError> {
        let header = self.read_image_header()?;
        let mut bytes = vec![0u8; header.byte_len()?];
        self.read_image_into(&header, &mut bytes, header.width as usize * RGBA_F32_PIXEL_SIZE)?;
        Ok(HostImage {
            width: header.width,
            height: header.height,
            pixels: bytemuck::pod_collect_to_vec(&bytes),
        })
    }

    fn floats_from<const N: usize>(&self, bytes: &[u8]) -> [f32; N] {
        std::array::from_fn(|i| {
            let word = [bytes[i * 4], bytes[i * 4 + 1], bytes[i * 4 + 2], bytes[i * 4 + 3]];
            f32::from_bits(self.order.u32_from(word))
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::channel::LoopbackChannel;
    use crate::codec::WireCodec;
    use crate::error::ProtocolError;
    use crate::types::{ImageHeader, RGBA_F32_PIXEL_SIZE};

    fn codec_with(bytes: Vec<u8>) -> WireCodec<LoopbackChannel> {
        WireCodec::new(LoopbackChannel::with_incoming(bytes))
    }

    fn floats(values: &[f32]) -> Vec<u8> {
        values.iter().flat_map(|v| v.to_ne_bytes()).collect()
    }

    #[test]
    fn three_vertices_consume_forty_bytes() {
        let mut bytes = 3u32.to_ne_bytes().to_vec();
        bytes.extend(floats(&[0.0, 1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0]));
        bytes.extend([0xAA; 4]); // next message

        let mut codec = codec_with(bytes);
        let array = codec.read_vertex_array(0).unwrap();

        assert_eq!(codec.channel().bytes_consumed(), 40);
        assert_eq!(codec.channel().remaining(), 4);
        assert_eq!(array.data.len(), 9);
        assert_eq!(array.vertex(2), &[6.0, 7.0, 8.0]);
    }

    #[test]
    fn vertex_extras_widen_each_vertex() {
        let mut bytes = 2u32.to_ne_bytes().to_vec();
        bytes.extend(floats(&[1.0; 2 * 5]));
        let mut codec = codec_with(bytes);

        let array = codec.read_vertex_array(2).unwrap();
        assert_eq!(codec.channel().bytes_consumed(), 4 + 2 * 5 * 4);
        assert_eq!(array.header.floats_per_vertex(), 5);
        // Count read, then one bulk payload read.
        assert_eq!(codec.channel().read_calls(), &[4, 40]);
    }

    #[test]
    fn zero_vertices_consume_only_the_count() {
        let mut codec = codec_with(0u32.to_ne_bytes().to_vec());
        let array = codec.read_vertex_array(7).unwrap();
        assert!(array.data.is_empty());
        assert_eq!(codec.channel().bytes_consumed(), 4);
    }

    #[test]
    fn two_by_two_image_reads_row_by_row() {
        let mut bytes = 2u32.to_ne_bytes().to_vec();
        bytes.extend(2u32.to_ne_bytes());
        let pixels: Vec<f32> = (0..16).map(|i| i as f32).collect();
        bytes.extend(floats(&pixels));

        let mut codec = codec_with(bytes);
        let image = codec.read_image().unwrap();

        assert_eq!(codec.channel().bytes_consumed(), 72);
        assert_eq!(codec.channel().read_calls(), &[4, 4, 32, 32]);
        assert_eq!(image.pixels, pixels);
    }

    #[test]
    fn strided_rows_leave_padding_untouched() {
        let header = ImageHeader { width: 1, height: 3 };
        let row = RGBA_F32_PIXEL_SIZE;
        let stride = 64;
        let mut codec = codec_with(floats(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0, 10.0, 11.0, 12.0]));

        let mut dest = vec![0xEEu8; stride * 2 + row];
        codec.read_image_into(&header, &mut dest, stride).unwrap();

        assert_eq!(codec.channel().bytes_consumed(), 48);
        assert_eq!(&dest[..row], floats(&[1.0, 2.0, 3.0, 4.0]).as_slice());
        assert!(dest[row..stride].iter().all(|&b| b == 0xEE));
        assert_eq!(&dest[stride..stride + row], floats(&[5.0, 6.0, 7.0, 8.0]).as_slice());
        assert_eq!(&dest[2 * stride..], floats(&[9.0, 10.0, 11.0, 12.0]).as_slice());
    }

    #[test]
    fn short_scalar_is_a_desync() {
        let mut codec = codec_with(vec![1, 2]);
        let err = codec.read_u32().unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::ShortRead { expected: 4, actual: 2, .. }
        ));
    }

    #[test]
    fn short_image_row_is_fatal() {
        let mut bytes = 1u32.to_ne_bytes().to_vec();
        bytes.extend(2u32.to_ne_bytes());
        bytes.extend(floats(&[0.0; 4 + 2]));

        let mut codec = codec_with(bytes);
        let err = codec.read_image().unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::ShortRowRead { row: 1, rows: 2, expected: 16, actual: 8 }
        ));
    }

    #[test]
    fn empty_stream_reads_as_disconnect() {
        let mut codec = codec_with(Vec::new());
        let err = codec.read_command().unwrap_err();
        assert!(err.is_disconnect());
    }

    #[test]
    fn payload_destination_must_match_header() {
        let mut codec = codec_with(2u32.to_ne_bytes().to_vec());
        let header = codec.read_vertex_header(0).unwrap();
        let mut dest = vec![0u8; 10];
        let err = codec.read_vertex_payload(&header, &mut dest).unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::DestinationSize { expected: 24, actual: 10, .. }
        ));
    }
}
