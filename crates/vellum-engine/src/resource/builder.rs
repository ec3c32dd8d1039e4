use anyhow::{Context, Result};
use vellum_wire::{ByteChannel, WireCodec};

use super::arena::{GpuArena, HostVisible, aligned_row_bytes};

/// Pixel format of every client-supplied image.
pub const IMAGE_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba32Float;

/// Vertex payload resident in an arena buffer.
#[derive(Debug)]
pub struct Vertices<B> {
    pub buffer: B,
    pub vertex_count: u32,
    pub floats_per_vertex: usize,
}

impl<B> Vertices<B> {
    pub fn stride_bytes(&self) -> usize {
        self.floats_per_vertex * vellum_wire::F32_SIZE
    }

    pub fn byte_len(&self) -> usize {
        self.vertex_count as usize * self.stride_bytes()
    }

    pub fn is_empty(&self) -> bool {
        self.vertex_count == 0
    }
}

/// Image built from a wire upload.
#[derive(Debug)]
pub struct Texture<I> {
    pub image: I,
    pub width: u32,
    pub height: u32,
    /// Distance between row starts in the backing buffer.
    pub row_stride: usize,
}

/// Turns wire payloads into GPU resources without an intermediate host copy.
///
/// Bytes are read straight into the arena buffer's host view, then the
/// written range is published once.
pub struct ResourceBuilder<'a, A: GpuArena> {
    arena: &'a mut A,
}

impl<'a, A: GpuArena> ResourceBuilder<'a, A> {
    pub fn new(arena: &'a mut A) -> Self {
        Self { arena }
    }

    /// Reads `[count][count × (3 + extra_floats) floats]` into a new buffer.
    ///
    /// The buffer is exactly as large as the payload.
    pub fn read_vertices<C: ByteChannel>(
        &mut self,
        codec: &mut WireCodec<C>,
        extra_floats: u32,
    ) -> Result<Vertices<A::Buffer>> {
        let header = codec.read_vertex_header(extra_floats)?;
        let len = header.byte_len()?;

        let mut buffer = self
            .arena
            .allocate(len, "vertex buffer")
            .with_context(|| format!("allocating vertex buffer for {} vertices", header.vertex_count))?;
        codec.read_vertex_payload(&header, buffer.contents_mut())?;
        self.arena.mark_modified(&buffer, 0..len);

        Ok(Vertices {
            buffer,
            vertex_count: header.vertex_count,
            floats_per_vertex: header.floats_per_vertex(),
        })
    }

    /// Reads `[width][height][rows]` into an RGBA32Float image.
    ///
    /// Rows land at multiples of the arena's row alignment for
    /// [`IMAGE_FORMAT`]. All rows are consumed before a zero-sized image is
    /// rejected, so the stream stays in sync up to the error.
    pub fn read_texture<C: ByteChannel>(
        &mut self,
        codec: &mut WireCodec<C>,
    ) -> Result<Texture<A::Image>> {
        let header = codec.read_image_header()?;
        let nominal = header.row_bytes()?;
        let alignment = self.arena.minimum_row_alignment(IMAGE_FORMAT);
        let row_stride = aligned_row_bytes(nominal, alignment);
        let len = row_stride
            .checked_mul(header.height as usize)
            .with_context(|| format!("texture {}x{} is too large", header.width, header.height))?;

        let mut buffer = self.arena.allocate(len, "texture buffer").with_context(|| {
            format!("allocating texture buffer for {}x{}", header.width, header.height)
        })?;
        codec.read_image_into(&header, buffer.contents_mut(), row_stride)?;
        self.arena.mark_modified(&buffer, 0..len);

        anyhow::ensure!(
            !header.is_empty(),
            "texture {}x{} has no pixels",
            header.width,
            header.height
        );

        let image = self
            .arena
            .wrap_as_image(buffer, IMAGE_FORMAT, header.width, header.height, row_stride)
            .with_context(|| format!("creating texture {}x{}", header.width, header.height))?;

        Ok(Texture {
            image,
            width: header.width,
            height: header.height,
            row_stride,
        })
    }
}
