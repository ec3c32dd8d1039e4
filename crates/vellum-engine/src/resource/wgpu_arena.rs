use std::ops::Range;

use anyhow::Result;

use crate::device::{GpuDevice, capture_errors, format_features};

use super::arena::{GpuArena, HostVisible};

/// Buffer usages every arena allocation carries.
///
/// One buffer type serves both vertex payloads and texture backing storage.
const BUFFER_USAGE: wgpu::BufferUsages = wgpu::BufferUsages::VERTEX
    .union(wgpu::BufferUsages::COPY_DST)
    .union(wgpu::BufferUsages::COPY_SRC);

/// Texture usages every image created from an uploaded buffer carries.
pub const IMAGE_USAGE: wgpu::TextureUsages = wgpu::TextureUsages::TEXTURE_BINDING
    .union(wgpu::TextureUsages::COPY_DST)
    .union(wgpu::TextureUsages::COPY_SRC);

/// Usages for an image of a format allowing `allowed`.
///
/// Images also become renderable (so clients can draw into them) where the
/// adapter permits; elsewhere they can only be sampled and read back.
pub fn image_usage(allowed: wgpu::TextureUsages) -> wgpu::TextureUsages {
    IMAGE_USAGE | (allowed & wgpu::TextureUsages::RENDER_ATTACHMENT)
}

/// GPU buffer paired with a CPU shadow the builder writes into.
///
/// The shadow is the "managed" half: nothing reaches the GPU until
/// [`WgpuArena::mark_modified`] uploads a range.
pub struct ManagedBuffer {
    buffer: wgpu::Buffer,
    shadow: Vec<u8>,
    len: usize,
}

impl ManagedBuffer {
    pub fn buffer(&self) -> &wgpu::Buffer {
        &self.buffer
    }

    /// Bytes the caller asked for (the GPU buffer may be slightly larger).
    pub fn byte_len(&self) -> usize {
        self.len
    }
}

impl HostVisible for ManagedBuffer {
    fn contents_mut(&mut self) -> &mut [u8] {
        &mut self.shadow[..self.len]
    }

    fn len(&self) -> usize {
        self.len
    }
}

/// Sampled/renderable 2-D image plus the linear buffer it was uploaded from.
pub struct GpuImage {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    backing: wgpu::Buffer,
    row_stride: usize,
}

impl GpuImage {
    pub fn texture(&self) -> &wgpu::Texture {
        &self.texture
    }

    pub fn view(&self) -> &wgpu::TextureView {
        &self.view
    }

    /// Linear storage the image was filled from, rows `row_stride` apart.
    pub fn backing(&self) -> &wgpu::Buffer {
        &self.backing
    }

    pub fn row_stride(&self) -> usize {
        self.row_stride
    }

    pub fn width(&self) -> u32 {
        self.texture.width()
    }

    pub fn height(&self) -> u32 {
        self.texture.height()
    }

    pub fn format(&self) -> wgpu::TextureFormat {
        self.texture.format()
    }
}

/// [`GpuArena`] over a wgpu device.
pub struct WgpuArena {
    adapter: wgpu::Adapter,
    device: wgpu::Device,
    queue: wgpu::Queue,
    limits: wgpu::Limits,
}

impl WgpuArena {
    pub fn new(gpu: &GpuDevice) -> Self {
        Self {
            adapter: gpu.adapter().clone(),
            device: gpu.device().clone(),
            queue: gpu.queue().clone(),
            limits: gpu.device().limits(),
        }
    }
}

impl GpuArena for WgpuArena {
    type Buffer = ManagedBuffer;
    type Image = GpuImage;

    fn allocate(&mut self, size: usize, label: &'static str) -> Result<ManagedBuffer> {
        // wgpu copies work in 4-byte units; zero-sized buffers are not useful.
        let gpu_size = (size.max(1) as u64).next_multiple_of(wgpu::COPY_BUFFER_ALIGNMENT);
        anyhow::ensure!(
            gpu_size <= self.limits.max_buffer_size,
            "{label}: {size} bytes exceeds the device buffer limit of {}",
            self.limits.max_buffer_size
        );

        let buffer = capture_errors(&self.device, label, || {
            self.device.create_buffer(&wgpu::BufferDescriptor {
                label: Some(label),
                size: gpu_size,
                usage: BUFFER_USAGE,
                mapped_at_creation: false,
            })
        })?;

        Ok(ManagedBuffer {
            buffer,
            shadow: vec![0u8; gpu_size as usize],
            len: size,
        })
    }

    fn mark_modified(&mut self, buffer: &ManagedBuffer, range: Range<usize>) {
        if range.is_empty() {
            return;
        }
        let align = wgpu::COPY_BUFFER_ALIGNMENT as usize;
        let start = range.start / align * align;
        let end = range.end.next_multiple_of(align).min(buffer.shadow.len());
        self.queue
            .write_buffer(&buffer.buffer, start as u64, &buffer.shadow[start..end]);
    }

    fn minimum_row_alignment(&self, _format: wgpu::TextureFormat) -> usize {
        wgpu::COPY_BYTES_PER_ROW_ALIGNMENT as usize
    }

    fn wrap_as_image(
        &mut self,
        buffer: ManagedBuffer,
        format: wgpu::TextureFormat,
        width: u32,
        height: u32,
        row_stride: usize,
    ) -> Result<GpuImage> {
        let max_dim = self.limits.max_texture_dimension_2d;
        anyhow::ensure!(
            width > 0 && height > 0,
            "texture {width}x{height} has no pixels"
        );
        anyhow::ensure!(
            width <= max_dim && height <= max_dim,
            "texture {width}x{height} exceeds the device limit of {max_dim}"
        );
        anyhow::ensure!(
            row_stride % self.minimum_row_alignment(format) == 0,
            "texture row stride {row_stride} is not aligned"
        );
        let bytes_per_row = u32::try_from(row_stride)?;

        let size = wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        };
        let features = format_features(&self.adapter, &self.device, format);
        anyhow::ensure!(
            features.allowed_usages.contains(IMAGE_USAGE),
            "{format:?} textures cannot be sampled and copied on this adapter"
        );
        let usage = image_usage(features.allowed_usages);

        let texture = capture_errors(&self.device, "texture upload", || {
            let texture = self.device.create_texture(&wgpu::TextureDescriptor {
                label: Some("vellum client texture"),
                size,
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format,
                usage,
                view_formats: &[],
            });

            let mut encoder = self
                .device
                .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                    label: Some("vellum texture upload"),
                });
            encoder.copy_buffer_to_texture(
                wgpu::TexelCopyBufferInfo {
                    buffer: &buffer.buffer,
                    layout: wgpu::TexelCopyBufferLayout {
                        offset: 0,
                        bytes_per_row: Some(bytes_per_row),
                        rows_per_image: Some(height),
                    },
                },
                wgpu::TexelCopyTextureInfo {
                    texture: &texture,
                    mip_level: 0,
                    origin: wgpu::Origin3d::ZERO,
                    aspect: wgpu::TextureAspect::All,
                },
                size,
            );
            self.queue.submit(Some(encoder.finish()));
            texture
        })?;

        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Ok(GpuImage {
            texture,
            view,
            backing: buffer.buffer,
            row_stride,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn images_are_renderable_only_where_allowed() {
        let full = wgpu::TextureUsages::all();
        assert!(image_usage(full).contains(wgpu::TextureUsages::RENDER_ATTACHMENT));

        // Rgba32Float on downlevel GL adapters.
        let downlevel = wgpu::TextureUsages::COPY_SRC
            | wgpu::TextureUsages::COPY_DST
            | wgpu::TextureUsages::TEXTURE_BINDING
            | wgpu::TextureUsages::STORAGE_BINDING;
        assert_eq!(image_usage(downlevel), IMAGE_USAGE);
    }

    #[test]
    fn image_usage_never_widens_past_render_attachment() {
        let usage = image_usage(wgpu::TextureUsages::all());
        assert!(!usage.contains(wgpu::TextureUsages::STORAGE_BINDING));
        assert_eq!(usage - wgpu::TextureUsages::RENDER_ATTACHMENT, IMAGE_USAGE);
    }
}
