use std::sync::mpsc;

use anyhow::{Context, Result};

use crate::device::{GpuDevice, capture_errors};
use crate::resource::aligned_row_bytes;

/// Texture rows copied to host memory at the GPU's copy pitch.
#[derive(Debug, Clone)]
pub struct StridedPixels {
    pub width: u32,
    pub height: u32,
    /// Bytes of pixel data per row, without padding.
    pub row_bytes: usize,
    /// Distance between row starts in `bytes`.
    pub row_stride: usize,
    pub bytes: Vec<u8>,
}

impl StridedPixels {
    /// Drops row padding.
    pub fn into_packed(self) -> Vec<u8> {
        if self.row_stride == self.row_bytes {
            return self.bytes;
        }
        let mut packed = Vec::with_capacity(self.row_bytes * self.height as usize);
        for row in self.bytes.chunks(self.row_stride).take(self.height as usize) {
            packed.extend_from_slice(&row[..self.row_bytes]);
        }
        packed
    }
}

/// Host-readable staging buffer sized for one texture.
///
/// Copies are encoded into a caller's command buffer; reading blocks until
/// the GPU has finished them.
pub struct Readback {
    buffer: wgpu::Buffer,
    width: u32,
    height: u32,
    row_bytes: usize,
    row_stride: usize,
}

impl Readback {
    pub fn new(device: &wgpu::Device, texture: &wgpu::Texture) -> Result<Self> {
        let (width, height) = (texture.width(), texture.height());
        let pixel_bytes = texture
            .format()
            .block_copy_size(Some(wgpu::TextureAspect::All))
            .with_context(|| format!("{:?} cannot be copied to a buffer", texture.format()))?
            as usize;
        let row_bytes = width as usize * pixel_bytes;
        let row_stride = aligned_row_bytes(row_bytes, wgpu::COPY_BYTES_PER_ROW_ALIGNMENT as usize);
        let size = (row_stride * height as usize).max(wgpu::COPY_BUFFER_ALIGNMENT as usize);

        let buffer = capture_errors(device, "readback buffer", || {
            device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("vellum readback buffer"),
                size: size as u64,
                usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
                mapped_at_creation: false,
            })
        })?;

        Ok(Self {
            buffer,
            width,
            height,
            row_bytes,
            row_stride,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Records a copy of `texture` into the staging buffer.
    pub fn encode_copy(&self, encoder: &mut wgpu::CommandEncoder, texture: &wgpu::Texture) {
        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyBufferInfo {
                buffer: &self.buffer,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(self.row_stride as u32),
                    rows_per_image: Some(self.height),
                },
            },
            wgpu::Extent3d {
                width: self.width,
                height: self.height,
                depth_or_array_layers: 1,
            },
        );
    }

    /// Maps the staging buffer and copies it out, padding included.
    pub fn read_strided(&self, gpu: &GpuDevice) -> Result<StridedPixels> {
        let len = (self.row_stride * self.height as usize) as u64;
        let bytes = if len == 0 {
            Vec::new()
        } else {
            let slice = self.buffer.slice(..len);
            let (tx, rx) = mpsc::channel();
            slice.map_async(wgpu::MapMode::Read, move |res| {
                let _ = tx.send(res);
            });
            gpu.wait_idle()?;
            rx.recv()
                .context("readback map callback never ran")?
                .context("failed to map readback buffer")?;

            let mapped = slice.get_mapped_range();
            let out = mapped.to_vec();
            drop(mapped);
            self.buffer.unmap();
            out
        };

        Ok(StridedPixels {
            width: self.width,
            height: self.height,
            row_bytes: self.row_bytes,
            row_stride: self.row_stride,
            bytes,
        })
    }

    /// Like [`read_strided`](Self::read_strided) with rows packed tightly.
    pub fn read_packed(&self, gpu: &GpuDevice) -> Result<Vec<u8>> {
        Ok(self.read_strided(gpu)?.into_packed())
    }
}

/// Copies the current contents of `texture` back to the host.
///
/// Submits its own command buffer and waits for it.
pub fn read_texture(gpu: &GpuDevice, texture: &wgpu::Texture) -> Result<StridedPixels> {
    let readback = Readback::new(gpu.device(), texture)?;
    let mut encoder = gpu.create_encoder("vellum texture readback");
    readback.encode_copy(&mut encoder, texture);
    gpu.submit("texture readback", encoder)?;
    readback.read_strided(gpu)
}
