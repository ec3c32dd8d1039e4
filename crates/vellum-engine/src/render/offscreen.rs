use std::sync::Arc;

use anyhow::Result;
use vellum_wire::RGBA_F32_PIXEL_SIZE;

use crate::device::{GpuDevice, SurfaceView, create_depth_stencil};

use super::pass::PassTarget;
use super::pipelines::PipelineSet;
use super::readback::{Readback, read_texture};
use super::target::{CapturedFrame, RenderTarget};

/// The only color format whose frames can be captured.
pub const CAPTURE_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba32Float;

/// Usages a texture needs to serve as a capturable off-screen target.
pub const CAPTURE_USAGE: wgpu::TextureUsages =
    wgpu::TextureUsages::RENDER_ATTACHMENT.union(wgpu::TextureUsages::COPY_SRC);

/// Whether `gpu` can render into [`CAPTURE_FORMAT`] and copy it back.
///
/// Downlevel adapters (GL on llvmpipe, for one) can sample RGBA32Float but
/// not render to it.
pub fn capture_supported(gpu: &GpuDevice) -> bool {
    gpu.supports_usages(CAPTURE_FORMAT, CAPTURE_USAGE)
}

/// Bytes in a captured `width × height` frame, or `None` if `format` cannot
/// be captured.
pub fn capture_byte_len(format: wgpu::TextureFormat, width: u32, height: u32) -> Option<usize> {
    if format != CAPTURE_FORMAT {
        return None;
    }
    (width as usize)
        .checked_mul(height as usize)?
        .checked_mul(RGBA_F32_PIXEL_SIZE)
}

/// Counts frames handed to the GPU and frames known to be finished.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FrameSync {
    submitted: u64,
    completed: u64,
}

impl FrameSync {
    /// Registers a submission and returns its frame number (from 1).
    pub fn submit(&mut self) -> u64 {
        self.submitted += 1;
        self.submitted
    }

    pub fn complete(&mut self, frame: u64) {
        debug_assert!(frame <= self.submitted);
        self.completed = self.completed.max(frame);
    }

    pub fn has_completed_frame(&self) -> bool {
        self.completed > 0
    }

    pub fn in_flight(&self) -> u64 {
        self.submitted - self.completed
    }
}

/// Renders into an existing texture and waits for each frame to finish.
///
/// Attachments are fixed at construction; clear values are taken from the
/// view every frame. When the texture is [`CAPTURE_FORMAT`], each frame is
/// also copied to a host-readable buffer, and capture returns the texture's
/// current contents whether or not a frame has been drawn yet.
pub struct OffscreenTarget {
    pipelines: Arc<PipelineSet>,
    color: wgpu::Texture,
    color_view: wgpu::TextureView,
    depth_stencil_view: wgpu::TextureView,
    readback: Option<Readback>,
    sync: FrameSync,
}

impl OffscreenTarget {
    pub fn new(gpu: &GpuDevice, color: &wgpu::Texture, pipelines: Arc<PipelineSet>) -> Result<Self> {
        anyhow::ensure!(
            color.usage().contains(wgpu::TextureUsages::RENDER_ATTACHMENT),
            "texture {}x{} cannot be rendered into",
            color.width(),
            color.height()
        );
        anyhow::ensure!(
            pipelines.color_format() == color.format(),
            "pipelines for {:?} cannot draw into {:?}",
            pipelines.color_format(),
            color.format()
        );

        let depth_stencil_view = gpu.checked("off-screen depth/stencil", |device| {
            create_depth_stencil(
                device,
                pipelines.depth_stencil_format(),
                color.width(),
                color.height(),
            )
        })?;

        let readback = if color.format() == CAPTURE_FORMAT {
            anyhow::ensure!(
                color.usage().contains(wgpu::TextureUsages::COPY_SRC),
                "capture texture must allow copies out"
            );
            Some(Readback::new(gpu.device(), color)?)
        } else {
            None
        };

        log::debug!(
            "off-screen target {}x{} {:?} (capture {})",
            color.width(),
            color.height(),
            color.format(),
            if readback.is_some() { "on" } else { "off" }
        );

        Ok(Self {
            pipelines,
            color: color.clone(),
            color_view: color.create_view(&wgpu::TextureViewDescriptor::default()),
            depth_stencil_view,
            readback,
            sync: FrameSync::default(),
        })
    }

    pub fn texture(&self) -> &wgpu::Texture {
        &self.color
    }

    pub fn size(&self) -> (u32, u32) {
        (self.color.width(), self.color.height())
    }

    pub fn frame_sync(&self) -> FrameSync {
        self.sync
    }
}

impl RenderTarget for OffscreenTarget {
    fn pipelines(&self) -> &PipelineSet {
        &self.pipelines
    }

    fn acquire_pass_target(&mut self, view: &mut dyn SurfaceView) -> Option<PassTarget> {
        Some(
            PassTarget::new(
                self.color_view.clone(),
                self.depth_stencil_view.clone(),
                self.size(),
            )
            .with_clear(view.clear_color(), view.clear_depth()),
        )
    }

    fn finish_frame(
        &mut self,
        gpu: &GpuDevice,
        mut encoder: wgpu::CommandEncoder,
        pass: PassTarget,
    ) -> Result<()> {
        if let Some(readback) = &self.readback {
            readback.encode_copy(&mut encoder, &self.color);
        }

        let frame = self.sync.submit();
        gpu.submit("off-screen frame", encoder)?;
        pass.present();

        gpu.wait_idle()?;
        self.sync.complete(frame);
        Ok(())
    }

    fn capture_frame(&mut self, gpu: &GpuDevice) -> Result<Option<CapturedFrame>> {
        let Some(readback) = &self.readback else {
            return Ok(None);
        };

        // Nothing rendered yet: the texture still holds whatever it was
        // created or uploaded with.
        let bytes = if self.sync.has_completed_frame() {
            readback.read_packed(gpu)?
        } else {
            read_texture(gpu, &self.color)?.into_packed()
        };
        debug_assert_eq!(
            Some(bytes.len()),
            capture_byte_len(self.color.format(), readback.width(), readback.height())
        );

        Ok(Some(CapturedFrame {
            width: readback.width(),
            height: readback.height(),
            pixels: bytemuck::pod_collect_to_vec(&bytes),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_rgba_float_can_be_captured() {
        assert_eq!(capture_byte_len(CAPTURE_FORMAT, 2, 3), Some(96));
        assert_eq!(capture_byte_len(wgpu::TextureFormat::Bgra8Unorm, 2, 3), None);
        assert_eq!(capture_byte_len(wgpu::TextureFormat::Rgba16Float, 2, 3), None);
        assert_eq!(capture_byte_len(CAPTURE_FORMAT, 0, 3), Some(0));
    }

    #[test]
    fn nothing_completed_before_the_first_frame() {
        let mut sync = FrameSync::default();
        assert!(!sync.has_completed_frame());

        let first = sync.submit();
        assert_eq!(first, 1);
        assert_eq!(sync.in_flight(), 1);
        assert!(!sync.has_completed_frame());

        sync.complete(first);
        assert!(sync.has_completed_frame());
        assert_eq!(sync.in_flight(), 0);
    }

    #[test]
    fn completion_never_goes_backwards() {
        let mut sync = FrameSync::default();
        let a = sync.submit();
        let b = sync.submit();
        sync.complete(b);
        sync.complete(a);
        assert_eq!(sync.in_flight(), 0);
    }
}
