use anyhow::Result;

use crate::device::{GpuDevice, SurfaceView};

use super::draw::DrawOp;
use super::pass::PassTarget;
use super::pipelines::PipelineSet;

/// Pixels of a completed frame, rows tightly packed, RGBA float per pixel.
#[derive(Debug, Clone, PartialEq)]
pub struct CapturedFrame {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<f32>,
}

impl CapturedFrame {
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.pixels)
    }
}

/// Where frames are drawn and how they complete.
///
/// The session holds a `Box<dyn RenderTarget>` and never asks which kind.
pub trait RenderTarget {
    /// Pipelines matching this target's attachments.
    fn pipelines(&self) -> &PipelineSet;

    /// Attachments for the next frame, or `None` if the frame must be skipped.
    fn acquire_pass_target(&mut self, view: &mut dyn SurfaceView) -> Option<PassTarget>;

    /// Submits `encoder`, presents, and for off-screen targets waits for the GPU.
    fn finish_frame(
        &mut self,
        gpu: &GpuDevice,
        encoder: wgpu::CommandEncoder,
        pass: PassTarget,
    ) -> Result<()>;

    /// The target's current pixels, if this target can provide them.
    fn capture_frame(&mut self, gpu: &GpuDevice) -> Result<Option<CapturedFrame>>;
}

/// Clears the target and replays `ops` into it as one frame.
///
/// Returns `false` when no pass target was available and the frame was
/// dropped.
pub fn draw_frame(
    target: &mut dyn RenderTarget,
    gpu: &GpuDevice,
    view: &mut dyn SurfaceView,
    ops: &[DrawOp],
) -> Result<bool> {
    let Some(pass_target) = target.acquire_pass_target(view) else {
        log::debug!("no pass target; dropping {} draws", ops.len());
        return Ok(false);
    };

    let mut encoder = gpu.create_encoder("vellum frame");
    gpu.checked("encoding frame", |device| {
        let mut pass = pass_target.begin(&mut encoder);
        for op in ops {
            op.encode(&mut pass, device, target.pipelines(), pass_target.size);
        }
    })?;

    target.finish_frame(gpu, encoder, pass_target)?;
    Ok(true)
}
