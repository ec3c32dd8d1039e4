use std::sync::Arc;

use anyhow::Result;

use crate::device::{GpuDevice, SurfaceView};

use super::pass::PassTarget;
use super::pipelines::PipelineSet;
use super::target::{CapturedFrame, RenderTarget};

/// Draws straight into the view's drawables.
///
/// Frames are presented as soon as they are submitted; the GPU is never
/// waited on, so nothing can be read back.
pub struct LiveSurfaceTarget {
    pipelines: Arc<PipelineSet>,
}

impl LiveSurfaceTarget {
    pub fn new(pipelines: Arc<PipelineSet>) -> Self {
        Self { pipelines }
    }
}

impl RenderTarget for LiveSurfaceTarget {
    fn pipelines(&self) -> &PipelineSet {
        &self.pipelines
    }

    fn acquire_pass_target(&mut self, view: &mut dyn SurfaceView) -> Option<PassTarget> {
        view.current_pass()
    }

    fn finish_frame(
        &mut self,
        gpu: &GpuDevice,
        encoder: wgpu::CommandEncoder,
        pass: PassTarget,
    ) -> Result<()> {
        gpu.submit("live frame", encoder)?;
        pass.present();
        Ok(())
    }

    fn capture_frame(&mut self, _gpu: &GpuDevice) -> Result<Option<CapturedFrame>> {
        Ok(None)
    }
}
