use anyhow::{Context, Result};
use vellum_engine::device::{GpuDevice, GpuInit, HeadlessView};
use vellum_engine::render::{
    CAPTURE_FORMAT, CAPTURE_USAGE, OffscreenTarget, PipelineCache, RenderTarget, capture_supported,
};
use vellum_wire::{LocalSocketChannel, WireCodec};

use crate::config::ServerConfig;
use crate::recovery::recover;
use crate::session::Session;

/// Off-screen default canvas of `width × height` RGBA float pixels.
pub(crate) fn offscreen_canvas(
    gpu: &GpuDevice,
    pipelines: &mut PipelineCache,
    width: u32,
    height: u32,
    depth_stencil_format: wgpu::TextureFormat,
) -> Result<Box<dyn RenderTarget>> {
    anyhow::ensure!(width > 0 && height > 0, "canvas {width}x{height} has no pixels");
    anyhow::ensure!(
        capture_supported(gpu),
        "adapter '{}' cannot render to {CAPTURE_FORMAT:?}; a headless canvas needs it",
        gpu.adapter().get_info().name
    );

    let canvas = gpu.checked("headless canvas", |device| {
        device.create_texture(&wgpu::TextureDescriptor {
            label: Some("vellum canvas"),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: CAPTURE_FORMAT,
            usage: CAPTURE_USAGE | wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[],
        })
    })?;

    let pipelines = pipelines.get(CAPTURE_FORMAT, depth_stencil_format)?;
    let target = OffscreenTarget::new(gpu, &canvas, pipelines)?;
    Ok(Box::new(target))
}

/// Serves clients one after another with no window.
///
/// Only returns on a listener failure, or on a fatal client error when the
/// policy is to exit.
pub fn run(config: &ServerConfig, init: &GpuInit) -> Result<()> {
    let gpu = pollster::block_on(GpuDevice::headless(init))?;
    let depth = init.depth_stencil_format;
    let (width, height) = (config.width, config.height);

    let mut session = Session::new(gpu, depth, |gpu, pipelines| {
        offscreen_canvas(gpu, pipelines, width, height, depth)
    })?;
    let mut view = HeadlessView::new(CAPTURE_FORMAT, depth);

    let mut channel = LocalSocketChannel::bind(&config.address)
        .with_context(|| format!("failed to bind {}", config.address.display()))?;
    channel.set_blocking_accept(true);
    let mut codec = WireCodec::with_byte_order(channel, config.byte_order);

    log::info!("headless canvas {width}x{height}, waiting for clients");
    loop {
        if !codec.accept_connection()? {
            continue;
        }
        if let Err(err) = session.handle_next(&mut codec, &mut view) {
            recover(err, config.on_fatal, &mut codec, &mut session)?;
        }
    }
}

#[cfg(test)]
mod tests {
    use vellum_engine::device::GpuInit;

    use super::*;

    const DEPTH: wgpu::TextureFormat = wgpu::TextureFormat::Depth24PlusStencil8;

    #[test]
    fn canvas_is_refused_cleanly_where_float_rendering_is_missing() {
        let gpu = match pollster::block_on(GpuDevice::headless(&GpuInit::default())) {
            Ok(gpu) => gpu,
            Err(err) => {
                eprintln!("skipping: {err:#}");
                return;
            }
        };
        let mut pipelines = PipelineCache::new(gpu.device());

        let canvas = offscreen_canvas(&gpu, &mut pipelines, 4, 4, DEPTH);
        assert_eq!(canvas.is_ok(), capture_supported(&gpu));
        if let Err(err) = canvas {
            assert!(format!("{err:#}").contains("cannot render to"));
        }
    }

    #[test]
    fn empty_canvas_is_rejected() {
        let gpu = match pollster::block_on(GpuDevice::headless(&GpuInit::default())) {
            Ok(gpu) => gpu,
            Err(err) => {
                eprintln!("skipping: {err:#}");
                return;
            }
        };
        let mut pipelines = PipelineCache::new(gpu.device());
        assert!(offscreen_canvas(&gpu, &mut pipelines, 0, 4, DEPTH).is_err());
    }
}
