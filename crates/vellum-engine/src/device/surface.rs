use anyhow::{Context, Result};
use wgpu::SurfaceError;
use winit::dpi::PhysicalSize;

use super::{GpuDevice, GpuInit, SurfaceView};
use crate::render::PassTarget;

/// What the frame loop should do after a failed drawable acquisition.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum SurfaceErrorAction {
    /// Surface was reconfigured; the next flush may succeed.
    Reconfigured,
    /// Transient; this frame is dropped.
    SkipFrame,
    /// Unrecoverable (commonly OOM).
    Fatal,
}

/// Window-backed display surface plus its depth/stencil attachment.
///
/// Plays the role of the on-screen view: it owns the swapchain configuration,
/// resizes the depth buffer alongside it, and carries the clear values the
/// client sets.
pub struct WindowSurface<'w> {
    /// Surface bound to the window; the window must outlive it.
    surface: wgpu::Surface<'w>,

    device: wgpu::Device,

    /// Active surface configuration.
    config: wgpu::SurfaceConfiguration,

    /// Current drawable size in physical pixels.
    size: PhysicalSize<u32>,

    depth_stencil_format: wgpu::TextureFormat,
    depth_stencil: wgpu::TextureView,

    clear_color: wgpu::Color,
    clear_depth: f32,

    /// Set once the surface reports an unrecoverable error.
    lost: bool,
}

impl<'w> WindowSurface<'w> {
    pub fn new(
        gpu: &GpuDevice,
        surface: wgpu::Surface<'w>,
        size: PhysicalSize<u32>,
        init: &GpuInit,
    ) -> Result<Self> {
        anyhow::ensure!(size.width > 0 && size.height > 0, "window has zero size");

        let caps = surface.get_capabilities(gpu.adapter());
        let prefs = &init.surface;
        let format =
            choose_surface_format(&caps, prefs.srgb).context("no supported surface formats")?;
        let alpha_mode = choose_alpha_mode(&caps, prefs.alpha_mode);

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: size.width,
            height: size.height,
            present_mode: prefs.present_mode,
            alpha_mode,
            view_formats: vec![],
            desired_maximum_frame_latency: prefs.max_frame_latency,
        };
        surface.configure(gpu.device(), &config);
        log::info!("window surface {}x{} {:?}", size.width, size.height, format);

        let depth_stencil = gpu.checked("window depth/stencil", |device| {
            create_depth_stencil(device, init.depth_stencil_format, size.width, size.height)
        })?;

        Ok(Self {
            surface,
            device: gpu.device().clone(),
            config,
            size,
            depth_stencil_format: init.depth_stencil_format,
            depth_stencil,
            clear_color: wgpu::Color::BLACK,
            clear_depth: 1.0,
            lost: false,
        })
    }

    /// Returns the current drawable size (physical pixels).
    pub fn size(&self) -> PhysicalSize<u32> {
        self.size
    }

    pub fn is_lost(&self) -> bool {
        self.lost
    }

    /// Reconfigures the surface after a resize.
    ///
    /// wgpu does not support configuring a surface with a 0x0 size; in that case,
    /// only internal state is updated and configuration is deferred.
    pub fn resize(&mut self, new_size: PhysicalSize<u32>) {
        self.size = new_size;
        if new_size.width == 0 || new_size.height == 0 {
            return;
        }

        self.config.width = new_size.width;
        self.config.height = new_size.height;
        self.surface.configure(&self.device, &self.config);
        self.depth_stencil = create_depth_stencil(
            &self.device,
            self.depth_stencil_format,
            new_size.width,
            new_size.height,
        );
    }

    /// Converts a `SurfaceError` into a higher-level action.
    pub fn handle_surface_error(&mut self, err: SurfaceError) -> SurfaceErrorAction {
        match err {
            SurfaceError::Lost | SurfaceError::Outdated => {
                if self.size.width > 0 && self.size.height > 0 {
                    self.surface.configure(&self.device, &self.config);
                }
                SurfaceErrorAction::Reconfigured
            }
            SurfaceError::OutOfMemory => SurfaceErrorAction::Fatal,
            SurfaceError::Timeout | SurfaceError::Other => SurfaceErrorAction::SkipFrame,
        }
    }
}

impl SurfaceView for WindowSurface<'_> {
    fn color_format(&self) -> wgpu::TextureFormat {
        self.config.format
    }

    fn depth_stencil_format(&self) -> wgpu::TextureFormat {
        self.depth_stencil_format
    }

    fn clear_color(&self) -> wgpu::Color {
        self.clear_color
    }

    fn set_clear_color(&mut self, color: wgpu::Color) {
        self.clear_color = color;
    }

    fn clear_depth(&self) -> f32 {
        self.clear_depth
    }

    fn current_pass(&mut self) -> Option<PassTarget> {
        if self.size.width == 0 || self.size.height == 0 {
            return None;
        }

        let drawable = match self.surface.get_current_texture() {
            Ok(t) => t,
            Err(err) => {
                let reason = err.to_string();
                let action = self.handle_surface_error(err);
                match action {
                    SurfaceErrorAction::Fatal => {
                        log::error!("window surface lost: {reason}");
                        self.lost = true;
                    }
                    _ => log::debug!("no drawable this frame ({reason}): {action:?}"),
                }
                return None;
            }
        };

        let color_view = drawable
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        Some(
            PassTarget::new(
                color_view,
                self.depth_stencil.clone(),
                (self.size.width, self.size.height),
            )
            .with_clear(self.clear_color, self.clear_depth)
            .with_drawable(drawable),
        )
    }
}

/// Depth/stencil attachment sized to match a color target.
pub(crate) fn create_depth_stencil(
    device: &wgpu::Device,
    format: wgpu::TextureFormat,
    width: u32,
    height: u32,
) -> wgpu::TextureView {
    device
        .create_texture(&wgpu::TextureDescriptor {
            label: Some("vellum depth/stencil"),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        })
        .create_view(&wgpu::TextureViewDescriptor::default())
}

fn choose_surface_format(
    caps: &wgpu::SurfaceCapabilities,
    prefer_srgb: bool,
) -> Option<wgpu::TextureFormat> {
    if prefer_srgb {
        let preferred = [
            wgpu::TextureFormat::Bgra8UnormSrgb,
            wgpu::TextureFormat::Rgba8UnormSrgb,
        ];
        if let Some(f) = preferred.into_iter().find(|f| caps.formats.contains(f)) {
            return Some(f);
        }
    }
    caps.formats.first().copied()
}

fn choose_alpha_mode(
    caps: &wgpu::SurfaceCapabilities,
    requested: Option<wgpu::CompositeAlphaMode>,
) -> wgpu::CompositeAlphaMode {
    requested
        .filter(|m| caps.alpha_modes.contains(m))
        .or_else(|| caps.alpha_modes.first().copied())
        .unwrap_or(wgpu::CompositeAlphaMode::Auto)
}
