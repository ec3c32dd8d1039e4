use crate::render::PassTarget;

/// What a render target needs from the thing being displayed.
///
/// A window surface hands out a fresh drawable every frame; a headless view
/// never has one. Clear values live here so that switching render targets
/// keeps the client's clear color.
pub trait SurfaceView {
    fn color_format(&self) -> wgpu::TextureFormat;
    fn depth_stencil_format(&self) -> wgpu::TextureFormat;

    fn clear_color(&self) -> wgpu::Color;
    fn set_clear_color(&mut self, color: wgpu::Color);
    fn clear_depth(&self) -> f32;

    /// Attachments for the current drawable, or `None` if none is free.
    fn current_pass(&mut self) -> Option<PassTarget>;
}

/// View with no display behind it.
#[derive(Debug, Clone)]
pub struct HeadlessView {
    color_format: wgpu::TextureFormat,
    depth_stencil_format: wgpu::TextureFormat,
    clear_color: wgpu::Color,
    clear_depth: f32,
}

impl HeadlessView {
    pub fn new(color_format: wgpu::TextureFormat, depth_stencil_format: wgpu::TextureFormat) -> Self {
        Self {
            color_format,
            depth_stencil_format,
            clear_color: wgpu::Color::BLACK,
            clear_depth: 1.0,
        }
    }
}

impl SurfaceView for HeadlessView {
    fn color_format(&self) -> wgpu::TextureFormat {
        self.color_format
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
        None
    }
}
