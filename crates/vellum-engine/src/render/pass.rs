/// Attachments and clear values for one frame's render pass.
///
/// Color and depth/stencil are cleared at the start of the pass. Only color is
/// stored; depth and stencil are scratch for the duration of the pass.
pub struct PassTarget {
    pub color_view: wgpu::TextureView,
    pub depth_stencil_view: wgpu::TextureView,
    pub clear_color: wgpu::Color,
    pub clear_depth: f32,
    pub clear_stencil: u32,
    /// Physical size of the attachments.
    pub size: (u32, u32),
    /// Swapchain image to present once the frame is submitted.
    drawable: Option<wgpu::SurfaceTexture>,
}

impl PassTarget {
    pub fn new(
        color_view: wgpu::TextureView,
        depth_stencil_view: wgpu::TextureView,
        size: (u32, u32),
    ) -> Self {
        Self {
            color_view,
            depth_stencil_view,
            clear_color: wgpu::Color::BLACK,
            clear_depth: 1.0,
            clear_stencil: 0,
            size,
            drawable: None,
        }
    }

    pub fn with_clear(mut self, color: wgpu::Color, depth: f32) -> Self {
        self.clear_color = color;
        self.clear_depth = depth;
        self
    }

    pub fn with_drawable(mut self, drawable: wgpu::SurfaceTexture) -> Self {
        self.drawable = Some(drawable);
        self
    }

    pub fn has_drawable(&self) -> bool {
        self.drawable.is_some()
    }

    /// Opens the frame's render pass on `encoder`.
    pub fn begin<'e>(&self, encoder: &'e mut wgpu::CommandEncoder) -> wgpu::RenderPass<'e> {
        encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("vellum frame pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &self.color_view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(self.clear_color),
                    store: wgpu::StoreOp::Store,
                },
                depth_slice: None,
            })],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: &self.depth_stencil_view,
                depth_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Clear(self.clear_depth),
                    store: wgpu::StoreOp::Discard,
                }),
                stencil_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Clear(self.clear_stencil),
                    store: wgpu::StoreOp::Discard,
                }),
            }),
            timestamp_writes: None,
            occlusion_query_set: None,
            multiview_mask: None,
        })
    }

    /// Presents the drawable, if any. Call after the frame was submitted.
    pub fn present(self) {
        if let Some(drawable) = self.drawable {
            drawable.present();
        }
    }
}
