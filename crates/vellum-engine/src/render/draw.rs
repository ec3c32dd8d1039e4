use vellum_wire::Transform;
use wgpu::util::DeviceExt;

use super::pipelines::{FrameUniforms, PipelineSet};

/// Which pipeline a queued draw uses.
#[derive(Debug, Clone)]
pub enum DrawKind {
    Dots,
    Arcs,
    VerticesWithColor,
    /// Textured triangles; holds the sampled image's view.
    Texture(wgpu::TextureView),
}

/// One client draw command, recorded until the frame's pass is open.
///
/// The transform is captured when the command arrives so later transform
/// changes do not affect it.
#[derive(Debug, Clone)]
pub struct DrawOp {
    pub kind: DrawKind,
    pub vertices: wgpu::Buffer,
    pub vertex_count: u32,
    pub xform: Transform,
}

impl DrawOp {
    pub fn new(kind: DrawKind, vertices: wgpu::Buffer, vertex_count: u32, xform: Transform) -> Self {
        Self {
            kind,
            vertices,
            vertex_count,
            xform,
        }
    }

    /// Records this draw into `pass`. Empty draws record nothing.
    pub fn encode(
        &self,
        pass: &mut wgpu::RenderPass<'_>,
        device: &wgpu::Device,
        pipelines: &PipelineSet,
        size: (u32, u32),
    ) {
        if self.vertex_count == 0 {
            return;
        }

        let uniforms = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("vellum draw uniforms"),
            contents: bytemuck::bytes_of(&FrameUniforms::new(&self.xform, size)),
            usage: wgpu::BufferUsages::UNIFORM,
        });
        let uniform_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("vellum draw uniforms bind group"),
            layout: &pipelines.uniform_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: uniforms.as_entire_binding(),
            }],
        });

        pass.set_bind_group(0, &uniform_group, &[]);
        pass.set_vertex_buffer(0, self.vertices.slice(..));

        match &self.kind {
            DrawKind::Dots => {
                pass.set_pipeline(&pipelines.dots);
                pass.draw(0..6, 0..self.vertex_count);
            }
            DrawKind::Arcs => {
                pass.set_pipeline(&pipelines.arcs);
                pass.draw(0..6, 0..self.vertex_count);
            }
            DrawKind::VerticesWithColor => {
                pass.set_pipeline(&pipelines.vertices_with_color);
                pass.draw(0..self.vertex_count, 0..1);
            }
            DrawKind::Texture(view) => {
                let texture_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
                    label: Some("vellum texture bind group"),
                    layout: &pipelines.texture_layout,
                    entries: &[
                        wgpu::BindGroupEntry {
                            binding: 0,
                            resource: wgpu::BindingResource::TextureView(view),
                        },
                        wgpu::BindGroupEntry {
                            binding: 1,
                            resource: wgpu::BindingResource::Sampler(&pipelines.sampler),
                        },
                    ],
                });
                pass.set_pipeline(&pipelines.texture);
                pass.set_bind_group(1, &texture_group, &[]);
                pass.draw(0..self.vertex_count, 0..1);
            }
        }
    }
}
