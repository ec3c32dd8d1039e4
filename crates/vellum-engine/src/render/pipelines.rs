use std::sync::Arc;

use anyhow::{Context, Result};
use bytemuck::{Pod, Zeroable};
use vellum_wire::{F32_SIZE, POSITION_FLOATS, Transform};

use crate::device::capture_errors;

/// Floats after the position for each draw kind.
pub const DOT_EXTRA_FLOATS: u32 = 8; // rgba, size xy, shape, border
pub const ARC_EXTRA_FLOATS: u32 = 11; // rgba, radii x4, wedge start/sweep, border
pub const COLORED_VERTEX_EXTRA_FLOATS: u32 = 3; // rgb
pub const TEXTURED_VERTEX_EXTRA_FLOATS: u32 = 2; // uv

/// Per-draw uniform block (80 bytes), shared by every shader at group 0.
#[repr(C)]
#[derive(Debug, Copy, Clone, Pod, Zeroable)]
pub struct FrameUniforms {
    pub xform: [[f32; 4]; 4],
    /// Target size in pixels.
    pub viewport: [f32; 2],
    pub _pad: [f32; 2], // 16-byte alignment
}

impl FrameUniforms {
    pub fn new(xform: &Transform, size: (u32, u32)) -> Self {
        Self {
            xform: xform.columns,
            viewport: [size.0.max(1) as f32, size.1.max(1) as f32],
            _pad: [0.0; 2],
        }
    }
}

// ── vertex layouts ────────────────────────────────────────────────────────

const DOT_ATTRS: [wgpu::VertexAttribute; 5] = wgpu::vertex_attr_array![
    0 => Float32x3, // position
    1 => Float32x4, // color
    2 => Float32x2, // size
    3 => Float32,   // shape
    4 => Float32    // border
];

const ARC_ATTRS: [wgpu::VertexAttribute; 5] = wgpu::vertex_attr_array![
    0 => Float32x3, // position
    1 => Float32x4, // color
    2 => Float32x4, // radii
    3 => Float32x2, // wedge
    4 => Float32    // border
];

const COLORED_ATTRS: [wgpu::VertexAttribute; 2] = wgpu::vertex_attr_array![
    0 => Float32x3, // position
    1 => Float32x3  // color
];

const TEXTURED_ATTRS: [wgpu::VertexAttribute; 2] = wgpu::vertex_attr_array![
    0 => Float32x3, // position
    1 => Float32x2  // uv
];

fn stride_for(extra_floats: u32) -> u64 {
    ((POSITION_FLOATS + extra_floats as usize) * F32_SIZE) as u64
}

/// Dots and arcs expand each client vertex into a quad, so they step per instance.
fn dot_layout() -> wgpu::VertexBufferLayout<'static> {
    wgpu::VertexBufferLayout {
        array_stride: stride_for(DOT_EXTRA_FLOATS),
        step_mode: wgpu::VertexStepMode::Instance,
        attributes: &DOT_ATTRS,
    }
}

fn arc_layout() -> wgpu::VertexBufferLayout<'static> {
    wgpu::VertexBufferLayout {
        array_stride: stride_for(ARC_EXTRA_FLOATS),
        step_mode: wgpu::VertexStepMode::Instance,
        attributes: &ARC_ATTRS,
    }
}

fn colored_layout() -> wgpu::VertexBufferLayout<'static> {
    wgpu::VertexBufferLayout {
        array_stride: stride_for(COLORED_VERTEX_EXTRA_FLOATS),
        step_mode: wgpu::VertexStepMode::Vertex,
        attributes: &COLORED_ATTRS,
    }
}

fn textured_layout() -> wgpu::VertexBufferLayout<'static> {
    wgpu::VertexBufferLayout {
        array_stride: stride_for(TEXTURED_VERTEX_EXTRA_FLOATS),
        step_mode: wgpu::VertexStepMode::Vertex,
        attributes: &TEXTURED_ATTRS,
    }
}

// ── pipeline set ──────────────────────────────────────────────────────────

/// The four render pipelines a target draws with, built once for a fixed
/// pair of color and depth/stencil formats.
pub struct PipelineSet {
    pub dots: wgpu::RenderPipeline,
    pub arcs: wgpu::RenderPipeline,
    pub vertices_with_color: wgpu::RenderPipeline,
    pub texture: wgpu::RenderPipeline,

    pub uniform_layout: wgpu::BindGroupLayout,
    pub texture_layout: wgpu::BindGroupLayout,
    pub sampler: wgpu::Sampler,

    color_format: wgpu::TextureFormat,
    depth_stencil_format: wgpu::TextureFormat,
}

impl PipelineSet {
    /// Compiles all four pipelines for the given attachments.
    ///
    /// Shader or layout errors the device rejects come back as `Err`.
    pub fn new(
        device: &wgpu::Device,
        color_format: wgpu::TextureFormat,
        depth_stencil_format: wgpu::TextureFormat,
    ) -> Result<Self> {
        capture_errors(device, "render pipelines", || {
            Self::build(device, color_format, depth_stencil_format)
        })?
    }

    fn build(
        device: &wgpu::Device,
        color_format: wgpu::TextureFormat,
        depth_stencil_format: wgpu::TextureFormat,
    ) -> Result<Self> {
        anyhow::ensure!(
            depth_stencil_format.has_depth_aspect() && depth_stencil_format.has_stencil_aspect(),
            "{depth_stencil_format:?} is not a combined depth/stencil format"
        );
        anyhow::ensure!(
            !color_format.is_depth_stencil_format(),
            "{color_format:?} is not a color format"
        );

        let min_binding_size = wgpu::BufferSize::new(std::mem::size_of::<FrameUniforms>() as u64)
            .context("frame uniform block is empty")?;

        let uniform_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("vellum frame uniforms bgl"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: Some(min_binding_size),
                },
                count: None,
            }],
        });

        let texture_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("vellum texture bgl"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: false },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::NonFiltering),
                    count: None,
                },
            ],
        });

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("vellum texture sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Nearest,
            min_filter: wgpu::FilterMode::Nearest,
            mipmap_filter: wgpu::MipmapFilterMode::Nearest,
            ..Default::default()
        });

        let flat_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("vellum flat pipeline layout"),
            bind_group_layouts: &[&uniform_layout],
            immediate_size: 0,
        });
        let textured_pipeline_layout =
            device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("vellum textured pipeline layout"),
                bind_group_layouts: &[&uniform_layout, &texture_layout],
                immediate_size: 0,
            });

        let blend = color_blend(device, color_format);
        if blend.is_none() {
            log::debug!("{color_format:?} is not blendable; alpha is written through");
        }

        let builder = PipelineBuilder {
            device,
            color_format,
            depth_stencil_format,
            blend,
        };

        let dots = builder.build(
            "dots",
            include_str!("shaders/dots.wgsl"),
            &flat_layout,
            dot_layout(),
        );
        let arcs = builder.build(
            "arcs",
            include_str!("shaders/arcs.wgsl"),
            &flat_layout,
            arc_layout(),
        );
        let vertices_with_color = builder.build(
            "vertices",
            include_str!("shaders/vertices.wgsl"),
            &flat_layout,
            colored_layout(),
        );
        let texture = builder.build(
            "texture",
            include_str!("shaders/texture.wgsl"),
            &textured_pipeline_layout,
            textured_layout(),
        );

        log::debug!("pipelines built for {color_format:?} + {depth_stencil_format:?}");

        Ok(Self {
            dots,
            arcs,
            vertices_with_color,
            texture,
            uniform_layout,
            texture_layout,
            sampler,
            color_format,
            depth_stencil_format,
        })
    }

    pub fn color_format(&self) -> wgpu::TextureFormat {
        self.color_format
    }

    pub fn depth_stencil_format(&self) -> wgpu::TextureFormat {
        self.depth_stencil_format
    }

    /// Whether these pipelines can render into the given attachments.
    pub fn matches(&self, color: wgpu::TextureFormat, depth_stencil: wgpu::TextureFormat) -> bool {
        self.color_format == color && self.depth_stencil_format == depth_stencil
    }
}

/// Pipeline sets already built on a device, keyed by attachment formats.
///
/// Switching render targets back and forth reuses the compiled pipelines.
pub struct PipelineCache {
    device: wgpu::Device,
    sets: Vec<Arc<PipelineSet>>,
}

impl PipelineCache {
    pub fn new(device: &wgpu::Device) -> Self {
        Self {
            device: device.clone(),
            sets: Vec::new(),
        }
    }

    pub fn get(
        &mut self,
        color_format: wgpu::TextureFormat,
        depth_stencil_format: wgpu::TextureFormat,
    ) -> Result<Arc<PipelineSet>> {
        if let Some(set) = self
            .sets
            .iter()
            .find(|s| s.matches(color_format, depth_stencil_format))
        {
            return Ok(set.clone());
        }
        let set = Arc::new(
            PipelineSet::new(&self.device, color_format, depth_stencil_format)
                .with_context(|| format!("building pipelines for {color_format:?}"))?,
        );
        self.sets.push(set.clone());
        Ok(set)
    }
}

/// Straight-alpha blending when the format supports it.
fn color_blend(device: &wgpu::Device, format: wgpu::TextureFormat) -> Option<wgpu::BlendState> {
    format
        .guaranteed_format_features(device.features())
        .flags
        .contains(wgpu::TextureFormatFeatureFlags::BLENDABLE)
        .then_some(wgpu::BlendState::ALPHA_BLENDING)
}

struct PipelineBuilder<'a> {
    device: &'a wgpu::Device,
    color_format: wgpu::TextureFormat,
    depth_stencil_format: wgpu::TextureFormat,
    blend: Option<wgpu::BlendState>,
}

impl PipelineBuilder<'_> {
    fn build(
        &self,
        name: &str,
        source: &'static str,
        layout: &wgpu::PipelineLayout,
        vertex_layout: wgpu::VertexBufferLayout<'static>,
    ) -> wgpu::RenderPipeline {
        let shader = self
            .device
            .create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(&format!("vellum {name} shader")),
                source: wgpu::ShaderSource::Wgsl(source.into()),
            });

        self.device
            .create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some(&format!("vellum {name} pipeline")),
                layout: Some(layout),
                vertex: wgpu::VertexState {
                    module: &shader,
                    entry_point: Some("vs_main"),
                    compilation_options: Default::default(),
                    buffers: &[vertex_layout],
                },
                fragment: Some(wgpu::FragmentState {
                    module: &shader,
                    entry_point: Some("fs_main"),
                    compilation_options: Default::default(),
                    targets: &[Some(wgpu::ColorTargetState {
                        format: self.color_format,
                        blend: self.blend,
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                }),
                primitive: wgpu::PrimitiveState {
                    topology: wgpu::PrimitiveTopology::TriangleList,
                    strip_index_format: None,
                    front_face: wgpu::FrontFace::Ccw,
                    cull_mode: None,
                    polygon_mode: wgpu::PolygonMode::Fill,
                    unclipped_depth: false,
                    conservative: false,
                },
                // Later draws always win; depth is attached but never rejects.
                depth_stencil: Some(wgpu::DepthStencilState {
                    format: self.depth_stencil_format,
                    depth_write_enabled: true,
                    depth_compare: wgpu::CompareFunction::Always,
                    stencil: wgpu::StencilState::default(),
                    bias: wgpu::DepthBiasState::default(),
                }),
                multisample: wgpu::MultisampleState::default(),
                multiview_mask: None,
                cache: None,
            })
    }
}
