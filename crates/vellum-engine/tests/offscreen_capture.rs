//! End-to-end checks against a real adapter.
//!
//! Each test skips (passes with a note on stderr) when no adapter is
//! available, e.g. on CI machines without a GPU or software rasterizer.
//! Tests that render into RGBA32Float also skip on adapters that can only
//! sample that format.

use std::sync::Arc;

use vellum_engine::device::{GpuDevice, GpuInit, HeadlessView, SurfaceView};
use vellum_engine::render::{
    COLORED_VERTEX_EXTRA_FLOATS, DrawKind, DrawOp, LiveSurfaceTarget, OffscreenTarget,
    PipelineSet, RenderTarget, capture_supported, draw_frame, read_texture,
};
use vellum_engine::resource::{
    GpuImage, IMAGE_FORMAT, ManagedBuffer, ResourceBuilder, Texture, Vertices, WgpuArena,
};
use vellum_wire::{LoopbackChannel, Transform, WireCodec};

const DEPTH: wgpu::TextureFormat = wgpu::TextureFormat::Depth24PlusStencil8;

fn gpu_or_skip(test: &str) -> Option<GpuDevice> {
    match pollster::block_on(GpuDevice::headless(&GpuInit::default())) {
        Ok(gpu) => Some(gpu),
        Err(err) => {
            eprintln!("skipping {test}: {err:#}");
            None
        }
    }
}

fn capture_gpu_or_skip(test: &str) -> Option<GpuDevice> {
    let gpu = gpu_or_skip(test)?;
    if !capture_supported(&gpu) {
        let info = gpu.adapter().get_info();
        eprintln!(
            "skipping {test}: {} cannot render to {IMAGE_FORMAT:?}",
            info.name
        );
        return None;
    }
    Some(gpu)
}

fn floats(values: &[f32]) -> Vec<u8> {
    values.iter().flat_map(|v| v.to_ne_bytes()).collect()
}

fn upload_image(gpu: &GpuDevice, width: u32, height: u32, pixels: &[f32]) -> Texture<GpuImage> {
    let mut bytes = width.to_ne_bytes().to_vec();
    bytes.extend(height.to_ne_bytes());
    bytes.extend(floats(pixels));
    let mut codec = WireCodec::new(LoopbackChannel::with_incoming(bytes));

    let mut arena = WgpuArena::new(gpu);
    let texture = ResourceBuilder::new(&mut arena)
        .read_texture(&mut codec)
        .unwrap();
    assert_eq!(codec.channel().remaining(), 0);
    texture
}

fn canvas(gpu: &GpuDevice, width: u32, height: u32) -> Texture<GpuImage> {
    upload_image(gpu, width, height, &vec![0.0; (width * height * 4) as usize])
}

fn offscreen(gpu: &GpuDevice, texture: &wgpu::Texture) -> OffscreenTarget {
    let pipelines = Arc::new(PipelineSet::new(gpu.device(), texture.format(), DEPTH).unwrap());
    OffscreenTarget::new(gpu, texture, pipelines).unwrap()
}

/// Two triangles spanning clip space, solid green.
fn green_quad(gpu: &GpuDevice) -> Vertices<ManagedBuffer> {
    #[rustfmt::skip]
    let quad = [
        -1.0, -1.0, 0.0,  0.0, 1.0, 0.0,
         1.0, -1.0, 0.0,  0.0, 1.0, 0.0,
         1.0,  1.0, 0.0,  0.0, 1.0, 0.0,
        -1.0, -1.0, 0.0,  0.0, 1.0, 0.0,
         1.0,  1.0, 0.0,  0.0, 1.0, 0.0,
        -1.0,  1.0, 0.0,  0.0, 1.0, 0.0,
    ];
    let mut bytes = 6u32.to_ne_bytes().to_vec();
    bytes.extend(floats(&quad));
    let mut codec = WireCodec::new(LoopbackChannel::with_incoming(bytes));
    let mut arena = WgpuArena::new(gpu);
    ResourceBuilder::new(&mut arena)
        .read_vertices(&mut codec, COLORED_VERTEX_EXTRA_FLOATS)
        .unwrap()
}

fn draw_of(vertices: &Vertices<ManagedBuffer>) -> DrawOp {
    DrawOp::new(
        DrawKind::VerticesWithColor,
        vertices.buffer.buffer().clone(),
        vertices.vertex_count,
        Transform::IDENTITY,
    )
}

#[test]
fn capture_before_any_frame_returns_the_texture_contents() {
    let Some(gpu) = capture_gpu_or_skip("capture_before_any_frame_returns_the_texture_contents")
    else {
        return;
    };
    let pixels: Vec<f32> = (0..2 * 2 * 4).map(|i| i as f32 / 16.0).collect();
    let image = upload_image(&gpu, 2, 2, &pixels);
    let mut target = offscreen(&gpu, image.image.texture());
    assert!(!target.frame_sync().has_completed_frame());

    let frame = target.capture_frame(&gpu).unwrap().unwrap();
    assert_eq!((frame.width, frame.height), (2, 2));
    assert_eq!(frame.pixels, pixels);
}

#[test]
fn finished_frame_is_captured_with_the_clear_color() {
    let Some(gpu) = capture_gpu_or_skip("finished_frame_is_captured_with_the_clear_color") else {
        return;
    };
    let canvas = canvas(&gpu, 4, 3);
    let mut target = offscreen(&gpu, canvas.image.texture());
    let mut view = HeadlessView::new(IMAGE_FORMAT, DEPTH);
    view.set_clear_color(wgpu::Color { r: 1.0, g: 0.25, b: 0.0, a: 1.0 });

    assert!(draw_frame(&mut target, &gpu, &mut view, &[]).unwrap());
    assert!(target.frame_sync().has_completed_frame());

    let frame = target.capture_frame(&gpu).unwrap().unwrap();
    assert_eq!((frame.width, frame.height), (4, 3));
    assert_eq!(frame.as_bytes().len(), 4 * 3 * 16);
    for pixel in frame.pixels.chunks(4) {
        assert_eq!(pixel, &[1.0, 0.25, 0.0, 1.0]);
    }
}

#[test]
fn colored_triangles_cover_the_frame() {
    let Some(gpu) = capture_gpu_or_skip("colored_triangles_cover_the_frame") else { return };
    let canvas = canvas(&gpu, 8, 8);
    let mut target = offscreen(&gpu, canvas.image.texture());
    let mut view = HeadlessView::new(IMAGE_FORMAT, DEPTH);

    let quad = green_quad(&gpu);
    assert!(draw_frame(&mut target, &gpu, &mut view, &[draw_of(&quad)]).unwrap());

    let frame = target.capture_frame(&gpu).unwrap().unwrap();
    for pixel in frame.pixels.chunks(4) {
        assert_eq!(pixel, &[0.0, 1.0, 0.0, 1.0]);
    }
}

#[test]
fn non_float_targets_render_but_do_not_capture() {
    let Some(gpu) = gpu_or_skip("non_float_targets_render_but_do_not_capture") else {
        return;
    };
    let texture = gpu.device().create_texture(&wgpu::TextureDescriptor {
        label: Some("rgba8 target"),
        size: wgpu::Extent3d {
            width: 4,
            height: 4,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: wgpu::TextureFormat::Rgba8Unorm,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
        view_formats: &[],
    });
    let mut target = offscreen(&gpu, &texture);
    let mut view = HeadlessView::new(texture.format(), DEPTH);

    assert!(draw_frame(&mut target, &gpu, &mut view, &[]).unwrap());
    assert!(target.capture_frame(&gpu).unwrap().is_none());
}

#[test]
fn live_target_without_a_drawable_skips_and_never_captures() {
    let Some(gpu) = gpu_or_skip("live_target_without_a_drawable_skips_and_never_captures") else {
        return;
    };
    let pipelines = Arc::new(
        PipelineSet::new(gpu.device(), wgpu::TextureFormat::Bgra8Unorm, DEPTH).unwrap(),
    );
    let mut target = LiveSurfaceTarget::new(pipelines);
    let mut view = HeadlessView::new(wgpu::TextureFormat::Bgra8Unorm, DEPTH);

    assert!(!draw_frame(&mut target, &gpu, &mut view, &[]).unwrap());
    assert!(target.capture_frame(&gpu).unwrap().is_none());

    let quad = green_quad(&gpu);
    let ops = [draw_of(&quad), draw_of(&quad)];
    assert!(!draw_frame(&mut target, &gpu, &mut view, &ops).unwrap());
    assert!(target.capture_frame(&gpu).unwrap().is_none());
}

#[test]
fn uploaded_texture_reads_back_unchanged() {
    let Some(gpu) = gpu_or_skip("uploaded_texture_reads_back_unchanged") else { return };
    let pixels: Vec<f32> = (0..3 * 2 * 4).map(|i| i as f32 * 0.5).collect();
    let texture = upload_image(&gpu, 3, 2, &pixels);
    assert_eq!(texture.row_stride, 256);

    // Renderable only where the adapter allows it; uploads work either way.
    assert_eq!(
        texture
            .image
            .texture()
            .usage()
            .contains(wgpu::TextureUsages::RENDER_ATTACHMENT),
        gpu.supports_usages(IMAGE_FORMAT, wgpu::TextureUsages::RENDER_ATTACHMENT)
    );

    let strided = read_texture(&gpu, texture.image.texture()).unwrap();
    assert_eq!(strided.row_bytes, 48);
    let packed: Vec<f32> = bytemuck::pod_collect_to_vec(&strided.into_packed());
    assert_eq!(packed, pixels);
}

#[test]
fn invalid_gpu_calls_come_back_as_errors() {
    let Some(gpu) = gpu_or_skip("invalid_gpu_calls_come_back_as_errors") else { return };

    let err = gpu
        .checked("empty texture", |device| {
            device.create_texture(&wgpu::TextureDescriptor {
                label: Some("zero-sized"),
                size: wgpu::Extent3d {
                    width: 0,
                    height: 4,
                    depth_or_array_layers: 1,
                },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: wgpu::TextureFormat::Rgba8Unorm,
                usage: wgpu::TextureUsages::COPY_DST,
                view_formats: &[],
            })
        })
        .unwrap_err();
    assert!(format!("{err}").starts_with("empty texture"));

    // The device is still usable afterwards.
    let canvas = canvas(&gpu, 1, 1);
    assert!(read_texture(&gpu, canvas.image.texture()).is_ok());
}

#[test]
fn unrenderable_texture_is_refused_as_a_target() {
    let Some(gpu) = gpu_or_skip("unrenderable_texture_is_refused_as_a_target") else { return };
    let texture = gpu.device().create_texture(&wgpu::TextureDescriptor {
        label: Some("sample-only"),
        size: wgpu::Extent3d {
            width: 2,
            height: 2,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: IMAGE_FORMAT,
        usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_SRC,
        view_formats: &[],
    });

    let target = PipelineSet::new(gpu.device(), IMAGE_FORMAT, DEPTH)
        .map(Arc::new)
        .and_then(|pipelines| OffscreenTarget::new(&gpu, &texture, pipelines));
    assert!(target.is_err());
}
