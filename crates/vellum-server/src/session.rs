use std::collections::HashMap;
use std::time::Instant;

use anyhow::{Context, Result};
use vellum_engine::device::{GpuDevice, SurfaceView};
use vellum_engine::render::{
    ARC_EXTRA_FLOATS, COLORED_VERTEX_EXTRA_FLOATS, DOT_EXTRA_FLOATS, DrawKind, DrawOp,
    OffscreenTarget, PipelineCache, RenderTarget, TEXTURED_VERTEX_EXTRA_FLOATS, draw_frame,
    read_texture,
};
use vellum_engine::resource::{GpuImage, ResourceBuilder, WgpuArena};
use vellum_wire::{ByteChannel, ProtocolError, RGBA_F32_PIXEL_SIZE, Transform, WireCodec};

use crate::commands::Command;

/// Texture id that selects the default canvas in `SetRenderTarget`.
pub const DEFAULT_CANVAS: u32 = 0;

/// Render target bound to a client texture.
struct Redirect {
    texture_id: u32,
    target: Box<dyn RenderTarget>,
}

/// A queued draw and the client texture it samples, if any.
struct PendingDraw {
    texture_id: Option<u32>,
    op: DrawOp,
}

/// Server-side state for the connected client.
///
/// Draw commands are queued until `Flush`, which renders them as one frame
/// into whichever target is active at that point.
pub struct Session {
    gpu: GpuDevice,
    arena: WgpuArena,
    pipelines: PipelineCache,
    depth_stencil_format: wgpu::TextureFormat,

    default_target: Box<dyn RenderTarget>,
    redirect: Option<Redirect>,

    textures: HashMap<u32, GpuImage>,
    next_texture_id: u32,

    pending: Vec<PendingDraw>,
    xform: Transform,
    started: Instant,
}

impl Session {
    /// Creates a session whose default canvas is built by `make_default`.
    pub fn new<F>(gpu: GpuDevice, depth_stencil_format: wgpu::TextureFormat, make_default: F) -> Result<Self>
    where
        F: FnOnce(&GpuDevice, &mut PipelineCache) -> Result<Box<dyn RenderTarget>>,
    {
        let mut pipelines = PipelineCache::new(gpu.device());
        let default_target =
            make_default(&gpu, &mut pipelines).context("failed to create the default canvas")?;

        Ok(Self {
            arena: WgpuArena::new(&gpu),
            gpu,
            pipelines,
            depth_stencil_format,
            default_target,
            redirect: None,
            textures: HashMap::new(),
            next_texture_id: 1,
            pending: Vec::new(),
            xform: Transform::IDENTITY,
            started: Instant::now(),
        })
    }

    pub fn texture_count(&self) -> usize {
        self.textures.len()
    }

    /// Forgets per-connection drawing state. Textures survive reconnects.
    pub fn reset_connection(&mut self) {
        if !self.pending.is_empty() {
            log::debug!("discarding {} unflushed draws", self.pending.len());
        }
        self.pending.clear();
        self.xform = Transform::IDENTITY;
        self.redirect = None;
    }

    /// Reads one command and its payload, performs it and sends any reply.
    ///
    /// An error leaves the stream in an unknown position; the caller must
    /// drop the connection.
    pub fn handle_next<C: ByteChannel>(
        &mut self,
        codec: &mut WireCodec<C>,
        view: &mut dyn SurfaceView,
    ) -> Result<Command> {
        let code = codec.read_command()?;
        let command =
            Command::from_code(code).with_context(|| format!("unknown command code {}", code.0))?;
        log::trace!("{command:?}");

        match command {
            Command::Ping => codec.write_command(Command::Ping.code())?,
            Command::ClearColor => {
                let c = codec.read_color()?;
                view.set_clear_color(wgpu::Color {
                    r: c.r as f64,
                    g: c.g as f64,
                    b: c.b as f64,
                    a: 1.0,
                });
            }
            Command::SetXform => self.xform = codec.read_transform()?,
            Command::DrawDots => self.queue_draw(codec, DOT_EXTRA_FLOATS, DrawKind::Dots)?,
            Command::DrawArcs => self.queue_draw(codec, ARC_EXTRA_FLOATS, DrawKind::Arcs)?,
            Command::DrawVertices => {
                self.queue_draw(codec, COLORED_VERTEX_EXTRA_FLOATS, DrawKind::VerticesWithColor)?
            }
            Command::CreateTexture => {
                let id = self.create_texture(codec)?;
                codec.write_u32(id)?;
            }
            Command::DrawTexture => self.draw_texture(codec)?,
            Command::ReadTexture => self.read_texture(codec)?,
            Command::SetRenderTarget => {
                let id = codec.read_u32()?;
                let ok = self.set_render_target(id);
                codec.write_u32(u32::from(ok))?;
            }
            Command::Flush => {
                let ops = self.take_pending();
                let target = active_target(&mut self.default_target, &mut self.redirect);
                draw_frame(target, &self.gpu, view, &ops)?;
                codec.write_f64(self.started.elapsed().as_secs_f64())?;
            }
            Command::FrameGrab => {
                let target = active_target(&mut self.default_target, &mut self.redirect);
                match target.capture_frame(&self.gpu)? {
                    Some(frame) => {
                        let stride = frame.width as usize * RGBA_F32_PIXEL_SIZE;
                        codec.write_image_rows(frame.width, frame.height, frame.as_bytes(), stride)?;
                    }
                    None => codec.write_unavailable_image()?,
                }
            }
            Command::DeleteTexture => {
                let id = codec.read_u32()?;
                self.delete_texture(id);
            }
        }
        Ok(command)
    }

    fn queue_draw<C: ByteChannel>(
        &mut self,
        codec: &mut WireCodec<C>,
        extra_floats: u32,
        kind: DrawKind,
    ) -> Result<()> {
        let vertices = ResourceBuilder::new(&mut self.arena).read_vertices(codec, extra_floats)?;
        if vertices.is_empty() {
            return Ok(());
        }
        self.pending.push(PendingDraw {
            texture_id: None,
            op: DrawOp::new(
                kind,
                vertices.buffer.buffer().clone(),
                vertices.vertex_count,
                self.xform,
            ),
        });
        Ok(())
    }

    fn create_texture<C: ByteChannel>(&mut self, codec: &mut WireCodec<C>) -> Result<u32> {
        let texture = ResourceBuilder::new(&mut self.arena).read_texture(codec)?;
        let id = self.next_texture_id;
        self.next_texture_id = id.checked_add(1).context("texture ids exhausted")?;
        log::debug!("texture {id}: {}x{}", texture.width, texture.height);
        self.textures.insert(id, texture.image);
        Ok(id)
    }

    fn draw_texture<C: ByteChannel>(&mut self, codec: &mut WireCodec<C>) -> Result<()> {
        let id = codec.read_u32()?;
        // The vertices are always consumed so the stream stays in step.
        let vertices =
            ResourceBuilder::new(&mut self.arena).read_vertices(codec, TEXTURED_VERTEX_EXTRA_FLOATS)?;
        let Some(image) = self.textures.get(&id) else {
            log::warn!("draw of unknown texture {id} ignored");
            return Ok(());
        };
        if self.renders_into(id) {
            log::warn!("texture {id} is the render target; cannot draw it into itself");
            return Ok(());
        }
        if vertices.is_empty() {
            return Ok(());
        }
        self.pending.push(PendingDraw {
            texture_id: Some(id),
            op: DrawOp::new(
                DrawKind::Texture(image.view().clone()),
                vertices.buffer.buffer().clone(),
                vertices.vertex_count,
                self.xform,
            ),
        });
        Ok(())
    }

    fn renders_into(&self, id: u32) -> bool {
        self.redirect.as_ref().is_some_and(|r| r.texture_id == id)
    }

    /// Drains the queue for a flush.
    ///
    /// Draws queued before their texture became the render target are
    /// dropped here; a pass cannot sample its own attachment.
    fn take_pending(&mut self) -> Vec<DrawOp> {
        let target = self.redirect.as_ref().map(|r| r.texture_id);
        self.pending
            .drain(..)
            .filter_map(|draw| match draw.texture_id {
                Some(id) if Some(id) == target => {
                    log::warn!("dropping draw of texture {id} into itself");
                    None
                }
                _ => Some(draw.op),
            })
            .collect()
    }

    fn read_texture<C: ByteChannel>(&mut self, codec: &mut WireCodec<C>) -> Result<()> {
        let id = codec.read_u32()?;
        let Some(image) = self.textures.get(&id) else {
            log::warn!("read of unknown texture {id}");
            codec.write_unavailable_image()?;
            return Ok(());
        };
        let pixels = read_texture(&self.gpu, image.texture())
            .with_context(|| format!("reading back texture {id}"))?;
        codec.write_image_rows(pixels.width, pixels.height, &pixels.bytes, pixels.row_stride)?;
        Ok(())
    }

    /// Points drawing at texture `id`, or back at the default canvas for
    /// [`DEFAULT_CANVAS`]. Returns whether the switch happened.
    fn set_render_target(&mut self, id: u32) -> bool {
        if id == DEFAULT_CANVAS {
            self.redirect = None;
            return true;
        }
        let Some(image) = self.textures.get(&id) else {
            log::warn!("render target {id} does not exist");
            return false;
        };

        let target = self
            .pipelines
            .get(image.format(), self.depth_stencil_format)
            .and_then(|pipelines| OffscreenTarget::new(&self.gpu, image.texture(), pipelines));
        match target {
            Ok(target) => {
                self.redirect = Some(Redirect {
                    texture_id: id,
                    target: Box::new(target),
                });
                true
            }
            Err(err) => {
                log::warn!("cannot render into texture {id}: {err:#}");
                false
            }
        }
    }

    fn delete_texture(&mut self, id: u32) {
        if self.textures.remove(&id).is_none() {
            log::warn!("delete of unknown texture {id} ignored");
            return;
        }
        if self.renders_into(id) {
            log::debug!("texture {id} was the render target; back to the default canvas");
            self.redirect = None;
        }
    }
}

fn active_target<'a>(
    default_target: &'a mut Box<dyn RenderTarget>,
    redirect: &'a mut Option<Redirect>,
) -> &'a mut dyn RenderTarget {
    match redirect {
        Some(redirect) => redirect.target.as_mut(),
        None => default_target.as_mut(),
    }
}

/// Whether `err` means the client went away rather than misbehaved.
pub fn is_disconnect(err: &anyhow::Error) -> bool {
    err.chain()
        .filter_map(|cause| cause.downcast_ref::<ProtocolError>())
        .any(ProtocolError::is_disconnect)
}
