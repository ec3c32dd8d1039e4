//! Frame rendering.
//!
//! Client draws are queued as [`DrawOp`]s and replayed into a single pass
//! when the client flushes. Where the pass lands is decided by a
//! [`RenderTarget`]:
//! - [`LiveSurfaceTarget`]: the window's swapchain, presented without waiting
//! - [`OffscreenTarget`]: a texture, waited on so the frame can be captured
//!
//! Convention:
//! - Positions go through the client transform straight to clip space.
//! - Dot sizes, arc radii and borders are in pixels of the current target.

mod draw;
mod live;
mod offscreen;
mod pass;
mod pipelines;
mod readback;
mod target;

pub use draw::{DrawKind, DrawOp};
pub use live::LiveSurfaceTarget;
pub use offscreen::{
    CAPTURE_FORMAT, CAPTURE_USAGE, FrameSync, OffscreenTarget, capture_byte_len, capture_supported,
};
pub use pass::PassTarget;
pub use pipelines::{
    ARC_EXTRA_FLOATS, COLORED_VERTEX_EXTRA_FLOATS, DOT_EXTRA_FLOATS, FrameUniforms, PipelineCache,
    PipelineSet, TEXTURED_VERTEX_EXTRA_FLOATS,
};
pub use readback::{Readback, StridedPixels, read_texture};
pub use target::{CapturedFrame, RenderTarget, draw_frame};
