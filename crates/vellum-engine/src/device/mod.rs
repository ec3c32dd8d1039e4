//! Adapter/device setup and the views render targets draw through.
//!
//! A windowed server pairs one [`GpuDevice`] with a [`WindowSurface`]; a
//! headless one uses [`HeadlessView`] and never touches a surface.

mod errors;
mod gpu;
mod init;
mod surface;
mod view;

pub use errors::{capture_errors, format_features};
pub use gpu::GpuDevice;
pub use init::{GpuInit, SurfacePreferences};
pub(crate) use surface::create_depth_stencil;
pub use surface::{SurfaceErrorAction, WindowSurface};
pub use view::{HeadlessView, SurfaceView};
