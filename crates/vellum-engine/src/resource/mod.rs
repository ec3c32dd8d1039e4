//! Client resources: vertex buffers and textures built from wire payloads.
//!
//! The builder only talks to a [`GpuArena`]; [`WgpuArena`] is the real
//! backend, tests use an in-memory one.

mod arena;
mod builder;
mod wgpu_arena;

pub use arena::{GpuArena, HostVisible, aligned_row_bytes};
pub use builder::{IMAGE_FORMAT, ResourceBuilder, Texture, Vertices};
pub use wgpu_arena::{GpuImage, IMAGE_USAGE, ManagedBuffer, WgpuArena, image_usage};
