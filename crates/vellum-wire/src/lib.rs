//! Vellum wire protocol.
//!
//! A controlling client drives the render server over a local byte stream.
//! This crate owns both ends of that stream's typing:
//! - [`ByteChannel`]: the transport contract, with a local-socket server
//!   ([`LocalSocketChannel`]) and an in-memory [`LoopbackChannel`]
//! - [`WireCodec`]: fixed-size scalars, colors, transforms, vertex arrays and
//!   RGBA float images, read and written with exact byte accounting
//!
//! Nothing here knows about the GPU. Bulk payloads are read into whatever
//! memory the caller hands over, which is how the engine lands them directly
//! in GPU-visible buffers.

mod channel;
mod codec;
mod decoder;
mod encoder;
mod error;
mod order;
#[cfg(unix)]
mod socket;
mod types;

pub use channel::{ByteChannel, LoopbackChannel};
pub use codec::WireCodec;
pub use error::ProtocolError;
pub use order::ByteOrder;
#[cfg(unix)]
pub use socket::LocalSocketChannel;
pub use types::{
    COLOR_SIZE, COMMAND_CODE_SIZE, CommandCode, F32_SIZE, F64_SIZE, HostImage, ImageHeader,
    POSITION_FLOATS, RGBA_F32_PIXEL_SIZE, Rgb, TRANSFORM_SIZE, Transform, U32_SIZE, VertexArray,
    VertexArrayHeader,
};
