//! Vellum engine crate.
//!
//! GPU-side pieces of the render server: device and window surface setup,
//! building client resources from wire payloads, and the two ways a frame
//! can be rendered (live to a window, or off-screen with capture).

pub mod device;
pub mod logging;
pub mod render;
pub mod resource;
