//! Hulia engine crate.
//!
//! GPU resource upload and frame submission over a backend seam, with a wgpu
//! backend bound to a winit window and a headless backend for tests.

pub mod backend;
pub mod core;
pub mod device;
pub mod logging;
pub mod pipeline;
pub mod renderer;
pub mod upload;
pub mod window;
