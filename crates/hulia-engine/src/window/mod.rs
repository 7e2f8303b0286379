//! Window + runtime loop.
//!
//! Owns the `winit` event loop and the single window, and wires them to the
//! wgpu device and the [`Renderer`](crate::renderer::Renderer).

mod runtime;

pub use runtime::{Runtime, RuntimeConfig};
