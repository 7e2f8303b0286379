//! Contract between the runtime loop and the program it drives.
//!
//! The runtime owns the window, the device and the [`Renderer`]; the app
//! only describes the scene and reacts to events.
//!
//! [`Renderer`]: crate::renderer::Renderer

mod app;

pub use app::{App, AppControl};
