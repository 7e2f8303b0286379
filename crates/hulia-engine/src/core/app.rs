use anyhow::Result;
use winit::event::WindowEvent;

use crate::renderer::{FrameConfig, FrameOutcome, SceneDesc};

/// Control directive returned by app callbacks.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum AppControl {
    Continue,
    Exit,
}

/// Lifecycle callbacks.
///
/// Order: `init` once after the window exists, then per iteration
/// `on_window_event`/`on_frame`, then `on_quit` after the renderer has been
/// shut down.
pub trait App {
    /// Describes what to upload. An error aborts startup.
    fn init(&mut self) -> Result<SceneDesc>;

    fn frame_config(&self) -> FrameConfig {
        FrameConfig::default()
    }

    /// Called for every window event before the runtime handles it.
    ///
    /// Close requests end the program regardless of the return value.
    fn on_window_event(&mut self, event: &WindowEvent) -> AppControl {
        let _ = event;
        AppControl::Continue
    }

    /// Called after each rendered frame with its outcome.
    fn on_frame(&mut self, outcome: &FrameOutcome) -> AppControl {
        let _ = outcome;
        AppControl::Continue
    }

    fn on_quit(&mut self) {}
}
