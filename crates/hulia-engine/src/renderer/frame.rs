use crate::backend::{Color, GpuError};

/// Per-frame settings.
#[derive(Debug, Clone)]
pub struct FrameConfig {
    /// Color the render pass clears the swapchain image to.
    pub clear_color: Color,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            clear_color: Color::from_rgba8(240, 240, 240, 255),
        }
    }
}

/// The single draw a frame issues.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum DrawCall {
    Vertices {
        vertex_count: u32,
        instance_count: u32,
    },
    Indexed {
        index_count: u32,
        instance_count: u32,
    },
}

/// Why a frame produced no image.
#[derive(Debug, Clone, PartialEq)]
pub enum SkipReason {
    /// No recording could be started; nothing was submitted.
    NoCommandBuffer(GpuError),
    /// The surface had no image to give (minimized, resizing).
    NoSwapchainImage,
    /// Acquisition failed; the empty recording was still submitted.
    AcquireFailed(GpuError),
}

/// Result of [`Renderer::render_frame`](super::Renderer::render_frame).
#[derive(Debug, Clone, PartialEq)]
pub enum FrameOutcome {
    /// The render pass cleared the image and issued this draw.
    Drawn(DrawCall),
    /// The render pass only cleared the image.
    Cleared,
    Skipped(SkipReason),
    /// Recording or submission failed after acquisition.
    Failed(GpuError),
}

impl FrameOutcome {
    pub fn presented(&self) -> bool {
        matches!(self, FrameOutcome::Drawn(_) | FrameOutcome::Cleared)
    }

    /// Whether rendering cannot continue.
    pub fn is_fatal(&self) -> bool {
        match self {
            FrameOutcome::Skipped(SkipReason::NoCommandBuffer(e))
            | FrameOutcome::Skipped(SkipReason::AcquireFailed(e))
            | FrameOutcome::Failed(e) => e.is_fatal(),
            _ => false,
        }
    }
}
