use thiserror::Error;

use super::recording::RecordingError;

/// Errors reported by a [`GpuBackend`](super::GpuBackend).
#[derive(Debug, Clone, Eq, PartialEq, Error)]
pub enum GpuError {
    #[error("failed to create {what}: {reason}")]
    ResourceCreation { what: &'static str, reason: String },

    #[error("shader compilation failed: {0}")]
    ShaderCompilation(String),

    #[error("pipeline creation failed: {0}")]
    PipelineCreation(String),

    #[error("unsupported by the {backend} backend: {what}")]
    Unsupported { backend: &'static str, what: String },

    #[error("no command buffer available")]
    CommandBufferUnavailable,

    #[error("swapchain acquisition failed: {0}")]
    Acquire(String),

    #[error("out of GPU memory")]
    OutOfMemory,

    #[error("GPU device lost")]
    DeviceLost,

    #[error("readback failed: {0}")]
    Readback(String),

    #[error(transparent)]
    Recording(#[from] RecordingError),
}

impl GpuError {
    /// Whether the device can no longer make progress.
    pub fn is_fatal(&self) -> bool {
        matches!(self, GpuError::OutOfMemory | GpuError::DeviceLost)
    }

    pub(crate) fn creation(what: &'static str, reason: impl ToString) -> Self {
        GpuError::ResourceCreation {
            what,
            reason: reason.to_string(),
        }
    }
}
