use crate::backend::GpuError;

/// What the device does after the surface refused an image.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum SurfaceErrorAction {
    /// Surface was reconfigured; the next acquisition should succeed.
    Reconfigured,
    /// Transient; this frame gets no image.
    SkipFrame,
    /// The device cannot continue.
    Fatal,
}

impl SurfaceErrorAction {
    /// Turns the action into the result of a swapchain acquisition.
    ///
    /// A reconfigured surface is reported as "no image this frame"; a skipped
    /// frame carries the surface error so the caller can log it.
    pub(crate) fn into_acquire(self, err: &wgpu::SurfaceError) -> Result<(), GpuError> {
        match self {
            SurfaceErrorAction::Reconfigured => Ok(()),
            SurfaceErrorAction::SkipFrame => Err(GpuError::Acquire(err.to_string())),
            SurfaceErrorAction::Fatal => Err(GpuError::OutOfMemory),
        }
    }
}

/// Maps an error caught while creating a shader or pipeline. Running out of
/// memory stays fatal; anything else becomes `failed(description)`.
pub(crate) fn creation_failure(err: wgpu::Error, failed: fn(String) -> GpuError) -> GpuError {
    match err {
        wgpu::Error::OutOfMemory { .. } => GpuError::OutOfMemory,
        other => failed(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn validation(description: &str) -> wgpu::Error {
        wgpu::Error::Validation {
            source: description.into(),
            description: description.to_string(),
        }
    }

    #[test]
    fn invalid_shader_becomes_compilation_error() {
        let err = creation_failure(validation("unknown identifier `foo`"), GpuError::ShaderCompilation);
        assert_eq!(err, GpuError::ShaderCompilation("unknown identifier `foo`".into()));
        assert!(!err.is_fatal());
    }

    #[test]
    fn invalid_pipeline_becomes_creation_error() {
        let err = creation_failure(validation("entry point `main` not found"), GpuError::PipelineCreation);
        assert_eq!(err, GpuError::PipelineCreation("entry point `main` not found".into()));
    }

    #[test]
    fn out_of_memory_during_creation_is_fatal() {
        let err = creation_failure(
            wgpu::Error::OutOfMemory {
                source: "allocation failed".into(),
            },
            GpuError::PipelineCreation,
        );
        assert_eq!(err, GpuError::OutOfMemory);
        assert!(err.is_fatal());
    }

    #[test]
    fn only_fatal_action_is_fatal() {
        let err = wgpu::SurfaceError::Timeout;
        assert_eq!(SurfaceErrorAction::Reconfigured.into_acquire(&err), Ok(()));
        assert!(!SurfaceErrorAction::SkipFrame.into_acquire(&err).unwrap_err().is_fatal());
        assert!(SurfaceErrorAction::Fatal.into_acquire(&err).unwrap_err().is_fatal());
    }
}
