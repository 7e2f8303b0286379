//! Backend seam between the upload/submit protocol and a graphics API.
//!
//! The protocol (staging, copy pass, per-frame acquire/draw/submit) is written
//! once against [`GpuBackend`]. Implementations:
//! - [`crate::device::Gpu`]: wgpu device bound to a winit window surface
//! - [`HeadlessBackend`]: no GPU; journals every call and simulates device
//!   memory so uploads can be read back

mod error;
mod headless;
mod recording;
mod resource;
mod types;

pub use error::GpuError;
pub use headless::{AcquireResult, Event, HeadlessBackend, Journal};
pub use recording::{
    submit, BufferBinding, Command, CommandRecording, RecordingError, ScopeKind,
    TextureSamplerBinding,
};
pub use resource::{Buffer, Pipeline, Sampler, Shader, Texture, TransferBuffer};
pub use types::{
    AddressMode, BufferUsage, Color, CopyAlignment, FilterMode, IndexFormat, PrimitiveTopology,
    SamplerDesc, SurfaceExtent, TextureDesc, TextureFormat,
};

pub(crate) use types::align_up;

use crate::pipeline::{PipelineDesc, ShaderSource};

/// A graphics device plus its presentable surface.
///
/// Handle types release their GPU object when dropped. The backend itself is
/// the device: dropping it destroys the device, so every handle must be gone
/// first.
pub trait GpuBackend: Sized {
    type Buffer;
    type TransferBuffer;
    type Texture;
    type Sampler;
    type Shader;
    type Pipeline;
    type SwapchainImage;

    fn name(&self) -> &'static str;

    /// Native pixel format of the presentable surface.
    fn swapchain_format(&self) -> TextureFormat;

    fn copy_alignment(&self) -> CopyAlignment;

    fn create_shader(&mut self, source: &ShaderSource) -> Result<Self::Shader, GpuError>;

    /// Builds a pipeline from an already validated description.
    fn create_pipeline(&mut self, desc: &PipelineDesc<'_, Self>) -> Result<Self::Pipeline, GpuError>;

    fn create_buffer(
        &mut self,
        label: Option<&str>,
        usage: BufferUsage,
        size: u64,
    ) -> Result<Self::Buffer, GpuError>;

    fn create_texture(&mut self, desc: &TextureDesc) -> Result<Self::Texture, GpuError>;

    fn create_sampler(&mut self, desc: &SamplerDesc) -> Result<Self::Sampler, GpuError>;

    fn create_transfer_buffer(&mut self, size: u64) -> Result<Self::TransferBuffer, GpuError>;

    /// Maps `buffer`, hands its whole byte range to `write`, unmaps.
    fn write_transfer_buffer(
        &mut self,
        buffer: &mut Self::TransferBuffer,
        write: &mut dyn FnMut(&mut [u8]),
    ) -> Result<(), GpuError>;

    /// Starts a new command recording.
    fn begin_recording<'a>(&mut self) -> Result<CommandRecording<'a, Self>, GpuError> {
        Ok(CommandRecording::new())
    }

    /// Blocks until the next presentable image is available and attaches it
    /// to `recording`.
    ///
    /// `Ok(None)` means no image this frame (minimized, resizing); the
    /// recording must still be submitted.
    fn acquire_swapchain_image(
        &mut self,
        recording: &mut CommandRecording<'_, Self>,
    ) -> Result<Option<SurfaceExtent>, GpuError>;

    /// Executes and consumes `recording`, presenting its swapchain image if
    /// one was acquired.
    fn submit(&mut self, recording: CommandRecording<'_, Self>) -> Result<(), GpuError>;

    /// Debug copy of a device-local buffer back to the host.
    fn read_buffer(
        &mut self,
        buffer: &Self::Buffer,
        offset: u64,
        size: u64,
    ) -> Result<Vec<u8>, GpuError>;
}
