//! Owned GPU resources.
//!
//! Each wrapper owns the backend handle and releases it when dropped, so
//! early returns during setup never leak. The metadata kept alongside the
//! handle is what recording validation needs.

use crate::pipeline::{PipelineResources, ShaderResources, ShaderSource, ShaderStage};

use super::types::{BufferUsage, PrimitiveTopology, SamplerDesc, TextureDesc};
use super::{GpuBackend, GpuError};

/// Device-local buffer.
pub struct Buffer<B: GpuBackend> {
    raw: B::Buffer,
    usage: BufferUsage,
    size: u64,
}

impl<B: GpuBackend> Buffer<B> {
    pub fn create(
        backend: &mut B,
        label: Option<&str>,
        usage: BufferUsage,
        size: u64,
    ) -> Result<Self, GpuError> {
        if size == 0 {
            return Err(GpuError::creation("buffer", "size is zero"));
        }
        let raw = backend.create_buffer(label, usage, size)?;
        Ok(Self { raw, usage, size })
    }

    pub fn raw(&self) -> &B::Buffer {
        &self.raw
    }

    pub fn usage(&self) -> BufferUsage {
        self.usage
    }

    pub fn size(&self) -> u64 {
        self.size
    }
}

/// Host-visible staging memory.
pub struct TransferBuffer<B: GpuBackend> {
    raw: B::TransferBuffer,
    size: u64,
}

impl<B: GpuBackend> TransferBuffer<B> {
    pub fn create(backend: &mut B, size: u64) -> Result<Self, GpuError> {
        if size == 0 {
            return Err(GpuError::creation("transfer buffer", "size is zero"));
        }
        let raw = backend.create_transfer_buffer(size)?;
        Ok(Self { raw, size })
    }

    /// Maps the whole buffer, lets `write` fill it, then unmaps.
    pub fn write(
        &mut self,
        backend: &mut B,
        write: &mut dyn FnMut(&mut [u8]),
    ) -> Result<(), GpuError> {
        backend.write_transfer_buffer(&mut self.raw, write)
    }

    pub fn raw(&self) -> &B::TransferBuffer {
        &self.raw
    }

    pub fn size(&self) -> u64 {
        self.size
    }
}

/// Device-local 2D texture.
pub struct Texture<B: GpuBackend> {
    raw: B::Texture,
    desc: TextureDesc,
}

impl<B: GpuBackend> Texture<B> {
    pub fn create(backend: &mut B, desc: TextureDesc) -> Result<Self, GpuError> {
        if desc.width == 0 || desc.height == 0 {
            return Err(GpuError::creation("texture", "zero extent"));
        }
        let raw = backend.create_texture(&desc)?;
        Ok(Self { raw, desc })
    }

    pub fn raw(&self) -> &B::Texture {
        &self.raw
    }

    pub fn desc(&self) -> &TextureDesc {
        &self.desc
    }
}

pub struct Sampler<B: GpuBackend> {
    raw: B::Sampler,
    desc: SamplerDesc,
}

impl<B: GpuBackend> Sampler<B> {
    pub fn create(backend: &mut B, desc: SamplerDesc) -> Result<Self, GpuError> {
        let raw = backend.create_sampler(&desc)?;
        Ok(Self { raw, desc })
    }

    pub fn raw(&self) -> &B::Sampler {
        &self.raw
    }

    pub fn desc(&self) -> &SamplerDesc {
        &self.desc
    }
}

/// Compiled shader stage. Only needed until the pipeline exists.
pub struct Shader<B: GpuBackend> {
    raw: B::Shader,
    stage: ShaderStage,
    resources: ShaderResources,
}

impl<B: GpuBackend> Shader<B> {
    pub fn create(backend: &mut B, source: &ShaderSource) -> Result<Self, GpuError> {
        let raw = backend.create_shader(source)?;
        Ok(Self {
            raw,
            stage: source.stage,
            resources: source.resources,
        })
    }

    pub fn raw(&self) -> &B::Shader {
        &self.raw
    }

    pub fn stage(&self) -> ShaderStage {
        self.stage
    }

    /// Resource counts the stage declared at creation.
    pub fn resources(&self) -> ShaderResources {
        self.resources
    }
}

/// Immutable graphics pipeline.
pub struct Pipeline<B: GpuBackend> {
    raw: B::Pipeline,
    resources: PipelineResources,
    vertex_slots: Vec<u32>,
    topology: PrimitiveTopology,
}

impl<B: GpuBackend> Pipeline<B> {
    pub(crate) fn from_raw(
        raw: B::Pipeline,
        resources: PipelineResources,
        vertex_slots: Vec<u32>,
        topology: PrimitiveTopology,
    ) -> Self {
        Self {
            raw,
            resources,
            vertex_slots,
            topology,
        }
    }

    pub fn raw(&self) -> &B::Pipeline {
        &self.raw
    }

    pub fn resources(&self) -> PipelineResources {
        self.resources
    }

    /// Buffer slots the vertex layout reads from.
    pub fn vertex_slots(&self) -> &[u32] {
        &self.vertex_slots
    }

    pub fn topology(&self) -> PrimitiveTopology {
        self.topology
    }
}
