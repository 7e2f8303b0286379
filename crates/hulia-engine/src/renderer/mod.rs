//! Static-scene renderer.
//!
//! [`Renderer::init`] builds every GPU resource the scene needs and uploads
//! it in one batch. [`Renderer::render_frame`] then records and submits one
//! render pass per call, and [`Renderer::shutdown`] releases everything in
//! dependency order before handing the backend back.

mod frame;
mod scene;

pub use frame::{DrawCall, FrameConfig, FrameOutcome, SkipReason};
pub use scene::{IndexData, MeshDesc, SceneDesc, TextureSource};

use anyhow::{Context, Result};

use crate::backend::{
    self, align_up, Buffer, BufferUsage, CommandRecording, GpuBackend, GpuError, IndexFormat,
    RecordingError, Sampler, Shader, Texture, TextureDesc,
};
use crate::pipeline::{create_pipeline, PipelineDesc};
use crate::upload::{self, Destination, DestinationKey, StagingPlan};

/// Device-local buffers owned by a mesh.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum MeshBuffer {
    Vertex,
    Index,
}

struct IndexBuffer<B: GpuBackend> {
    buffer: Buffer<B>,
    format: IndexFormat,
    len: u64,
}

struct BoundTexture<B: GpuBackend> {
    texture: Texture<B>,
    sampler: Sampler<B>,
}

/// GPU resources of an uploaded mesh.
pub struct MeshResources<B: GpuBackend> {
    pipeline: backend::Pipeline<B>,
    index: Option<IndexBuffer<B>>,
    vertex_buffer: Buffer<B>,
    vertex_slot: u32,
    vertex_len: u64,
    texture: Option<BoundTexture<B>>,
    draw: DrawCall,
}

impl<B: GpuBackend> MeshResources<B> {
    pub fn pipeline(&self) -> &backend::Pipeline<B> {
        &self.pipeline
    }

    pub fn vertex_buffer(&self) -> &Buffer<B> {
        &self.vertex_buffer
    }

    pub fn index_buffer(&self) -> Option<&Buffer<B>> {
        self.index.as_ref().map(|i| &i.buffer)
    }

    pub fn texture(&self) -> Option<&Texture<B>> {
        self.texture.as_ref().map(|t| &t.texture)
    }

    pub fn draw_call(&self) -> DrawCall {
        self.draw
    }

    fn record<'a>(&'a self, recording: &mut CommandRecording<'a, B>) -> Result<(), RecordingError> {
        recording.bind_pipeline(&self.pipeline)?;
        if let Some(bound) = &self.texture {
            recording.bind_fragment_samplers(0, &[(&bound.texture, &bound.sampler)])?;
        }
        recording.bind_vertex_buffers(self.vertex_slot, &[&self.vertex_buffer])?;

        match (&self.index, self.draw) {
            (Some(index), DrawCall::Indexed { index_count, instance_count }) => {
                recording.bind_index_buffer(&index.buffer, index.format)?;
                recording.draw_indexed(index_count, instance_count, 0, 0, 0)
            }
            (
                _,
                DrawCall::Vertices {
                    vertex_count,
                    instance_count,
                },
            ) => recording.draw(vertex_count, instance_count, 0, 0),
            (None, DrawCall::Indexed { .. }) => Err(RecordingError::IndexBufferNotBound),
        }
    }

    /// Drops the pipeline first, then buffers, then the texture and sampler.
    fn release(self) {
        let MeshResources {
            pipeline,
            index,
            vertex_buffer,
            texture,
            ..
        } = self;
        drop(pipeline);
        drop(index);
        drop(vertex_buffer);
        if let Some(BoundTexture { texture, sampler }) = texture {
            drop(texture);
            drop(sampler);
        }
    }
}

/// Owns a backend and the resources of one static scene.
pub struct Renderer<B: GpuBackend> {
    config: FrameConfig,
    frames: u64,
    mesh: Option<MeshResources<B>>,
    // Last: dropped after every resource it created.
    backend: B,
}

impl<B: GpuBackend> Renderer<B> {
    /// Creates the scene's pipeline and resources and uploads them.
    ///
    /// Any failure drops what was created so far, then the backend.
    pub fn init(mut backend: B, scene: SceneDesc, config: FrameConfig) -> Result<Self> {
        log::info!(
            "initializing renderer on the {} backend (swapchain {:?})",
            backend.name(),
            backend.swapchain_format()
        );

        let mesh = match scene.mesh {
            Some(desc) => Some(build_mesh(&mut backend, desc)?),
            None => {
                log::info!("scene has no mesh; frames will only clear");
                None
            }
        };

        Ok(Self {
            config,
            frames: 0,
            mesh,
            backend,
        })
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn config(&self) -> &FrameConfig {
        &self.config
    }

    pub fn mesh(&self) -> Option<&MeshResources<B>> {
        self.mesh.as_ref()
    }

    /// Frames submitted with a render pass so far.
    pub fn frame_count(&self) -> u64 {
        self.frames
    }

    /// Debug copy of a mesh buffer's uploaded bytes, without padding.
    pub fn read_back(&mut self, which: MeshBuffer) -> Result<Vec<u8>, GpuError> {
        let mesh = self
            .mesh
            .as_ref()
            .ok_or_else(|| GpuError::Readback("scene has no mesh".into()))?;
        let (buffer, len) = match which {
            MeshBuffer::Vertex => (&mesh.vertex_buffer, mesh.vertex_len),
            MeshBuffer::Index => mesh
                .index
                .as_ref()
                .map(|i| (&i.buffer, i.len))
                .ok_or_else(|| GpuError::Readback("mesh has no index buffer".into()))?,
        };
        self.backend.read_buffer(buffer.raw(), 0, len)
    }

    /// Records and submits one frame.
    ///
    /// Every recording that was begun is submitted, including when no
    /// swapchain image is available.
    pub fn render_frame(&mut self) -> FrameOutcome {
        let Self {
            config,
            frames,
            mesh,
            backend,
        } = self;
        let frame = *frames + 1;

        let mut recording = match backend.begin_recording() {
            Ok(recording) => recording,
            Err(e) => {
                log::warn!("frame {frame}: failed to begin command recording: {e}");
                return FrameOutcome::Skipped(SkipReason::NoCommandBuffer(e));
            }
        };

        let skipped = match backend.acquire_swapchain_image(&mut recording) {
            Ok(Some(extent)) => {
                log::trace!("frame {frame}: acquired {}x{} image", extent.width, extent.height);
                None
            }
            Ok(None) => {
                log::debug!("frame {frame}: no swapchain image, skipping");
                Some(SkipReason::NoSwapchainImage)
            }
            Err(e) => {
                log::warn!("frame {frame}: failed to acquire swapchain image: {e}");
                Some(SkipReason::AcquireFailed(e))
            }
        };

        if let Some(reason) = skipped {
            if let Err(e) = backend::submit(&mut *backend, recording) {
                log::error!("frame {frame}: failed to submit empty recording: {e}");
            }
            return FrameOutcome::Skipped(reason);
        }

        let recorded = record_frame(&mut recording, mesh.as_ref(), config);
        let submitted = backend::submit(&mut *backend, recording);

        match (recorded, submitted) {
            (Ok(draw), Ok(())) => {
                *frames = frame;
                draw.map_or(FrameOutcome::Cleared, FrameOutcome::Drawn)
            }
            (Err(e), _) => {
                log::error!("frame {frame}: failed to record render pass: {e}");
                FrameOutcome::Failed(e.into())
            }
            (Ok(_), Err(e)) => {
                log::error!("frame {frame}: submission failed: {e}");
                FrameOutcome::Failed(e)
            }
        }
    }

    /// Releases the scene's resources in dependency order and returns the
    /// backend.
    pub fn shutdown(self) -> B {
        let Self {
            frames,
            mesh,
            backend,
            ..
        } = self;

        if let Some(mesh) = mesh {
            mesh.release();
        }
        log::info!("renderer shut down after {frames} frame(s)");
        backend
    }
}

fn record_frame<'a, B: GpuBackend>(
    recording: &mut CommandRecording<'a, B>,
    mesh: Option<&'a MeshResources<B>>,
    config: &FrameConfig,
) -> Result<Option<DrawCall>, RecordingError> {
    recording.begin_render_pass(config.clear_color)?;
    if let Some(mesh) = mesh {
        mesh.record(recording)?;
    }
    recording.end_render_pass()?;
    Ok(mesh.map(|m| m.draw))
}

fn build_mesh<B: GpuBackend>(backend: &mut B, desc: scene::MeshDesc) -> Result<MeshResources<B>> {
    anyhow::ensure!(
        desc.vertex_layout.slots().len() == 1,
        "mesh vertex layout must declare exactly one buffer slot, found {}",
        desc.vertex_layout.slots().len()
    );
    let vertex_slot = desc.vertex_layout.slots()[0].slot;

    let vertex_shader = Shader::create(backend, &desc.vertex_shader)
        .with_context(|| format!("failed to create {}", desc.vertex_shader.label()))?;
    let fragment_shader = Shader::create(backend, &desc.fragment_shader)
        .with_context(|| format!("failed to create {}", desc.fragment_shader.label()))?;

    let pipeline_desc = PipelineDesc {
        label: Some("mesh pipeline"),
        vertex_shader: &vertex_shader,
        fragment_shader: &fragment_shader,
        vertex_layout: &desc.vertex_layout,
        topology: desc.topology,
        color_format: backend.swapchain_format(),
        resources: desc.pipeline_resources(),
    };
    let pipeline =
        create_pipeline(backend, &pipeline_desc).context("failed to create graphics pipeline")?;

    // Stages are baked into the pipeline.
    drop(vertex_shader);
    drop(fragment_shader);

    let copy_align = backend.copy_alignment().buffer_offset.max(1);
    let vertex_buffer = Buffer::create(
        backend,
        Some("vertex buffer"),
        BufferUsage::Vertex,
        align_up(desc.vertices.len() as u64, copy_align),
    )
    .context("failed to create vertex buffer")?;

    let index = match &desc.indices {
        Some(indices) => {
            let expected = indices.count as u64 * indices.format.size();
            anyhow::ensure!(
                indices.bytes.len() as u64 == expected,
                "{} index bytes given for {} {:?} indices",
                indices.bytes.len(),
                indices.count,
                indices.format
            );
            let buffer = Buffer::create(
                backend,
                Some("index buffer"),
                BufferUsage::Index,
                align_up(expected, copy_align),
            )
            .context("failed to create index buffer")?;
            Some(IndexBuffer {
                buffer,
                format: indices.format,
                len: expected,
            })
        }
        None => None,
    };

    let texture = match &desc.texture {
        Some(source) => {
            let texture = Texture::create(
                backend,
                TextureDesc {
                    label: Some("mesh texture".into()),
                    width: source.image.width(),
                    height: source.image.height(),
                    format: source.image.format().texture_format(),
                },
            )
            .context("failed to create texture")?;
            let sampler = Sampler::create(backend, source.sampler.clone())
                .context("failed to create sampler")?;
            Some(BoundTexture { texture, sampler })
        }
        None => None,
    };

    {
        let mut plan = StagingPlan::new(backend.copy_alignment());
        let mut destinations = Vec::new();

        plan.push_buffer(DestinationKey(destinations.len()), 0, &desc.vertices);
        destinations.push(Destination::Buffer(&vertex_buffer));

        if let (Some(indices), Some(index)) = (&desc.indices, &index) {
            plan.push_buffer(DestinationKey(destinations.len()), 0, &indices.bytes);
            destinations.push(Destination::Buffer(&index.buffer));
        }

        if let (Some(source), Some(bound)) = (&desc.texture, &texture) {
            plan.push_texture(DestinationKey(destinations.len()), &source.image);
            destinations.push(Destination::Texture(&bound.texture));
        }

        let report = upload::upload(backend, &plan, &destinations)
            .context("failed to upload static resources")?;
        log::info!(
            "uploaded {} bytes of static data in {} region(s)",
            report.data_len,
            report.uploads.len()
        );
    }

    let draw = match &desc.indices {
        Some(indices) => DrawCall::Indexed {
            index_count: indices.count,
            instance_count: 1,
        },
        None => DrawCall::Vertices {
            vertex_count: desc.vertex_count,
            instance_count: 1,
        },
    };

    Ok(MeshResources {
        pipeline,
        index,
        vertex_buffer,
        vertex_slot,
        vertex_len: desc.vertices.len() as u64,
        texture,
        draw,
    })
}
