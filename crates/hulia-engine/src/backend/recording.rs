use thiserror::Error;

use super::resource::{Buffer, Pipeline, Sampler, Texture, TransferBuffer};
use super::types::{BufferUsage, Color, IndexFormat};
use super::GpuBackend;

/// Kind of pass scope a recording can have open.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum ScopeKind {
    Copy,
    Render,
}

#[derive(Debug, Clone, Eq, PartialEq, Error)]
pub enum RecordingError {
    #[error("cannot open a {requested:?} pass while a {open:?} pass is open")]
    ScopeAlreadyOpen { open: ScopeKind, requested: ScopeKind },

    #[error("command requires an open {expected:?} pass (open: {found:?})")]
    WrongScope {
        expected: ScopeKind,
        found: Option<ScopeKind>,
    },

    #[error("recording was submitted with an open {0:?} pass")]
    UnclosedScope(ScopeKind),

    #[error("a swapchain image was already acquired for this recording")]
    SwapchainAlreadyAcquired,

    #[error("render pass needs an acquired swapchain image")]
    NoSwapchainImage,

    #[error("no pipeline bound")]
    PipelineNotBound,

    #[error("indexed draw without a bound index buffer")]
    IndexBufferNotBound,

    #[error("vertex buffer slot {0} is not bound")]
    MissingVertexBuffer(u32),

    #[error("vertex buffer slot {0} is not part of the pipeline layout")]
    UnknownVertexSlot(u32),

    #[error("fragment sampler slots {first}..{end} exceed the {declared} declared by the pipeline")]
    SamplerSlotOutOfRange { first: u32, end: u32, declared: u32 },

    #[error("fragment sampler slot {0} is not bound")]
    UnboundSampler(u32),

    #[error("expected a {expected:?} buffer, got {found:?}")]
    WrongBufferUsage {
        expected: BufferUsage,
        found: BufferUsage,
    },

    #[error("copy of {size} bytes at {offset} overruns a {capacity} byte {what}")]
    CopyOutOfBounds {
        what: &'static str,
        offset: u64,
        size: u64,
        capacity: u64,
    },

    #[error("texture upload rows of {row_pitch} bytes cannot hold {width} texels")]
    RowPitchTooSmall { row_pitch: u32, width: u32 },
}

/// A buffer bound at an offset.
pub struct BufferBinding<'a, B: GpuBackend> {
    pub buffer: &'a B::Buffer,
    pub offset: u64,
}

/// A texture and the sampler reading it.
pub struct TextureSamplerBinding<'a, B: GpuBackend> {
    pub texture: &'a B::Texture,
    pub sampler: &'a B::Sampler,
}

/// One recorded command, referencing raw backend handles.
pub enum Command<'a, B: GpuBackend> {
    BeginCopyPass,
    UploadToBuffer {
        source: &'a B::TransferBuffer,
        source_offset: u64,
        destination: &'a B::Buffer,
        destination_offset: u64,
        size: u64,
        cycle: bool,
    },
    UploadToTexture {
        source: &'a B::TransferBuffer,
        source_offset: u64,
        row_pitch: u32,
        destination: &'a B::Texture,
        width: u32,
        height: u32,
        cycle: bool,
    },
    EndCopyPass,
    BeginRenderPass {
        clear: Color,
    },
    BindPipeline(&'a B::Pipeline),
    BindFragmentSamplers {
        first_slot: u32,
        bindings: Vec<TextureSamplerBinding<'a, B>>,
    },
    BindVertexBuffers {
        first_slot: u32,
        buffers: Vec<BufferBinding<'a, B>>,
    },
    BindIndexBuffer {
        binding: BufferBinding<'a, B>,
        format: IndexFormat,
    },
    Draw {
        vertex_count: u32,
        instance_count: u32,
        first_vertex: u32,
        first_instance: u32,
    },
    DrawIndexed {
        index_count: u32,
        instance_count: u32,
        first_index: u32,
        vertex_offset: i32,
        first_instance: u32,
    },
    EndRenderPass,
}

impl<B: GpuBackend> Command<'_, B> {
    pub fn name(&self) -> &'static str {
        match self {
            Command::BeginCopyPass => "begin_copy_pass",
            Command::UploadToBuffer { .. } => "upload_to_buffer",
            Command::UploadToTexture { .. } => "upload_to_texture",
            Command::EndCopyPass => "end_copy_pass",
            Command::BeginRenderPass { .. } => "begin_render_pass",
            Command::BindPipeline(_) => "bind_pipeline",
            Command::BindFragmentSamplers { .. } => "bind_fragment_samplers",
            Command::BindVertexBuffers { .. } => "bind_vertex_buffers",
            Command::BindIndexBuffer { .. } => "bind_index_buffer",
            Command::Draw { .. } => "draw",
            Command::DrawIndexed { .. } => "draw_indexed",
            Command::EndRenderPass => "end_render_pass",
        }
    }
}

/// State of the currently bound render pass.
#[derive(Default)]
struct RenderState {
    pipeline_bound: bool,
    vertex_slots: Vec<u32>,
    fragment_samplers: u32,
    bound_samplers: Vec<bool>,
    bound_vertex_slots: Vec<u32>,
    index_bound: bool,
}

/// Backend-agnostic command buffer.
///
/// Commands are validated as they are recorded: one pass scope at a time,
/// uploads only inside a copy pass, pipeline bound before any binding or
/// draw. A recording is consumed by exactly one submission; dropping it
/// unsubmitted is reported.
pub struct CommandRecording<'a, B: GpuBackend> {
    commands: Vec<Command<'a, B>>,
    swapchain: Option<B::SwapchainImage>,
    scope: Option<ScopeKind>,
    render: RenderState,
    submitted: bool,
}

impl<'a, B: GpuBackend> Default for CommandRecording<'a, B> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a, B: GpuBackend> CommandRecording<'a, B> {
    pub fn new() -> Self {
        Self {
            commands: Vec::new(),
            swapchain: None,
            scope: None,
            render: RenderState::default(),
            submitted: false,
        }
    }

    pub fn commands(&self) -> &[Command<'a, B>] {
        &self.commands
    }

    pub fn open_scope(&self) -> Option<ScopeKind> {
        self.scope
    }

    pub fn has_swapchain_image(&self) -> bool {
        self.swapchain.is_some()
    }

    /// Attaches the image a backend acquired for this recording.
    pub fn set_swapchain_image(&mut self, image: B::SwapchainImage) -> Result<(), RecordingError> {
        if self.swapchain.is_some() {
            return Err(RecordingError::SwapchainAlreadyAcquired);
        }
        self.swapchain = Some(image);
        Ok(())
    }

    // ── scopes ────────────────────────────────────────────────────────────

    fn open(&mut self, kind: ScopeKind) -> Result<(), RecordingError> {
        if let Some(open) = self.scope {
            return Err(RecordingError::ScopeAlreadyOpen {
                open,
                requested: kind,
            });
        }
        self.scope = Some(kind);
        Ok(())
    }

    fn require(&self, expected: ScopeKind) -> Result<(), RecordingError> {
        if self.scope != Some(expected) {
            return Err(RecordingError::WrongScope {
                expected,
                found: self.scope,
            });
        }
        Ok(())
    }

    pub fn begin_copy_pass(&mut self) -> Result<(), RecordingError> {
        self.open(ScopeKind::Copy)?;
        self.commands.push(Command::BeginCopyPass);
        Ok(())
    }

    pub fn end_copy_pass(&mut self) -> Result<(), RecordingError> {
        self.require(ScopeKind::Copy)?;
        self.scope = None;
        self.commands.push(Command::EndCopyPass);
        Ok(())
    }

    pub fn begin_render_pass(&mut self, clear: Color) -> Result<(), RecordingError> {
        if self.swapchain.is_none() {
            return Err(RecordingError::NoSwapchainImage);
        }
        self.open(ScopeKind::Render)?;
        self.render = RenderState::default();
        self.commands.push(Command::BeginRenderPass { clear });
        Ok(())
    }

    pub fn end_render_pass(&mut self) -> Result<(), RecordingError> {
        self.require(ScopeKind::Render)?;
        self.scope = None;
        self.commands.push(Command::EndRenderPass);
        Ok(())
    }

    /// Closes whatever pass is still open. Returns its kind, if any.
    pub(crate) fn close_open_scope(&mut self) -> Option<ScopeKind> {
        let open = self.scope.take()?;
        self.commands.push(match open {
            ScopeKind::Copy => Command::EndCopyPass,
            ScopeKind::Render => Command::EndRenderPass,
        });
        Some(open)
    }

    // ── copy pass ─────────────────────────────────────────────────────────

    pub fn upload_to_buffer(
        &mut self,
        source: &'a TransferBuffer<B>,
        source_offset: u64,
        destination: &'a Buffer<B>,
        destination_offset: u64,
        size: u64,
        cycle: bool,
    ) -> Result<(), RecordingError> {
        self.require(ScopeKind::Copy)?;
        check_range("transfer buffer", source_offset, size, source.size())?;
        check_range("destination buffer", destination_offset, size, destination.size())?;

        self.commands.push(Command::UploadToBuffer {
            source: source.raw(),
            source_offset,
            destination: destination.raw(),
            destination_offset,
            size,
            cycle,
        });
        Ok(())
    }

    /// Uploads a full texture whose rows sit `row_pitch` bytes apart.
    pub fn upload_to_texture(
        &mut self,
        source: &'a TransferBuffer<B>,
        source_offset: u64,
        row_pitch: u32,
        destination: &'a Texture<B>,
        cycle: bool,
    ) -> Result<(), RecordingError> {
        self.require(ScopeKind::Copy)?;

        let desc = destination.desc();
        let row_bytes = desc.width * desc.format.block_size();
        if row_pitch < row_bytes {
            return Err(RecordingError::RowPitchTooSmall {
                row_pitch,
                width: desc.width,
            });
        }
        // The last row only needs its texels, not the full pitch.
        let size = row_pitch as u64 * (desc.height as u64 - 1) + row_bytes as u64;
        check_range("transfer buffer", source_offset, size, source.size())?;

        self.commands.push(Command::UploadToTexture {
            source: source.raw(),
            source_offset,
            row_pitch,
            destination: destination.raw(),
            width: desc.width,
            height: desc.height,
            cycle,
        });
        Ok(())
    }

    // ── render pass ───────────────────────────────────────────────────────

    pub fn bind_pipeline(&mut self, pipeline: &'a Pipeline<B>) -> Result<(), RecordingError> {
        self.require(ScopeKind::Render)?;
        self.render = RenderState {
            pipeline_bound: true,
            vertex_slots: pipeline.vertex_slots().to_vec(),
            fragment_samplers: pipeline.resources().fragment.samplers,
            bound_samplers: vec![false; pipeline.resources().fragment.samplers as usize],
            ..RenderState::default()
        };
        self.commands.push(Command::BindPipeline(pipeline.raw()));
        Ok(())
    }

    fn require_pipeline(&self) -> Result<(), RecordingError> {
        self.require(ScopeKind::Render)?;
        if !self.render.pipeline_bound {
            return Err(RecordingError::PipelineNotBound);
        }
        Ok(())
    }

    pub fn bind_fragment_samplers(
        &mut self,
        first_slot: u32,
        pairs: &[(&'a Texture<B>, &'a Sampler<B>)],
    ) -> Result<(), RecordingError> {
        self.require_pipeline()?;
        let declared = self.render.fragment_samplers;
        let end = u32::try_from(pairs.len())
            .ok()
            .and_then(|count| first_slot.checked_add(count));
        match end {
            Some(end) if end <= declared => {
                self.render.bound_samplers[first_slot as usize..end as usize].fill(true);
            }
            _ => {
                return Err(RecordingError::SamplerSlotOutOfRange {
                    first: first_slot,
                    end: end.unwrap_or(u32::MAX),
                    declared,
                });
            }
        }

        let bindings = pairs
            .iter()
            .map(|(texture, sampler)| TextureSamplerBinding {
                texture: texture.raw(),
                sampler: sampler.raw(),
            })
            .collect();
        self.commands.push(Command::BindFragmentSamplers {
            first_slot,
            bindings,
        });
        Ok(())
    }

    pub fn bind_vertex_buffers(
        &mut self,
        first_slot: u32,
        buffers: &[&'a Buffer<B>],
    ) -> Result<(), RecordingError> {
        self.require_pipeline()?;

        let mut slots = Vec::with_capacity(buffers.len());
        let mut bindings = Vec::with_capacity(buffers.len());
        for (i, buffer) in buffers.iter().enumerate() {
            let slot = u32::try_from(i)
                .ok()
                .and_then(|i| first_slot.checked_add(i))
                .ok_or(RecordingError::UnknownVertexSlot(u32::MAX))?;
            if !self.render.vertex_slots.contains(&slot) {
                return Err(RecordingError::UnknownVertexSlot(slot));
            }
            expect_usage(buffer, BufferUsage::Vertex)?;
            slots.push(slot);
            bindings.push(BufferBinding {
                buffer: buffer.raw(),
                offset: 0,
            });
        }

        for slot in slots {
            if !self.render.bound_vertex_slots.contains(&slot) {
                self.render.bound_vertex_slots.push(slot);
            }
        }

        self.commands.push(Command::BindVertexBuffers {
            first_slot,
            buffers: bindings,
        });
        Ok(())
    }

    pub fn bind_index_buffer(
        &mut self,
        buffer: &'a Buffer<B>,
        format: IndexFormat,
    ) -> Result<(), RecordingError> {
        self.require_pipeline()?;
        expect_usage(buffer, BufferUsage::Index)?;
        self.render.index_bound = true;
        self.commands.push(Command::BindIndexBuffer {
            binding: BufferBinding {
                buffer: buffer.raw(),
                offset: 0,
            },
            format,
        });
        Ok(())
    }

    /// Every vertex slot of the pipeline and every fragment sampler it
    /// declares must be bound before a draw.
    fn require_draw_inputs(&self) -> Result<(), RecordingError> {
        self.require_pipeline()?;
        for slot in &self.render.vertex_slots {
            if !self.render.bound_vertex_slots.contains(slot) {
                return Err(RecordingError::MissingVertexBuffer(*slot));
            }
        }
        if let Some(slot) = self.render.bound_samplers.iter().position(|bound| !bound) {
            return Err(RecordingError::UnboundSampler(slot as u32));
        }
        Ok(())
    }

    pub fn draw(
        &mut self,
        vertex_count: u32,
        instance_count: u32,
        first_vertex: u32,
        first_instance: u32,
    ) -> Result<(), RecordingError> {
        self.require_draw_inputs()?;
        self.commands.push(Command::Draw {
            vertex_count,
            instance_count,
            first_vertex,
            first_instance,
        });
        Ok(())
    }

    pub fn draw_indexed(
        &mut self,
        index_count: u32,
        instance_count: u32,
        first_index: u32,
        vertex_offset: i32,
        first_instance: u32,
    ) -> Result<(), RecordingError> {
        self.require_draw_inputs()?;
        if !self.render.index_bound {
            return Err(RecordingError::IndexBufferNotBound);
        }
        self.commands.push(Command::DrawIndexed {
            index_count,
            instance_count,
            first_index,
            vertex_offset,
            first_instance,
        });
        Ok(())
    }

    /// Hands the recorded commands and acquired image to a backend.
    ///
    /// Called by [`GpuBackend::submit`] implementations; marks the recording
    /// as submitted.
    pub fn into_parts(mut self) -> (Vec<Command<'a, B>>, Option<B::SwapchainImage>) {
        self.submitted = true;
        (
            std::mem::take(&mut self.commands),
            self.swapchain.take(),
        )
    }
}

impl<B: GpuBackend> Drop for CommandRecording<'_, B> {
    fn drop(&mut self) {
        if !self.submitted {
            log::error!(
                "command recording with {} command(s) dropped without submission",
                self.commands.len()
            );
        }
    }
}

fn check_range(
    what: &'static str,
    offset: u64,
    size: u64,
    capacity: u64,
) -> Result<(), RecordingError> {
    match offset.checked_add(size) {
        Some(end) if end <= capacity => Ok(()),
        _ => Err(RecordingError::CopyOutOfBounds {
            what,
            offset,
            size,
            capacity,
        }),
    }
}

fn expect_usage<B: GpuBackend>(buffer: &Buffer<B>, expected: BufferUsage) -> Result<(), RecordingError> {
    if buffer.usage() != expected {
        return Err(RecordingError::WrongBufferUsage {
            expected,
            found: buffer.usage(),
        });
    }
    Ok(())
}

/// Closes any open pass and submits `recording` to `backend`.
///
/// The recording is submitted even when a pass was left open; the dangling
/// scope is reported afterwards.
pub fn submit<B: GpuBackend>(
    backend: &mut B,
    mut recording: CommandRecording<'_, B>,
) -> Result<(), super::GpuError> {
    let unclosed = recording.close_open_scope();
    backend.submit(recording)?;
    match unclosed {
        Some(kind) => Err(RecordingError::UnclosedScope(kind).into()),
        None => Ok(()),
    }
}
