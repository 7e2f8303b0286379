//! Headless backend for tests and tooling.
//!
//! No GPU work happens. Device memory is simulated with byte vectors so that
//! staged uploads land where a real device would put them, and every call is
//! appended to a shared [`Journal`] that tests inspect afterwards.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use crate::pipeline::{PipelineDesc, ShaderSource, ShaderStage};

use super::recording::{Command, CommandRecording};
use super::types::{
    BufferUsage, Color, CopyAlignment, IndexFormat, SamplerDesc, SurfaceExtent, TextureDesc,
    TextureFormat,
};
use super::{GpuBackend, GpuError};

/// One observed backend call.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    CreateShader { id: u64, stage: ShaderStage },
    CreatePipeline { id: u64 },
    CreateBuffer { id: u64, usage: BufferUsage, size: u64 },
    CreateTexture { id: u64, width: u32, height: u32 },
    CreateSampler { id: u64 },
    CreateTransferBuffer { id: u64, size: u64 },
    WriteTransferBuffer { id: u64, size: u64 },
    BeginRecording,
    AcquireSwapchain { available: bool },
    Submit { commands: usize, presented: bool },
    BeginCopyPass,
    UploadToBuffer {
        source: u64,
        source_offset: u64,
        destination: u64,
        destination_offset: u64,
        size: u64,
        cycle: bool,
    },
    UploadToTexture {
        source: u64,
        source_offset: u64,
        destination: u64,
        width: u32,
        height: u32,
        row_pitch: u32,
        cycle: bool,
    },
    EndCopyPass,
    BeginRenderPass { clear: Color },
    BindPipeline { id: u64 },
    BindFragmentSamplers { first_slot: u32, count: usize },
    BindVertexBuffers { first_slot: u32, count: usize },
    BindIndexBuffer { format: IndexFormat },
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
    Release { kind: &'static str, id: u64 },
}

impl Event {
    pub fn name(&self) -> &'static str {
        match self {
            Event::CreateShader { .. } => "create_shader",
            Event::CreatePipeline { .. } => "create_pipeline",
            Event::CreateBuffer { .. } => "create_buffer",
            Event::CreateTexture { .. } => "create_texture",
            Event::CreateSampler { .. } => "create_sampler",
            Event::CreateTransferBuffer { .. } => "create_transfer_buffer",
            Event::WriteTransferBuffer { .. } => "write_transfer_buffer",
            Event::BeginRecording => "begin_recording",
            Event::AcquireSwapchain { .. } => "acquire_swapchain",
            Event::Submit { .. } => "submit",
            Event::BeginCopyPass => "begin_copy_pass",
            Event::UploadToBuffer { .. } => "upload_to_buffer",
            Event::UploadToTexture { .. } => "upload_to_texture",
            Event::EndCopyPass => "end_copy_pass",
            Event::BeginRenderPass { .. } => "begin_render_pass",
            Event::BindPipeline { .. } => "bind_pipeline",
            Event::BindFragmentSamplers { .. } => "bind_fragment_samplers",
            Event::BindVertexBuffers { .. } => "bind_vertex_buffers",
            Event::BindIndexBuffer { .. } => "bind_index_buffer",
            Event::Draw { .. } => "draw",
            Event::DrawIndexed { .. } => "draw_indexed",
            Event::EndRenderPass => "end_render_pass",
            Event::Release { .. } => "release",
        }
    }
}

/// Shared, append-only log of backend calls.
#[derive(Debug, Clone, Default)]
pub struct Journal(Rc<RefCell<Vec<Event>>>);

impl Journal {
    fn push(&self, event: Event) {
        log::trace!("headless: {event:?}");
        self.0.borrow_mut().push(event);
    }

    pub fn events(&self) -> Vec<Event> {
        self.0.borrow().clone()
    }

    /// Number of events with the given [`Event::name`].
    pub fn count(&self, name: &str) -> usize {
        self.0.borrow().iter().filter(|e| e.name() == name).count()
    }

    /// Names of all events in order.
    pub fn names(&self) -> Vec<&'static str> {
        self.0.borrow().iter().map(Event::name).collect()
    }

    /// Forgets everything recorded so far.
    pub fn clear(&self) {
        self.0.borrow_mut().clear();
    }
}

/// What the next swapchain acquisition returns.
#[derive(Debug, Clone, PartialEq)]
pub enum AcquireResult {
    Image,
    NoImage,
    Error(GpuError),
}

// ── handles ───────────────────────────────────────────────────────────────

pub struct HeadlessBuffer {
    id: u64,
    memory: RefCell<Vec<u8>>,
    journal: Journal,
}

pub struct HeadlessTransferBuffer {
    id: u64,
    memory: Vec<u8>,
    journal: Journal,
}

pub struct HeadlessTexture {
    id: u64,
    width: u32,
    height: u32,
    memory: RefCell<Vec<u8>>,
    journal: Journal,
}

pub struct HeadlessSampler {
    id: u64,
    journal: Journal,
}

pub struct HeadlessShader {
    id: u64,
    journal: Journal,
}

pub struct HeadlessPipeline {
    id: u64,
    journal: Journal,
}

#[derive(Debug)]
pub struct HeadlessImage {
    pub frame: u64,
    pub extent: SurfaceExtent,
}

macro_rules! release_on_drop {
    ($($ty:ident => $kind:literal),* $(,)?) => {
        $(
            impl Drop for $ty {
                fn drop(&mut self) {
                    self.journal.push(Event::Release { kind: $kind, id: self.id });
                }
            }
        )*
    };
}

release_on_drop! {
    HeadlessBuffer => "buffer",
    HeadlessTransferBuffer => "transfer_buffer",
    HeadlessTexture => "texture",
    HeadlessSampler => "sampler",
    HeadlessShader => "shader",
    HeadlessPipeline => "pipeline",
}

impl HeadlessTexture {
    pub fn extent(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Texels, tightly packed.
    pub fn contents(&self) -> Vec<u8> {
        self.memory.borrow().clone()
    }
}

// ── backend ───────────────────────────────────────────────────────────────

/// Backend with no GPU behind it.
pub struct HeadlessBackend {
    journal: Journal,
    next_id: u64,
    frame: u64,
    extent: SurfaceExtent,
    format: TextureFormat,
    alignment: CopyAlignment,
    acquire_script: VecDeque<AcquireResult>,
    failing_recordings: u32,
}

impl Default for HeadlessBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl HeadlessBackend {
    pub fn new() -> Self {
        Self {
            journal: Journal::default(),
            next_id: 1,
            frame: 0,
            extent: SurfaceExtent {
                width: 1280,
                height: 720,
            },
            format: TextureFormat::Bgra8UnormSrgb,
            alignment: CopyAlignment::default(),
            acquire_script: VecDeque::new(),
            failing_recordings: 0,
        }
    }

    pub fn with_swapchain_format(mut self, format: TextureFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_copy_alignment(mut self, alignment: CopyAlignment) -> Self {
        self.alignment = alignment;
        self
    }

    /// Shared handle to the call journal.
    pub fn journal(&self) -> Journal {
        self.journal.clone()
    }

    /// Queues the result of an upcoming swapchain acquisition. Acquisitions
    /// with nothing queued produce an image.
    pub fn push_acquire_result(&mut self, result: AcquireResult) {
        self.acquire_script.push_back(result);
    }

    /// Makes the next `count` calls to `begin_recording` fail.
    pub fn fail_next_recordings(&mut self, count: u32) {
        self.failing_recordings = count;
    }

    /// Debug copy of a texture's texels, tightly packed.
    pub fn read_texture(&self, texture: &HeadlessTexture) -> Vec<u8> {
        texture.contents()
    }

    fn next_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn execute(&mut self, command: &Command<'_, Self>) {
        match command {
            Command::BeginCopyPass => self.journal.push(Event::BeginCopyPass),
            Command::EndCopyPass => self.journal.push(Event::EndCopyPass),
            Command::UploadToBuffer {
                source,
                source_offset,
                destination,
                destination_offset,
                size,
                cycle,
            } => {
                let src = &source.memory[*source_offset as usize..(source_offset + size) as usize];
                let mut dst = destination.memory.borrow_mut();
                if *cycle {
                    // Cycling hands out fresh backing memory; prior contents are gone.
                    dst.iter_mut().for_each(|b| *b = 0);
                }
                let start = *destination_offset as usize;
                dst[start..start + src.len()].copy_from_slice(src);

                self.journal.push(Event::UploadToBuffer {
                    source: source.id,
                    source_offset: *source_offset,
                    destination: destination.id,
                    destination_offset: *destination_offset,
                    size: *size,
                    cycle: *cycle,
                });
            }
            Command::UploadToTexture {
                source,
                source_offset,
                row_pitch,
                destination,
                width,
                height,
                cycle,
            } => {
                let row_bytes = *width as usize * 4;
                let mut dst = destination.memory.borrow_mut();
                if *cycle {
                    dst.iter_mut().for_each(|b| *b = 0);
                }
                for row in 0..*height as usize {
                    let src_start = *source_offset as usize + row * *row_pitch as usize;
                    let dst_start = row * row_bytes;
                    dst[dst_start..dst_start + row_bytes]
                        .copy_from_slice(&source.memory[src_start..src_start + row_bytes]);
                }

                self.journal.push(Event::UploadToTexture {
                    source: source.id,
                    source_offset: *source_offset,
                    destination: destination.id,
                    width: *width,
                    height: *height,
                    row_pitch: *row_pitch,
                    cycle: *cycle,
                });
            }
            Command::BeginRenderPass { clear } => {
                self.journal.push(Event::BeginRenderPass { clear: *clear })
            }
            Command::BindPipeline(pipeline) => {
                self.journal.push(Event::BindPipeline { id: pipeline.id })
            }
            Command::BindFragmentSamplers {
                first_slot,
                bindings,
            } => self.journal.push(Event::BindFragmentSamplers {
                first_slot: *first_slot,
                count: bindings.len(),
            }),
            Command::BindVertexBuffers {
                first_slot,
                buffers,
            } => self.journal.push(Event::BindVertexBuffers {
                first_slot: *first_slot,
                count: buffers.len(),
            }),
            Command::BindIndexBuffer { format, .. } => {
                self.journal.push(Event::BindIndexBuffer { format: *format })
            }
            Command::Draw {
                vertex_count,
                instance_count,
                first_vertex,
                first_instance,
            } => self.journal.push(Event::Draw {
                vertex_count: *vertex_count,
                instance_count: *instance_count,
                first_vertex: *first_vertex,
                first_instance: *first_instance,
            }),
            Command::DrawIndexed {
                index_count,
                instance_count,
                first_index,
                vertex_offset,
                first_instance,
            } => self.journal.push(Event::DrawIndexed {
                index_count: *index_count,
                instance_count: *instance_count,
                first_index: *first_index,
                vertex_offset: *vertex_offset,
                first_instance: *first_instance,
            }),
            Command::EndRenderPass => self.journal.push(Event::EndRenderPass),
        }
    }
}

impl GpuBackend for HeadlessBackend {
    type Buffer = HeadlessBuffer;
    type TransferBuffer = HeadlessTransferBuffer;
    type Texture = HeadlessTexture;
    type Sampler = HeadlessSampler;
    type Shader = HeadlessShader;
    type Pipeline = HeadlessPipeline;
    type SwapchainImage = HeadlessImage;

    fn name(&self) -> &'static str {
        "headless"
    }

    fn swapchain_format(&self) -> TextureFormat {
        self.format
    }

    fn copy_alignment(&self) -> CopyAlignment {
        self.alignment
    }

    fn create_shader(&mut self, source: &ShaderSource) -> Result<Self::Shader, GpuError> {
        let id = self.next_id();
        self.journal.push(Event::CreateShader {
            id,
            stage: source.stage,
        });
        Ok(HeadlessShader {
            id,
            journal: self.journal.clone(),
        })
    }

    fn create_pipeline(&mut self, _desc: &PipelineDesc<'_, Self>) -> Result<Self::Pipeline, GpuError> {
        let id = self.next_id();
        self.journal.push(Event::CreatePipeline { id });
        Ok(HeadlessPipeline {
            id,
            journal: self.journal.clone(),
        })
    }

    fn create_buffer(
        &mut self,
        _label: Option<&str>,
        usage: BufferUsage,
        size: u64,
    ) -> Result<Self::Buffer, GpuError> {
        let id = self.next_id();
        self.journal.push(Event::CreateBuffer { id, usage, size });
        Ok(HeadlessBuffer {
            id,
            memory: RefCell::new(vec![0; size as usize]),
            journal: self.journal.clone(),
        })
    }

    fn create_texture(&mut self, desc: &TextureDesc) -> Result<Self::Texture, GpuError> {
        let id = self.next_id();
        self.journal.push(Event::CreateTexture {
            id,
            width: desc.width,
            height: desc.height,
        });
        let size = desc.width as usize * desc.height as usize * desc.format.block_size() as usize;
        Ok(HeadlessTexture {
            id,
            width: desc.width,
            height: desc.height,
            memory: RefCell::new(vec![0; size]),
            journal: self.journal.clone(),
        })
    }

    fn create_sampler(&mut self, _desc: &SamplerDesc) -> Result<Self::Sampler, GpuError> {
        let id = self.next_id();
        self.journal.push(Event::CreateSampler { id });
        Ok(HeadlessSampler {
            id,
            journal: self.journal.clone(),
        })
    }

    fn create_transfer_buffer(&mut self, size: u64) -> Result<Self::TransferBuffer, GpuError> {
        let id = self.next_id();
        self.journal.push(Event::CreateTransferBuffer { id, size });
        Ok(HeadlessTransferBuffer {
            id,
            memory: vec![0; size as usize],
            journal: self.journal.clone(),
        })
    }

    fn write_transfer_buffer(
        &mut self,
        buffer: &mut Self::TransferBuffer,
        write: &mut dyn FnMut(&mut [u8]),
    ) -> Result<(), GpuError> {
        write(&mut buffer.memory);
        self.journal.push(Event::WriteTransferBuffer {
            id: buffer.id,
            size: buffer.memory.len() as u64,
        });
        Ok(())
    }

    fn begin_recording<'a>(&mut self) -> Result<CommandRecording<'a, Self>, GpuError> {
        if self.failing_recordings > 0 {
            self.failing_recordings -= 1;
            return Err(GpuError::CommandBufferUnavailable);
        }
        self.journal.push(Event::BeginRecording);
        Ok(CommandRecording::new())
    }

    fn acquire_swapchain_image(
        &mut self,
        recording: &mut CommandRecording<'_, Self>,
    ) -> Result<Option<SurfaceExtent>, GpuError> {
        let result = self.acquire_script.pop_front().unwrap_or(AcquireResult::Image);
        self.journal.push(Event::AcquireSwapchain {
            available: result == AcquireResult::Image,
        });

        match result {
            AcquireResult::Image => {
                self.frame += 1;
                recording.set_swapchain_image(HeadlessImage {
                    frame: self.frame,
                    extent: self.extent,
                })?;
                Ok(Some(self.extent))
            }
            AcquireResult::NoImage => Ok(None),
            AcquireResult::Error(e) => Err(e),
        }
    }

    fn submit(&mut self, recording: CommandRecording<'_, Self>) -> Result<(), GpuError> {
        let (commands, image) = recording.into_parts();
        for command in &commands {
            self.execute(command);
        }
        self.journal.push(Event::Submit {
            commands: commands.len(),
            presented: image.is_some(),
        });
        Ok(())
    }

    fn read_buffer(
        &mut self,
        buffer: &Self::Buffer,
        offset: u64,
        size: u64,
    ) -> Result<Vec<u8>, GpuError> {
        let memory = buffer.memory.borrow();
        let end = offset
            .checked_add(size)
            .filter(|end| *end <= memory.len() as u64)
            .ok_or_else(|| {
                GpuError::Readback(format!(
                    "range {offset}+{size} outside {} byte buffer",
                    memory.len()
                ))
            })?;
        Ok(memory[offset as usize..end as usize].to_vec())
    }
}
