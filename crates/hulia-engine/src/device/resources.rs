use std::borrow::Cow;
use std::cell::Cell;
use std::sync::mpsc;

use crate::backend::{
    align_up, BufferUsage, CommandRecording, CopyAlignment, GpuBackend, GpuError, SamplerDesc,
    SurfaceExtent, TextureDesc, TextureFormat,
};
use crate::pipeline::{PipelineDesc, ShaderCode, ShaderResources, ShaderSource};

use super::convert::{self, VertexBuffers};
use super::error::creation_failure;
use super::{encode, Gpu};

const BACKEND: &str = "wgpu";

/// Host-visible staging buffer (`MAP_WRITE | COPY_SRC`), mapped at creation.
pub struct WgpuTransferBuffer {
    pub(super) buffer: wgpu::Buffer,
    pub(super) mapped: Cell<bool>,
}

pub struct WgpuTexture {
    pub(super) texture: wgpu::Texture,
    pub(super) view: wgpu::TextureView,
}

pub struct WgpuShader {
    module: wgpu::ShaderModule,
    entry_point: String,
}

/// Render pipeline plus the bind group layout of its fragment samplers.
///
/// Sampler slot `i` is bound at group 0: texture at binding `2i`, sampler at
/// binding `2i + 1`.
pub struct WgpuPipeline {
    pub(super) pipeline: wgpu::RenderPipeline,
    pub(super) samplers_layout: Option<wgpu::BindGroupLayout>,
    pub(super) fragment_samplers: u32,
}

pub struct SwapchainImage {
    pub(super) texture: wgpu::SurfaceTexture,
    pub(super) view: wgpu::TextureView,
}

fn unsupported(what: impl Into<String>) -> GpuError {
    GpuError::Unsupported {
        backend: BACKEND,
        what: what.into(),
    }
}

fn check_stage_resources(stage: &str, resources: ShaderResources, allow_samplers: bool) -> Result<(), GpuError> {
    let ShaderResources {
        samplers,
        uniform_buffers,
        storage_buffers,
        storage_textures,
    } = resources;
    if uniform_buffers + storage_buffers + storage_textures > 0 || (samplers > 0 && !allow_samplers) {
        return Err(unsupported(format!(
            "{stage} stage resources {resources:?}; only fragment samplers are bindable"
        )));
    }
    Ok(())
}

fn sampler_bind_group_layout(device: &wgpu::Device, count: u32) -> wgpu::BindGroupLayout {
    let entries: Vec<_> = (0..count)
        .flat_map(|i| {
            [
                wgpu::BindGroupLayoutEntry {
                    binding: 2 * i,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 2 * i + 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ]
        })
        .collect();

    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("hulia fragment samplers"),
        entries: &entries,
    })
}

/// Runs `create` inside out-of-memory and validation error scopes and
/// reports what they caught.
fn scoped<T>(
    device: &wgpu::Device,
    failed: fn(String) -> GpuError,
    create: impl FnOnce() -> T,
) -> Result<T, GpuError> {
    let memory = device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
    let validation = device.push_error_scope(wgpu::ErrorFilter::Validation);
    let value = create();
    let invalid = pollster::block_on(validation.pop());
    let exhausted = pollster::block_on(memory.pop());
    match exhausted.or(invalid) {
        Some(err) => Err(creation_failure(err, failed)),
        None => Ok(value),
    }
}

/// Blocks until a `map_async` request on `slice` completes.
fn map_blocking(
    device: &wgpu::Device,
    slice: wgpu::BufferSlice<'_>,
    mode: wgpu::MapMode,
) -> Result<(), String> {
    let (tx, rx) = mpsc::channel();
    slice.map_async(mode, move |result| {
        let _ = tx.send(result);
    });
    device
        .poll(wgpu::PollType::Wait {
            submission_index: None,
            timeout: None,
        })
        .map_err(|e| e.to_string())?;
    rx.recv()
        .map_err(|e| e.to_string())?
        .map_err(|e| e.to_string())
}

impl<'w> GpuBackend for Gpu<'w> {
    type Buffer = wgpu::Buffer;
    type TransferBuffer = WgpuTransferBuffer;
    type Texture = WgpuTexture;
    type Sampler = wgpu::Sampler;
    type Shader = WgpuShader;
    type Pipeline = WgpuPipeline;
    type SwapchainImage = SwapchainImage;

    fn name(&self) -> &'static str {
        BACKEND
    }

    fn swapchain_format(&self) -> TextureFormat {
        self.format
    }

    fn copy_alignment(&self) -> CopyAlignment {
        CopyAlignment {
            buffer_offset: wgpu::COPY_BUFFER_ALIGNMENT,
            texture_row_pitch: wgpu::COPY_BYTES_PER_ROW_ALIGNMENT,
        }
    }

    fn create_shader(&mut self, source: &ShaderSource) -> Result<Self::Shader, GpuError> {
        let code = match &source.code {
            ShaderCode::Wgsl(text) => wgpu::ShaderSource::Wgsl(Cow::Borrowed(text.as_str())),
            ShaderCode::Spirv(words) => wgpu::ShaderSource::SpirV(Cow::Borrowed(words.as_slice())),
        };
        let label = source.label();
        let module = scoped(&self.device, GpuError::ShaderCompilation, || {
            self.device.create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(label.as_ref()),
                source: code,
            })
        })?;
        log::debug!("created shader module {label} (entry {})", source.entry_point);

        Ok(WgpuShader {
            module,
            entry_point: source.entry_point.clone(),
        })
    }

    fn create_pipeline(&mut self, desc: &PipelineDesc<'_, Self>) -> Result<Self::Pipeline, GpuError> {
        check_stage_resources("vertex", desc.resources.vertex, false)?;
        check_stage_resources("fragment", desc.resources.fragment, true)?;

        let fragment_samplers = desc.resources.fragment.samplers;
        let vertex_buffers = VertexBuffers::new(desc.vertex_layout);
        let buffers = vertex_buffers.layouts();
        let vs = desc.vertex_shader.raw();
        let fs = desc.fragment_shader.raw();
        let device = &self.device;

        let (pipeline, samplers_layout) = scoped(device, GpuError::PipelineCreation, || {
            let samplers_layout =
                (fragment_samplers > 0).then(|| sampler_bind_group_layout(device, fragment_samplers));
            let bind_group_layouts: Vec<&wgpu::BindGroupLayout> = samplers_layout.iter().collect();

            let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: desc.label,
                bind_group_layouts: &bind_group_layouts,
                immediate_size: 0,
            });

            let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: desc.label,
                layout: Some(&layout),
                vertex: wgpu::VertexState {
                    module: &vs.module,
                    entry_point: Some(vs.entry_point.as_str()),
                    compilation_options: Default::default(),
                    buffers: &buffers,
                },
                fragment: Some(wgpu::FragmentState {
                    module: &fs.module,
                    entry_point: Some(fs.entry_point.as_str()),
                    compilation_options: Default::default(),
                    targets: &[Some(wgpu::ColorTargetState {
                        format: convert::texture_format(desc.color_format),
                        blend: Some(wgpu::BlendState::REPLACE),
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                }),
                primitive: wgpu::PrimitiveState {
                    topology: convert::topology(desc.topology),
                    ..Default::default()
                },
                depth_stencil: None,
                multisample: wgpu::MultisampleState::default(),
                multiview_mask: None,
                cache: None,
            });
            (pipeline, samplers_layout)
        })?;

        Ok(WgpuPipeline {
            pipeline,
            samplers_layout,
            fragment_samplers,
        })
    }

    fn create_buffer(
        &mut self,
        label: Option<&str>,
        usage: BufferUsage,
        size: u64,
    ) -> Result<Self::Buffer, GpuError> {
        let usage = match usage {
            BufferUsage::Vertex => wgpu::BufferUsages::VERTEX,
            BufferUsage::Index => wgpu::BufferUsages::INDEX,
        };
        // COPY_SRC keeps the buffer readable by `read_buffer`.
        Ok(self.device.create_buffer(&wgpu::BufferDescriptor {
            label,
            size: align_up(size, wgpu::COPY_BUFFER_ALIGNMENT),
            usage: usage | wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::COPY_SRC,
            mapped_at_creation: false,
        }))
    }

    fn create_texture(&mut self, desc: &TextureDesc) -> Result<Self::Texture, GpuError> {
        let limit = self.device.limits().max_texture_dimension_2d;
        if desc.width > limit || desc.height > limit {
            return Err(GpuError::creation(
                "texture",
                format!("{}x{} exceeds the device limit {limit}", desc.width, desc.height),
            ));
        }

        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: desc.label.as_deref(),
            size: wgpu::Extent3d {
                width: desc.width,
                height: desc.height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: convert::texture_format(desc.format),
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Ok(WgpuTexture { texture, view })
    }

    fn create_sampler(&mut self, desc: &SamplerDesc) -> Result<Self::Sampler, GpuError> {
        Ok(self.device.create_sampler(&convert::sampler_descriptor(desc)))
    }

    fn create_transfer_buffer(&mut self, size: u64) -> Result<Self::TransferBuffer, GpuError> {
        let buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: self.label("hulia transfer buffer"),
            size: align_up(size, wgpu::COPY_BUFFER_ALIGNMENT),
            usage: wgpu::BufferUsages::MAP_WRITE | wgpu::BufferUsages::COPY_SRC,
            mapped_at_creation: true,
        });
        Ok(WgpuTransferBuffer {
            buffer,
            mapped: Cell::new(true),
        })
    }

    fn write_transfer_buffer(
        &mut self,
        buffer: &mut Self::TransferBuffer,
        write: &mut dyn FnMut(&mut [u8]),
    ) -> Result<(), GpuError> {
        if !buffer.mapped.get() {
            map_blocking(&self.device, buffer.buffer.slice(..), wgpu::MapMode::Write)
                .map_err(|e| GpuError::creation("transfer buffer mapping", e))?;
        }
        {
            let mut view = buffer.buffer.slice(..).get_mapped_range_mut();
            write(&mut view[..]);
        }
        buffer.buffer.unmap();
        buffer.mapped.set(false);
        Ok(())
    }

    fn acquire_swapchain_image(
        &mut self,
        recording: &mut CommandRecording<'_, Self>,
    ) -> Result<Option<SurfaceExtent>, GpuError> {
        let Some(extent) = self.extent() else {
            log::trace!("surface has zero area; no image");
            return Ok(None);
        };

        match self.surface.get_current_texture() {
            Ok(texture) => {
                if texture.suboptimal {
                    log::debug!("swapchain image is suboptimal");
                }
                let view = texture
                    .texture
                    .create_view(&wgpu::TextureViewDescriptor::default());
                recording.set_swapchain_image(SwapchainImage { texture, view })?;
                Ok(Some(extent))
            }
            Err(err) => {
                let action = self.handle_surface_error(&err);
                log::debug!("surface error {err}: {action:?}");
                action.into_acquire(&err)?;
                Ok(None)
            }
        }
    }

    fn submit(&mut self, recording: CommandRecording<'_, Self>) -> Result<(), GpuError> {
        let (commands, image) = recording.into_parts();

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("hulia command encoder"),
            });
        let encoded = encode::encode(&self.device, &mut encoder, &commands, image.as_ref());
        // A recording is submitted once even when it cannot be encoded; the
        // partial encoder is replaced by an empty one.
        let buffer = match &encoded {
            Ok(()) => encoder.finish(),
            Err(err) => {
                log::error!("recording of {} command(s) failed to encode: {err}", commands.len());
                drop(encoder);
                self.device
                    .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                        label: Some("hulia empty encoder"),
                    })
                    .finish()
            }
        };
        self.queue.submit(std::iter::once(buffer));

        if let Some(image) = image {
            self.window.pre_present_notify();
            image.texture.present();
        }
        encoded
    }

    fn read_buffer(
        &mut self,
        buffer: &Self::Buffer,
        offset: u64,
        size: u64,
    ) -> Result<Vec<u8>, GpuError> {
        let end = offset
            .checked_add(size)
            .filter(|end| *end <= buffer.size())
            .ok_or_else(|| {
                GpuError::Readback(format!(
                    "range {offset}+{size} outside {} byte buffer",
                    buffer.size()
                ))
            })?;
        if size == 0 {
            return Ok(Vec::new());
        }

        // Copies must start and end on the copy alignment.
        let start = offset - offset % wgpu::COPY_BUFFER_ALIGNMENT;
        let copy_end = align_up(end, wgpu::COPY_BUFFER_ALIGNMENT).min(buffer.size());

        let staging = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: self.label("hulia readback"),
            size: copy_end - start,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("hulia readback encoder"),
            });
        encoder.copy_buffer_to_buffer(buffer, start, &staging, 0, copy_end - start);
        self.queue.submit(std::iter::once(encoder.finish()));

        let slice = staging.slice(..);
        map_blocking(&self.device, slice, wgpu::MapMode::Read).map_err(GpuError::Readback)?;

        let skip = (offset - start) as usize;
        let bytes = slice.get_mapped_range()[skip..skip + size as usize].to_vec();
        staging.unmap();
        Ok(bytes)
    }
}
