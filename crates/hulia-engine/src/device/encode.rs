//! Translates a finished recording into wgpu encoder calls.

use crate::backend::{Color, Command, GpuError, RecordingError};

use super::convert;
use super::resources::{SwapchainImage, WgpuPipeline, WgpuTexture, WgpuTransferBuffer};
use super::Gpu;

type Commands<'a, 'w> = [Command<'a, Gpu<'w>>];

fn unsupported(what: String) -> GpuError {
    GpuError::Unsupported {
        backend: "wgpu",
        what,
    }
}

/// A transfer buffer that was never written is still mapped; copying from it
/// would be invalid.
fn ensure_unmapped(source: &WgpuTransferBuffer) {
    if source.mapped.replace(false) {
        source.buffer.unmap();
    }
}

pub(super) fn encode(
    device: &wgpu::Device,
    encoder: &mut wgpu::CommandEncoder,
    commands: &Commands<'_, '_>,
    image: Option<&SwapchainImage>,
) -> Result<(), GpuError> {
    let mut i = 0;
    while i < commands.len() {
        match &commands[i] {
            Command::BeginRenderPass { clear } => {
                let end = commands[i..]
                    .iter()
                    .position(|c| matches!(c, Command::EndRenderPass))
                    .map_or(commands.len(), |p| i + p);
                let view = image
                    .map(|image| &image.view)
                    .ok_or(RecordingError::NoSwapchainImage)?;
                encode_render_pass(device, encoder, view, *clear, &commands[i + 1..end])?;
                i = end + 1;
                continue;
            }
            Command::BeginCopyPass | Command::EndCopyPass => {}
            Command::UploadToBuffer {
                source,
                source_offset,
                destination,
                destination_offset,
                size,
                cycle,
            } => {
                ensure_unmapped(source);
                if *cycle {
                    log::trace!("cycle hint ignored; wgpu orders copies itself");
                }
                encoder.copy_buffer_to_buffer(
                    &source.buffer,
                    *source_offset,
                    destination,
                    *destination_offset,
                    *size,
                );
            }
            Command::UploadToTexture {
                source,
                source_offset,
                row_pitch,
                destination,
                width,
                height,
                ..
            } => {
                ensure_unmapped(source);
                encoder.copy_buffer_to_texture(
                    wgpu::TexelCopyBufferInfo {
                        buffer: &source.buffer,
                        layout: wgpu::TexelCopyBufferLayout {
                            offset: *source_offset,
                            bytes_per_row: Some(*row_pitch),
                            rows_per_image: Some(*height),
                        },
                    },
                    wgpu::TexelCopyTextureInfo {
                        texture: &destination.texture,
                        mip_level: 0,
                        origin: wgpu::Origin3d::ZERO,
                        aspect: wgpu::TextureAspect::All,
                    },
                    wgpu::Extent3d {
                        width: *width,
                        height: *height,
                        depth_or_array_layers: 1,
                    },
                );
            }
            other => {
                return Err(unsupported(format!("{} outside a render pass", other.name())));
            }
        }
        i += 1;
    }
    Ok(())
}

/// Texture/sampler pairs bound for the current pipeline, flushed into a bind
/// group right before a draw.
struct SamplerSlots<'a> {
    slots: Vec<Option<(&'a WgpuTexture, &'a wgpu::Sampler)>>,
    dirty: bool,
}

impl<'a> SamplerSlots<'a> {
    fn for_pipeline(pipeline: &WgpuPipeline) -> Self {
        Self {
            slots: vec![None; pipeline.fragment_samplers as usize],
            dirty: pipeline.fragment_samplers > 0,
        }
    }

    fn bind_group(
        &mut self,
        device: &wgpu::Device,
        pipeline: &WgpuPipeline,
    ) -> Result<Option<wgpu::BindGroup>, GpuError> {
        if !self.dirty {
            return Ok(None);
        }
        let Some(layout) = &pipeline.samplers_layout else {
            return Ok(None);
        };

        let mut entries = Vec::with_capacity(self.slots.len() * 2);
        for (slot, bound) in self.slots.iter().enumerate() {
            let (texture, sampler) =
                bound.ok_or_else(|| unsupported(format!("draw with fragment sampler {slot} unbound")))?;
            let slot = slot as u32;
            entries.push(wgpu::BindGroupEntry {
                binding: 2 * slot,
                resource: wgpu::BindingResource::TextureView(&texture.view),
            });
            entries.push(wgpu::BindGroupEntry {
                binding: 2 * slot + 1,
                resource: wgpu::BindingResource::Sampler(sampler),
            });
        }

        self.dirty = false;
        Ok(Some(device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("hulia fragment samplers"),
            layout,
            entries: &entries,
        })))
    }
}

fn encode_render_pass(
    device: &wgpu::Device,
    encoder: &mut wgpu::CommandEncoder,
    view: &wgpu::TextureView,
    clear: Color,
    commands: &Commands<'_, '_>,
) -> Result<(), GpuError> {
    let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
        label: Some("hulia frame pass"),
        color_attachments: &[Some(wgpu::RenderPassColorAttachment {
            view,
            resolve_target: None,
            ops: wgpu::Operations {
                load: wgpu::LoadOp::Clear(convert::color(clear)),
                store: wgpu::StoreOp::Store,
            },
            depth_slice: None,
        })],
        depth_stencil_attachment: None,
        timestamp_writes: None,
        occlusion_query_set: None,
        multiview_mask: None,
    });

    let mut pipeline: Option<&WgpuPipeline> = None;
    let mut samplers = SamplerSlots {
        slots: Vec::new(),
        dirty: false,
    };

    for command in commands {
        match command {
            Command::BindPipeline(bound) => {
                pass.set_pipeline(&bound.pipeline);
                samplers = SamplerSlots::for_pipeline(bound);
                pipeline = Some(*bound);
            }
            Command::BindFragmentSamplers {
                first_slot,
                bindings,
            } => {
                for (i, binding) in bindings.iter().enumerate() {
                    let slot = *first_slot as usize + i;
                    if let Some(entry) = samplers.slots.get_mut(slot) {
                        *entry = Some((binding.texture, binding.sampler));
                    }
                }
                samplers.dirty = true;
            }
            Command::BindVertexBuffers {
                first_slot,
                buffers,
            } => {
                for (i, binding) in buffers.iter().enumerate() {
                    pass.set_vertex_buffer(*first_slot + i as u32, binding.buffer.slice(binding.offset..));
                }
            }
            Command::BindIndexBuffer { binding, format } => {
                pass.set_index_buffer(
                    binding.buffer.slice(binding.offset..),
                    convert::index_format(*format),
                );
            }
            Command::Draw {
                vertex_count,
                instance_count,
                first_vertex,
                first_instance,
            } => {
                let pipeline = pipeline.ok_or(RecordingError::PipelineNotBound)?;
                if let Some(group) = samplers.bind_group(device, pipeline)? {
                    pass.set_bind_group(0, &group, &[]);
                }
                pass.draw(
                    *first_vertex..first_vertex + vertex_count,
                    *first_instance..first_instance + instance_count,
                );
            }
            Command::DrawIndexed {
                index_count,
                instance_count,
                first_index,
                vertex_offset,
                first_instance,
            } => {
                let pipeline = pipeline.ok_or(RecordingError::PipelineNotBound)?;
                if let Some(group) = samplers.bind_group(device, pipeline)? {
                    pass.set_bind_group(0, &group, &[]);
                }
                pass.draw_indexed(
                    *first_index..first_index + index_count,
                    *vertex_offset,
                    *first_instance..first_instance + instance_count,
                );
            }
            other => {
                return Err(unsupported(format!("{} inside a render pass", other.name())));
            }
        }
    }
    Ok(())
}
