//! Graphics pipeline creation.
//!
//! A pipeline is built from two shader stages, a vertex layout, a topology
//! and the surface color format. Everything that can be checked without the
//! GPU is checked here, before the backend sees the description:
//! - the vertex layout (attribute offsets against slot strides)
//! - shader stages in the right positions
//! - declared shader resource counts against what the pipeline binds

mod layout;
mod shader;

pub use layout::{
    LayoutError, VertexAttribute, VertexBufferSlot, VertexFormat, VertexLayout, VertexStepMode,
};
pub use shader::{
    ShaderCode, ShaderError, ShaderFormat, ShaderResources, ShaderSource, ShaderStage,
    DEFAULT_ENTRY_POINT,
};

use thiserror::Error;

use crate::backend::{GpuBackend, GpuError, Pipeline, PrimitiveTopology, Shader, TextureFormat};

/// Resource counts the pipeline binds per stage.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq, Hash)]
pub struct PipelineResources {
    pub vertex: ShaderResources,
    pub fragment: ShaderResources,
}

impl PipelineResources {
    pub fn stage(&self, stage: ShaderStage) -> ShaderResources {
        match stage {
            ShaderStage::Vertex => self.vertex,
            ShaderStage::Fragment => self.fragment,
        }
    }
}

/// Everything the backend needs to build a pipeline.
pub struct PipelineDesc<'a, B: GpuBackend> {
    pub label: Option<&'a str>,
    pub vertex_shader: &'a Shader<B>,
    pub fragment_shader: &'a Shader<B>,
    pub vertex_layout: &'a VertexLayout,
    pub topology: PrimitiveTopology,
    pub color_format: TextureFormat,
    pub resources: PipelineResources,
}

#[derive(Debug, Clone, Eq, PartialEq, Error)]
pub enum PipelineError {
    #[error("invalid vertex layout")]
    Layout(#[from] LayoutError),

    #[error("{expected:?} shader slot was given a {found:?} shader")]
    WrongStage {
        expected: ShaderStage,
        found: ShaderStage,
    },

    #[error(
        "{stage:?} shader declares {declared:?} but the pipeline binds {requested:?}"
    )]
    ResourceMismatch {
        stage: ShaderStage,
        declared: ShaderResources,
        requested: ShaderResources,
    },

    #[error(transparent)]
    Backend(#[from] GpuError),
}

impl<B: GpuBackend> PipelineDesc<'_, B> {
    /// Checks the description without touching the GPU.
    pub fn validate(&self) -> Result<(), PipelineError> {
        self.vertex_layout.validate()?;

        for (expected, shader) in [
            (ShaderStage::Vertex, self.vertex_shader),
            (ShaderStage::Fragment, self.fragment_shader),
        ] {
            if shader.stage() != expected {
                return Err(PipelineError::WrongStage {
                    expected,
                    found: shader.stage(),
                });
            }

            let requested = self.resources.stage(expected);
            if shader.resources() != requested {
                return Err(PipelineError::ResourceMismatch {
                    stage: expected,
                    declared: shader.resources(),
                    requested,
                });
            }
        }

        Ok(())
    }
}

/// Validates `desc` and asks the backend to build the pipeline.
pub fn create_pipeline<B: GpuBackend>(
    backend: &mut B,
    desc: &PipelineDesc<'_, B>,
) -> Result<Pipeline<B>, PipelineError> {
    desc.validate()?;

    let raw = backend.create_pipeline(desc)?;
    let vertex_slots = desc.vertex_layout.slots().iter().map(|s| s.slot).collect();

    log::debug!(
        "created pipeline {:?} ({:?}, {} vertex slot(s), color {:?})",
        desc.label.unwrap_or("unnamed"),
        desc.topology,
        desc.vertex_layout.slots().len(),
        desc.color_format,
    );

    Ok(Pipeline::from_raw(raw, desc.resources, vertex_slots, desc.topology))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{HeadlessBackend, Journal};

    const VS: &str = "vs";
    const FS: &str = "fs";

    fn shaders(
        backend: &mut HeadlessBackend,
        fragment: ShaderResources,
    ) -> (Shader<HeadlessBackend>, Shader<HeadlessBackend>) {
        let vs = Shader::create(
            backend,
            &ShaderSource::wgsl(ShaderStage::Vertex, VS, ShaderResources::NONE),
        )
        .unwrap();
        let fs = Shader::create(backend, &ShaderSource::wgsl(ShaderStage::Fragment, FS, fragment))
            .unwrap();
        (vs, fs)
    }

    fn position_layout(stride: u64, offset: u64) -> VertexLayout {
        VertexLayout::new()
            .slot(0, stride, VertexStepMode::Vertex)
            .attribute(0, 0, VertexFormat::Float32x3, offset)
    }

    fn desc<'a>(
        vs: &'a Shader<HeadlessBackend>,
        fs: &'a Shader<HeadlessBackend>,
        layout: &'a VertexLayout,
        resources: PipelineResources,
    ) -> PipelineDesc<'a, HeadlessBackend> {
        PipelineDesc {
            label: Some("test"),
            vertex_shader: vs,
            fragment_shader: fs,
            vertex_layout: layout,
            topology: PrimitiveTopology::TriangleList,
            color_format: TextureFormat::Bgra8UnormSrgb,
            resources,
        }
    }

    #[test]
    fn valid_pipeline_is_created() {
        let mut backend = HeadlessBackend::new();
        let (vs, fs) = shaders(&mut backend, ShaderResources::samplers(1));
        let layout = position_layout(12, 0);
        let resources = PipelineResources {
            fragment: ShaderResources::samplers(1),
            ..Default::default()
        };

        let pipeline = create_pipeline(&mut backend, &desc(&vs, &fs, &layout, resources)).unwrap();
        assert_eq!(pipeline.vertex_slots(), &[0]);
        assert_eq!(pipeline.resources().fragment.samplers, 1);
    }

    #[test]
    fn offset_beyond_stride_fails_without_reaching_backend() {
        let mut backend = HeadlessBackend::new();
        let journal: Journal = backend.journal();
        let (vs, fs) = shaders(&mut backend, ShaderResources::NONE);
        let layout = position_layout(12, 4);

        let err = create_pipeline(&mut backend, &desc(&vs, &fs, &layout, Default::default()))
            .err()
            .unwrap();
        assert!(matches!(
            err,
            PipelineError::Layout(LayoutError::AttributeOutOfBounds { .. })
        ));
        assert_eq!(journal.count("create_pipeline"), 0);
    }

    #[test]
    fn resource_count_mismatch_fails() {
        let mut backend = HeadlessBackend::new();
        // Fragment shader declares no sampler, pipeline binds one.
        let (vs, fs) = shaders(&mut backend, ShaderResources::NONE);
        let layout = position_layout(12, 0);
        let resources = PipelineResources {
            fragment: ShaderResources::samplers(1),
            ..Default::default()
        };

        let err = create_pipeline(&mut backend, &desc(&vs, &fs, &layout, resources))
            .err()
            .unwrap();
        assert_eq!(
            err,
            PipelineError::ResourceMismatch {
                stage: ShaderStage::Fragment,
                declared: ShaderResources::NONE,
                requested: ShaderResources::samplers(1),
            }
        );
    }

    #[test]
    fn swapped_stages_fail() {
        let mut backend = HeadlessBackend::new();
        let (vs, fs) = shaders(&mut backend, ShaderResources::NONE);
        let layout = position_layout(12, 0);

        let err = create_pipeline(&mut backend, &desc(&fs, &vs, &layout, Default::default()))
            .err()
            .unwrap();
        assert_eq!(
            err,
            PipelineError::WrongStage {
                expected: ShaderStage::Vertex,
                found: ShaderStage::Fragment,
            }
        );
    }
}
