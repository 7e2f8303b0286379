use bytemuck::Pod;

use crate::backend::{IndexFormat, PrimitiveTopology, SamplerDesc};
use crate::pipeline::{PipelineResources, ShaderResources, ShaderSource, VertexLayout};
use crate::upload::ImageData;

/// What the renderer draws every frame.
///
/// A scene without a mesh clears the window and draws nothing.
#[derive(Debug, Clone, Default)]
pub struct SceneDesc {
    pub mesh: Option<MeshDesc>,
}

impl SceneDesc {
    /// Clear-only scene.
    pub fn blank() -> Self {
        Self::default()
    }

    pub fn mesh(mesh: MeshDesc) -> Self {
        Self { mesh: Some(mesh) }
    }
}

impl From<MeshDesc> for SceneDesc {
    fn from(mesh: MeshDesc) -> Self {
        Self::mesh(mesh)
    }
}

/// Index data for an indexed draw.
#[derive(Debug, Clone)]
pub struct IndexData {
    pub bytes: Vec<u8>,
    pub format: IndexFormat,
    pub count: u32,
}

/// Texture sampled by the fragment stage at sampler slot 0.
#[derive(Debug, Clone)]
pub struct TextureSource {
    pub image: ImageData,
    pub sampler: SamplerDesc,
}

/// One static mesh: shaders, vertex data, and optional indices and texture.
#[derive(Debug, Clone)]
pub struct MeshDesc {
    pub vertex_shader: ShaderSource,
    pub fragment_shader: ShaderSource,
    /// Must declare exactly one buffer slot.
    pub vertex_layout: VertexLayout,
    pub topology: PrimitiveTopology,
    pub vertices: Vec<u8>,
    pub vertex_count: u32,
    pub indices: Option<IndexData>,
    pub texture: Option<TextureSource>,
}

impl MeshDesc {
    pub fn new<V: Pod>(
        vertex_shader: ShaderSource,
        fragment_shader: ShaderSource,
        vertex_layout: VertexLayout,
        vertices: &[V],
    ) -> Self {
        Self {
            vertex_shader,
            fragment_shader,
            vertex_layout,
            topology: PrimitiveTopology::TriangleList,
            vertices: bytemuck::cast_slice(vertices).to_vec(),
            vertex_count: vertices.len() as u32,
            indices: None,
            texture: None,
        }
    }

    pub fn with_topology(mut self, topology: PrimitiveTopology) -> Self {
        self.topology = topology;
        self
    }

    pub fn with_indices_u16(mut self, indices: &[u16]) -> Self {
        self.indices = Some(IndexData {
            bytes: bytemuck::cast_slice(indices).to_vec(),
            format: IndexFormat::Uint16,
            count: indices.len() as u32,
        });
        self
    }

    pub fn with_indices_u32(mut self, indices: &[u32]) -> Self {
        self.indices = Some(IndexData {
            bytes: bytemuck::cast_slice(indices).to_vec(),
            format: IndexFormat::Uint32,
            count: indices.len() as u32,
        });
        self
    }

    pub fn with_texture(mut self, image: ImageData, sampler: SamplerDesc) -> Self {
        self.texture = Some(TextureSource { image, sampler });
        self
    }

    /// Resources the pipeline binds for this mesh: one fragment sampler per
    /// texture, nothing else.
    pub fn pipeline_resources(&self) -> PipelineResources {
        PipelineResources {
            vertex: ShaderResources::NONE,
            fragment: ShaderResources::samplers(self.texture.is_some() as u32),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::{ShaderStage, VertexFormat};

    fn mesh() -> MeshDesc {
        let layout = VertexLayout::new()
            .slot(0, 8, Default::default())
            .packed(0, 0, &[VertexFormat::Float32x2]);
        MeshDesc::new(
            ShaderSource::wgsl(ShaderStage::Vertex, "", ShaderResources::NONE),
            ShaderSource::wgsl(ShaderStage::Fragment, "", ShaderResources::NONE),
            layout,
            &[[0.0f32, 1.0], [1.0, 0.0], [-1.0, 0.0]],
        )
    }

    #[test]
    fn vertices_are_flattened_to_bytes() {
        let m = mesh();
        assert_eq!(m.vertex_count, 3);
        assert_eq!(m.vertices.len(), 24);
        assert_eq!(&m.vertices[4..8], &1.0f32.to_ne_bytes());
    }

    #[test]
    fn indices_record_format_and_count() {
        let m = mesh().with_indices_u16(&[0, 1, 2, 2, 1, 0]);
        let indices = m.indices.unwrap();
        assert_eq!(indices.format, IndexFormat::Uint16);
        assert_eq!(indices.count, 6);
        assert_eq!(indices.bytes.len(), 12);
    }

    #[test]
    fn texture_requests_one_fragment_sampler() {
        assert_eq!(mesh().pipeline_resources(), PipelineResources::default());

        let image = ImageData::from_rgba8(1, 1, vec![255; 4]).unwrap();
        let textured = mesh().with_texture(image, SamplerDesc::default());
        assert_eq!(textured.pipeline_resources().fragment.samplers, 1);
    }
}
