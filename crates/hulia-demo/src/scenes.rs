use std::path::Path;

use anyhow::{Context, Result};
use bytemuck::{Pod, Zeroable};

use hulia_engine::backend::SamplerDesc;
use hulia_engine::pipeline::{
    ShaderResources, ShaderSource, ShaderStage, VertexFormat, VertexLayout, VertexStepMode,
};
use hulia_engine::renderer::{MeshDesc, SceneDesc};
use hulia_engine::upload::ImageData;

use crate::shaders;

#[repr(C)]
#[derive(Debug, Copy, Clone, Pod, Zeroable)]
struct ColoredVertex {
    position: [f32; 3],
    color: [f32; 4],
}

#[repr(C)]
#[derive(Debug, Copy, Clone, Pod, Zeroable)]
struct TexturedVertex {
    position: [f32; 3],
    uv: [f32; 2],
}

const TRIANGLE: [ColoredVertex; 3] = [
    ColoredVertex {
        position: [-0.5, -0.5, 0.0],
        color: [1.0, 0.0, 0.0, 1.0],
    },
    ColoredVertex {
        position: [0.5, -0.5, 0.0],
        color: [0.0, 1.0, 0.0, 1.0],
    },
    ColoredVertex {
        position: [0.0, 0.5, 0.0],
        color: [0.0, 0.0, 1.0, 1.0],
    },
];

const QUAD: [TexturedVertex; 4] = [
    TexturedVertex {
        position: [-0.5, -0.5, 0.0],
        uv: [0.0, 1.0],
    },
    TexturedVertex {
        position: [0.5, -0.5, 0.0],
        uv: [1.0, 1.0],
    },
    TexturedVertex {
        position: [0.5, 0.5, 0.0],
        uv: [1.0, 0.0],
    },
    TexturedVertex {
        position: [-0.5, 0.5, 0.0],
        uv: [0.0, 0.0],
    },
];

const QUAD_INDICES: [u16; 6] = [0, 1, 2, 0, 2, 3];

const CHECKER_SIZE: u32 = 64;
const CHECKER_CELL: u32 = 8;

pub fn triangle() -> SceneDesc {
    let layout = VertexLayout::new()
        .slot(0, size_of::<ColoredVertex>() as u64, VertexStepMode::Vertex)
        .packed(0, 0, &[VertexFormat::Float32x3, VertexFormat::Float32x4]);

    MeshDesc::new(
        ShaderSource::wgsl(ShaderStage::Vertex, shaders::COLORED_VS, ShaderResources::NONE)
            .with_label("triangle vs"),
        ShaderSource::wgsl(ShaderStage::Fragment, shaders::COLORED_FS, ShaderResources::NONE)
            .with_label("triangle fs"),
        layout,
        &TRIANGLE,
    )
    .into()
}

/// Textured quad; draws `image` when given, a checkerboard otherwise.
pub fn textured_quad(image: Option<&Path>) -> Result<SceneDesc> {
    let image = match image {
        Some(path) => ImageData::load(path)
            .with_context(|| format!("failed to load texture {}", path.display()))?,
        None => checkerboard()?,
    };
    log::info!("quad texture {}x{}", image.width(), image.height());

    let layout = VertexLayout::new()
        .slot(0, size_of::<TexturedVertex>() as u64, VertexStepMode::Vertex)
        .packed(0, 0, &[VertexFormat::Float32x3, VertexFormat::Float32x2]);

    let mesh = MeshDesc::new(
        ShaderSource::wgsl(ShaderStage::Vertex, shaders::TEXTURED_VS, ShaderResources::NONE)
            .with_label("quad vs"),
        ShaderSource::wgsl(
            ShaderStage::Fragment,
            shaders::TEXTURED_FS,
            ShaderResources::samplers(1),
        )
        .with_label("quad fs"),
        layout,
        &QUAD,
    )
    .with_indices_u16(&QUAD_INDICES)
    .with_texture(
        image,
        SamplerDesc {
            label: Some("quad sampler".to_string()),
            ..Default::default()
        },
    );

    Ok(mesh.into())
}

fn checkerboard() -> Result<ImageData> {
    let mut pixels = Vec::with_capacity((CHECKER_SIZE * CHECKER_SIZE * 4) as usize);
    for y in 0..CHECKER_SIZE {
        for x in 0..CHECKER_SIZE {
            let light = (x / CHECKER_CELL + y / CHECKER_CELL) % 2 == 0;
            let v = if light { 230 } else { 40 };
            pixels.extend_from_slice(&[v, v, v, 255]);
        }
    }
    Ok(ImageData::from_rgba8(CHECKER_SIZE, CHECKER_SIZE, pixels)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn triangle_layout_matches_vertex_struct() {
        let scene = triangle();
        let mesh = scene.mesh.unwrap();
        assert_eq!(mesh.vertex_count, 3);
        assert_eq!(mesh.vertex_layout.stride(0), Some(28));
        assert!(mesh.vertex_layout.validate().is_ok());
    }

    #[test]
    fn quad_declares_one_sampler() {
        let mesh = textured_quad(None).unwrap().mesh.unwrap();
        assert_eq!(mesh.indices.as_ref().map(|i| i.count), Some(6));
        assert_eq!(mesh.pipeline_resources().fragment, ShaderResources::samplers(1));
        assert_eq!(mesh.fragment_shader.resources, ShaderResources::samplers(1));
    }

    #[test]
    fn checkerboard_alternates_cells() {
        let image = checkerboard().unwrap();
        assert_eq!(image.pixels().len(), (CHECKER_SIZE * CHECKER_SIZE * 4) as usize);
        assert_eq!(image.pixels()[0], 230);
        let next_cell = (CHECKER_CELL * 4) as usize;
        assert_eq!(image.pixels()[next_cell], 40);
    }
}
