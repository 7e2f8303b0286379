#![allow(dead_code)]

use hulia_engine::backend::SamplerDesc;
use hulia_engine::pipeline::{
    ShaderResources, ShaderSource, ShaderStage, VertexFormat, VertexLayout, VertexStepMode,
};
use hulia_engine::renderer::MeshDesc;
use hulia_engine::upload::ImageData;

pub const TRIANGLE: [[f32; 3]; 3] = [[0.0, 0.5, 0.0], [-0.5, -0.5, 0.0], [0.5, -0.5, 0.0]];

pub const QUAD: [[f32; 5]; 4] = [
    [-0.5, -0.5, 0.0, 0.0, 1.0],
    [0.5, -0.5, 0.0, 1.0, 1.0],
    [0.5, 0.5, 0.0, 1.0, 0.0],
    [-0.5, 0.5, 0.0, 0.0, 0.0],
];

pub const QUAD_INDICES: [u16; 6] = [0, 1, 2, 0, 2, 3];

pub fn triangle() -> MeshDesc {
    let layout = VertexLayout::new()
        .slot(0, 12, VertexStepMode::Vertex)
        .packed(0, 0, &[VertexFormat::Float32x3]);
    MeshDesc::new(
        ShaderSource::wgsl(ShaderStage::Vertex, "// vs", ShaderResources::NONE),
        ShaderSource::wgsl(ShaderStage::Fragment, "// fs", ShaderResources::NONE),
        layout,
        &TRIANGLE,
    )
}

/// `width`x`height` image whose texel bytes count up from 0.
pub fn gradient(width: u32, height: u32) -> ImageData {
    let pixels = (0..width * height * 4).map(|i| i as u8).collect();
    ImageData::from_rgba8(width, height, pixels).unwrap()
}

pub fn textured_quad(image: ImageData) -> MeshDesc {
    let layout = VertexLayout::new()
        .slot(0, 20, VertexStepMode::Vertex)
        .packed(0, 0, &[VertexFormat::Float32x3, VertexFormat::Float32x2]);
    MeshDesc::new(
        ShaderSource::wgsl(ShaderStage::Vertex, "// vs", ShaderResources::NONE),
        ShaderSource::wgsl(ShaderStage::Fragment, "// fs", ShaderResources::samplers(1)),
        layout,
        &QUAD,
    )
    .with_indices_u16(&QUAD_INDICES)
    .with_texture(image, SamplerDesc::default())
}
