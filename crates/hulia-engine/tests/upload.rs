mod common;

use hulia_engine::backend::{
    BufferUsage, CopyAlignment, Event, GpuBackend, HeadlessBackend, Texture, TextureDesc,
};
use hulia_engine::renderer::{FrameConfig, MeshBuffer, Renderer};
use hulia_engine::upload::{self, Destination, DestinationKey, StagingPlan};

#[test]
fn staged_vertices_read_back_unchanged() {
    let mut renderer = Renderer::init(
        HeadlessBackend::new(),
        common::triangle().into(),
        FrameConfig::default(),
    )
    .unwrap();

    let bytes = renderer.read_back(MeshBuffer::Vertex).unwrap();
    assert_eq!(bytes, bytemuck::cast_slice::<_, u8>(&common::TRIANGLE));
    assert!(renderer.read_back(MeshBuffer::Index).is_err());
}

#[test]
fn quad_uploads_every_region_in_one_copy_pass() {
    let backend = HeadlessBackend::new().with_copy_alignment(CopyAlignment {
        buffer_offset: 16,
        texture_row_pitch: 256,
    });
    let journal = backend.journal();
    let image = common::gradient(5, 3);
    let mut renderer = Renderer::init(
        backend,
        common::textured_quad(image.clone()).into(),
        FrameConfig::default(),
    )
    .unwrap();

    assert_eq!(journal.count("begin_copy_pass"), 1);
    assert_eq!(journal.count("upload_to_buffer"), 2);
    assert_eq!(journal.count("upload_to_texture"), 1);
    assert_eq!(journal.count("submit"), 1);

    let (row_pitch, texture_cycle) = journal
        .events()
        .iter()
        .find_map(|e| match e {
            Event::UploadToTexture {
                row_pitch, cycle, ..
            } => Some((*row_pitch, *cycle)),
            _ => None,
        })
        .unwrap();
    assert_eq!(row_pitch, 256);
    assert!(texture_cycle);

    assert_eq!(
        renderer.read_back(MeshBuffer::Vertex).unwrap(),
        bytemuck::cast_slice::<_, u8>(&common::QUAD)
    );
    assert_eq!(
        renderer.read_back(MeshBuffer::Index).unwrap(),
        bytemuck::cast_slice::<_, u8>(&common::QUAD_INDICES)
    );

    let texture = renderer.mesh().and_then(|m| m.texture()).unwrap();
    let texels = renderer.backend().read_texture(texture.raw());
    assert_eq!(texels.len(), 5 * 3 * 4);
    assert_eq!(texels, image.pixels());
}

#[test]
fn texture_region_stages_rows_at_row_pitch() {
    let mut backend = HeadlessBackend::new().with_copy_alignment(CopyAlignment {
        buffer_offset: 4,
        texture_row_pitch: 64,
    });
    let image = common::gradient(3, 2);
    let texture = Texture::create(
        &mut backend,
        TextureDesc {
            label: None,
            width: 3,
            height: 2,
            format: image.format().texture_format(),
        },
    )
    .unwrap();

    let mut plan = StagingPlan::new(backend.copy_alignment());
    plan.push_texture(DestinationKey(0), &image);
    let report = upload::upload(&mut backend, &plan, &[Destination::Texture(&texture)]).unwrap();

    assert_eq!(report.data_len, 3 * 2 * 4);
    assert_eq!(report.uploads.len(), 1);
    assert_eq!(report.uploads[0].staged_size, 64 * 2);
    assert_eq!(backend.read_texture(texture.raw()), image.pixels());
}

#[test]
fn disjoint_regions_of_one_buffer_do_not_cycle() {
    let mut backend = HeadlessBackend::new();
    let journal = backend.journal();
    let buffer = hulia_engine::backend::Buffer::create(&mut backend, None, BufferUsage::Vertex, 8)
        .unwrap();
    let low = [1u8, 2, 3, 4];
    let high = [5u8, 6, 7, 8];

    let mut plan = StagingPlan::new(backend.copy_alignment());
    plan.push_buffer(DestinationKey(0), 0, &low);
    plan.push_buffer(DestinationKey(0), 4, &high);
    let report = upload::upload(
        &mut backend,
        &plan,
        &[Destination::Buffer(&buffer)],
    )
    .unwrap();

    assert!(report.uploads.iter().all(|u| !u.cycle));
    assert_eq!(journal.count("upload_to_buffer"), 2);
    assert_eq!(
        backend.read_buffer(buffer.raw(), 0, 8).unwrap(),
        vec![1, 2, 3, 4, 5, 6, 7, 8]
    );
}
