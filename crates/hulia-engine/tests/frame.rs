mod common;

use hulia_engine::backend::{AcquireResult, Event, GpuError, HeadlessBackend};
use hulia_engine::pipeline::{PipelineError, ShaderResources, ShaderSource, ShaderStage};
use hulia_engine::renderer::{DrawCall, FrameConfig, FrameOutcome, Renderer, SceneDesc, SkipReason};

fn render_events(events: &[Event]) -> Vec<&'static str> {
    let start = events
        .iter()
        .position(|e| matches!(e, Event::BeginRecording))
        .unwrap();
    events[start..].iter().map(Event::name).collect()
}

#[test]
fn triangle_frame_draws_three_vertices_once() {
    let backend = HeadlessBackend::new();
    let journal = backend.journal();
    let mut renderer =
        Renderer::init(backend, common::triangle().into(), FrameConfig::default()).unwrap();
    journal.clear();

    let outcome = renderer.render_frame();
    assert_eq!(
        outcome,
        FrameOutcome::Drawn(DrawCall::Vertices {
            vertex_count: 3,
            instance_count: 1
        })
    );

    let events = journal.events();
    assert_eq!(
        render_events(&events),
        vec![
            "begin_recording",
            "acquire_swapchain",
            "begin_render_pass",
            "bind_pipeline",
            "bind_vertex_buffers",
            "draw",
            "end_render_pass",
            "submit",
        ]
    );
    assert!(events.contains(&Event::Draw {
        vertex_count: 3,
        instance_count: 1,
        first_vertex: 0,
        first_instance: 0,
    }));
    assert!(matches!(
        events.last(),
        Some(Event::Submit {
            presented: true,
            ..
        })
    ));
}

#[test]
fn quad_frame_draws_six_indices_with_its_sampler() {
    let mut renderer = Renderer::init(
        HeadlessBackend::new(),
        common::textured_quad(common::gradient(4, 4)).into(),
        FrameConfig::default(),
    )
    .unwrap();
    let journal = renderer.backend().journal();
    journal.clear();

    assert_eq!(
        renderer.render_frame(),
        FrameOutcome::Drawn(DrawCall::Indexed {
            index_count: 6,
            instance_count: 1
        })
    );

    let events = journal.events();
    assert!(events.contains(&Event::BindFragmentSamplers {
        first_slot: 0,
        count: 1
    }));
    assert!(events.contains(&Event::DrawIndexed {
        index_count: 6,
        instance_count: 1,
        first_index: 0,
        vertex_offset: 0,
        first_instance: 0,
    }));
}

#[test]
fn clear_color_comes_from_frame_config() {
    let config = FrameConfig::default();
    let mut renderer =
        Renderer::init(HeadlessBackend::new(), SceneDesc::blank(), config.clone()).unwrap();
    let journal = renderer.backend().journal();

    renderer.render_frame();
    assert!(journal.events().contains(&Event::BeginRenderPass {
        clear: config.clear_color
    }));
}

#[test]
fn missing_image_still_submits_once() {
    let mut backend = HeadlessBackend::new();
    backend.push_acquire_result(AcquireResult::NoImage);
    let journal = backend.journal();
    let mut renderer =
        Renderer::init(backend, common::triangle().into(), FrameConfig::default()).unwrap();
    journal.clear();

    assert_eq!(
        renderer.render_frame(),
        FrameOutcome::Skipped(SkipReason::NoSwapchainImage)
    );
    assert_eq!(journal.count("submit"), 1);
    assert_eq!(journal.count("begin_render_pass"), 0);
    assert_eq!(renderer.frame_count(), 0);

    // The next frame has an image again.
    assert!(renderer.render_frame().presented());
    assert_eq!(journal.count("submit"), 2);
    assert_eq!(renderer.frame_count(), 1);
}

#[test]
fn failed_recording_submits_nothing() {
    let mut backend = HeadlessBackend::new();
    backend.fail_next_recordings(1);
    let journal = backend.journal();
    let mut renderer =
        Renderer::init(backend, SceneDesc::blank(), FrameConfig::default()).unwrap();
    journal.clear();

    let outcome = renderer.render_frame();
    assert!(matches!(
        outcome,
        FrameOutcome::Skipped(SkipReason::NoCommandBuffer(_))
    ));
    assert!(!outcome.is_fatal());
    assert_eq!(journal.count("submit"), 0);
    assert_eq!(journal.count("acquire_swapchain"), 0);
}

#[test]
fn lost_device_on_acquire_is_fatal() {
    let mut backend = HeadlessBackend::new();
    backend.push_acquire_result(AcquireResult::Error(GpuError::DeviceLost));
    let mut renderer =
        Renderer::init(backend, SceneDesc::blank(), FrameConfig::default()).unwrap();

    let outcome = renderer.render_frame();
    assert_eq!(
        outcome,
        FrameOutcome::Skipped(SkipReason::AcquireFailed(GpuError::DeviceLost))
    );
    assert!(outcome.is_fatal());
}

#[test]
fn attribute_past_stride_fails_pipeline_creation() {
    let mut mesh = common::triangle();
    mesh.vertex_layout = hulia_engine::pipeline::VertexLayout::new()
        .slot(0, 12, Default::default())
        .attribute(0, 0, hulia_engine::pipeline::VertexFormat::Float32x3, 4);

    let err = Renderer::init(HeadlessBackend::new(), mesh.into(), FrameConfig::default())
        .err()
        .unwrap();
    assert!(matches!(
        err.downcast_ref::<PipelineError>(),
        Some(PipelineError::Layout(_))
    ));
}

#[test]
fn undeclared_sampler_fails_pipeline_creation() {
    let mut mesh = common::textured_quad(common::gradient(2, 2));
    mesh.fragment_shader =
        ShaderSource::wgsl(ShaderStage::Fragment, "// fs", ShaderResources::NONE);

    let backend = HeadlessBackend::new();
    let journal = backend.journal();
    let err = Renderer::init(backend, mesh.into(), FrameConfig::default())
        .err()
        .unwrap();

    assert!(matches!(
        err.downcast_ref::<PipelineError>(),
        Some(PipelineError::ResourceMismatch {
            stage: ShaderStage::Fragment,
            ..
        })
    ));
    assert_eq!(journal.count("create_pipeline"), 0);
    assert_eq!(journal.count("create_buffer"), 0);
}

#[test]
fn shutdown_releases_in_dependency_order() {
    let renderer = Renderer::init(
        HeadlessBackend::new(),
        common::textured_quad(common::gradient(2, 2)).into(),
        FrameConfig::default(),
    )
    .unwrap();
    let journal = renderer.backend().journal();
    journal.clear();

    let backend = renderer.shutdown();
    let released: Vec<_> = journal
        .events()
        .into_iter()
        .filter_map(|e| match e {
            Event::Release { kind, .. } => Some(kind),
            _ => None,
        })
        .collect();
    assert_eq!(
        released,
        vec!["pipeline", "buffer", "buffer", "texture", "sampler"]
    );
    drop(backend);
}
