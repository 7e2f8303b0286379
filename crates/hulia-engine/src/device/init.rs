/// Knobs for device and surface creation.
#[derive(Debug, Clone)]
pub struct GpuInit {
    /// Pick an sRGB swapchain format if the surface offers one.
    pub prefer_srgb: bool,

    /// FIFO is available everywhere and blocks acquisition on vblank.
    pub present_mode: wgpu::PresentMode,

    /// Requested compositing mode; ignored when the surface lacks it.
    pub alpha_mode: Option<wgpu::CompositeAlphaMode>,

    pub required_features: wgpu::Features,
    pub required_limits: wgpu::Limits,

    /// Frames the presentation engine may queue (a hint).
    pub frame_latency: u32,

    /// Validation layers plus debug labels on internal objects.
    pub debug_mode: bool,
}

impl Default for GpuInit {
    fn default() -> Self {
        Self {
            prefer_srgb: true,
            present_mode: wgpu::PresentMode::Fifo,
            alpha_mode: None,
            required_features: wgpu::Features::empty(),
            required_limits: wgpu::Limits::default(),
            frame_latency: 2,
            debug_mode: cfg!(debug_assertions),
        }
    }
}

impl GpuInit {
    /// Instance flags for `debug_mode`; `WGPU_*` environment overrides apply
    /// on top.
    pub(crate) fn instance_flags(&self) -> wgpu::InstanceFlags {
        let flags = if self.debug_mode {
            wgpu::InstanceFlags::debugging()
        } else {
            wgpu::InstanceFlags::empty()
        };
        flags.with_env()
    }
}
