use anyhow::{Context, Result};
use winit::dpi::PhysicalSize;
use winit::window::Window;

use crate::backend::{SurfaceExtent, TextureFormat};

use super::{convert, surface, GpuInit, SurfaceErrorAction};

/// wgpu device presenting to one window.
///
/// Implements [`GpuBackend`](crate::backend::GpuBackend); recordings are
/// encoded and submitted on `queue`, swapchain images come from `surface`.
/// Borrows the window for `'w`, so it is dropped before the window.
pub struct Gpu<'w> {
    pub(super) window: &'w Window,
    pub(super) surface: wgpu::Surface<'w>,
    pub(super) adapter: wgpu::Adapter,
    pub(super) device: wgpu::Device,
    pub(super) queue: wgpu::Queue,
    pub(super) config: wgpu::SurfaceConfiguration,
    /// `config.format` in engine terms.
    pub(super) format: TextureFormat,
    /// Last size reported by the window; may be zero while minimized.
    pub(super) size: PhysicalSize<u32>,
    pub(super) debug_mode: bool,
}

impl<'w> Gpu<'w> {
    /// Creates the device and binds it to `window`'s surface.
    ///
    /// There is no fallback: any failure here aborts startup.
    pub async fn new(window: &'w Window, init: GpuInit) -> Result<Self> {
        let size = window.inner_size();
        anyhow::ensure!(size.width > 0 && size.height > 0, "window has zero size");

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            flags: init.instance_flags(),
            ..Default::default()
        });

        let surface = instance
            .create_surface(window)
            .context("failed to create wgpu surface")?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .context("failed to find a suitable GPU adapter")?;

        let info = adapter.get_info();
        log::info!("using {} ({:?})", info.name, info.backend);

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("hulia device"),
                required_features: init.required_features,
                required_limits: init.required_limits.clone(),
                experimental_features: wgpu::ExperimentalFeatures::disabled(),
                memory_hints: wgpu::MemoryHints::Performance,
                trace: wgpu::Trace::Off,
            })
            .await
            .context("failed to create wgpu device/queue")?;

        device.on_uncaptured_error(std::sync::Arc::new(|e| {
            log::error!("uncaptured wgpu error: {e}");
        }));

        let caps = surface.get_capabilities(&adapter);
        let format = surface::choose_surface_format(&caps.formats, init.prefer_srgb)
            .with_context(|| format!("no usable surface format among {:?}", caps.formats))?;
        let engine_format = convert::texture_format_from_wgpu(format)
            .context("surface format has no engine equivalent")?;

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: size.width,
            height: size.height,
            present_mode: init.present_mode,
            alpha_mode: surface::choose_alpha_mode(&caps.alpha_modes, init.alpha_mode),
            view_formats: vec![],
            desired_maximum_frame_latency: init.frame_latency,
        };
        surface.configure(&device, &config);

        log::info!(
            "surface configured: {}x{} {:?}, {:?}",
            size.width,
            size.height,
            format,
            config.present_mode
        );

        Ok(Self {
            window,
            surface,
            adapter,
            device,
            queue,
            config,
            format: engine_format,
            size,
            debug_mode: init.debug_mode,
        })
    }

    /// Returns the active surface format.
    pub fn surface_format(&self) -> wgpu::TextureFormat {
        self.config.format
    }

    /// Returns the current drawable size (physical pixels).
    pub fn size(&self) -> PhysicalSize<u32> {
        self.size
    }

    pub fn adapter_info(&self) -> wgpu::AdapterInfo {
        self.adapter.get_info()
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    /// Reconfigures the surface after a resize.
    pub fn resize(&mut self, new_size: PhysicalSize<u32>) {
        log::debug!("surface resize to {}x{}", new_size.width, new_size.height);
        surface::apply_resize(
            &self.surface,
            &self.device,
            &mut self.config,
            &mut self.size,
            new_size,
        );
    }

    pub(super) fn extent(&self) -> Option<SurfaceExtent> {
        (self.size.width > 0 && self.size.height > 0).then_some(SurfaceExtent {
            width: self.config.width,
            height: self.config.height,
        })
    }

    /// Converts a surface error into a higher-level action.
    pub(super) fn handle_surface_error(&mut self, err: &wgpu::SurfaceError) -> SurfaceErrorAction {
        surface::map_surface_error(&self.surface, &self.device, &self.config, self.size, err)
    }

    pub(super) fn label<'a>(&self, label: &'a str) -> Option<&'a str> {
        self.debug_mode.then_some(label)
    }
}
