use anyhow::{anyhow, Context, Result};
use ouroboros::self_referencing;

use winit::application::ApplicationHandler;
use winit::dpi::{LogicalSize, PhysicalSize};
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::window::{Window, WindowId};

use crate::core::{App, AppControl};
use crate::device::{Gpu, GpuInit};
use crate::renderer::Renderer;

/// Window configuration.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub title: String,
    pub initial_size: LogicalSize<f64>,
    pub resizable: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            title: "Hulia Engine".to_string(),
            initial_size: LogicalSize::new(1280.0, 720.0),
            resizable: true,
        }
    }
}

/// Entry point for the runtime.
pub struct Runtime;

impl Runtime {
    /// Opens the window, initializes the device and renderer, then drives
    /// frames until the window is closed.
    ///
    /// Returns an error if startup failed or a frame hit a fatal device error.
    pub fn run<A>(config: RuntimeConfig, gpu_init: GpuInit, app: A) -> Result<()>
    where
        A: 'static + App,
    {
        let event_loop = EventLoop::new().context("failed to create winit EventLoop")?;
        let mut state = RuntimeState::new(config, gpu_init, app);

        event_loop
            .run_app(&mut state)
            .context("winit event loop terminated with error")?;

        match state.failure.take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

/// The window and everything that borrows it.
///
/// The renderer sits in an `Option` so shutdown can release it (and the
/// device it owns) while the window is still alive.
#[self_referencing]
struct WindowEntry {
    window: Window,

    #[borrows(window)]
    #[not_covariant]
    renderer: Option<Renderer<Gpu<'this>>>,
}

fn build_renderer<'w, A: App>(
    window: &'w Window,
    gpu_init: GpuInit,
    app: &mut A,
) -> Result<Renderer<Gpu<'w>>> {
    let gpu = pollster::block_on(Gpu::new(window, gpu_init))
        .context("GPU initialization failed for window")?;
    let scene = app.init().context("application init failed")?;
    Renderer::init(gpu, scene, app.frame_config()).context("renderer setup failed")
}

struct RuntimeState<A>
where
    A: App + 'static,
{
    config: RuntimeConfig,
    gpu_init: GpuInit,
    app: A,

    entry: Option<WindowEntry>,
    failure: Option<anyhow::Error>,
    quit: bool,
}

impl<A> RuntimeState<A>
where
    A: App + 'static,
{
    fn new(config: RuntimeConfig, gpu_init: GpuInit, app: A) -> Self {
        Self {
            config,
            gpu_init,
            app,
            entry: None,
            failure: None,
            quit: false,
        }
    }

    fn create_window_entry(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let attrs = Window::default_attributes()
            .with_title(self.config.title.clone())
            .with_inner_size(self.config.initial_size)
            .with_resizable(self.config.resizable);

        let window = event_loop
            .create_window(attrs)
            .context("failed to create window")?;

        let gpu_init = self.gpu_init.clone();
        let app = &mut self.app;

        let entry = WindowEntryTryBuilder {
            window,
            renderer_builder: |window| build_renderer(window, gpu_init, app).map(Some),
        }
        .try_build()?;

        entry.with_window(|w| w.request_redraw());
        self.entry = Some(entry);
        Ok(())
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, err: anyhow::Error) {
        log::error!("{err:#}");
        self.failure.get_or_insert(err);
        self.shutdown(event_loop);
    }

    /// Releases the renderer's resources, then the device, then the window.
    fn shutdown(&mut self, event_loop: &ActiveEventLoop) {
        if let Some(mut entry) = self.entry.take() {
            entry.with_renderer_mut(|renderer| {
                if let Some(renderer) = renderer.take() {
                    let frames = renderer.frame_count();
                    drop(renderer.shutdown());
                    log::info!("renderer shut down after {frames} frames");
                }
            });
            drop(entry);
        }

        if !self.quit {
            self.quit = true;
            self.app.on_quit();
        }
        event_loop.exit();
    }

    fn resize(&mut self, new_size: PhysicalSize<u32>) {
        if let Some(entry) = self.entry.as_mut() {
            entry.with_mut(|fields| {
                if let Some(renderer) = fields.renderer.as_mut() {
                    renderer.backend_mut().resize(new_size);
                }
                fields.window.request_redraw();
            });
        }
    }

    fn redraw(&mut self, event_loop: &ActiveEventLoop) {
        let Some(entry) = self.entry.as_mut() else {
            return;
        };
        let Some(outcome) = entry.with_renderer_mut(|r| r.as_mut().map(|r| r.render_frame()))
        else {
            return;
        };

        if outcome.is_fatal() {
            self.fail(event_loop, anyhow!("fatal device error: {outcome:?}"));
            return;
        }

        if self.app.on_frame(&outcome) == AppControl::Exit {
            self.shutdown(event_loop);
        }
    }
}

impl<A> ApplicationHandler for RuntimeState<A>
where
    A: App + 'static,
{
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.entry.is_some() || self.quit {
            return;
        }

        if let Err(e) = self.create_window_entry(event_loop) {
            self.fail(event_loop, e.context("startup failed"));
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        if self.quit {
            event_loop.exit();
            return;
        }

        event_loop.set_control_flow(ControlFlow::Wait);

        // Continuous redraw: every iteration renders one frame.
        if let Some(entry) = &self.entry {
            entry.with_window(|w| w.request_redraw());
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        if self.quit {
            event_loop.exit();
            return;
        }

        if self.app.on_window_event(&event) == AppControl::Exit {
            self.shutdown(event_loop);
            return;
        }

        match event {
            WindowEvent::CloseRequested | WindowEvent::Destroyed => self.shutdown(event_loop),

            WindowEvent::Resized(new_size) => self.resize(new_size),

            WindowEvent::ScaleFactorChanged { .. } => {
                if let Some(new_size) = self
                    .entry
                    .as_ref()
                    .map(|entry| entry.with_window(|w| w.inner_size()))
                {
                    self.resize(new_size);
                }
            }

            WindowEvent::RedrawRequested => self.redraw(event_loop),

            _ => {}
        }
    }
}
