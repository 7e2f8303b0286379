//! Tutorial programs: a blank window, a vertex-colored triangle and a
//! textured quad, each driven by the hulia runtime.

mod scenes;
mod shaders;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{bail, Result};
use winit::event::{ElementState, KeyEvent, WindowEvent};
use winit::keyboard::{Key, NamedKey};

use hulia_engine::core::{App, AppControl};
use hulia_engine::device::GpuInit;
use hulia_engine::logging::{init_logging, LoggingConfig};
use hulia_engine::renderer::{FrameOutcome, SceneDesc};
use hulia_engine::window::{Runtime, RuntimeConfig};

const USAGE: &str = "usage: hulia-demo [blank|triangle|quad] [--image PATH] [--no-vsync]";

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
enum Tutorial {
    Blank,
    Triangle,
    Quad,
}

#[derive(Debug)]
struct Options {
    tutorial: Tutorial,
    image: Option<PathBuf>,
    vsync: bool,
}

impl Options {
    fn parse(args: impl IntoIterator<Item = String>) -> Result<Self> {
        let mut options = Options {
            tutorial: Tutorial::Triangle,
            image: None,
            vsync: true,
        };

        let mut args = args.into_iter();
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "blank" => options.tutorial = Tutorial::Blank,
                "triangle" => options.tutorial = Tutorial::Triangle,
                "quad" => options.tutorial = Tutorial::Quad,
                "--image" => match args.next() {
                    Some(path) => options.image = Some(path.into()),
                    None => bail!("--image needs a path"),
                },
                "--no-vsync" => options.vsync = false,
                other => bail!("unknown argument {other:?}"),
            }
        }

        if options.image.is_some() && options.tutorial != Tutorial::Quad {
            bail!("--image only applies to the quad tutorial");
        }
        Ok(options)
    }
}

struct TutorialApp {
    tutorial: Tutorial,
    image: Option<PathBuf>,
    presented: u64,
    skipped: u64,
}

impl App for TutorialApp {
    fn init(&mut self) -> Result<SceneDesc> {
        log::info!("starting {:?} tutorial", self.tutorial);
        match self.tutorial {
            Tutorial::Blank => Ok(SceneDesc::blank()),
            Tutorial::Triangle => Ok(scenes::triangle()),
            Tutorial::Quad => scenes::textured_quad(self.image.as_deref()),
        }
    }

    fn on_window_event(&mut self, event: &WindowEvent) -> AppControl {
        match event {
            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        logical_key: Key::Named(NamedKey::Escape),
                        state: ElementState::Pressed,
                        ..
                    },
                ..
            } => AppControl::Exit,
            _ => AppControl::Continue,
        }
    }

    fn on_frame(&mut self, outcome: &FrameOutcome) -> AppControl {
        if outcome.presented() {
            self.presented += 1;
        } else {
            self.skipped += 1;
        }
        AppControl::Continue
    }

    fn on_quit(&mut self) {
        log::info!(
            "{:?} tutorial done: {} frames presented, {} skipped",
            self.tutorial,
            self.presented,
            self.skipped
        );
    }
}

fn main() -> ExitCode {
    init_logging(LoggingConfig::default());

    let options = match Options::parse(std::env::args().skip(1)) {
        Ok(options) => options,
        Err(e) => {
            eprintln!("{e}\n{USAGE}");
            return ExitCode::FAILURE;
        }
    };

    let config = RuntimeConfig {
        title: format!("Hulia Engine: {:?}", options.tutorial),
        ..Default::default()
    };
    let gpu_init = GpuInit {
        present_mode: if options.vsync {
            wgpu::PresentMode::Fifo
        } else {
            wgpu::PresentMode::AutoNoVsync
        },
        ..Default::default()
    };
    let app = TutorialApp {
        tutorial: options.tutorial,
        image: options.image,
        presented: 0,
        skipped: 0,
    };

    match Runtime::run(config, gpu_init, app) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}
