// =============================================================================
// TRIANGLE DEMO - Desktop driver for the rust_vulkan library
// =============================================================================
//
// Plays the role of the host: owns a winit window, hands it to the library
// and forwards resizes and redraws. Build with `--features demo`.
//
// Keys: ESC quits, F11 toggles borderless fullscreen.

use anyhow::Result;
use rust_vulkan::application::{Application, FrameOutcome};
use rust_vulkan::backend::NativeWindow;
use rust_vulkan::config::Config;
use rust_vulkan::logging::{self, LogCategories};
use std::time::Instant;
use winit::{
    application::ApplicationHandler,
    event::WindowEvent,
    event_loop::{ActiveEventLoop, EventLoop},
    keyboard::{KeyCode, PhysicalKey},
    window::{Fullscreen, Window, WindowAttributes, WindowId},
};

const INITIAL_SIZE: (u32, u32) = (800, 600);

fn main() -> Result<()> {
    logging::init(None, LogCategories::all(), &[env!("CARGO_CRATE_NAME")]);

    let config = Config::load();
    log::info!("Present mode: {}", config.graphics.present_mode);

    let event_loop = EventLoop::new()?;
    let mut demo = Demo::new(config);
    event_loop.run_app(&mut demo)?;
    Ok(())
}

/// Field order matters: the application must drop before its window.
struct Demo {
    application: Option<Application>,
    window: Option<Window>,
    config: Config,

    frame_count: u32,
    last_fps_update: Instant,
}

impl Demo {
    fn new(config: Config) -> Self {
        Self {
            application: None,
            window: None,
            config,
            frame_count: 0,
            last_fps_update: Instant::now(),
        }
    }

    fn render(&mut self) -> Result<()> {
        let Some(application) = self.application.as_mut() else {
            return Ok(());
        };

        match application.draw_frame()? {
            FrameOutcome::Presented => self.frame_count += 1,
            FrameOutcome::NeedsRefresh => application.refresh()?,
            FrameOutcome::Skipped => {}
        }
        Ok(())
    }

    fn update_fps(&mut self) {
        let elapsed = self.last_fps_update.elapsed().as_secs_f32();
        if elapsed < 1.0 {
            return;
        }

        if let Some(ref window) = self.window {
            window.set_title(&format!(
                "{} - {:.0} FPS",
                self.config.application.name,
                self.frame_count as f32 / elapsed
            ));
        }
        self.frame_count = 0;
        self.last_fps_update = Instant::now();
    }

    fn toggle_fullscreen(&self) {
        if let Some(ref window) = self.window {
            if window.fullscreen().is_some() {
                window.set_fullscreen(None);
            } else {
                window.set_fullscreen(Some(Fullscreen::Borderless(None)));
            }
        }
    }
}

impl ApplicationHandler for Demo {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }

        let attributes = WindowAttributes::default()
            .with_title(&self.config.application.name)
            .with_inner_size(winit::dpi::PhysicalSize::new(INITIAL_SIZE.0, INITIAL_SIZE.1));

        let window = match event_loop.create_window(attributes) {
            Ok(w) => w,
            Err(e) => {
                log::error!("Failed to create window: {:?}", e);
                event_loop.exit();
                return;
            }
        };

        let size = window.inner_size();
        let native = NativeWindow::from_window(&window);
        match Application::new(&native, size.width, size.height, &self.config, None) {
            Ok(application) => self.application = Some(application),
            Err(e) => {
                log::error!("Failed to initialize Vulkan: {:#}", e);
                event_loop.exit();
                return;
            }
        }

        self.window = Some(window);
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => {
                log::info!("Close requested, shutting down...");
                self.application = None;
                event_loop.exit();
            }

            WindowEvent::Resized(size) => {
                if let Some(ref mut application) = self.application {
                    application.resize(size.width, size.height);
                }
            }

            WindowEvent::RedrawRequested => {
                if let Err(e) = self.render() {
                    log::error!("Render error: {:#}", e);
                    self.application = None;
                    event_loop.exit();
                    return;
                }
                self.update_fps();
            }

            WindowEvent::KeyboardInput { event, .. } if event.state.is_pressed() => {
                match event.physical_key {
                    PhysicalKey::Code(KeyCode::Escape) => event_loop.exit(),
                    PhysicalKey::Code(KeyCode::F11) => self.toggle_fullscreen(),
                    _ => {}
                }
            }

            _ => {}
        }
    }

    // Redraw continuously
    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(ref window) = self.window {
            window.request_redraw();
        }
    }
}
