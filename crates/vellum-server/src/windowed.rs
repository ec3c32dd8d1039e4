use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use ouroboros::self_referencing;
use winit::application::ApplicationHandler;
use winit::dpi::LogicalSize;
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::window::{Window, WindowId};

use vellum_engine::device::{GpuDevice, GpuInit, SurfaceView, WindowSurface};
use vellum_engine::render::{LiveSurfaceTarget, RenderTarget};
use vellum_wire::{LocalSocketChannel, WireCodec};

use crate::commands::Command;
use crate::config::ServerConfig;
use crate::recovery::recover;
use crate::session::Session;

/// How long to wait between socket polls when the client is quiet.
const IDLE_POLL: Duration = Duration::from_millis(2);

/// Runs the server with a window as the default canvas.
pub fn run(config: ServerConfig, init: GpuInit) -> Result<()> {
    let mut channel = LocalSocketChannel::bind(&config.address)
        .with_context(|| format!("failed to bind {}", config.address.display()))?;
    channel.set_blocking_accept(false);
    let codec = WireCodec::with_byte_order(channel, config.byte_order);

    let event_loop = EventLoop::new().context("failed to create winit EventLoop")?;
    let mut app = ServerApp {
        config,
        init,
        codec,
        window: None,
        session: None,
        failure: None,
    };

    event_loop
        .run_app(&mut app)
        .context("winit event loop terminated with error")?;

    match app.failure {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

#[self_referencing]
struct WindowEntry {
    window: Window,

    #[borrows(window)]
    #[covariant]
    surface: WindowSurface<'this>,
}

struct ServerApp {
    config: ServerConfig,
    init: GpuInit,
    codec: WireCodec<LocalSocketChannel>,

    window: Option<WindowEntry>,
    session: Option<Session>,

    /// Error that stopped the event loop, reported once it returns.
    failure: Option<anyhow::Error>,
}

impl ServerApp {
    fn fail(&mut self, event_loop: &ActiveEventLoop, err: anyhow::Error) {
        log::error!("{err:#}");
        self.failure = Some(err);
        event_loop.exit();
    }

    fn open_window(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let attrs = Window::default_attributes()
            .with_title("vellum")
            .with_inner_size(LogicalSize::new(self.config.width, self.config.height));
        let window = event_loop
            .create_window(attrs)
            .context("failed to create window")?;

        let init = &self.init;
        let instance = GpuDevice::create_instance(init);
        let mut gpu = None;

        let entry = WindowEntryTryBuilder {
            window,
            surface_builder: |window| attach_surface(window, instance, init, &mut gpu),
        }
        .try_build()?;
        let gpu = gpu.context("GPU was not initialised with the window")?;

        let color_format = entry.borrow_surface().color_format();
        let depth = init.depth_stencil_format;
        let session = Session::new(gpu, depth, |_gpu, pipelines| {
            let target: Box<dyn RenderTarget> =
                Box::new(LiveSurfaceTarget::new(pipelines.get(color_format, depth)?));
            Ok(target)
        })?;

        self.window = Some(entry);
        self.session = Some(session);
        Ok(())
    }

    /// Handles commands until the client goes quiet or a frame is flushed.
    ///
    /// Returning after a flush lets window events in between frames. Returns
    /// whether any command was handled.
    fn pump_commands(&mut self) -> Result<bool> {
        let (Some(entry), Some(session)) = (self.window.as_mut(), self.session.as_mut()) else {
            return Ok(false);
        };
        let codec = &mut self.codec;

        if !codec.accept_connection()? {
            return Ok(false);
        }

        let mut handled_any = false;
        while codec.data_available()? {
            handled_any = true;
            let handled = entry.with_surface_mut(|surface| session.handle_next(codec, surface));
            match handled {
                Ok(Command::Flush) => break,
                Ok(_) => {}
                Err(err) => {
                    recover(err, self.config.on_fatal, codec, session)?;
                    break;
                }
            }
        }

        anyhow::ensure!(
            !entry.borrow_surface().is_lost(),
            "window surface can no longer be drawn to"
        );
        Ok(handled_any)
    }
}

/// Creates the device for `window` and the surface that presents to it.
///
/// The device is handed back through `gpu`; it must be chosen together with
/// the surface so the adapter can present to it.
fn attach_surface<'w>(
    window: &'w Window,
    instance: wgpu::Instance,
    init: &GpuInit,
    gpu: &mut Option<GpuDevice>,
) -> Result<WindowSurface<'w>> {
    let surface = instance
        .create_surface(window)
        .context("failed to create window surface")?;
    let device = pollster::block_on(GpuDevice::new(instance, init, Some(&surface)))?;
    let surface = WindowSurface::new(&device, surface, window.inner_size(), init)?;
    *gpu = Some(device);
    Ok(surface)
}

impl ApplicationHandler for ServerApp {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }
        if let Err(err) = self.open_window(event_loop) {
            self.fail(event_loop, err.context("failed to open the server window"));
            return;
        }
        log::info!(
            "waiting for clients on {}",
            self.codec.channel().path().display()
        );
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        let busy = match self.pump_commands() {
            Ok(busy) => busy,
            Err(err) => {
                self.fail(event_loop, err);
                return;
            }
        };

        if busy {
            event_loop.set_control_flow(ControlFlow::Poll);
        } else {
            event_loop.set_control_flow(ControlFlow::WaitUntil(Instant::now() + IDLE_POLL));
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => {
                log::info!("window closed; shutting down");
                event_loop.exit();
            }
            WindowEvent::Resized(size) => {
                if let Some(entry) = self.window.as_mut() {
                    entry.with_surface_mut(|surface| surface.resize(size));
                }
            }
            WindowEvent::ScaleFactorChanged { .. } => {
                if let Some(entry) = self.window.as_mut() {
                    let size = entry.with_window(|w| w.inner_size());
                    entry.with_surface_mut(|surface| surface.resize(size));
                }
            }
            _ => {}
        }
    }
}
