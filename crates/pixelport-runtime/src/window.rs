//! Desktop window mode.
//!
//! A winit window shows the backend's surface scaled up by an integer factor,
//! and cursor activity over it reaches the module's pointer entry points.
//! The event loop is pumped from [`WindowFrameSource::wait_for_frame`], so the
//! session stays on one thread and pointer calls never overlap a frame.

use std::sync::Arc;
use std::time::Duration;

use pixelport_core::{PointerKind, PortConfig, PortError, PortResult};
use pixelport_module::{ComputeModule, InputRouter, WasmModule};
use pixelport_render::{create_backend, BackendKind, RenderBackend, WindowPresenter, WindowedBackend};
use winit::application::ApplicationHandler;
use winit::dpi::PhysicalSize;
use winit::event::{ElementState, WindowEvent};
use winit::event_loop::{ActiveEventLoop, EventLoop};
use winit::platform::pump_events::{EventLoopExtPumpEvents, PumpStatus};
use winit::window::{Window, WindowId};

use crate::frame_source::{AnimationHandle, FrameSignal, FrameSource, IntervalFrameSource};
use crate::session::Session;

const OPEN_TIMEOUT: Duration = Duration::from_secs(5);
const OPEN_POLL: Duration = Duration::from_millis(10);

/// A pointer action already mapped into grid coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridPointer {
    pub kind: PointerKind,
    pub x: f64,
    pub y: f64,
}

/// Maps window pixels onto grid cells and remembers where the cursor is.
///
/// Button events carry no position, so they reuse the last cursor position;
/// a button with the cursor outside the window produces nothing.
#[derive(Debug, Clone, Copy)]
pub struct PointerTracker {
    grid: (u32, u32),
    surface: (u32, u32),
    position: Option<(f64, f64)>,
}

impl PointerTracker {
    pub fn new(grid: (u32, u32), surface: (u32, u32)) -> Self {
        Self {
            grid,
            surface,
            position: None,
        }
    }

    pub fn resize(&mut self, surface: (u32, u32)) {
        self.surface = surface;
    }

    pub fn moved(&mut self, x: f64, y: f64) -> GridPointer {
        let x = x * self.grid.0 as f64 / self.surface.0.max(1) as f64;
        let y = y * self.grid.1 as f64 / self.surface.1.max(1) as f64;
        self.position = Some((x, y));
        GridPointer {
            kind: PointerKind::Move,
            x,
            y,
        }
    }

    pub fn button(&self, kind: PointerKind) -> Option<GridPointer> {
        let (x, y) = self.position?;
        Some(GridPointer { kind, x, y })
    }

    pub fn left(&mut self) {
        self.position = None;
    }
}

struct WindowState {
    title: String,
    inner_size: PhysicalSize<u32>,
    window: Option<Arc<Window>>,
    tracker: PointerTracker,
    pointer: Vec<GridPointer>,
    closed: bool,
    error: Option<String>,
}

impl ApplicationHandler for WindowState {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }
        let attributes = Window::default_attributes()
            .with_title(self.title.clone())
            .with_inner_size(self.inner_size)
            .with_resizable(false);
        match event_loop.create_window(attributes) {
            Ok(window) => {
                let size = window.inner_size();
                self.tracker.resize((size.width, size.height));
                self.window = Some(Arc::new(window));
            }
            Err(e) => {
                self.error = Some(e.to_string());
                event_loop.exit();
            }
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => {
                self.closed = true;
                event_loop.exit();
            }
            WindowEvent::Resized(size) => self.tracker.resize((size.width, size.height)),
            WindowEvent::CursorMoved { position, .. } => {
                let moved = self.tracker.moved(position.x, position.y);
                self.pointer.push(moved);
            }
            WindowEvent::CursorLeft { .. } => self.tracker.left(),
            WindowEvent::MouseInput { state, .. } => {
                let kind = match state {
                    ElementState::Pressed => PointerKind::Down,
                    ElementState::Released => PointerKind::Up,
                };
                if let Some(pressed) = self.tracker.button(kind) {
                    self.pointer.push(pressed);
                }
            }
            _ => {}
        }
    }
}

/// A native window plus the event loop that feeds it.
pub struct DesktopWindow {
    event_loop: EventLoop<()>,
    state: WindowState,
}

impl DesktopWindow {
    /// Open a window of `scale` pixels per grid cell and wait until it exists.
    pub fn open(title: &str, grid: (u32, u32), scale: u32) -> PortResult<Self> {
        let (width, height) = grid
            .0
            .checked_mul(scale)
            .zip(grid.1.checked_mul(scale))
            .ok_or_else(|| {
                PortError::Render(format!(
                    "a {}x{} grid at scale {} does not fit in a window",
                    grid.0, grid.1, scale
                ))
            })?;
        let event_loop = EventLoop::new()
            .map_err(|e| PortError::Render(format!("failed to create event loop: {}", e)))?;

        let mut desktop = Self {
            event_loop,
            state: WindowState {
                title: title.to_string(),
                inner_size: PhysicalSize::new(width, height),
                window: None,
                tracker: PointerTracker::new(grid, (width, height)),
                pointer: Vec::new(),
                closed: false,
                error: None,
            },
        };

        let mut waited = Duration::ZERO;
        while desktop.state.window.is_none() {
            let status = desktop
                .event_loop
                .pump_app_events(Some(OPEN_POLL), &mut desktop.state);
            if let PumpStatus::Exit(code) = status {
                return Err(PortError::Render(match desktop.state.error.take() {
                    Some(e) => format!("failed to open window: {}", e),
                    None => format!("event loop exited with code {} before the window opened", code),
                }));
            }
            waited += OPEN_POLL;
            if waited >= OPEN_TIMEOUT {
                return Err(PortError::Render(format!(
                    "window did not open within {:?}",
                    OPEN_TIMEOUT
                )));
            }
        }

        let (width, height) = desktop.surface_size();
        tracing::info!("Opened {}x{} window for a {}x{} grid", width, height, grid.0, grid.1);
        Ok(desktop)
    }

    pub fn handle(&self) -> PortResult<Arc<Window>> {
        self.state
            .window
            .clone()
            .ok_or_else(|| PortError::InvalidState("window is not open".into()))
    }

    /// Inner size in physical pixels.
    pub fn surface_size(&self) -> (u32, u32) {
        match &self.state.window {
            Some(window) => {
                let size = window.inner_size();
                (size.width, size.height)
            }
            None => (self.state.inner_size.width, self.state.inner_size.height),
        }
    }

    /// Handle window events for up to `timeout`. Returns false once the window has closed.
    pub fn pump(&mut self, timeout: Duration) -> bool {
        let status = self
            .event_loop
            .pump_app_events(Some(timeout), &mut self.state);
        !self.state.closed && matches!(status, PumpStatus::Continue)
    }

    /// Pointer actions collected since the last call, in arrival order.
    pub fn take_pointer(&mut self) -> Vec<GridPointer> {
        std::mem::take(&mut self.state.pointer)
    }
}

/// Wrap a backend so that it also draws into `window`.
pub fn create_windowed_backend(
    kind: BackendKind,
    window: &DesktopWindow,
    width: u32,
    height: u32,
) -> PortResult<Box<dyn RenderBackend>> {
    let inner = create_backend(kind, width, height)?;
    let presenter = WindowPresenter::new(window.handle()?, (width, height), window.surface_size())?;
    Ok(Box::new(WindowedBackend::new(inner, presenter)))
}

/// Wall-clock frame source that services a window while it waits.
///
/// Pointer actions are delivered between frames, in arrival order. Closing the
/// window ends the run.
pub struct WindowFrameSource<M> {
    window: DesktopWindow,
    clock: IntervalFrameSource,
    input: InputRouter<M>,
    dispatched: u64,
}

impl<M: ComputeModule> WindowFrameSource<M> {
    pub fn new(window: DesktopWindow, clock: IntervalFrameSource, input: InputRouter<M>) -> Self {
        Self {
            window,
            clock,
            input,
            dispatched: 0,
        }
    }

    /// Pointer actions that reached the module.
    pub fn dispatched(&self) -> u64 {
        self.dispatched
    }

    fn deliver(&mut self, pointer: GridPointer) {
        let result = match pointer.kind {
            PointerKind::Move => self.input.on_move(pointer.x, pointer.y),
            PointerKind::Down => self.input.on_press(pointer.x, pointer.y),
            PointerKind::Up => self.input.on_release(pointer.x, pointer.y),
        };
        match result {
            Ok(()) => self.dispatched += 1,
            Err(e) => tracing::error!("Window {} failed: {}", pointer.kind.entry_point(), e),
        }
    }
}

impl<M: ComputeModule> FrameSource for WindowFrameSource<M> {
    fn request_frame(&mut self) -> AnimationHandle {
        self.clock.request_frame()
    }

    fn cancel_frame(&mut self, handle: AnimationHandle) {
        self.clock.cancel_frame(handle);
    }

    fn wait_for_frame(&mut self) -> Option<FrameSignal> {
        loop {
            let wait = self.clock.until_due()?;
            let open = self.window.pump(wait);
            for pointer in self.window.take_pointer() {
                self.deliver(pointer);
            }
            if !open {
                tracing::info!("Window closed");
                return None;
            }
            if self.clock.until_due()?.is_zero() {
                return self.clock.fire();
            }
        }
    }
}

impl Session<WasmModule> {
    /// Load the configured module and show it in a desktop window.
    ///
    /// The window opens once the grid size is known, before `init` runs.
    pub fn windowed(config: &PortConfig) -> PortResult<(Self, WindowFrameSource<WasmModule>)> {
        let scale = config.render.scale;
        let title = format!("pixelport - {}", config.module.path.display());
        let mut opened = None;
        let session = Session::from_config_with(config, |kind, width, height| {
            let window = DesktopWindow::open(&title, (width, height), scale)?;
            let backend = create_windowed_backend(kind, &window, width, height)?;
            opened = Some(window);
            Ok(backend)
        })?;
        let window = opened
            .ok_or_else(|| PortError::InvalidState("session started without a window".into()))?;

        let clock = IntervalFrameSource::new(config.render.fps)?;
        let source = WindowFrameSource::new(window, clock, session.input());
        Ok((session, source))
    }
}
