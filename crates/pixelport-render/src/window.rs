//! Presentation onto a native window surface.
//!
//! The window itself is owned elsewhere; this module only needs something wgpu
//! can create a surface from.

use pixelport_core::{FrameBuffer, PortError, PortResult};

use crate::backend::{BackendKind, RenderBackend};
use crate::gpu::{create_instance, GpuContext};
use crate::texture_quad::QuadRenderer;

/// What to do when the next surface texture cannot be acquired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AcquireAction {
    DropFrame,
    ReconfigureAndRetry,
    Fatal,
}

fn acquire_action(err: &wgpu::SurfaceError) -> AcquireAction {
    match err {
        wgpu::SurfaceError::Timeout => AcquireAction::DropFrame,
        wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated => {
            AcquireAction::ReconfigureAndRetry
        }
        _ => AcquireAction::Fatal,
    }
}

/// Surface formats that store linear values, so texels reach the screen unconverted.
fn preferred_format(formats: &[wgpu::TextureFormat]) -> Option<wgpu::TextureFormat> {
    formats
        .iter()
        .copied()
        .find(|format| !format.is_srgb())
        .or_else(|| formats.first().copied())
}

/// Draws the grid, scaled with nearest sampling, onto a window surface.
pub struct WindowPresenter {
    gpu: GpuContext,
    surface: wgpu::Surface<'static>,
    config: wgpu::SurfaceConfiguration,
    quad: QuadRenderer,
}

impl WindowPresenter {
    /// `grid` is the module's grid size; `surface_size` the window's inner size in physical pixels.
    pub fn new(
        target: impl Into<wgpu::SurfaceTarget<'static>>,
        grid: (u32, u32),
        surface_size: (u32, u32),
    ) -> PortResult<Self> {
        let instance = create_instance();
        let surface = instance
            .create_surface(target)
            .map_err(|e| PortError::Render(format!("failed to create window surface: {}", e)))?;
        let gpu = GpuContext::request(&instance, Some(&surface)).map_err(|e| {
            PortError::Render(format!("Failed to initialize WGPU context: {}", e))
        })?;

        let caps = surface.get_capabilities(&gpu.adapter);
        let format = preferred_format(&caps.formats)
            .ok_or_else(|| PortError::Render("window surface supports no formats".into()))?;
        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: surface_size.0.max(1),
            height: surface_size.1.max(1),
            present_mode: wgpu::PresentMode::Fifo,
            alpha_mode: caps
                .alpha_modes
                .first()
                .copied()
                .unwrap_or(wgpu::CompositeAlphaMode::Auto),
            desired_maximum_frame_latency: 2,
            view_formats: Vec::new(),
        };
        surface.configure(&gpu.device, &config);
        tracing::debug!(
            "Configured {:?} window surface at {}x{}",
            format,
            config.width,
            config.height
        );

        let quad = QuadRenderer::new(&gpu, format, grid.0, grid.1)?;
        Ok(Self {
            gpu,
            surface,
            config,
            quad,
        })
    }

    /// Show one RGBA8 frame of the grid's size. Returns false if the frame was dropped.
    pub fn present_rgba8(&mut self, pixels: &[u8]) -> PortResult<bool> {
        self.quad.upload(&self.gpu.queue, pixels);

        let Some(frame) = self.acquire()? else {
            return Ok(false);
        };
        let view = frame
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let mut encoder = self
            .gpu
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("window_present_encoder"),
            });
        self.quad.draw(&mut encoder, &view);
        self.gpu.queue.submit(Some(encoder.finish()));
        frame.present();
        Ok(true)
    }

    fn acquire(&mut self) -> PortResult<Option<wgpu::SurfaceTexture>> {
        let err = match self.surface.get_current_texture() {
            Ok(frame) => return Ok(Some(frame)),
            Err(err) => err,
        };
        match acquire_action(&err) {
            AcquireAction::DropFrame => {
                tracing::warn!("Window surface timed out; dropping frame");
                Ok(None)
            }
            AcquireAction::ReconfigureAndRetry => {
                self.surface.configure(&self.gpu.device, &self.config);
                match self.surface.get_current_texture() {
                    Ok(frame) => Ok(Some(frame)),
                    Err(err) if acquire_action(&err) != AcquireAction::Fatal => {
                        tracing::warn!("Window surface still unavailable after reconfigure: {}", err);
                        Ok(None)
                    }
                    Err(err) => Err(PortError::Render(format!("window surface failed: {}", err))),
                }
            }
            AcquireAction::Fatal => Err(PortError::Render(format!("window surface failed: {}", err))),
        }
    }
}

/// A backend whose every successful present is mirrored onto a window.
///
/// Snapshots and counts come from the wrapped backend.
pub struct WindowedBackend {
    inner: Box<dyn RenderBackend>,
    presenter: WindowPresenter,
}

impl WindowedBackend {
    pub fn new(inner: Box<dyn RenderBackend>, presenter: WindowPresenter) -> Self {
        Self { inner, presenter }
    }
}

impl RenderBackend for WindowedBackend {
    fn kind(&self) -> BackendKind {
        self.inner.kind()
    }

    fn size(&self) -> (u32, u32) {
        self.inner.size()
    }

    fn present(&mut self, pixels: &[u8], width: u32, height: u32) -> PortResult<()> {
        self.inner.present(pixels, width, height)?;
        self.presenter.present_rgba8(pixels)?;
        Ok(())
    }

    fn snapshot(&self) -> PortResult<FrameBuffer> {
        self.inner.snapshot()
    }

    fn present_count(&self) -> u64 {
        self.inner.present_count()
    }
}
