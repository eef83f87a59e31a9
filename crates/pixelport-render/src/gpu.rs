use anyhow::Result;
use wgpu::{Adapter, Device, Instance, Queue};

/// A shared context for all GPU-accelerated operations.
pub struct GpuContext {
    pub(crate) adapter: Adapter,
    pub device: Device,
    pub queue: Queue,
}

/// Instance over every native backend (Metal, Vulkan, DX12, GL).
pub(crate) fn create_instance() -> Instance {
    wgpu::Instance::new(wgpu::InstanceDescriptor {
        backends: wgpu::Backends::all(),
        ..Default::default()
    })
}

impl GpuContext {
    /// Initializes WGPU headless; presentation goes to an offscreen target.
    pub fn init() -> Result<Self> {
        Self::request(&create_instance(), None)
    }

    /// Pick an adapter (able to present to `compatible_surface`, if given) and open a device on it.
    pub(crate) fn request(
        instance: &Instance,
        compatible_surface: Option<&wgpu::Surface<'_>>,
    ) -> Result<Self> {
        // Find the best adapter
        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface,
            force_fallback_adapter: false,
        }))
        .ok_or_else(|| anyhow::anyhow!("Failed to find suitable wgpu adapter"))?;

        let (device, queue) = pollster::block_on(adapter.request_device(
            &wgpu::DeviceDescriptor {
                label: Some("Pixelport GPU Device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::downlevel_defaults(),
            },
            None,
        ))?;

        let info = adapter.get_info();
        tracing::info!("Using GPU adapter {} ({:?})", info.name, info.backend);

        Ok(Self {
            adapter,
            device,
            queue,
        })
    }

    /// Largest texture edge the device accepts.
    pub fn max_texture_dimension(&self) -> u32 {
        self.device.limits().max_texture_dimension_2d
    }
}
