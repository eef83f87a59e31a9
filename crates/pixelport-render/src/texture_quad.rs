use pixelport_core::{FrameBuffer, PortError, PortResult, BYTES_PER_PIXEL};
use wgpu::util::DeviceExt;

use crate::backend::{check_frame, BackendKind, RenderBackend};
use crate::gpu::GpuContext;

#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
struct Vertex {
    position: [f32; 2],
}

/// Two triangles covering clip space from -1 to 1.
const QUAD_VERTICES: &[Vertex] = &[
    // Tri 1
    Vertex { position: [-1.0, -1.0] },
    Vertex { position: [1.0, -1.0] },
    Vertex { position: [-1.0, 1.0] },
    // Tri 2
    Vertex { position: [-1.0, 1.0] },
    Vertex { position: [1.0, -1.0] },
    Vertex { position: [1.0, 1.0] },
];

const SURFACE_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

/// Pipeline, grid texture and quad geometry for drawing one grid into a color target.
///
/// The grid texture is always `Rgba8Unorm`; the target may use any color format.
pub(crate) struct QuadRenderer {
    pipeline: wgpu::RenderPipeline,
    vertex_buffer: wgpu::Buffer,
    grid_texture: wgpu::Texture,
    bind_group: wgpu::BindGroup,
    width: u32,
    height: u32,
}

impl QuadRenderer {
    pub(crate) fn new(
        gpu: &GpuContext,
        target_format: wgpu::TextureFormat,
        width: u32,
        height: u32,
    ) -> PortResult<Self> {
        let max = gpu.max_texture_dimension();
        if width > max || height > max {
            return Err(PortError::Render(format!(
                "grid {}x{} exceeds the device texture limit of {}",
                width, height, max
            )));
        }

        let shader = gpu
            .device
            .create_shader_module(wgpu::include_wgsl!("texture_quad.wgsl"));

        let bind_group_layout = gpu.device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("texture_quad_bind_group_layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: false },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::NonFiltering),
                    count: None,
                },
            ],
        });

        let pipeline_layout = gpu.device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("texture_quad_pipeline_layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let pipeline = gpu.device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("texture_quad_pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: "vs_main",
                buffers: &[wgpu::VertexBufferLayout {
                    array_stride: std::mem::size_of::<Vertex>() as wgpu::BufferAddress,
                    step_mode: wgpu::VertexStepMode::Vertex,
                    attributes: &wgpu::vertex_attr_array![0 => Float32x2],
                }],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: "fs_main",
                compilation_options: wgpu::PipelineCompilationOptions::default(),
                targets: &[Some(wgpu::ColorTargetState {
                    format: target_format,
                    // Replace, never blend: the surface must show exactly the frame.
                    blend: None,
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),
            primitive: wgpu::PrimitiveState::default(),
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
        });

        let vertex_buffer = gpu.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("texture_quad_vertex_buffer"),
            contents: bytemuck::cast_slice(QUAD_VERTICES),
            usage: wgpu::BufferUsages::VERTEX,
        });

        let grid_texture = gpu.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("texture_quad_grid"),
            size: extent(width, height),
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: SURFACE_FORMAT,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        let grid_view = grid_texture.create_view(&wgpu::TextureViewDescriptor::default());

        // Nearest in every direction keeps each grid cell exactly one texel.
        let sampler = gpu.device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("texture_quad_sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Nearest,
            min_filter: wgpu::FilterMode::Nearest,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        let bind_group = gpu.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("texture_quad_bind_group"),
            layout: &bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&grid_view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&sampler),
                },
            ],
        });

        Ok(Self {
            pipeline,
            vertex_buffer,
            grid_texture,
            bind_group,
            width,
            height,
        })
    }

    /// Replace the whole grid texture; no partial-update bookkeeping.
    pub(crate) fn upload(&self, queue: &wgpu::Queue, pixels: &[u8]) {
        queue.write_texture(
            wgpu::ImageCopyTexture {
                texture: &self.grid_texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            pixels,
            wgpu::ImageDataLayout {
                offset: 0,
                bytes_per_row: Some(self.width * BYTES_PER_PIXEL as u32),
                rows_per_image: Some(self.height),
            },
            extent(self.width, self.height),
        );
    }

    /// Clear `target` and draw the grid over all of it.
    pub(crate) fn draw(&self, encoder: &mut wgpu::CommandEncoder, target: &wgpu::TextureView) {
        let mut rpass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("texture_quad_render_pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: target,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
        });

        rpass.set_pipeline(&self.pipeline);
        rpass.set_bind_group(0, &self.bind_group, &[]);
        rpass.set_vertex_buffer(0, self.vertex_buffer.slice(..));
        rpass.draw(0..QUAD_VERTICES.len() as u32, 0..1);
    }
}

fn extent(width: u32, height: u32) -> wgpu::Extent3d {
    wgpu::Extent3d {
        width,
        height,
        depth_or_array_layers: 1,
    }
}

/// Presents frames by uploading them into a texture drawn over a full-surface quad.
///
/// Every GPU object is created once in [`TextureQuad::new`]. Each `present` replaces
/// the whole texture, then issues one draw of 6 vertices into the offscreen surface.
pub struct TextureQuad {
    gpu: GpuContext,
    quad: QuadRenderer,
    surface_texture: wgpu::Texture,
    surface_view: wgpu::TextureView,
    presents: u64,
}

impl TextureQuad {
    pub fn new(width: u32, height: u32) -> PortResult<Self> {
        let gpu = GpuContext::init().map_err(|e| {
            PortError::Render(format!("Failed to initialize WGPU context: {}", e))
        })?;
        Self::with_context(gpu, width, height)
    }

    pub fn with_context(gpu: GpuContext, width: u32, height: u32) -> PortResult<Self> {
        let quad = QuadRenderer::new(&gpu, SURFACE_FORMAT, width, height)?;

        let surface_texture = gpu.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("texture_quad_surface"),
            size: extent(width, height),
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: SURFACE_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });
        let surface_view = surface_texture.create_view(&wgpu::TextureViewDescriptor::default());

        Ok(Self {
            gpu,
            quad,
            surface_texture,
            surface_view,
            presents: 0,
        })
    }
}

impl RenderBackend for TextureQuad {
    fn kind(&self) -> BackendKind {
        BackendKind::TextureQuad
    }

    fn size(&self) -> (u32, u32) {
        (self.quad.width, self.quad.height)
    }

    fn present(&mut self, pixels: &[u8], width: u32, height: u32) -> PortResult<()> {
        check_frame(pixels, width, height, self.size())?;

        self.quad.upload(&self.gpu.queue, pixels);
        let mut encoder = self
            .gpu
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("texture_quad_encoder"),
            });
        self.quad.draw(&mut encoder, &self.surface_view);
        self.gpu.queue.submit(Some(encoder.finish()));

        self.presents += 1;
        Ok(())
    }

    fn snapshot(&self) -> PortResult<FrameBuffer> {
        let (width, height) = self.size();
        let row_bytes = width * BYTES_PER_PIXEL as u32;
        let padded_bytes_per_row = (row_bytes + wgpu::COPY_BYTES_PER_ROW_ALIGNMENT - 1)
            & !(wgpu::COPY_BYTES_PER_ROW_ALIGNMENT - 1);

        let readback = self.gpu.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("texture_quad_readback"),
            size: (padded_bytes_per_row * height) as wgpu::BufferAddress,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let mut encoder = self
            .gpu
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("texture_quad_readback_encoder"),
            });
        encoder.copy_texture_to_buffer(
            wgpu::ImageCopyTexture {
                texture: &self.surface_texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::ImageCopyBuffer {
                buffer: &readback,
                layout: wgpu::ImageDataLayout {
                    offset: 0,
                    bytes_per_row: Some(padded_bytes_per_row),
                    rows_per_image: Some(height),
                },
            },
            extent(width, height),
        );
        self.gpu.queue.submit(Some(encoder.finish()));

        let slice = readback.slice(..);
        let (tx, rx) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |v| {
            let _ = tx.send(v);
        });
        self.gpu.device.poll(wgpu::Maintain::Wait);

        match rx.recv() {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                return Err(PortError::Render(format!(
                    "failed to map surface readback buffer: {}",
                    e
                )))
            }
            Err(_) => {
                return Err(PortError::Render(
                    "surface readback was dropped before completing".into(),
                ))
            }
        }

        let mut frame = FrameBuffer::new(width, height);
        {
            let data = slice.get_mapped_range();
            let row_len = row_bytes as usize;
            for (y, dst_row) in frame.data.chunks_exact_mut(row_len).enumerate() {
                let row_start = y * padded_bytes_per_row as usize;
                dst_row.copy_from_slice(&data[row_start..row_start + row_len]);
            }
        }
        readback.unmap();

        Ok(frame)
    }

    fn present_count(&self) -> u64 {
        self.presents
    }
}
