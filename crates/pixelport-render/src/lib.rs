//! # pixelport-render
//!
//! Presentation backends for the Pixelport host. Each backend owns a surface sized
//! to the module's grid and presents one RGBA8 frame per call:
//! `DirectBlit` copies pixels straight onto a CPU surface, `TextureQuad` uploads
//! them into a wgpu texture and draws it over a full-surface quad.
//! `WindowedBackend` mirrors either one onto a native window surface.

pub mod backend;
pub mod blit;
pub mod gpu;
pub mod snapshot;
pub mod surface;
pub mod texture_quad;
pub mod window;

pub use backend::{create_backend, BackendKind, RenderBackend};
pub use blit::DirectBlit;
pub use gpu::GpuContext;
pub use surface::RenderSurface;
pub use texture_quad::TextureQuad;
pub use window::{WindowPresenter, WindowedBackend};
