use std::fmt;
use std::str::FromStr;

use pixelport_core::frame::byte_len;
use pixelport_core::{FrameBuffer, PortError, PortResult};

/// A presentation target for one module's frames.
///
/// Created once per session with the grid's dimensions; `present` is then called
/// once per frame with a fresh view of the module's pixels.
pub trait RenderBackend {
    fn kind(&self) -> BackendKind;

    /// Surface dimensions, fixed at construction.
    fn size(&self) -> (u32, u32);

    /// Replace the visible surface with `pixels` (RGBA8, row-major, unpadded).
    fn present(&mut self, pixels: &[u8], width: u32, height: u32) -> PortResult<()>;

    /// Read back what the surface currently shows.
    fn snapshot(&self) -> PortResult<FrameBuffer>;

    /// Number of successful `present` calls so far.
    fn present_count(&self) -> u64;
}

/// Available backend kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BackendKind {
    /// Copy pixels straight onto a CPU-side RGBA8 surface.
    DirectBlit,
    /// Upload pixels into a GPU texture and draw a full-surface quad.
    #[default]
    TextureQuad,
}

impl BackendKind {
    pub const ALL: [BackendKind; 2] = [BackendKind::DirectBlit, BackendKind::TextureQuad];

    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::DirectBlit => "direct-blit",
            BackendKind::TextureQuad => "texture-quad",
        }
    }

    /// Parse a configured backend name. Unknown names are `UnsupportedBackend`.
    pub fn parse(name: &str) -> PortResult<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "direct-blit" | "blit" | "2d" => Ok(BackendKind::DirectBlit),
            "texture-quad" | "gpu" | "webgl" | "webgl2" => Ok(BackendKind::TextureQuad),
            _ => Err(PortError::UnsupportedBackend(name.to_string())),
        }
    }
}

impl FromStr for BackendKind {
    type Err = PortError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Create a rendering backend sized to the grid.
pub fn create_backend(
    kind: BackendKind,
    width: u32,
    height: u32,
) -> PortResult<Box<dyn RenderBackend>> {
    tracing::info!("Initializing {} backend at {}x{}", kind, width, height);
    match kind {
        BackendKind::DirectBlit => Ok(Box::new(crate::blit::DirectBlit::new(width, height)?)),
        BackendKind::TextureQuad => Ok(Box::new(crate::texture_quad::TextureQuad::new(
            width, height,
        )?)),
    }
}

/// Check a frame against the surface it is about to be presented on.
pub(crate) fn check_frame(
    pixels: &[u8],
    width: u32,
    height: u32,
    surface: (u32, u32),
) -> PortResult<()> {
    if (width, height) != surface {
        return Err(PortError::Render(format!(
            "frame is {}x{} but the surface is {}x{}",
            width, height, surface.0, surface.1
        )));
    }
    let expected = byte_len(width, height);
    if pixels.len() != expected {
        return Err(PortError::Render(format!(
            "frame has {} bytes, expected {} for {}x{} RGBA8",
            pixels.len(),
            expected,
            width,
            height
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_names_and_aliases() {
        assert_eq!(BackendKind::parse("direct-blit").unwrap(), BackendKind::DirectBlit);
        assert_eq!(BackendKind::parse("2d").unwrap(), BackendKind::DirectBlit);
        assert_eq!(BackendKind::parse("Texture-Quad").unwrap(), BackendKind::TextureQuad);
        assert_eq!(BackendKind::parse("webgl2").unwrap(), BackendKind::TextureQuad);
    }

    #[test]
    fn test_parse_unsupported() {
        let err = BackendKind::parse("bitmaprenderer").unwrap_err();
        assert!(matches!(err, PortError::UnsupportedBackend(ref name) if name == "bitmaprenderer"));
    }

    #[test]
    fn test_display_round_trips_through_parse() {
        for kind in BackendKind::ALL {
            assert_eq!(kind.to_string().parse::<BackendKind>().unwrap(), kind);
        }
    }

    #[test]
    fn test_check_frame_rejects_mismatch() {
        assert!(check_frame(&[0; 16], 2, 2, (2, 2)).is_ok());
        assert!(check_frame(&[0; 15], 2, 2, (2, 2)).is_err());
        assert!(check_frame(&[0; 16], 4, 1, (2, 2)).is_err());
    }
}
