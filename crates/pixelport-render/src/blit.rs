use pixelport_core::{FrameBuffer, PortResult};

use crate::backend::{check_frame, BackendKind, RenderBackend};
use crate::surface::RenderSurface;

/// Paints each frame directly onto a CPU surface at (0, 0).
pub struct DirectBlit {
    surface: RenderSurface,
    presents: u64,
}

impl DirectBlit {
    pub fn new(width: u32, height: u32) -> PortResult<Self> {
        Ok(Self {
            surface: RenderSurface::new(width, height),
            presents: 0,
        })
    }

    pub fn surface(&self) -> &RenderSurface {
        &self.surface
    }
}

impl RenderBackend for DirectBlit {
    fn kind(&self) -> BackendKind {
        BackendKind::DirectBlit
    }

    fn size(&self) -> (u32, u32) {
        (self.surface.width(), self.surface.height())
    }

    fn present(&mut self, pixels: &[u8], width: u32, height: u32) -> PortResult<()> {
        check_frame(pixels, width, height, self.size())?;
        self.surface.put_image_data(pixels, width, height)?;
        self.presents += 1;
        Ok(())
    }

    fn snapshot(&self) -> PortResult<FrameBuffer> {
        self.surface.to_frame_buffer()
    }

    fn present_count(&self) -> u64 {
        self.presents
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_present_is_byte_exact() {
        let mut blit = DirectBlit::new(4, 3).unwrap();
        let pixels: Vec<u8> = (0..4 * 3 * 4).map(|i| (i * 7 % 256) as u8).collect();
        blit.present(&pixels, 4, 3).unwrap();
        assert_eq!(blit.snapshot().unwrap().data, pixels);
        assert_eq!(blit.present_count(), 1);
    }

    #[test]
    fn test_successive_frames_replace_surface() {
        let mut blit = DirectBlit::new(2, 2).unwrap();
        blit.present(&[0xff; 16], 2, 2).unwrap();
        blit.present(&[0x00; 16], 2, 2).unwrap();
        assert!(blit.surface().as_rgba8().iter().all(|&b| b == 0));
        assert_eq!(blit.present_count(), 2);
    }

    #[test]
    fn test_rejected_frame_is_not_counted() {
        let mut blit = DirectBlit::new(2, 2).unwrap();
        assert!(blit.present(&[0; 4], 1, 1).is_err());
        assert_eq!(blit.present_count(), 0);
    }
}
