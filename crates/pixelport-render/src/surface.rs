use image::{ImageBuffer, Rgba, RgbaImage};
use pixelport_core::{FrameBuffer, PortError, PortResult};

/// A host-owned RGBA8 canvas with fixed dimensions.
pub struct RenderSurface {
    canvas: RgbaImage,
}

impl RenderSurface {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            canvas: RgbaImage::new(width, height),
        }
    }

    pub fn width(&self) -> u32 {
        self.canvas.width()
    }

    pub fn height(&self) -> u32 {
        self.canvas.height()
    }

    /// Paint `pixels` at the origin, unscaled and without color conversion.
    pub fn put_image_data(&mut self, pixels: &[u8], width: u32, height: u32) -> PortResult<()> {
        let image = ImageBuffer::<Rgba<u8>, &[u8]>::from_raw(width, height, pixels)
            .ok_or_else(|| {
                PortError::Render(format!(
                    "{} bytes do not form a {}x{} RGBA8 image",
                    pixels.len(),
                    width,
                    height
                ))
            })?;
        if image.dimensions() != self.canvas.dimensions() {
            return Err(PortError::Render(format!(
                "image is {}x{} but the surface is {}x{}",
                width,
                height,
                self.width(),
                self.height()
            )));
        }
        // Same size, same layout: the blit is a single row-major copy.
        self.canvas.copy_from_slice(&image);
        Ok(())
    }

    pub fn as_rgba8(&self) -> &[u8] {
        self.canvas.as_raw()
    }

    pub fn to_frame_buffer(&self) -> PortResult<FrameBuffer> {
        FrameBuffer::from_rgba8(self.width(), self.height(), self.canvas.as_raw().clone())
            .ok_or_else(|| PortError::Render("surface canvas does not match its dimensions".into()))
    }
}
