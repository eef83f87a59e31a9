use pixelport_core::frame::byte_len;
use pixelport_core::{ExportNames, PortError, PortResult, BYTES_PER_PIXEL};

use crate::memory::MemoryView;
use crate::module::ComputeModule;

/// Fixed geometry of the module's pixel grid.
///
/// Resolved once at startup, before the module's `init` runs, and never re-read: the grid
/// cannot change size for the lifetime of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridDescriptor {
    /// Offset of the first pixel inside linear memory.
    pub pixel_buffer_offset: u32,
    pub width: u32,
    pub height: u32,
}

impl GridDescriptor {
    /// Read the grid pointer, width and height value exports.
    ///
    /// Each export names an address; the `u32` stored there is the value.
    pub fn resolve<M: ComputeModule + ?Sized>(
        module: &mut M,
        names: &ExportNames,
    ) -> PortResult<Self> {
        let ptr_address = module.value_export(&names.grid_ptr)?;
        let width_address = module.value_export(&names.width)?;
        let height_address = module.value_export(&names.height)?;

        let view = module.memory();
        let grid = Self {
            pixel_buffer_offset: view.read_u32(ptr_address)?,
            width: view.read_u32(width_address)?,
            height: view.read_u32(height_address)?,
        };
        grid.validate()?;

        tracing::info!(
            "Resolved grid {}x{} at offset {:#x} ({} bytes of {} in memory)",
            grid.width,
            grid.height,
            grid.pixel_buffer_offset,
            grid.byte_len(),
            view.len()
        );
        Ok(grid)
    }

    fn validate(&self) -> PortResult<()> {
        if self.width == 0 || self.height == 0 {
            return Err(PortError::InvalidGrid(format!(
                "grid has zero area ({}x{})",
                self.width, self.height
            )));
        }
        let total = (self.width as u64)
            .checked_mul(self.height as u64)
            .and_then(|n| n.checked_mul(BYTES_PER_PIXEL as u64));
        match total {
            Some(n) if n <= usize::MAX as u64 => Ok(()),
            _ => Err(PortError::InvalidGrid(format!(
                "grid {}x{} is too large to address",
                self.width, self.height
            ))),
        }
    }

    /// Size of the RGBA8 frame in bytes.
    pub fn byte_len(&self) -> usize {
        byte_len(self.width, self.height)
    }

    /// Resolve this frame's pixel window. Call again after every module call.
    pub fn pixels<'a>(&self, view: &MemoryView<'a>) -> PortResult<&'a [u8]> {
        view.bytes(self.pixel_buffer_offset as u64, self.byte_len() as u64)
    }
}
