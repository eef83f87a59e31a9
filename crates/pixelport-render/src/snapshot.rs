//! Surface snapshots written to disk.

use std::path::Path;

use pixelport_core::{FrameBuffer, PortError, PortResult, BYTES_PER_PIXEL};

/// Save a frame as an RGBA8 image; the format follows the file extension.
pub fn save_frame(frame: &FrameBuffer, path: &Path) -> PortResult<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    image::save_buffer(
        path,
        &frame.data,
        frame.width,
        frame.height,
        image::ExtendedColorType::Rgba8,
    )
    .map_err(|e| {
        PortError::Render(format!(
            "failed to save snapshot '{}': {}",
            path.display(),
            e
        ))
    })?;

    tracing::info!(
        "Saved {}x{} snapshot to {}",
        frame.width,
        frame.height,
        path.display()
    );
    Ok(())
}

/// Load an image back as an RGBA8 frame.
pub fn load_frame(path: &Path) -> PortResult<FrameBuffer> {
    let img = image::open(path).map_err(|e| {
        PortError::Render(format!("failed to load image '{}': {}", path.display(), e))
    })?;

    let rgba = img.to_rgba8();
    let (width, height) = rgba.dimensions();
    FrameBuffer::from_rgba8(width, height, rgba.into_raw()).ok_or_else(|| {
        PortError::Render(format!(
            "image '{}' did not decode to {}x{} RGBA8",
            path.display(),
            width,
            height
        ))
    })
}

/// Number of pixels whose RGBA bytes differ between `frame` and `reference`.
///
/// Exact comparison, no tolerance. Frames of different sizes are an error.
pub fn diff_frames(frame: &FrameBuffer, reference: &FrameBuffer) -> PortResult<usize> {
    if (frame.width, frame.height) != (reference.width, reference.height) {
        return Err(PortError::Render(format!(
            "dimensions mismatch: {}x{} vs reference {}x{}",
            frame.width, frame.height, reference.width, reference.height
        )));
    }
    Ok(frame
        .data
        .chunks_exact(BYTES_PER_PIXEL)
        .zip(reference.data.chunks_exact(BYTES_PER_PIXEL))
        .filter(|(a, b)| a != b)
        .count())
}
