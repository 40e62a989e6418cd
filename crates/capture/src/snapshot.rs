//! Still-image export of a single rendered frame.

use std::io::Cursor;
use std::path::{Path, PathBuf};

use crate::error::CaptureError;

/// Encodes one tightly packed RGBA frame as PNG bytes.
///
/// Encoding is deterministic: the same frame yields the same bytes, so two
/// snapshots taken without a state change in between compare equal.
pub fn encode_png(width: u32, height: u32, rgba: &[u8]) -> Result<Vec<u8>, CaptureError> {
    let expected = width as usize * height as usize * 4;
    if rgba.len() != expected {
        return Err(CaptureError::FrameSize {
            width,
            height,
            expected,
            actual: rgba.len(),
        });
    }
    let image = image::RgbaImage::from_raw(width, height, rgba.to_vec())
        .expect("frame buffer length was validated above");
    let mut cursor = Cursor::new(Vec::new());
    image::DynamicImage::ImageRgba8(image).write_to(&mut cursor, image::ImageFormat::Png)?;
    Ok(cursor.into_inner())
}

/// Encodes the frame and writes it to a timestamped file in `output_dir`.
pub fn write_snapshot(
    output_dir: &Path,
    width: u32,
    height: u32,
    rgba: &[u8],
) -> Result<PathBuf, CaptureError> {
    let bytes = encode_png(width, height, rgba)?;
    let stamp = chrono::Local::now().format("%Y%m%d_%H%M%S%.3f");
    let path = output_dir.join(format!("snapshot_{stamp}.png"));
    std::fs::write(&path, &bytes).map_err(|source| CaptureError::Write {
        path: path.clone(),
        source,
    })?;
    tracing::info!(path = %path.display(), "snapshot written");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeated_encodes_are_byte_identical() {
        let frame: Vec<u8> = (0..2 * 2 * 4).map(|value| value as u8).collect();
        let first = encode_png(2, 2, &frame).unwrap();
        let second = encode_png(2, 2, &frame).unwrap();
        assert_eq!(first, second);
        assert_eq!(&first[..8], b"\x89PNG\r\n\x1a\n");
    }

    #[test]
    fn size_mismatch_is_rejected() {
        let result = encode_png(4, 4, &[0u8; 3]);
        assert!(matches!(result, Err(CaptureError::FrameSize { .. })));
    }

    #[test]
    fn snapshot_lands_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let frame = vec![128u8; 2 * 2 * 4];
        let path = write_snapshot(dir.path(), 2, 2, &frame).unwrap();
        assert!(path.exists());
        let written = std::fs::read(path).unwrap();
        assert_eq!(&written[..8], b"\x89PNG\r\n\x1a\n");
    }
}
