//! I/O helpers for input photographs and JSON documents.
//!
//! - `load_rgb_image`: read a PNG/JPEG into an owned RGB buffer.
//! - `save_plane_png`: write a normalized `ImageF32` plane as grayscale PNG.
//! - `read_json_file` / `write_json_file`: serde round-trips with parent
//!   directory creation.
use super::{ImageF32, ImageRgb8, ImageView};
use image::{GrayImage, Luma};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::path::Path;

/// Owned RGB buffer with a borrowed view conversion.
#[derive(Clone, Debug)]
pub struct RgbImageBuf {
    width: usize,
    height: usize,
    data: Vec<[u8; 3]>,
}

impl RgbImageBuf {
    pub fn new(width: usize, height: usize, data: Vec<[u8; 3]>) -> Self {
        debug_assert_eq!(data.len(), width * height);
        Self {
            width,
            height,
            data,
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn as_view(&self) -> ImageRgb8<'_> {
        ImageRgb8::packed(self.width, self.height, &self.data)
    }
}

/// Load an image from disk and convert it to 8-bit RGB.
pub fn load_rgb_image(path: &Path) -> Result<RgbImageBuf, String> {
    let img = image::open(path)
        .map_err(|e| format!("Failed to open {}: {e}", path.display()))?
        .into_rgb8();
    let width = img.width() as usize;
    let height = img.height() as usize;
    let data = img.pixels().map(|p| p.0).collect();
    Ok(RgbImageBuf::new(width, height, data))
}

/// Save a `[0, 1]` plane to a grayscale PNG, clamping out-of-range values.
pub fn save_plane_png(plane: &ImageF32, path: &Path) -> Result<(), String> {
    ensure_parent_dir(path)?;
    let mut out = GrayImage::new(plane.w as u32, plane.h as u32);
    for (y, row) in plane.rows().enumerate() {
        for (x, &px) in row.iter().enumerate() {
            let v = (px * 255.0).clamp(0.0, 255.0);
            out.put_pixel(x as u32, y as u32, Luma([v as u8]));
        }
    }
    out.save(path)
        .map_err(|e| format!("Failed to save {}: {e}", path.display()))
}

/// Deserialize a JSON document from `path`.
pub fn read_json_file<T: DeserializeOwned>(path: &Path) -> Result<T, String> {
    let data = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read {}: {e}", path.display()))?;
    serde_json::from_str(&data).map_err(|e| format!("Failed to parse {}: {e}", path.display()))
}

/// Serialize a value as pretty JSON to `path`, creating parent directories.
pub fn write_json_file<T: Serialize>(path: &Path, value: &T) -> Result<(), String> {
    ensure_parent_dir(path)?;
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| format!("Failed to serialize JSON for {}: {e}", path.display()))?;
    fs::write(path, json).map_err(|e| format!("Failed to write JSON {}: {e}", path.display()))
}

fn ensure_parent_dir(path: &Path) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .map_err(|e| format!("Failed to create {}: {e}", parent.display()))?;
        }
    }
    Ok(())
}
