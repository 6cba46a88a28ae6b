use std::fs;
use std::path::{Path, PathBuf};

use image::ImageReader;

pub const MAX_INPUT_BYTES: u64 = 5 * 1024 * 1024;
pub const MIN_INPUT_DIMENSION: u32 = 50;
pub const MAX_INPUT_DIMENSION: u32 = 4096;

const INPUT_EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];

/// An input image that passed the pre-flight checks for the style vendor.
/// `detected_format` comes from the magic bytes, not the extension, so the
/// true encoding survives into the output pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StyleInput {
    pub path: PathBuf,
    pub byte_size: u64,
    pub width: u32,
    pub height: u32,
    pub detected_format: String,
}

/// Check an input image before anything is sent to the style vendor.
///
/// Fails closed with a human-readable reason for a missing file, an
/// extension outside jpg/jpeg/png, a byte size over 5 MiB, a resolution
/// outside the 50..=4096 window, or unreadable image data. Cheap checks run
/// first so no decode work happens for an over-sized upload.
pub fn validate_style_input(path: &Path) -> Result<StyleInput, String> {
    if !path.is_file() {
        return Err(format!("input image does not exist: {}", path.display()));
    }

    let extension = path
        .extension()
        .and_then(|v| v.to_str())
        .map(|v| v.to_ascii_lowercase())
        .unwrap_or_default();
    if !INPUT_EXTENSIONS.contains(&extension.as_str()) {
        return Err(format!(
            "unsupported input image format '.{extension}'. Only JPG, JPEG and PNG are accepted"
        ));
    }

    let byte_size = fs::metadata(path)
        .map_err(|error| format!("could not stat input image: {error}"))?
        .len();
    if !within_byte_limit(byte_size) {
        return Err(format!(
            "input image is too large: {:.2} MiB. The limit is 5 MiB",
            byte_size as f64 / (1024.0 * 1024.0)
        ));
    }

    let reader = ImageReader::open(path)
        .map_err(|error| format!("could not open input image: {error}"))?
        .with_guessed_format()
        .map_err(|error| format!("could not probe input image: {error}"))?;
    let detected_format = reader
        .format()
        .map(|format| format!("{format:?}").to_ascii_lowercase())
        .ok_or_else(|| String::from("could not detect the input image format"))?;
    let (width, height) = reader
        .into_dimensions()
        .map_err(|error| format!("could not read input image dimensions: {error}"))?;

    if !within_resolution(width, height) {
        return Err(format!(
            "input resolution {width}x{height} is out of range. \
             Both sides must be between {MIN_INPUT_DIMENSION} and {MAX_INPUT_DIMENSION} pixels"
        ));
    }

    Ok(StyleInput {
        path: path.to_path_buf(),
        byte_size,
        width,
        height,
        detected_format,
    })
}

pub fn within_byte_limit(byte_size: u64) -> bool {
    byte_size <= MAX_INPUT_BYTES
}

pub fn within_resolution(width: u32, height: u32) -> bool {
    (MIN_INPUT_DIMENSION..=MAX_INPUT_DIMENSION).contains(&width)
        && (MIN_INPUT_DIMENSION..=MAX_INPUT_DIMENSION).contains(&height)
}
