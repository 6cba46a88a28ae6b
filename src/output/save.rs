use std::fs;
use std::path::{Path, PathBuf};

use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine;
use image::{DynamicImage, ImageError, Rgb, RgbImage, RgbaImage};
use tracing::info;

use super::pathing::split_file_name;
use super::watermark::{self, WatermarkDefaults, WatermarkSpec};
use super::{OutputError, OutputFormat};

/// A file the save pipeline actually produced. A returned value always
/// points at an existing file; failures surface as `OutputError` instead of
/// a half-written path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedImage {
    pub file_path: PathBuf,
    pub format: OutputFormat,
}

/// Decode a base64 raster payload, optionally composite a text watermark,
/// and persist it under `directory` as `{stem of file_name_hint}.{format}`.
///
/// The decoded image is normalized to RGBA so watermarking sees one color
/// mode regardless of the source. JPEG-class targets are flattened over an
/// opaque white background (source alpha as the mask) before encoding;
/// alpha-capable targets keep their channel.
pub fn save_base64_image(
    payload: &str,
    file_name_hint: &str,
    directory: &Path,
    format: OutputFormat,
    watermark: Option<&WatermarkSpec>,
    defaults: &WatermarkDefaults,
) -> Result<SavedImage, OutputError> {
    fs::create_dir_all(directory).map_err(OutputError::Io)?;

    let (stem, _) = split_file_name(file_name_hint);
    let file_name = format!("{stem}.{}", format.extension());
    let file_path = directory.join(file_name.as_str());

    let compact: String = payload.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    let bytes = BASE64_STANDARD
        .decode(compact.as_bytes())
        .map_err(|error| OutputError::Decode(format!("invalid base64 payload: {error}")))?;
    let decoded = image::load_from_memory(bytes.as_slice())
        .map_err(|error| OutputError::Decode(format!("payload is not a decodable image: {error}")))?;

    let mut rgba = decoded.to_rgba8();
    if let Some(spec) = watermark {
        if !spec.text.trim().is_empty() {
            watermark::composite_text(&mut rgba, spec, defaults);
        }
    }

    let output = if format.supports_alpha() {
        DynamicImage::ImageRgba8(rgba)
    } else {
        DynamicImage::ImageRgb8(flatten_onto_white(&rgba))
    };
    output
        .save_with_format(file_path.as_path(), format.image_format())
        .map_err(|error| match error {
            ImageError::IoError(source) => OutputError::Io(source),
            other => OutputError::Io(std::io::Error::other(other.to_string())),
        })?;

    info!(path = %file_path.display(), "image saved");
    Ok(SavedImage { file_path, format })
}

/// Composite straight-alpha RGBA over an opaque white background, using the
/// alpha channel as the paste mask.
fn flatten_onto_white(image: &RgbaImage) -> RgbImage {
    let mut out = RgbImage::from_pixel(image.width(), image.height(), Rgb([255, 255, 255]));
    for (src, dst) in image.pixels().zip(out.pixels_mut()) {
        let alpha = src[3] as f32 / 255.0;
        for i in 0..3 {
            let v = src[i] as f32 * alpha + 255.0 * (1.0 - alpha);
            dst[i] = v.round().clamp(0.0, 255.0) as u8;
        }
    }
    out
}
