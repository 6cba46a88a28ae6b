pub mod pathing;
pub mod save;
pub mod validate;
pub mod watermark;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum OutputError {
    #[error("unsupported file extension '{extension}'. Allowed extensions: {allowed}")]
    InvalidExtension { extension: String, allowed: String },
    #[error("could not find a free file name for '{file_name}' within 100 attempts")]
    TooManyCollisions { file_name: String },
    #[error("image payload decode failed: {0}")]
    Decode(String),
    #[error("output filesystem error: {0}")]
    Io(#[source] std::io::Error),
}

/// Raster formats the save pipeline can produce. Svg is a legal extension
/// for downloaded files but never a raster encode target, so it is absent
/// here on purpose.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Png,
    Jpg,
    Jpeg,
    Webp,
}

impl OutputFormat {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().trim_start_matches('.').to_ascii_lowercase().as_str() {
            "png" => Some(Self::Png),
            "jpg" => Some(Self::Jpg),
            "jpeg" => Some(Self::Jpeg),
            "webp" => Some(Self::Webp),
            _ => None,
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpg => "jpg",
            Self::Jpeg => "jpeg",
            Self::Webp => "webp",
        }
    }

    /// JPEG-class targets cannot carry an alpha channel and get flattened
    /// over white before encoding.
    pub fn supports_alpha(self) -> bool {
        !matches!(self, Self::Jpg | Self::Jpeg)
    }

    pub fn image_format(self) -> image::ImageFormat {
        match self {
            Self::Png => image::ImageFormat::Png,
            Self::Jpg | Self::Jpeg => image::ImageFormat::Jpeg,
            Self::Webp => image::ImageFormat::WebP,
        }
    }
}
