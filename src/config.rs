use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::output::watermark::WatermarkDefaults;

pub const VOLCENGINE_AK_PLACEHOLDER: &str = "YOUR_AK_HERE";
pub const VOLCENGINE_SK_PLACEHOLDER: &str = "YOUR_SK_HERE";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config '{path}': {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config '{path}': {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to prepare output folder '{path}': {source}")]
    OutputFolder {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Process-wide configuration, loaded once at startup and shared by
/// reference. Absent fields fall back to the built-in defaults, matching
/// a partially filled-in config document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub image: ImageConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default = "default_styles", deserialize_with = "deserialize_styles")]
    pub styles: BTreeMap<String, StyleParams>,
    #[serde(skip)]
    pub install_root: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub unsplash_access_key: String,
    pub pexels_api_key: String,
    pub pixabay_api_key: String,
    pub together_api_key: String,
    pub volcengine: VolcengineConfig,
    pub timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            unsplash_access_key: String::new(),
            pexels_api_key: String::new(),
            pixabay_api_key: String::new(),
            together_api_key: String::new(),
            volcengine: VolcengineConfig::default(),
            timeout_secs: 60,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VolcengineConfig {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub region: String,
}

impl Default for VolcengineConfig {
    fn default() -> Self {
        Self {
            access_key_id: String::from(VOLCENGINE_AK_PLACEHOLDER),
            secret_access_key: String::from(VOLCENGINE_SK_PLACEHOLDER),
            region: String::from("cn-beijing"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub name: String,
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            name: String::from("pictor"),
            host: String::from("0.0.0.0"),
            port: 5173,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageConfig {
    pub max_results: u32,
    pub default_width: u32,
    pub default_height: u32,
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            max_results: 20,
            default_width: 512,
            default_height: 512,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub base_folder: String,
    pub default_extension: String,
    pub allowed_extensions: Vec<String>,
    pub watermark_font_path: Option<String>,
    pub watermark_font_size: u32,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            base_folder: String::from("generated_images"),
            default_extension: String::from(".png"),
            allowed_extensions: vec![
                String::from(".png"),
                String::from(".jpg"),
                String::from(".jpeg"),
                String::from(".svg"),
                String::from(".webp"),
            ],
            watermark_font_path: None,
            watermark_font_size: 20,
        }
    }
}

/// Vendor identifiers for one named style. `sub_req_key` selects a variant
/// of the primary model where the vendor splits one request key into
/// several sub-styles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StyleParams {
    pub req_key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sub_req_key: Option<String>,
}

impl StyleParams {
    fn primary(req_key: &str) -> Self {
        Self {
            req_key: String::from(req_key),
            sub_req_key: None,
        }
    }

    fn with_sub(req_key: &str, sub_req_key: &str) -> Self {
        Self {
            req_key: String::from(req_key),
            sub_req_key: Some(String::from(sub_req_key)),
        }
    }
}

/// Accepted document forms for one style entry. Older config documents map
/// a label straight to the request-key string; both forms normalize into
/// `StyleParams` at load time.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum StyleEntrySpec {
    Key(String),
    Params {
        req_key: String,
        #[serde(default)]
        sub_req_key: Option<String>,
    },
}

fn deserialize_styles<'de, D>(deserializer: D) -> Result<BTreeMap<String, StyleParams>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = BTreeMap::<String, StyleEntrySpec>::deserialize(deserializer)?;
    Ok(raw
        .into_iter()
        .map(|(name, spec)| {
            let params = match spec {
                StyleEntrySpec::Key(req_key) => StyleParams {
                    req_key,
                    sub_req_key: None,
                },
                StyleEntrySpec::Params {
                    req_key,
                    sub_req_key,
                } => StyleParams {
                    req_key,
                    sub_req_key,
                },
            };
            (name, params)
        })
        .collect())
}

fn default_styles() -> BTreeMap<String, StyleParams> {
    let mut styles = BTreeMap::new();
    styles.insert(String::from("anime"), StyleParams::primary("img2img_cartoon_style"));
    styles.insert(
        String::from("ink-wash"),
        StyleParams::with_sub("img2img_pretty_style", "img2img_pretty_style_ink"),
    );
    styles.insert(String::from("comic"), StyleParams::primary("img2img_comic_style"));
    styles.insert(String::from("general"), StyleParams::primary("img2img_general_style"));
    styles.insert(String::from("ghibli"), StyleParams::primary("img2img_ghibli_style"));
    styles.insert(String::from("3d-cartoon"), StyleParams::primary("img2img_disney_3d_style"));
    styles.insert(String::from("photoreal"), StyleParams::primary("img2img_real_mix_style"));
    styles.insert(String::from("pastel"), StyleParams::primary("img2img_pastel_boys_style"));
    styles.insert(String::from("makoto"), StyleParams::primary("img2img_makoto_style"));
    styles.insert(String::from("princess"), StyleParams::primary("img2img_rev_animated_style"));
    styles.insert(String::from("dreamy"), StyleParams::primary("img2img_blueline_style"));
    styles.insert(String::from("water-ink"), StyleParams::primary("img2img_water_ink_style"));
    styles.insert(String::from("new-monet"), StyleParams::primary("i2i_ai_create_monet"));
    styles.insert(String::from("watercolor"), StyleParams::primary("img2img_water_paint_style"));
    styles.insert(
        String::from("monet-garden"),
        StyleParams::with_sub("img2img_comic_style", "img2img_comic_style_monet"),
    );
    styles.insert(
        String::from("american-comic"),
        StyleParams::with_sub("img2img_comic_style", "img2img_comic_style_marvel"),
    );
    styles.insert(
        String::from("cyber-mech"),
        StyleParams::with_sub("img2img_comic_style", "img2img_comic_style_future"),
    );
    styles.insert(String::from("korean-comic"), StyleParams::primary("img2img_exquisite_style"));
    styles.insert(
        String::from("romantic-light"),
        StyleParams::with_sub("img2img_pretty_style", "img2img_pretty_style_light"),
    );
    styles.insert(String::from("ceramic-doll"), StyleParams::primary("img2img_ceramics_style"));
    styles.insert(String::from("chinese-red"), StyleParams::primary("img2img_chinese_style"));
    styles.insert(
        String::from("clay"),
        StyleParams::with_sub("img2img_clay_style", "img2img_clay_style_3d"),
    );
    styles.insert(
        String::from("plush-doll"),
        StyleParams::with_sub("img2img_clay_style", "img2img_clay_style_bubble"),
    );
    styles.insert(
        String::from("3d-game"),
        StyleParams::with_sub("img2img_3d_style", "img2img_3d_style_era"),
    );
    styles.insert(
        String::from("animated-movie"),
        StyleParams::with_sub("img2img_3d_style", "img2img_3d_style_movie"),
    );
    styles.insert(
        String::from("toy-doll"),
        StyleParams::with_sub("img2img_3d_style", "img2img_3d_style_doll"),
    );
    styles
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api: ApiConfig::default(),
            server: ServerConfig::default(),
            image: ImageConfig::default(),
            output: OutputConfig::default(),
            styles: default_styles(),
            install_root: PathBuf::new(),
        }
    }
}

impl AppConfig {
    /// Load the configuration document, or write the built-in defaults to
    /// disk when no document exists yet. The output base folder is resolved
    /// to an absolute path and created before the config is handed out.
    pub fn load_or_create(path: &Path, install_root: &Path) -> Result<Self, ConfigError> {
        let mut config = if path.is_file() {
            let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
                path: path.display().to_string(),
                source,
            })?;
            let parsed: AppConfig =
                serde_json::from_str(raw.as_str()).map_err(|source| ConfigError::Parse {
                    path: path.display().to_string(),
                    source,
                })?;
            info!(path = %path.display(), "loaded configuration");
            parsed
        } else {
            let defaults = AppConfig::default();
            match serde_json::to_string_pretty(&defaults) {
                Ok(rendered) => match fs::write(path, rendered) {
                    Ok(()) => info!(
                        path = %path.display(),
                        "config document missing, wrote defaults. Fill in your API keys"
                    ),
                    Err(error) => warn!(
                        path = %path.display(),
                        %error,
                        "config document missing and defaults could not be written"
                    ),
                },
                Err(error) => warn!(%error, "default config could not be rendered"),
            }
            defaults
        };

        config.install_root = install_root.to_path_buf();

        let base = PathBuf::from(config.output.base_folder.as_str());
        let base_abs = if base.is_absolute() {
            base
        } else {
            install_root.join(base)
        };
        fs::create_dir_all(base_abs.as_path()).map_err(|source| ConfigError::OutputFolder {
            path: base_abs.display().to_string(),
            source,
        })?;
        config.output.base_folder = base_abs.display().to_string();

        config.warn_on_placeholder_credentials();
        Ok(config)
    }

    fn warn_on_placeholder_credentials(&self) {
        let volc = &self.api.volcengine;
        if volc.access_key_id.is_empty() || volc.access_key_id == VOLCENGINE_AK_PLACEHOLDER {
            warn!("volcengine access_key_id is not configured, style transfer will be unavailable");
        }
        if volc.secret_access_key.is_empty() || volc.secret_access_key == VOLCENGINE_SK_PLACEHOLDER
        {
            warn!("volcengine secret_access_key is not configured, style transfer will be unavailable");
        }
    }

    pub fn base_output_dir(&self) -> PathBuf {
        PathBuf::from(self.output.base_folder.as_str())
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.api.timeout_secs.max(1))
    }

    pub fn style_params(&self, name: &str) -> Option<&StyleParams> {
        self.styles.get(name)
    }

    pub fn style_names(&self) -> Vec<&str> {
        self.styles.keys().map(String::as_str).collect()
    }

    pub fn watermark_defaults(&self) -> WatermarkDefaults {
        WatermarkDefaults {
            font_path: self
                .output
                .watermark_font_path
                .as_deref()
                .map(|raw| {
                    let candidate = PathBuf::from(raw);
                    if candidate.is_absolute() {
                        candidate
                    } else {
                        self.install_root.join(candidate)
                    }
                }),
            font_size: self.output.watermark_font_size.max(1),
        }
    }
}
