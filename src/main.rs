use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use pictor::api::server::serve;
use pictor::api::style::{run_style_transfer, StyleTransferRequest};
use pictor::config::AppConfig;
use pictor::default_install_root;
use serde_json::json;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let cli_args = std::env::args().skip(1).collect::<Vec<_>>();
    if matches!(cli_args.first().map(String::as_str), Some("style-transfer")) {
        run_style_transfer_cli(cli_args.into_iter().skip(1).collect::<Vec<_>>())?;
        return Ok(());
    }

    let install_root = default_install_root();
    let config = Arc::new(load_config(install_root.as_path())?);
    let bind = std::env::var("PICTOR_BIND").unwrap_or_else(|_| config.bind_addr());
    let addr: SocketAddr = bind.parse()?;

    serve(addr, config).await?;
    Ok(())
}

fn init_tracing() {
    let env_filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy();

    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .try_init();
}

fn load_config(install_root: &std::path::Path) -> Result<AppConfig, Box<dyn std::error::Error>> {
    let config_path = std::env::var("PICTOR_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| install_root.join("config.json"));
    Ok(AppConfig::load_or_create(
        config_path.as_path(),
        install_root,
    )?)
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct StyleTransferCliArgs {
    image_path: String,
    style_name: String,
    output_name: String,
    output_folder: Option<String>,
    watermark_text: Option<String>,
    watermark_anchor: Option<String>,
    watermark_opacity: Option<u8>,
}

fn parse_style_transfer_cli_args(
    args: &[String],
) -> Result<StyleTransferCliArgs, Box<dyn std::error::Error>> {
    let mut image_path = None::<String>;
    let mut style_name = None::<String>;
    let mut output_name = None::<String>;
    let mut output_folder = None::<String>;
    let mut watermark_text = None::<String>;
    let mut watermark_anchor = None::<String>;
    let mut watermark_opacity = None::<u8>;

    let mut i = 0usize;
    while i < args.len() {
        let flag = args[i].as_str();
        let needs_value = |idx: usize| -> Result<String, Box<dyn std::error::Error>> {
            let Some(value) = args.get(idx + 1) else {
                return Err(std::io::Error::other(format!("Missing value for {flag}")).into());
            };
            Ok(value.clone())
        };

        match flag {
            "--image" => {
                image_path = Some(needs_value(i)?);
                i += 2;
            }
            "--style" => {
                style_name = Some(needs_value(i)?);
                i += 2;
            }
            "--output-name" => {
                output_name = Some(needs_value(i)?);
                i += 2;
            }
            "--output-folder" => {
                output_folder = Some(needs_value(i)?);
                i += 2;
            }
            "--watermark-text" => {
                watermark_text = Some(needs_value(i)?);
                i += 2;
            }
            "--watermark-anchor" => {
                watermark_anchor = Some(needs_value(i)?);
                i += 2;
            }
            "--watermark-opacity" => {
                let raw = needs_value(i)?;
                let parsed = raw.trim().parse::<u8>().map_err(|_| {
                    std::io::Error::other(format!(
                        "--watermark-opacity must be 0-255, got '{raw}'"
                    ))
                })?;
                watermark_opacity = Some(parsed);
                i += 2;
            }
            unknown => {
                return Err(std::io::Error::other(format!(
                    "Unknown argument: {unknown}\n\nUse --help for usage."
                ))
                .into());
            }
        }
    }

    let image_path = image_path
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| std::io::Error::other("Missing required --image"))?;
    let style_name = style_name
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| std::io::Error::other("Missing required --style"))?;
    let output_name = output_name
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| format!("styled_{}.png", style_name.replace(' ', "_")));

    Ok(StyleTransferCliArgs {
        image_path,
        style_name,
        output_name,
        output_folder,
        watermark_text,
        watermark_anchor,
        watermark_opacity,
    })
}

fn run_style_transfer_cli(args: Vec<String>) -> Result<(), Box<dyn std::error::Error>> {
    if args
        .iter()
        .any(|arg| matches!(arg.as_str(), "-h" | "--help"))
    {
        print_style_transfer_usage();
        return Ok(());
    }

    let parsed = parse_style_transfer_cli_args(args.as_slice())?;
    let install_root = default_install_root();
    let config = load_config(install_root.as_path())?;

    let request = StyleTransferRequest {
        input_image_path: parsed.image_path,
        style_name: parsed.style_name,
        file_name: parsed.output_name,
        save_folder: parsed.output_folder,
        watermark_text: parsed.watermark_text,
        watermark_anchor: parsed.watermark_anchor,
        watermark_opacity: parsed.watermark_opacity,
        watermark_font_path: None,
        watermark_font_size: None,
    };

    let envelope = match run_style_transfer(&config, &request) {
        Ok(response) => serde_json::to_value(response)?,
        Err(error) => json!({
            "success": false,
            "error": error.message(),
        }),
    };
    println!("{}", serde_json::to_string_pretty(&envelope)?);
    Ok(())
}

fn print_style_transfer_usage() {
    eprintln!(concat!(
        "Usage:\n",
        "  pictor style-transfer --image PATH --style NAME ",
        "[--output-name NAME] [--output-folder PATH] ",
        "[--watermark-text TEXT] [--watermark-anchor ANCHOR] [--watermark-opacity 0-255]\n\n",
        "Defaults:\n",
        "  --output-name defaults to styled_<style>.png\n",
        "  --output-folder defaults to the configured output base folder\n",
        "  anchors: bottom-right (default), bottom-left, top-left, top-right\n"
    ));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_requires_image_and_style() {
        let err =
            parse_style_transfer_cli_args(&[]).expect_err("image should be required");
        assert!(err.to_string().contains("--image"));

        let err = parse_style_transfer_cli_args(&[
            String::from("--image"),
            String::from("cat.png"),
        ])
        .expect_err("style should be required");
        assert!(err.to_string().contains("--style"));
    }

    #[test]
    fn parse_fills_in_the_default_output_name() {
        let parsed = parse_style_transfer_cli_args(&[
            String::from("--image"),
            String::from("cat.png"),
            String::from("--style"),
            String::from("ink wash"),
        ])
        .expect("parse should succeed");
        assert_eq!(parsed.output_name, "styled_ink_wash.png");
        assert!(parsed.output_folder.is_none());
    }

    #[test]
    fn parse_accepts_watermark_flags() {
        let parsed = parse_style_transfer_cli_args(&[
            String::from("--image"),
            String::from("cat.png"),
            String::from("--style"),
            String::from("anime"),
            String::from("--watermark-text"),
            String::from("pictor"),
            String::from("--watermark-anchor"),
            String::from("top-left"),
            String::from("--watermark-opacity"),
            String::from("200"),
        ])
        .expect("parse should succeed");
        assert_eq!(parsed.watermark_text.as_deref(), Some("pictor"));
        assert_eq!(parsed.watermark_anchor.as_deref(), Some("top-left"));
        assert_eq!(parsed.watermark_opacity, Some(200));
    }

    #[test]
    fn parse_rejects_out_of_range_opacity() {
        let err = parse_style_transfer_cli_args(&[
            String::from("--image"),
            String::from("cat.png"),
            String::from("--style"),
            String::from("anime"),
            String::from("--watermark-opacity"),
            String::from("300"),
        ])
        .expect_err("opacity over 255 should fail");
        assert!(err.to_string().contains("0-255"));
    }

    #[test]
    fn parse_rejects_unknown_flags() {
        let err = parse_style_transfer_cli_args(&[String::from("--bogus")])
            .expect_err("unknown flag should fail");
        assert!(err.to_string().contains("Unknown argument"));
    }
}
