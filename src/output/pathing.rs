use std::fs;
use std::path::PathBuf;

use super::OutputError;
use crate::config::AppConfig;

const MAX_DEDUP_ATTEMPTS: u32 = 100;

/// A resolved, currently-free save destination. The directory exists by the
/// time the caller receives this; the file does not.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavePath {
    pub absolute_path: PathBuf,
    pub directory: PathBuf,
    pub file_name: String,
}

/// Resolve a writable, collision-free destination for `desired_name`.
///
/// A name without an extension gets the configured default appended; a name
/// with an extension outside the allow-list is rejected. When the resolved
/// candidate already exists on disk, `{stem}_{n}{ext}` is tried for
/// n = 1, 2, … up to 100 attempts.
///
/// The existence check and the later write are not atomic: two concurrent
/// calls for the same name in the same directory can resolve to the same
/// path. Callers needing strict exclusivity must serialize per directory or
/// switch the probe to `File::create_new`.
pub fn allocate_save_path(
    config: &AppConfig,
    desired_name: &str,
    target_dir: Option<&str>,
) -> Result<SavePath, OutputError> {
    let directory = resolve_target_dir(config, target_dir);
    fs::create_dir_all(directory.as_path()).map_err(OutputError::Io)?;

    let allowed = &config.output.allowed_extensions;
    let (stem, ext) = split_file_name(desired_name);
    let ext = match ext {
        None => {
            let default_ext = config.output.default_extension.to_ascii_lowercase();
            if default_ext.starts_with('.') {
                default_ext
            } else {
                format!(".{default_ext}")
            }
        }
        Some(ext) => {
            let lowered = ext.to_ascii_lowercase();
            if !allowed.iter().any(|a| a.eq_ignore_ascii_case(lowered.as_str())) {
                return Err(OutputError::InvalidExtension {
                    extension: ext,
                    allowed: allowed.join(", "),
                });
            }
            lowered
        }
    };

    let mut file_name = format!("{stem}{ext}");
    let mut counter = 1u32;
    while directory.join(file_name.as_str()).exists() {
        if counter > MAX_DEDUP_ATTEMPTS {
            return Err(OutputError::TooManyCollisions {
                file_name: format!("{stem}{ext}"),
            });
        }
        file_name = format!("{stem}_{counter}{ext}");
        counter += 1;
    }

    let absolute_path = directory.join(file_name.as_str());
    Ok(SavePath {
        absolute_path,
        directory,
        file_name,
    })
}

fn resolve_target_dir(config: &AppConfig, target_dir: Option<&str>) -> PathBuf {
    match target_dir.map(str::trim).filter(|v| !v.is_empty()) {
        None => config.base_output_dir(),
        Some(dir) => {
            let candidate = PathBuf::from(dir);
            if candidate.is_absolute() {
                candidate
            } else {
                config.install_root.join(candidate)
            }
        }
    }
}

/// Split a file name into stem and extension. The extension, when present,
/// keeps its leading dot; a lone leading dot is part of the stem.
pub(super) fn split_file_name(name: &str) -> (&str, Option<String>) {
    match name.rfind('.') {
        Some(idx) if idx > 0 => (&name[..idx], Some(name[idx..].to_string())),
        _ => (name, None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_config(tag: &str) -> AppConfig {
        let stamp = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("time should be monotonic")
            .as_nanos();
        let root = std::env::temp_dir().join(format!("pictor_pathing_{tag}_{stamp}"));
        fs::create_dir_all(root.as_path()).expect("temp root should exist");
        let mut config = AppConfig::default();
        config.install_root = root.clone();
        config.output.base_folder = root.join("out").display().to_string();
        config
    }

    fn cleanup(config: &AppConfig) {
        let _ = fs::remove_dir_all(config.install_root.as_path());
    }

    #[test]
    fn appends_default_extension_when_name_has_none() {
        let config = temp_config("default_ext");
        let resolved =
            allocate_save_path(&config, "icon", None).expect("allocation should succeed");
        assert_eq!(resolved.file_name, "icon.png");
        assert_eq!(resolved.directory, config.base_output_dir());
        assert_eq!(
            resolved.absolute_path,
            config.base_output_dir().join("icon.png")
        );
        assert!(resolved.directory.is_dir());
        assert!(!resolved.absolute_path.exists());
        cleanup(&config);
    }

    #[test]
    fn rejects_extensions_outside_the_allow_list() {
        let config = temp_config("reject");
        let err = allocate_save_path(&config, "icon.bmp", None)
            .expect_err("bmp should be rejected");
        match err {
            OutputError::InvalidExtension { extension, allowed } => {
                assert_eq!(extension, ".bmp");
                assert!(allowed.contains(".png"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        cleanup(&config);
    }

    #[test]
    fn dedups_past_existing_numbered_siblings() {
        let config = temp_config("dedup");
        let dir = config.base_output_dir();
        fs::create_dir_all(dir.as_path()).expect("output dir should exist");
        for name in ["name.png", "name_1.png", "name_2.png"] {
            fs::write(dir.join(name), b"x").expect("sibling should be written");
        }

        let resolved =
            allocate_save_path(&config, "name.png", None).expect("allocation should succeed");
        assert_eq!(resolved.file_name, "name_3.png");
        cleanup(&config);
    }

    #[test]
    fn fails_after_one_hundred_collisions() {
        let config = temp_config("bound");
        let dir = config.base_output_dir();
        fs::create_dir_all(dir.as_path()).expect("output dir should exist");
        fs::write(dir.join("name.png"), b"x").expect("seed file should be written");
        for n in 1..=100 {
            fs::write(dir.join(format!("name_{n}.png")), b"x")
                .expect("sibling should be written");
        }

        let err = allocate_save_path(&config, "name.png", None)
            .expect_err("exhausted namespace should fail");
        assert!(matches!(err, OutputError::TooManyCollisions { .. }));
        cleanup(&config);
    }

    #[test]
    fn uppercase_extensions_normalize_to_lowercase() {
        let config = temp_config("case");
        let resolved =
            allocate_save_path(&config, "Shot.PNG", None).expect("allocation should succeed");
        assert_eq!(resolved.file_name, "Shot.png");
        cleanup(&config);
    }

    #[test]
    fn relative_target_dir_resolves_under_install_root() {
        let config = temp_config("relative");
        let resolved = allocate_save_path(&config, "icon.png", Some("nested/icons"))
            .expect("allocation should succeed");
        assert_eq!(
            resolved.directory,
            config.install_root.join("nested/icons")
        );
        assert!(resolved.directory.is_dir());
        cleanup(&config);
    }

    #[test]
    fn splits_only_on_the_last_dot() {
        assert_eq!(
            split_file_name("archive.tar.png"),
            ("archive.tar", Some(String::from(".png")))
        );
        assert_eq!(split_file_name("plain"), ("plain", None));
        assert_eq!(split_file_name(".hidden"), (".hidden", None));
    }
}
