// src/config/loader.rs

use std::fs;
use std::path::{Path, PathBuf};

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::errors::{GowatchError, Result};

/// Load a configuration file from a given path and return the raw `RawConfigFile`.
///
/// This only performs TOML deserialization; it does **not** perform semantic
/// validation. Use [`load_and_validate`] for that.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawConfigFile> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path).map_err(|e| {
        GowatchError::ConfigError(format!("cannot read config file {:?}: {}", path, e))
    })?;

    let config: RawConfigFile = toml::from_str(&contents)?;

    Ok(config)
}

/// Load a configuration file from path and run validation.
///
/// This is the entry point for the rest of the application:
///
/// - Reads TOML.
/// - Applies defaults (handled by `serde` + `Default` impls).
/// - Checks the default command and every `[command]` override are non-empty
///   and turns the overrides into ordered rules.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<ConfigFile> {
    let raw_config = load_from_path(&path)?;
    let config = ConfigFile::try_from(raw_config)?;
    Ok(config)
}

/// Resolve the configured `root` against the directory holding the config
/// file.
///
/// - Absolute roots are used as-is.
/// - If the config path has a non-empty parent (e.g. "configs/gowatch.toml"),
///   relative roots are joined onto it.
/// - For a bare filename like "gowatch.toml" the root stays relative to the
///   current working directory.
pub fn resolve_root(config_path: &Path, root: &Path) -> PathBuf {
    if root.is_absolute() {
        return root.to_path_buf();
    }

    match config_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.join(root),
        _ => root.to_path_buf(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_root_follows_config_directory() {
        assert_eq!(
            resolve_root(Path::new("configs/gowatch.toml"), Path::new("src")),
            PathBuf::from("configs/src")
        );
        assert_eq!(
            resolve_root(Path::new("gowatch.toml"), Path::new(".")),
            PathBuf::from(".")
        );
    }

    #[test]
    fn missing_file_is_a_config_error() {
        let err = load_and_validate("definitely/not/here/gowatch.toml").unwrap_err();
        assert!(matches!(err, GowatchError::ConfigError(_)));
    }
}
