//! Configuration loading for commands.

use std::path::Path;

use anyhow::{Context, Result};
use docsynth_core::Config;

/// Load configuration from `path`, or the platform default, then apply
/// environment overrides.
///
/// An explicit path must exist; the default location may be absent.
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    let config = match path {
        Some(path) => Config::load_from(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => Config::load().context("Failed to load global config")?,
    };
    Ok(config.with_env_overrides())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_explicit_config_file_is_read() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("docsynth.toml");
        fs::write(&path, "[crawl]\nmin_pages = 3\n").unwrap();
        let config = load_config(Some(&path)).unwrap();
        assert_eq!(config.crawl.min_pages, 3);
    }

    #[test]
    fn test_missing_explicit_config_is_an_error() {
        let dir = tempdir().unwrap();
        let err = load_config(Some(&dir.path().join("absent.toml"))).unwrap_err();
        assert!(err.to_string().contains("absent.toml"));
    }
}
