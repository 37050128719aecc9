//! Shared CLI helpers for workspace tools.

use std::fs;
use std::path::Path;

use serde::de::DeserializeOwned;
use tracing::debug;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::{Error, Result};

/// Installs the global `tracing` subscriber.
///
/// `RUST_LOG` wins when set; otherwise the level is `debug` for verbose runs
/// and `info` for everything else.
pub fn setup_cli_logging(verbose: bool) -> Result<()> {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false))
        .with(filter)
        .try_init()
        .map_err(|e| Error::Config(format!("Failed to initialize logger: {e}")))?;

    Ok(())
}

pub fn load_toml_config<T>(path: &Path) -> Result<T>
where
    T: DeserializeOwned,
{
    let content = fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Failed to read config {}: {e}", path.display())))?;

    debug!("Loading config from {}", path.display());
    toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Failed to parse config {}: {e}", path.display())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GenerationConfig;
    use tempfile::TempDir;

    #[test]
    fn test_load_toml_config() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("gen.toml");
        fs::write(
            &path,
            r#"
seed = 7
output_dir = "lists"

[indexer]
extensions = ["jpg"]
case_sensitive = false
"#,
        )
        .unwrap();

        let config: GenerationConfig = load_toml_config(&path).unwrap();
        assert_eq!(config.seed, Some(7));
        assert_eq!(config.output_dir, std::path::PathBuf::from("lists"));
        assert_eq!(config.indexer.extensions, vec!["jpg".to_string()]);
        assert!(!config.indexer.case_sensitive);
    }

    #[test]
    fn test_load_toml_config_missing_file() {
        let result: Result<GenerationConfig> = load_toml_config(Path::new("/nonexistent/gen.toml"));
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_load_toml_config_bad_syntax() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.toml");
        fs::write(&path, "seed = [unterminated").unwrap();

        let result: Result<GenerationConfig> = load_toml_config(&path);
        assert!(matches!(result, Err(Error::Config(_))));
    }
}
