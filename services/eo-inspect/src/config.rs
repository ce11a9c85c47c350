//! Load configuration for the CLI.

use std::path::Path;

use band_loader::LoadConfig;
use eo_common::{ProductError, ProductResult};
use tracing::info;

/// Configuration from a YAML file when given, from the environment
/// otherwise.
pub fn load_config(path: Option<&Path>) -> ProductResult<LoadConfig> {
    let config = match path {
        Some(path) => {
            info!(path = %path.display(), "Loading configuration file");
            LoadConfig::from_yaml_file(path)?
        }
        None => LoadConfig::from_env(),
    };
    config.validate().map_err(ProductError::InvalidConfig)?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_yaml_config_file() {
        let dir = test_utils::temp_test_dir();
        let path = dir.path().join("eo.yaml");
        fs::write(&path, "elevation_source: /data/dem/srtm_30m.tif\nresampling: cubic\n").unwrap();

        let config = load_config(Some(&path)).unwrap();
        assert_eq!(config.elevation_source.unwrap().location(), "/data/dem/srtm_30m.tif");
    }

    #[test]
    fn test_invalid_yaml_values() {
        let dir = test_utils::temp_test_dir();
        let path = dir.path().join("eo.yaml");
        fs::write(&path, "hillshade:\n  altitude: 100\n").unwrap();

        let err = load_config(Some(&path)).unwrap_err();
        assert_eq!(err.kind(), "InvalidConfig");
    }

    #[test]
    fn test_missing_file() {
        let err = load_config(Some(Path::new("/nonexistent/eo.yaml"))).unwrap_err();
        assert_eq!(err.kind(), "Io");
    }
}
