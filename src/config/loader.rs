//! Loading a profile spec from YAML

use super::schema::ProfileSpec;
use super::validate::validate_spec;
use crate::error::{Error, Result};
use std::fs;
use std::path::Path;

/// Load and validate a YAML profile spec
pub fn load_spec<P: AsRef<Path>>(config_path: P) -> Result<ProfileSpec> {
    let yaml_content = fs::read_to_string(config_path.as_ref()).map_err(|e| {
        Error::ConfigError(format!(
            "Failed to read config file {}: {e}",
            config_path.as_ref().display()
        ))
    })?;

    let spec = parse_spec(&yaml_content)?;
    validate_spec(&spec).map_err(|e| Error::ConfigError(format!("Invalid config: {e}")))?;
    Ok(spec)
}

/// Parse YAML text without validating it
pub fn parse_spec(yaml: &str) -> Result<ProfileSpec> {
    serde_yaml::from_str(yaml)
        .map_err(|e| Error::ConfigError(format!("Failed to parse YAML config: {e}")))
}
