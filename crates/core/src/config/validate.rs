use super::{types::Config, ConfigError};

/// Validate configuration
/// Currently validates:
/// - Encoder binary path is not empty
/// - AAC encoder name is not empty
/// - Header line limit, when set, is not 0
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    let encoder = &config.encoder;

    if encoder.binary_path.as_os_str().is_empty() {
        return Err(ConfigError::ValidationError(
            "encoder.binary_path cannot be empty".to_string(),
        ));
    }

    if encoder.aac_encoder.trim().is_empty() {
        return Err(ConfigError::ValidationError(
            "encoder.aac_encoder cannot be empty".to_string(),
        ));
    }

    if encoder.max_header_lines == Some(0) {
        return Err(ConfigError::ValidationError(
            "encoder.max_header_lines cannot be 0".to_string(),
        ));
    }

    Ok(())
}
