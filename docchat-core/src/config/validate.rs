//! Configuration validation rules.

use super::schema::Config;

/// Validate configuration and return aggregated validation errors.
pub fn validate_config(config: &Config) -> crate::Result<()> {
    let mut errors = Vec::new();

    if config.chat.workspace.trim().is_empty() {
        errors.push("chat.workspace must not be empty".to_string());
    }
    if config.chat.model.trim().is_empty() {
        errors.push("chat.model must not be empty".to_string());
    }
    if config.chat.max_tokens == 0 {
        errors.push("chat.max_tokens must be > 0".to_string());
    }
    if !(0.0..=2.0).contains(&config.chat.temperature) {
        errors.push("chat.temperature must be in [0.0, 2.0]".to_string());
    }

    if config.upload.max_bytes == 0 {
        errors.push("upload.max_bytes must be > 0".to_string());
    }

    if let Some(base) = &config.provider.api_base {
        if !base.trim().is_empty()
            && !base.starts_with("http://")
            && !base.starts_with("https://")
        {
            errors.push("provider.api_base must be an http(s) URL".to_string());
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(crate::Error::Validation(errors.join("; ")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_accepts_defaults() {
        let config = Config::default();
        validate_config(&config).unwrap();
    }

    #[test]
    fn test_validate_rejects_zero_max_tokens() {
        let mut config = Config::default();
        config.chat.max_tokens = 0;

        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("chat.max_tokens"));
    }

    #[test]
    fn test_validate_rejects_bad_api_base() {
        let mut config = Config::default();
        config.provider.api_base = Some("ftp://example.com".to_string());

        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("provider.api_base"));
    }
}
