use regex::Regex;
use std::net::SocketAddr;
use std::path::Path;
use thiserror::Error;

use crate::config::models::ServerConfig;
use crate::ports::file_store::validate_path;

#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("Configuration validation failed: {message}")]
    ValidationFailed { message: String },

    #[error("Invalid field '{field}': {message}")]
    InvalidField { field: String, message: String },

    #[error("Invalid listen address: {address} - {reason}")]
    InvalidListenAddress { address: String, reason: String },

    #[error("Invalid pattern in field '{field}': {pattern} - {reason}")]
    InvalidPattern {
        field: String,
        pattern: String,
        reason: String,
    },

    #[error("Directory not found: {path}")]
    DirectoryNotFound { path: String },
}

pub type ValidationResult<T> = Result<T, ValidationError>;

/// Configuration validator with detailed error reporting
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate a complete server configuration, reporting every problem at once
    pub fn validate(config: &ServerConfig) -> ValidationResult<()> {
        let mut errors = Vec::new();

        if let Err(e) = Self::validate_listen_address(&config.listen_addr()) {
            errors.push(e);
        }

        if !Path::new(&config.root).is_dir() {
            errors.push(ValidationError::DirectoryNotFound {
                path: config.root.clone(),
            });
        }

        if let Err(e) = Self::validate_store_path("index", &config.index) {
            errors.push(e);
        }

        if let Some(not_found_file) = &config.not_found_file {
            let trimmed = not_found_file.trim_start_matches('/');
            if let Err(e) = Self::validate_store_path("not_found_file", trimmed) {
                errors.push(e);
            }
        }

        if config.cache_policy.enabled {
            errors.extend(Self::validate_cache_policy(config));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ValidationError::ValidationFailed {
                message: Self::format_multiple_errors(errors),
            })
        }
    }

    fn validate_listen_address(address: &str) -> ValidationResult<()> {
        if address.parse::<SocketAddr>().is_err() {
            return Err(ValidationError::InvalidListenAddress {
                address: address.to_string(),
                reason: "Host must be an IP address (e.g., '127.0.0.1' or '0.0.0.0')".to_string(),
            });
        }
        Ok(())
    }

    fn validate_store_path(field: &str, path: &str) -> ValidationResult<()> {
        validate_path(path).map_err(|e| ValidationError::InvalidField {
            field: field.to_string(),
            message: format!("{e}. Use a relative path such as 'index.html'"),
        })
    }

    fn validate_cache_policy(config: &ServerConfig) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        for prefix in &config.cache_policy.prefixes {
            if !prefix.starts_with('/') {
                errors.push(ValidationError::InvalidField {
                    field: format!("cache_policy prefix: {prefix}"),
                    message: "Prefixes are matched against request paths and must start with '/'"
                        .to_string(),
                });
            }
        }

        for pattern in &config.cache_policy.patterns {
            if let Err(e) = Regex::new(pattern) {
                errors.push(ValidationError::InvalidPattern {
                    field: "cache_policy.patterns".to_string(),
                    pattern: pattern.clone(),
                    reason: e.to_string(),
                });
            }
        }

        errors
    }

    fn format_multiple_errors(errors: Vec<ValidationError>) -> String {
        if errors.len() == 1 {
            return errors[0].to_string();
        }
        let mut message = format!("Found {} configuration errors:", errors.len());
        for (i, error) in errors.iter().enumerate() {
            message.push_str(&format!("\n  {}. {}", i + 1, error));
        }
        message
    }
}
