// src/config.rs

//! Startup loading: configuration file and the pinned CA certificate.

use std::fs;
use std::path::Path;

use reqwest::Certificate;

use crate::error::{AppError, Result};
use crate::models::Config;

/// Load, override from the environment and validate the configuration.
///
/// A missing file at the default location falls back to defaults; when the
/// path was given `explicit`ly it has to be readable. A file that exists but
/// does not parse is always an error.
pub fn load_config(path: &Path, explicit: bool) -> Result<Config> {
    let mut config = if path.exists() {
        Config::load(path)
            .map_err(|e| AppError::config(format!("Failed to load {}: {}", path.display(), e)))?
    } else if explicit {
        return Err(AppError::config(format!(
            "Config file not found: {}",
            path.display()
        )));
    } else {
        log::warn!(
            "No config file at {}, using defaults and environment",
            path.display()
        );
        Config::default()
    };

    config.apply_env();
    config.validate()?;
    log::debug!("Configuration: {:?}", config);
    Ok(config)
}

/// Read the CA certificate hub connections are pinned to.
pub fn load_ca_certificate(path: &Path) -> Result<Certificate> {
    if !path.is_file() {
        return Err(AppError::MissingCaCertificate {
            path: path.to_path_buf(),
        });
    }

    let pem = fs::read(path)?;
    let certificate = Certificate::from_pem(&pem)?;
    log::debug!("Loaded CA certificate from {}", path.display());
    Ok(certificate)
}
