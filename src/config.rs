//! Catalog configuration, read from a CONL file
//!
//! ```conl
//! ; catalog.conl
//! base_url = https://catalog.example/api
//! catalog_id = nz-classic
//! page_size = 500
//! cache_path = catalog.db
//! placeholder_image_url = /images/stamps/placeholder.png
//! ```
//!
//! Every key is optional. The auth token never lives in the file; it comes
//! from `CATALOG_AUTH_TOKEN`.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::coordinator::CatalogRequest;
use crate::error::{CatalogError, Result};
use crate::normalize::PLACEHOLDER_IMAGE_URL;

pub const DEFAULT_CONFIG_FILE: &str = "catalog.conl";
pub const DEFAULT_CACHE_PATH: &str = "catalog.db";
pub const DEFAULT_BASE_URL: &str = "https://api.stampcatalog.example/v1";
pub const DEFAULT_CATALOG_ID: &str = "default";
pub const DEFAULT_PAGE_SIZE: u32 = 500;
pub const AUTH_TOKEN_ENV: &str = "CATALOG_AUTH_TOKEN";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    pub base_url: String,
    pub catalog_id: String,
    pub page_size: u32,
    pub cache_path: PathBuf,
    /// Image shown for stamps the remote has no image for
    pub placeholder_image_url: String,
    #[serde(skip)]
    pub auth_token: Option<String>,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            catalog_id: DEFAULT_CATALOG_ID.to_string(),
            page_size: DEFAULT_PAGE_SIZE,
            cache_path: PathBuf::from(DEFAULT_CACHE_PATH),
            placeholder_image_url: PLACEHOLDER_IMAGE_URL.to_string(),
            auth_token: None,
        }
    }
}

impl CatalogConfig {
    pub fn from_conl(content: &str) -> Result<Self> {
        let config: CatalogConfig = serde_conl::from_str(content)
            .map_err(|e| CatalogError::Config(format!("invalid CONL: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from `path`; a missing file gives the defaults
    pub fn load(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let content = fs::read_to_string(path)?;
            Self::from_conl(&content)
                .map_err(|e| CatalogError::Config(format!("{}: {}", path.display(), e)))?
        } else {
            Self::default()
        };
        config.auth_token = std::env::var(AUTH_TOKEN_ENV)
            .ok()
            .filter(|token| !token.trim().is_empty());
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.base_url.trim().is_empty() {
            return Err(CatalogError::Config("base_url must not be empty".to_string()));
        }
        if self.catalog_id.trim().is_empty() {
            return Err(CatalogError::Config("catalog_id must not be empty".to_string()));
        }
        if self.page_size == 0 {
            return Err(CatalogError::Config("page_size must be at least 1".to_string()));
        }
        if self.placeholder_image_url.trim().is_empty() {
            return Err(CatalogError::Config(
                "placeholder_image_url must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    pub fn request(&self) -> CatalogRequest {
        CatalogRequest {
            catalog_id: self.catalog_id.clone(),
            page_size: self.page_size,
            auth_token: self.auth_token.clone(),
            placeholder_image_url: self.placeholder_image_url.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = CatalogConfig::default();
        assert_eq!(config.page_size, DEFAULT_PAGE_SIZE);
        assert_eq!(config.cache_path, PathBuf::from("catalog.db"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_conl_overrides_some_keys() {
        let config = CatalogConfig::from_conl("catalog_id = nz-classic\npage_size = 250\n").unwrap();
        assert_eq!(config.catalog_id, "nz-classic");
        assert_eq!(config.page_size, 250);
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
    }

    #[test]
    fn test_placeholder_image_url_from_conl() {
        let config =
            CatalogConfig::from_conl("placeholder_image_url = /static/no-image.svg\n").unwrap();
        assert_eq!(config.placeholder_image_url, "/static/no-image.svg");
        assert_eq!(config.request().placeholder_image_url, "/static/no-image.svg");
        assert_eq!(
            CatalogConfig::default().placeholder_image_url,
            PLACEHOLDER_IMAGE_URL
        );

        let blank = CatalogConfig {
            placeholder_image_url: " ".to_string(),
            ..Default::default()
        };
        assert!(blank.validate().is_err());
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = CatalogConfig::load(&dir.path().join("absent.conl")).unwrap();
        assert_eq!(config.catalog_id, DEFAULT_CATALOG_ID);
    }

    #[test]
    fn test_validate_rejects_zero_page_size() {
        let config = CatalogConfig {
            page_size: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_request_carries_catalog_and_token() {
        let config = CatalogConfig {
            catalog_id: "nz-classic".to_string(),
            auth_token: Some("secret".to_string()),
            ..Default::default()
        };
        let request = config.request();
        assert_eq!(request.catalog_id, "nz-classic");
        assert_eq!(request.page_size, DEFAULT_PAGE_SIZE);
        assert_eq!(request.auth_token.as_deref(), Some("secret"));
    }
}
