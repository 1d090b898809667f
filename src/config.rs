//! Application configuration.
//!
//! The API origin comes from the `BOOKSHELF_API_URL` environment variable
//! (a `.env` file is honored), falling back to a compiled-in default. A host
//! persisted by the configuration screen overrides the origin per request at
//! the HTTP client level, not here.

use std::path::PathBuf;

use anyhow::Result;

/// Application name used for data directory paths
const APP_NAME: &str = "bookshelf";

/// Environment variable naming the API origin
const API_URL_VAR: &str = "BOOKSHELF_API_URL";

/// Compiled-in default API origin
const DEFAULT_API_URL: &str = "http://localhost:3000";

#[derive(Debug, Clone)]
pub struct Config {
    /// Default API origin, before any persisted host override
    pub api_url: String,
    /// Directory holding the credential store file
    pub store_dir: PathBuf,
}

impl Config {
    pub fn load() -> Result<Self> {
        // Load .env file if present (silently ignore if not found)
        let _ = dotenvy::dotenv();

        let api_url = resolve_api_url(std::env::var(API_URL_VAR).ok().as_deref());

        let data_dir = dirs::data_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find data directory"))?;

        Ok(Self {
            api_url,
            store_dir: data_dir.join(APP_NAME),
        })
    }
}

/// Pick the configured origin, trimming a trailing slash so path joins
/// stay predictable.
fn resolve_api_url(configured: Option<&str>) -> String {
    match configured {
        Some(url) if !url.trim().is_empty() => url.trim().trim_end_matches('/').to_string(),
        _ => DEFAULT_API_URL.to_string(),
    }
}
