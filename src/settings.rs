use std::time::Duration;

use anyhow::{Context, Result};
use config::{Config, Environment};
use serde::Deserialize;

use crate::notion::DEFAULT_API_BASE;

/// Settings read from `NOTION_*` environment variables.
///
/// `NOTION_PAGE_ID` and `NOTION_TOKEN` may be absent; a missing page id means
/// the site renders without content.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    #[serde(default)]
    page_id: Option<String>,
    #[serde(default)]
    token: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_api_base")]
    pub api_base: String,
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_api_base() -> String {
    DEFAULT_API_BASE.to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            page_id: None,
            token: None,
            timeout_secs: default_timeout_secs(),
            api_base: default_api_base(),
        }
    }
}

impl Settings {
    pub fn load() -> Result<Self> {
        Config::builder()
            .add_source(Environment::with_prefix("NOTION"))
            .build()
            .and_then(|c| c.try_deserialize())
            .context("Failed to read NOTION_* settings")
    }

    pub fn page_id(&self) -> Option<&str> {
        non_empty(self.page_id.as_deref())
    }

    pub fn token(&self) -> Option<&str> {
        non_empty(self.token.as_deref())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }
}

fn non_empty(v: Option<&str>) -> Option<&str> {
    v.map(str::trim).filter(|s| !s.is_empty())
}
