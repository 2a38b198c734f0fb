use std::{fs, path::Path};

use serde::Deserialize;

use crate::{FlowdeckError, Result};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// backend api config
    pub api: ApiConfig,
    /// agent run stream config
    pub stream: StreamConfig,
    /// canvas layout config
    pub layout: LayoutConfig,
    /// builder autosave config
    pub autosave: AutosaveConfig,
    /// workflow store config
    pub store: StoreConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// backend base url, eg. http://localhost:8000/api
    pub base_url: String,
    /// static access token, usually supplied by a token provider instead
    pub access_token: Option<String>,
    /// request timeout in milliseconds
    pub timeout_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// delay before reopening a dropped stream of a still running agent, in milliseconds
    pub reconnect_delay_ms: u64,
    /// consecutive reconnects before giving up
    pub max_reconnect_attempts: u32,
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq)]
#[serde(default)]
pub struct LayoutConfig {
    /// distance between two depth levels
    pub vertical_spacing: f64,
    /// distance between two siblings of the same level
    pub horizontal_spacing: f64,
    pub origin_x: f64,
    pub origin_y: f64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AutosaveConfig {
    /// quiet period before a pending definition is saved, in milliseconds
    pub debounce_ms: u64,
    /// pending definitions queue size
    pub queue_size: usize,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// store type
    pub store_type: StoreType,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StoreType {
    #[default]
    Mem,
    Api,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000/api".to_string(),
            access_token: None,
            timeout_ms: 30_000,
        }
    }
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            reconnect_delay_ms: 1_000,
            max_reconnect_attempts: 5,
        }
    }
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            vertical_spacing: 120.0,
            horizontal_spacing: 300.0,
            origin_x: 0.0,
            origin_y: 0.0,
        }
    }
}

impl Default for AutosaveConfig {
    fn default() -> Self {
        Self {
            debounce_ms: 1_000,
            queue_size: 64,
        }
    }
}

impl Config {
    pub fn create<T: AsRef<Path>>(path: T) -> Result<Self> {
        let data = fs::read_to_string(path.as_ref()).map_err(|e| FlowdeckError::Config(format!("failed to load config file {:?}: {}", path.as_ref(), e)))?;

        Self::load_from_str(data.as_str())
    }

    pub fn load_from_str(toml_str: &str) -> Result<Self> {
        let config = toml::from_str::<Config>(toml_str)?;
        Ok(config)
    }
}
