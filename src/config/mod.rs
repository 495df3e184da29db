// runtablesync/src/config/mod.rs
use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::Path;

use crate::errors::AppError;
use crate::runs::BasecallModels;
use crate::storage::BucketUri;

pub const DEFAULT_CONFIG_PATH: &str = "config.json";
pub const DEFAULT_STORAGE_ENDPOINT: &str = "https://storage.googleapis.com";
pub const DEFAULT_STORAGE_REGION: &str = "auto";
pub const DEFAULT_LISTING_PREFIX: &str = "inputs";
pub const DEFAULT_ENTITY_API_URL: &str = "https://api.firecloud.org/api/";

// Structs for deserializing config.json
#[derive(Debug, Clone, Default, Deserialize)]
pub struct JsonStorageConfig {
    pub endpoint_url: Option<String>,
    pub region: Option<String>,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    pub listing_prefix: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct JsonEntityApiConfig {
    pub base_url: Option<String>,
    pub access_token: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawJsonConfig {
    pub storage: Option<JsonStorageConfig>,
    pub entity_api: Option<JsonEntityApiConfig>,
    /// flow cell → kit → basecaller configuration, layered over the built-in table
    pub basecall_models: Option<HashMap<String, HashMap<String, String>>>,
}

// Application's internal configuration structs
#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub endpoint_url: String,
    pub region: String,
    pub access_key_id: String,
    pub secret_access_key: String,
    pub listing_prefix: String,
}

#[derive(Debug, Clone)]
pub struct EntityApiConfig {
    pub base_url: String,
    pub access_token: String,
}

/// What to synchronise, as given on the command line.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub project: Option<String>,
    pub namespace: String,
    pub workspace: String,
    /// `false` means dry run: payloads are printed, nothing is written.
    pub run: bool,
    pub buckets: Vec<BucketUri>,
    pub sample_set_column: Option<String>,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub storage: StorageConfig,
    pub entity_api: EntityApiConfig,
    pub basecall_models: BasecallModels,
    pub sync: SyncConfig,
}

impl RawJsonConfig {
    /// Reads the config file given on the command line, or `config.json` when
    /// none was given. Only the default file may be missing; everything then
    /// comes from the environment instead.
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        match config_path {
            Some(path) => Self::load_from_json(path),
            None => Self::load_default(Path::new(DEFAULT_CONFIG_PATH)),
        }
    }

    fn load_default(default_path: &Path) -> Result<Self> {
        if !default_path.exists() {
            tracing::info!(path = %default_path.display(), "No config file found, using environment only");
            return Ok(Self::default());
        }
        Self::load_from_json(default_path)
    }

    pub fn load_from_json(config_path: &Path) -> Result<Self> {
        if !config_path.exists() {
            return Err(AppError::Config(format!(
                "config file {} does not exist",
                config_path.display()
            ))
            .into());
        }
        let config_content = fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config file at {}", config_path.display()))?;
        serde_json::from_str(&config_content).with_context(|| {
            format!(
                "Failed to parse JSON from config file at {}",
                config_path.display()
            )
        })
    }
}

/// First non-empty value among the config file entry, the environment
/// variable `env_key`, and `default`.
fn pick(
    from_file: Option<&String>,
    env_key: &str,
    env: &impl Fn(&str) -> Option<String>,
    default: Option<&str>,
) -> Option<String> {
    from_file
        .filter(|s| !s.trim().is_empty())
        .cloned()
        .or_else(|| env(env_key).filter(|s| !s.trim().is_empty()))
        .or_else(|| default.map(str::to_string))
}

fn require(value: Option<String>, what: &str, env_key: &str) -> Result<String> {
    value.ok_or_else(|| {
        AppError::Config(format!(
            "{} must be set in config.json or via the {} environment variable",
            what, env_key
        ))
        .into()
    })
}

impl AppConfig {
    /// Combines the config file, the environment and the command line.
    pub fn resolve(
        raw: RawJsonConfig,
        env: impl Fn(&str) -> Option<String>,
        sync: SyncConfig,
    ) -> Result<Self> {
        let storage_raw = raw.storage.unwrap_or_default();
        let entity_raw = raw.entity_api.unwrap_or_default();

        let storage = StorageConfig {
            endpoint_url: require(
                pick(storage_raw.endpoint_url.as_ref(), "STORAGE_ENDPOINT_URL", &env, Some(DEFAULT_STORAGE_ENDPOINT)),
                "storage.endpoint_url",
                "STORAGE_ENDPOINT_URL",
            )?,
            region: pick(storage_raw.region.as_ref(), "STORAGE_REGION", &env, Some(DEFAULT_STORAGE_REGION))
                .unwrap_or_else(|| DEFAULT_STORAGE_REGION.to_string()),
            access_key_id: require(
                pick(storage_raw.access_key_id.as_ref(), "STORAGE_ACCESS_KEY_ID", &env, None),
                "storage.access_key_id",
                "STORAGE_ACCESS_KEY_ID",
            )?,
            secret_access_key: require(
                pick(storage_raw.secret_access_key.as_ref(), "STORAGE_SECRET_ACCESS_KEY", &env, None),
                "storage.secret_access_key",
                "STORAGE_SECRET_ACCESS_KEY",
            )?,
            listing_prefix: pick(storage_raw.listing_prefix.as_ref(), "STORAGE_LISTING_PREFIX", &env, Some(DEFAULT_LISTING_PREFIX))
                .unwrap_or_else(|| DEFAULT_LISTING_PREFIX.to_string()),
        };

        let entity_api = EntityApiConfig {
            base_url: require(
                pick(entity_raw.base_url.as_ref(), "ENTITY_API_BASE_URL", &env, Some(DEFAULT_ENTITY_API_URL)),
                "entity_api.base_url",
                "ENTITY_API_BASE_URL",
            )?,
            access_token: require(
                pick(entity_raw.access_token.as_ref(), "ENTITY_API_ACCESS_TOKEN", &env, None),
                "entity_api.access_token",
                "ENTITY_API_ACCESS_TOKEN",
            )?,
        };

        let mut basecall_models = BasecallModels::default();
        if let Some(overrides) = &raw.basecall_models {
            basecall_models.extend(overrides);
        }

        if sync.buckets.is_empty() {
            return Err(AppError::Config("at least one bucket must be given".to_string()).into());
        }

        Ok(AppConfig {
            storage,
            entity_api,
            basecall_models,
            sync,
        })
    }
}
