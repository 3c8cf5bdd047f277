use std::env;
use std::path::PathBuf;

use anyhow::{Context, Result};
use dotenvy::dotenv;
use tracker_core::models::attachment::{AttachmentPolicy, DEFAULT_MAX_ATTACHMENT_BYTES};

pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 20 * 1024 * 1024;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StorageConfig {
    Local { root: PathBuf },
    S3 { endpoint: Option<String>, bucket: String, region: String },
}

/// Process configuration, read once at start-up.
#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    pub bind_addr: String,
    pub storage: StorageConfig,
    pub max_attachment_bytes: u64,
    pub max_upload_bytes: u64,
    pub db_max_connections: u32,
    pub default_currency: String,
}

/// The part of the configuration the service consults per request.
#[derive(Clone, Debug)]
pub struct Settings {
    pub attachment_policy: AttachmentPolicy,
    pub max_upload_bytes: u64,
    pub default_currency: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            attachment_policy: AttachmentPolicy::default(),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            default_currency: "ZMW".to_string(),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv().ok(); // Load .env if present

        let storage = match env::var("STORAGE_BACKEND").unwrap_or_else(|_| "local".to_string()).as_str() {
            "local" => StorageConfig::Local {
                root: env::var("STORAGE_ROOT").unwrap_or_else(|_| "./storage".to_string()).into(),
            },
            "s3" => StorageConfig::S3 {
                endpoint: env::var("S3_ENDPOINT").ok(),
                bucket: env::var("S3_BUCKET").unwrap_or_else(|_| "activity-attachments".to_string()),
                region: env::var("AWS_REGION").unwrap_or_else(|_| "us-east-1".to_string()),
            },
            other => anyhow::bail!("STORAGE_BACKEND must be 'local' or 's3', got '{}'", other),
        };

        Ok(Config {
            database_url: env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite://tracker.db".to_string()),
            bind_addr: env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string()),
            storage,
            max_attachment_bytes: parse_var("MAX_ATTACHMENT_BYTES", DEFAULT_MAX_ATTACHMENT_BYTES)?,
            max_upload_bytes: parse_var("MAX_UPLOAD_BYTES", DEFAULT_MAX_UPLOAD_BYTES)?,
            db_max_connections: parse_var("DB_MAX_CONNECTIONS", 5)?,
            default_currency: env::var("DEFAULT_CURRENCY").unwrap_or_else(|_| "ZMW".to_string()),
        })
    }

    pub fn settings(&self) -> Settings {
        Settings {
            attachment_policy: AttachmentPolicy { max_bytes: self.max_attachment_bytes },
            max_upload_bytes: self.max_upload_bytes,
            default_currency: self.default_currency.clone(),
        }
    }
}

fn parse_var<T>(name: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(name) {
        Ok(raw) => raw.trim().parse().with_context(|| format!("{} must be a number, got '{}'", name, raw)),
        Err(_) => Ok(default),
    }
}
