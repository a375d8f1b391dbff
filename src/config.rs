//! Configuration parsing and component factory
//!
//! Binaries read their settings once at start-up through clap `env`
//! arguments; the parsers here turn raw strings into typed values so no
//! string is re-interpreted later.
//!
//! Environment variables used by the factory:
//! - STORAGE_BACKEND: "s3" (default) or "memory"
//! - S3_REGION: region override for bucket clients (optional)
//! - S3_ENDPOINT: custom S3 endpoint (optional, for MinIO/LocalStack)

use crate::storage::{BucketResolver, MemoryBuckets, S3Buckets, S3Settings};
use crate::{Error, Result};
use std::str::FromStr;
use std::sync::Arc;
use tracing::info;

/// Parse a boolean flag, case-insensitively.
///
/// Accepts `true/t/yes/y/on/1` and `false/f/no/n/off/0`; an empty value is
/// `false`. Anything else is a configuration error.
pub fn parse_flag(raw: &str) -> Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "t" | "yes" | "y" | "on" | "1" => Ok(true),
        "false" | "f" | "no" | "n" | "off" | "0" | "" => Ok(false),
        _ => Err(Error::Config(format!(
            "expected a boolean (true/false/yes/no/1/0), got '{}'",
            raw
        ))),
    }
}

/// Clap value parser wrapping [`parse_flag`].
pub fn flag_arg(raw: &str) -> std::result::Result<bool, String> {
    parse_flag(raw).map_err(|e| e.to_string())
}

/// Log level selected by the `TRACE` flag.
pub fn log_level(trace: bool) -> &'static str {
    if trace {
        "debug"
    } else {
        "info"
    }
}

/// Number of query pages packed into one dump document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockSize(usize);

impl BlockSize {
    pub fn new(pages: usize) -> Result<Self> {
        if pages == 0 {
            return Err(Error::Config("BLOCKSIZE must be larger than 0".to_string()));
        }
        Ok(Self(pages))
    }

    pub fn get(&self) -> usize {
        self.0
    }
}

impl FromStr for BlockSize {
    type Err = Error;

    fn from_str(raw: &str) -> Result<Self> {
        let pages: i64 = raw
            .trim()
            .parse()
            .map_err(|_| Error::Config(format!("BLOCKSIZE must be an integer, got '{}'", raw)))?;
        if pages < 1 {
            return Err(Error::Config(format!(
                "BLOCKSIZE must be larger than 0, got {}",
                pages
            )));
        }
        let pages = usize::try_from(pages)
            .map_err(|_| Error::Config(format!("BLOCKSIZE out of range: {}", pages)))?;
        Self::new(pages)
    }
}

/// Clap value parser for [`BlockSize`].
pub fn block_size_arg(raw: &str) -> std::result::Result<BlockSize, String> {
    raw.parse::<BlockSize>().map_err(|e| e.to_string())
}

/// Where object storage lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Memory,
    S3,
}

impl StorageBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Memory => "memory",
            Self::S3 => "s3",
        }
    }
}

impl FromStr for StorageBackend {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(Self::Memory),
            "s3" | "aws" => Ok(Self::S3),
            other => Err(Error::Config(format!(
                "Unknown STORAGE_BACKEND: {}. Use 'memory' or 's3'",
                other
            ))),
        }
    }
}

pub struct ComponentFactory;

impl ComponentFactory {
    /// Create the bucket resolver from environment
    pub fn create_bucket_resolver() -> Result<Arc<dyn BucketResolver>> {
        let backend: StorageBackend = std::env::var("STORAGE_BACKEND")
            .unwrap_or_else(|_| "s3".to_string())
            .parse()?;

        match backend {
            StorageBackend::Memory => {
                info!("Using in-memory object store (development mode)");
                Ok(Arc::new(MemoryBuckets::new()))
            }
            StorageBackend::S3 => {
                let settings = S3Settings {
                    region: env_non_empty("S3_REGION"),
                    endpoint: env_non_empty("S3_ENDPOINT"),
                };
                info!(
                    region = %settings.region.as_deref().unwrap_or("default"),
                    "Using S3 object store"
                );
                Ok(Arc::new(S3Buckets::new(settings)))
            }
        }
    }

    /// Load the shared AWS configuration (region, credentials) from the
    /// execution environment.
    pub async fn load_aws_config() -> aws_config::SdkConfig {
        aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await
    }
}

fn env_non_empty(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Require a configuration value, naming the variable when it is missing.
pub fn require(name: &str, value: Option<String>) -> Result<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| Error::Config(format!("Environment variable {} missing", name)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_flag_is_case_insensitive() {
        for raw in ["true", "True", "TRUE", "1", "Yes", "YES", "y", "T", " on "] {
            assert!(parse_flag(raw).unwrap(), "{raw} should be true");
        }
        for raw in ["false", "False", "0", "no", "N", "off", ""] {
            assert!(!parse_flag(raw).unwrap(), "{raw} should be false");
        }
    }

    #[test]
    fn test_parse_flag_rejects_garbage() {
        let err = parse_flag("maybe").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert!(flag_arg("2").is_err());
    }

    #[test]
    fn test_block_size_parsing() {
        assert_eq!("4".parse::<BlockSize>().unwrap().get(), 4);
        assert_eq!(" 12 ".parse::<BlockSize>().unwrap().get(), 12);
        assert!(matches!("0".parse::<BlockSize>(), Err(Error::Config(_))));
        assert!(matches!("-3".parse::<BlockSize>(), Err(Error::Config(_))));
        assert!(matches!("ten".parse::<BlockSize>(), Err(Error::Config(_))));
        assert!(matches!("".parse::<BlockSize>(), Err(Error::Config(_))));
        assert!(BlockSize::new(0).is_err());
    }

    #[test]
    fn test_storage_backend_parsing() {
        assert_eq!("S3".parse::<StorageBackend>().unwrap(), StorageBackend::S3);
        assert_eq!(
            "memory".parse::<StorageBackend>().unwrap(),
            StorageBackend::Memory
        );
        assert!("gcs".parse::<StorageBackend>().is_err());
    }

    #[test]
    fn test_require() {
        assert_eq!(require("BUCKET", Some(" b ".into())).unwrap(), "b");
        let err = require("BUCKET", Some("".into())).unwrap_err();
        assert!(err.to_string().contains("BUCKET"));
        assert!(require("BUCKET", None).is_err());
    }

    #[test]
    fn test_log_level() {
        assert_eq!(log_level(true), "debug");
        assert_eq!(log_level(false), "info");
    }
}
