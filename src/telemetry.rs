//! Logging and metrics bootstrap shared by every tsrelay function.
//!
//! Logs are JSON lines on stdout so CloudWatch can index their fields.
//! `RUST_LOG` takes precedence over the level chosen by the `TRACE` flag.

use crate::{Error, Result};

use opentelemetry::global;
use opentelemetry::KeyValue;
use opentelemetry_sdk::metrics::SdkMeterProvider;
use opentelemetry_sdk::Resource;
use tracing::info;
use tracing_subscriber::EnvFilter;

const LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Resource description of the running function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelemetryConfig {
    pub service_name: String,
    /// Lambda function name, when running inside Lambda
    pub function_name: Option<String>,
    pub function_version: Option<String>,
    pub region: Option<String>,
    /// Extra `key=value` pairs from `OTEL_RESOURCE_ATTRIBUTES`
    pub extra_attributes: Vec<(String, String)>,
}

impl TelemetryConfig {
    pub fn from_env(default_service_name: &str) -> Result<Self> {
        Self::from_lookup(default_service_name, |name| std::env::var(name).ok())
    }

    /// Build the configuration from an arbitrary variable lookup.
    pub fn from_lookup<F>(default_service_name: &str, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let service_name = match lookup("OTEL_SERVICE_NAME") {
            Some(raw) if raw.trim().is_empty() => {
                return Err(Error::Config("OTEL_SERVICE_NAME cannot be empty".to_string()))
            }
            Some(raw) => raw.trim().to_string(),
            None => default_service_name.to_string(),
        };

        let extra_attributes = match lookup("OTEL_RESOURCE_ATTRIBUTES") {
            Some(raw) => parse_resource_attributes(&raw)?,
            None => Vec::new(),
        };

        Ok(Self {
            service_name,
            function_name: non_empty("AWS_LAMBDA_FUNCTION_NAME"),
            function_version: non_empty("AWS_LAMBDA_FUNCTION_VERSION"),
            region: non_empty("AWS_REGION"),
            extra_attributes,
        })
    }

    /// Resource attributes, with the fixed keys overriding extra pairs.
    pub fn resource_attributes(&self) -> Vec<KeyValue> {
        let mut attributes: Vec<KeyValue> = self
            .extra_attributes
            .iter()
            .filter(|(k, _)| !matches!(k.as_str(), "service.name" | "faas.name"))
            .map(|(k, v)| KeyValue::new(k.clone(), v.clone()))
            .collect();
        attributes.push(KeyValue::new("service.name", self.service_name.clone()));
        attributes.push(KeyValue::new("service.namespace", "tsrelay"));
        if let Some(name) = &self.function_name {
            attributes.push(KeyValue::new("faas.name", name.clone()));
        }
        if let Some(version) = &self.function_version {
            attributes.push(KeyValue::new("faas.version", version.clone()));
        }
        if let Some(region) = &self.region {
            attributes.push(KeyValue::new("cloud.region", region.clone()));
        }
        attributes
    }
}

/// Keeps the meter provider alive until the function exits.
pub struct Telemetry {
    config: TelemetryConfig,
    meter_provider: SdkMeterProvider,
}

impl Telemetry {
    /// Install the JSON log subscriber and the global meter provider.
    pub fn init_for_component(default_service_name: &str, log_level: &str) -> Result<Self> {
        let config = TelemetryConfig::from_env(default_service_name)?;
        let filter = log_filter(log_level, std::env::var("RUST_LOG").ok().as_deref())?;

        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(false)
            .with_current_span(false)
            .try_init()
            .map_err(|e| Error::Config(format!("failed to initialize log subscriber: {e}")))?;

        let resource = Resource::default().merge(&Resource::new(config.resource_attributes()));
        let meter_provider = SdkMeterProvider::builder().with_resource(resource).build();
        global::set_meter_provider(meter_provider.clone());

        info!(
            service_name = %config.service_name,
            function_name = config.function_name.as_deref().unwrap_or("local"),
            log_level,
            "Telemetry initialized"
        );

        Ok(Self {
            config,
            meter_provider,
        })
    }

    pub fn config(&self) -> &TelemetryConfig {
        &self.config
    }
}

impl Drop for Telemetry {
    fn drop(&mut self) {
        let _ = self.meter_provider.shutdown();
    }
}

/// Log filter from `RUST_LOG` if set, else from `level`.
fn log_filter(level: &str, rust_log: Option<&str>) -> Result<EnvFilter> {
    if let Some(directives) = rust_log.filter(|d| !d.trim().is_empty()) {
        return EnvFilter::try_new(directives)
            .map_err(|e| Error::Config(format!("invalid RUST_LOG '{directives}': {e}")));
    }
    let level = level.trim().to_ascii_lowercase();
    if !LEVELS.contains(&level.as_str()) {
        return Err(Error::Config(format!(
            "invalid log level '{level}', expected one of {LEVELS:?}"
        )));
    }
    EnvFilter::try_new(&level).map_err(|e| Error::Config(e.to_string()))
}

fn parse_resource_attributes(raw: &str) -> Result<Vec<(String, String)>> {
    raw.split(',')
        .map(str::trim)
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            let (key, value) = pair.split_once('=').ok_or_else(|| {
                Error::Config(format!(
                    "OTEL_RESOURCE_ATTRIBUTES entry '{pair}' is invalid, expected key=value"
                ))
            })?;
            let key = key.trim();
            if key.is_empty() {
                return Err(Error::Config(
                    "OTEL_RESOURCE_ATTRIBUTES contains an empty attribute key".to_string(),
                ));
            }
            Ok((key.to_string(), value.trim().to_string()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_config_reads_lambda_environment() {
        let config = TelemetryConfig::from_lookup(
            "tsrelay-exporter",
            lookup(&[
                ("AWS_LAMBDA_FUNCTION_NAME", "prod-exporter"),
                ("AWS_REGION", "eu-west-1"),
                ("OTEL_RESOURCE_ATTRIBUTES", "team=iot, faas.name=spoofed"),
            ]),
        )
        .unwrap();
        assert_eq!(config.service_name, "tsrelay-exporter");
        assert_eq!(config.function_name.as_deref(), Some("prod-exporter"));

        let attributes = config.resource_attributes();
        let faas: Vec<_> = attributes
            .iter()
            .filter(|kv| kv.key.as_str() == "faas.name")
            .collect();
        assert_eq!(faas.len(), 1);
        assert_eq!(faas[0].value.as_str(), "prod-exporter");
        assert!(attributes.iter().any(|kv| kv.key.as_str() == "team"));
    }

    #[test]
    fn test_empty_service_name_is_rejected() {
        let err = TelemetryConfig::from_lookup("x", lookup(&[("OTEL_SERVICE_NAME", " ")]))
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_parse_resource_attributes() {
        let attrs = parse_resource_attributes("deployment.environment=prod, team=iot,").unwrap();
        assert_eq!(
            attrs,
            vec![
                ("deployment.environment".to_string(), "prod".to_string()),
                ("team".to_string(), "iot".to_string())
            ]
        );
        assert!(parse_resource_attributes("broken").is_err());
        assert!(parse_resource_attributes("=value").is_err());
    }

    #[test]
    fn test_log_filter() {
        assert!(log_filter("DEBUG", None).is_ok());
        assert!(log_filter("verbose", None).is_err());
        // RUST_LOG wins over the flag-derived level
        assert!(log_filter("verbose", Some("tsrelay=trace")).is_ok());
        assert!(log_filter("info", Some("  ")).is_ok());
    }
}
