//! Process configuration.
//!
//! Parsing the on-disk config file format is a collaborator concern (the
//! CLI/operator own the file format and env-var precedence rules); this
//! module only defines the in-process [`Config`] struct the core builds
//! from, with the defaults a bare invocation would use, and a convenience
//! loader built on the `config` crate layering a TOML file over
//! `ATTESTORE_`-prefixed environment variables.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;

use crate::types::BackendKind;

/// Root configuration for the artifact store process.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub http: HttpConfig,
    pub storage: StorageConfig,
    pub log: LogConfig,
    pub extensions: ExtensionsConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            http: HttpConfig::default(),
            storage: StorageConfig::default(),
            log: LogConfig::default(),
            extensions: ExtensionsConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from an optional TOML file, overridden by
    /// `ATTESTORE_*` environment variables (double underscore separates
    /// nesting, e.g. `ATTESTORE_HTTP__PORT=9000`).
    pub fn load(file: Option<&std::path::Path>) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder()
            .add_source(config::Config::try_from(&Self::default())?);
        if let Some(path) = file {
            builder = builder.add_source(config::File::from(path).required(false));
        }
        builder = builder.add_source(
            config::Environment::with_prefix("ATTESTORE")
                .separator("__")
                .try_parsing(true),
        );
        builder.build()?.try_deserialize()
    }

    /// Bind address derived from `http.address`/`http.port`.
    #[must_use]
    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.http.address, self.http.port)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub address: std::net::IpAddr,
    pub port: u16,
    pub tls: TlsConfig,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            address: std::net::IpAddr::V4(std::net::Ipv4Addr::UNSPECIFIED),
            port: 9000,
            tls: TlsConfig::default(),
        }
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TlsConfig {
    pub enabled: bool,
    pub cert_path: Option<PathBuf>,
    pub key_path: Option<PathBuf>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Filesystem root used by the filesystem backend and as the location
    /// of `metadata.db` (see persisted-state layout).
    pub root_directory: PathBuf,
    /// Reserved — content-addressed dedupe is not implemented.
    pub dedupe: bool,
    /// Reserved — garbage collection of orphaned bytes is not implemented.
    pub gc: bool,
    pub storage_driver: StorageDriverConfig,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root_directory: PathBuf::from("./data"),
            dedupe: false,
            gc: false,
            storage_driver: StorageDriverConfig::default(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageDriverConfig {
    pub name: BackendKind,
    pub region: Option<String>,
    pub bucket: Option<String>,
    pub access_key: Option<String>,
    pub secret_key: Option<String>,
    pub endpoint: Option<String>,
    /// Verify content integrity with a stored sha256 on read, per
    /// `EnableChecksum`.
    pub enable_checksum: bool,
}

impl Default for StorageDriverConfig {
    fn default() -> Self {
        Self {
            name: BackendKind::Filesystem,
            region: None,
            bucket: None,
            access_key: None,
            secret_key: None,
            endpoint: None,
            enable_checksum: true,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub level: String,
    pub output: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            output: "stdout".to_string(),
        }
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtensionsConfig {
    pub s3api: S3ApiConfig,
    pub rbac: RbacConfig,
    pub supplychain: SupplyChainConfig,
    pub metrics: MetricsConfig,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct S3ApiConfig {
    pub enabled: bool,
}

impl Default for S3ApiConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RbacConfig {
    pub enabled: bool,
    pub keycloak: KeycloakConfig,
    pub anonymous_read: bool,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct KeycloakConfig {
    pub url: String,
    pub realm: String,
    pub client_id: String,
    pub client_secret: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct SupplyChainConfig {
    pub signing: SigningConfig,
    pub sbom: SbomConfig,
    pub attestation: AttestationConfig,
    pub private_key_path: Option<PathBuf>,
    pub metadata_db_path: Option<PathBuf>,
}

impl Default for SupplyChainConfig {
    fn default() -> Self {
        Self {
            signing: SigningConfig::default(),
            sbom: SbomConfig::default(),
            attestation: AttestationConfig::default(),
            private_key_path: None,
            metadata_db_path: None,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct SigningConfig {
    pub enabled: bool,
    pub providers: Vec<String>,
    pub verify: bool,
}

impl Default for SigningConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            providers: vec!["self-rooted".to_string()],
            verify: true,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct SbomConfig {
    pub enabled: bool,
    pub formats: Vec<String>,
    pub require: bool,
}

impl Default for SbomConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            formats: vec!["spdx".to_string(), "cyclonedx".to_string()],
            require: false,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct AttestationConfig {
    pub enabled: bool,
    pub types: Vec<String>,
}

impl Default for AttestationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            types: vec![
                "build".to_string(),
                "test".to_string(),
                "deploy".to_string(),
                "scan".to_string(),
                "provenance".to_string(),
            ],
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    pub prometheus: PrometheusConfig,
    pub tracing: TracingExportConfig,
    pub health: HealthConfig,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            prometheus: PrometheusConfig::default(),
            tracing: TracingExportConfig::default(),
            health: HealthConfig::default(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct PrometheusConfig {
    pub enabled: bool,
    pub path: String,
}

impl Default for PrometheusConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: "/metrics".to_string(),
        }
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TracingExportConfig {
    pub enabled: bool,
    pub endpoint: Option<String>,
    pub service_name: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthConfig {
    pub paths: Vec<String>,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            paths: vec![
                "/health".to_string(),
                "/health/ready".to_string(),
                "/health/live".to_string(),
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_bind_to_port_9000() {
        let cfg = Config::default();
        assert_eq!(cfg.bind_addr().port(), 9000);
    }

    #[test]
    fn load_with_no_file_returns_defaults() {
        let cfg = Config::load(None).expect("defaults always load");
        assert_eq!(cfg.storage.storage_driver.name, BackendKind::Filesystem);
    }
}
