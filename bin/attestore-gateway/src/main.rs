//! attestore-gateway — the S3-compatible HTTP front end for the
//! artifact store. Wires the configured storage backend (wrapped in a
//! retrying/circuit-breaking decorator), the embedded metadata store,
//! optional RBAC, and supply-chain signing into one axum [`Router`].

use anyhow::{Context, Result};
use attestore_auth::{AuthState, JwtValidator, PolicyEngine};
use attestore_backend::{azure::AzureBackend, filesystem::FilesystemBackend, gcs::GcsBackend, s3::S3Backend, Backend};
use attestore_common::types::BackendKind;
use attestore_common::Config;
use attestore_meta_store::MetaStore;
use attestore_reliability::{CircuitBreakerConfig, RetryBackend, RetryerConfig};
use attestore_s3::router::AuthLayers;
use attestore_s3::AppState;
use attestore_supplychain::SigningAuthority;
use axum::extract::DefaultBodyLimit;
use clap::Parser;
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[derive(Parser, Debug)]
#[command(name = "attestore-gateway")]
#[command(about = "Self-hosted binary-artifact store with an S3-compatible API")]
#[command(version)]
struct Args {
    /// Configuration file path (TOML). Overridden by `ATTESTORE_*` env vars.
    #[arg(short, long)]
    config: Option<std::path::PathBuf>,

    /// Maximum size, in bytes, accepted for a single (non-multipart) body.
    #[arg(long, default_value_t = 5 * 1024 * 1024 * 1024)]
    max_body_bytes: usize,
}

async fn build_backend(cfg: &attestore_common::config::StorageDriverConfig, root: &std::path::Path) -> Result<Arc<dyn Backend>> {
    let retry_config = RetryerConfig::default();
    let breaker_config = CircuitBreakerConfig::default();

    let backend: Arc<dyn Backend> = match cfg.name {
        BackendKind::Filesystem => {
            let inner = FilesystemBackend::new(root, cfg.enable_checksum);
            Arc::new(RetryBackend::new(inner, retry_config, breaker_config))
        }
        BackendKind::S3 => {
            let container = cfg.bucket.clone().context("storage.storageDriver.bucket is required for the S3 backend")?;
            let inner = S3Backend::new(container, cfg.region.clone(), cfg.endpoint.clone(), cfg.enable_checksum).await?;
            Arc::new(RetryBackend::new(inner, retry_config, breaker_config))
        }
        BackendKind::Azure => {
            let account = cfg.endpoint.clone().context("storage.storageDriver.endpoint (Azure account name) is required")?;
            let container = cfg.bucket.clone().context("storage.storageDriver.bucket is required for the Azure backend")?;
            let access_key = cfg.access_key.clone().context("storage.storageDriver.accessKey is required for the Azure backend")?;
            let inner = AzureBackend::new(account, container, access_key, cfg.enable_checksum)?;
            Arc::new(RetryBackend::new(inner, retry_config, breaker_config))
        }
        BackendKind::Gcs => {
            let bucket = cfg.bucket.clone().context("storage.storageDriver.bucket is required for the GCS backend")?;
            let inner = GcsBackend::new(bucket, cfg.enable_checksum).await?;
            Arc::new(RetryBackend::new(inner, retry_config, breaker_config))
        }
    };
    Ok(backend)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = Config::load(args.config.as_deref()).context("failed to load configuration")?;

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| config.log.level.clone().into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(bind = %config.bind_addr(), backend = ?config.storage.storage_driver.name, "starting attestore-gateway");

    std::fs::create_dir_all(&config.storage.root_directory)
        .with_context(|| format!("failed to create storage root {:?}", config.storage.root_directory))?;

    let backend = build_backend(&config.storage.storage_driver, &config.storage.root_directory).await?;

    let meta_store_path = config
        .extensions
        .supplychain
        .metadata_db_path
        .clone()
        .unwrap_or_else(|| config.storage.root_directory.join("metadata.db"));
    let meta_store = Arc::new(MetaStore::open(&meta_store_path).await.context("failed to open metadata store")?);

    let signing_authority = match &config.extensions.supplychain.private_key_path {
        Some(path) => {
            let pem = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read signing key at {path:?}"))?;
            SigningAuthority::from_pkcs8_pem(&pem)?
        }
        None => {
            info!("no signing key configured, generating an ephemeral one");
            SigningAuthority::generate()?
        }
    };

    let app_state = Arc::new(AppState::new(backend, meta_store.clone(), Arc::new(signing_authority)));

    let auth_layers = if config.extensions.rbac.enabled {
        info!(keycloak = %config.extensions.rbac.keycloak.url, "RBAC is ENABLED");
        let jwt = JwtValidator::new(config.extensions.rbac.keycloak.url.clone(), config.extensions.rbac.keycloak.realm.clone());
        let policy_engine = PolicyEngine::new(config.extensions.rbac.anonymous_read);
        let auth_state = Arc::new(AuthState { jwt, policy_engine, meta_store: meta_store.clone() });
        Some(AuthLayers { state: auth_state })
    } else {
        info!("RBAC is DISABLED, every request runs as anonymous");
        None
    };

    let mut app = attestore_s3::build_router(app_state, auth_layers);

    if config.extensions.metrics.prometheus.enabled {
        let prometheus_handle = PrometheusBuilder::new()
            .set_buckets_for_metric(
                Matcher::Full("artifact_size_bytes".to_string()),
                &attestore_s3::metrics::SIZE_BUCKETS,
            )
            .context("failed to configure artifact_size_bytes buckets")?
            .install_recorder()
            .context("failed to install Prometheus recorder")?;
        let path = config.extensions.metrics.prometheus.path.clone();
        info!(%path, "Prometheus metrics endpoint enabled");
        app = app.route(&path, axum::routing::get(move || async move { prometheus_handle.render() }));
    }

    app = app
        .layer(DefaultBodyLimit::max(args.max_body_bytes))
        .layer(TraceLayer::new_for_http());

    let listener = TcpListener::bind(config.bind_addr()).await?;
    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
            info!("shutting down");
        })
        .await?;

    info!("attestore-gateway shut down gracefully");
    Ok(())
}
