//! Startup orchestration.
//!
//! # Responsibilities
//! - Initialize all subsystems in dependency order
//! - Start background tasks (metrics, credential watcher)
//! - Bind listeners and begin accepting traffic
//!
//! # Design Decisions
//! - Fail fast: any credential or key loading error is fatal
//! - Subsystems initialize in order, not concurrently
//! - Listeners start last (traffic only when ready)

use notify::RecommendedWatcher;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

use crate::config::{AuthConfig, ProxyConfig, StateConfig, TimeoutConfig, UpstreamConfig};
use crate::error::StartupError;
use crate::http::{AppState, HttpServer};
use crate::lifecycle::shutdown::Shutdown;
use crate::lifecycle::signals;
use crate::net::load_tls_config;
use crate::observability::metrics;
use crate::resolver::{BackendResolver, KubeTargetStore, ServiceUrlResolver};
use crate::tls::{
    CredentialWatcher, FileCertBundleFetcher, FileCertFetcher, MutualTlsClientCreator,
    TlsClientManager,
};
use crate::token::JwtTokenValidator;

/// Everything the server needs, built and checked.
pub struct Services {
    pub state: AppState,
    /// Kept alive for as long as the server runs; dropping it stops watching.
    pub watcher: Option<RecommendedWatcher>,
}

/// Token validator from `[auth]`. No key configured means every token is
/// rejected; a configured key that cannot be read is fatal.
pub fn build_validator(auth: &AuthConfig) -> Result<JwtTokenValidator, StartupError> {
    match &auth.public_key_path {
        Some(path) => {
            let pem = std::fs::read(path).map_err(|source| StartupError::VerificationKey {
                path: path.clone(),
                source,
            })?;
            let validator = JwtTokenValidator::from_public_key_pem(&pem, auth.leeway_secs)?;
            tracing::info!(path = %path.display(), "Token verification key loaded");
            Ok(validator)
        }
        None => {
            tracing::warn!("No token verification key configured, all uploads will be rejected");
            Ok(JwtTokenValidator::fail_closed())
        }
    }
}

/// Backend client manager from `[upstream]`. Missing or broken credentials
/// are fatal; there is no unauthenticated fallback.
pub fn build_client_manager(
    upstream: &UpstreamConfig,
    timeouts: &TimeoutConfig,
) -> Result<Arc<TlsClientManager>, StartupError> {
    let (cert, key, bundle) = upstream
        .credential_paths()
        .ok_or(StartupError::MissingCredentials)?;

    let request_timeout = match timeouts.request_secs {
        0 => None,
        secs => Some(Duration::from_secs(secs)),
    };
    let creator = MutualTlsClientCreator::new(
        Arc::new(FileCertFetcher::new(cert, key)),
        Arc::new(FileCertBundleFetcher::new(bundle)),
    )
    .connect_timeout(Duration::from_secs(timeouts.connect_secs))
    .request_timeout(request_timeout);

    Ok(Arc::new(TlsClientManager::new(Arc::new(creator))?))
}

/// Resolver backed by the API server in `[state]`.
pub fn build_resolver(
    state: &StateConfig,
    upstream: &UpstreamConfig,
    timeouts: &TimeoutConfig,
) -> Result<BackendResolver, StartupError> {
    let store = KubeTargetStore::new(state, Duration::from_secs(timeouts.state_secs))?;
    tracing::info!(api_url = %state.api_url, "Target state provider ready");
    Ok(BackendResolver::new(
        Arc::new(store),
        Arc::new(ServiceUrlResolver::from_config(upstream)),
    ))
}

/// Start rotating the backend client on credential changes, if enabled.
pub fn start_credential_watcher(
    upstream: &UpstreamConfig,
    clients: Arc<TlsClientManager>,
) -> Result<Option<RecommendedWatcher>, StartupError> {
    if !upstream.watch_credentials {
        return Ok(None);
    }
    let Some((cert, key, bundle)) = upstream.credential_paths() else {
        return Ok(None);
    };
    let watcher = CredentialWatcher::new(vec![cert, key, bundle], clients).run()?;
    Ok(Some(watcher))
}

/// Build every subsystem the server depends on.
pub fn initialize(config: &ProxyConfig) -> Result<Services, StartupError> {
    let validator = build_validator(&config.auth)?;
    let clients = build_client_manager(&config.upstream, &config.timeouts)?;
    let resolver = build_resolver(&config.state, &config.upstream, &config.timeouts)?;
    let watcher = start_credential_watcher(&config.upstream, clients.clone())?;

    Ok(Services {
        state: AppState::new(
            Arc::new(validator),
            resolver,
            clients,
            config.auth.scheme.as_str(),
        ),
        watcher,
    })
}

/// Start the proxy and serve until a stop signal arrives.
pub async fn run(config: ProxyConfig) -> Result<(), StartupError> {
    if config.observability.metrics_enabled {
        let addr = parse_addr(&config.observability.metrics_address)?;
        metrics::init_metrics(addr);
    }

    let services = initialize(&config)?;
    let _watcher = services.watcher;
    let server = HttpServer::new(services.state);

    let shutdown = Shutdown::new();
    signals::spawn_signal_handler(shutdown.clone());

    let addr = parse_addr(&config.listener.bind_address)?;
    match &config.listener.tls {
        Some(tls) => {
            let rustls =
                load_tls_config(Path::new(&tls.cert_path), Path::new(&tls.key_path)).await?;
            server.run_tls(addr, rustls, shutdown.subscribe()).await?;
        }
        None => {
            let listener = TcpListener::bind(addr).await?;
            server.run(listener, shutdown.subscribe()).await?;
        }
    }

    Ok(())
}

fn parse_addr(addr: &str) -> Result<SocketAddr, StartupError> {
    addr.parse()
        .map_err(|_| StartupError::Address(addr.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tls::client::tests::test_credentials;
    use std::path::PathBuf;

    #[test]
    fn validator_without_key_fails_closed() {
        let validator = build_validator(&AuthConfig::default()).unwrap();
        assert!(!validator.has_key());
    }

    #[test]
    fn unreadable_key_is_fatal() {
        let auth = AuthConfig {
            public_key_path: Some(PathBuf::from("/nonexistent/token.pub")),
            ..AuthConfig::default()
        };
        assert!(matches!(
            build_validator(&auth),
            Err(StartupError::VerificationKey { .. })
        ));
    }

    #[test]
    fn garbage_key_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("token.pub");
        std::fs::write(&path, "not a key").unwrap();
        let auth = AuthConfig {
            public_key_path: Some(path),
            ..AuthConfig::default()
        };
        assert!(matches!(build_validator(&auth), Err(StartupError::Token(_))));
    }

    #[test]
    fn missing_credentials_are_fatal() {
        assert!(matches!(
            build_client_manager(&UpstreamConfig::default(), &TimeoutConfig::default()),
            Err(StartupError::MissingCredentials)
        ));
    }

    #[test]
    fn initializes_from_files() {
        let creds = test_credentials();
        let dir = tempfile::tempdir().unwrap();
        let write = |name: &str, contents: &str| {
            let path = dir.path().join(name);
            std::fs::write(&path, contents).unwrap();
            path
        };

        let mut config = ProxyConfig::default();
        config.auth.public_key_path = Some(write(
            "token.pub",
            include_str!("../../tests/fixtures/token_verify_key.pem"),
        ));
        config.upstream.client_cert_path = Some(write("tls.crt", &creds.cert));
        config.upstream.client_key_path = Some(write("tls.key", &creds.key));
        config.upstream.ca_bundle_path = Some(write("ca.crt", &creds.ca));
        config.upstream.watch_credentials = false;

        let services = initialize(&config).unwrap();
        assert!(services.watcher.is_none());
        assert_eq!(services.state.clients.current().generation(), 1);
        assert_eq!(&*services.state.auth_scheme, "Bearer");
    }

    #[test]
    fn bad_bundle_is_fatal() {
        let creds = test_credentials();
        let dir = tempfile::tempdir().unwrap();
        let cert = dir.path().join("tls.crt");
        let key = dir.path().join("tls.key");
        let ca = dir.path().join("ca.crt");
        std::fs::write(&cert, &creds.cert).unwrap();
        std::fs::write(&key, &creds.key).unwrap();
        std::fs::write(&ca, "").unwrap();

        let upstream = UpstreamConfig {
            client_cert_path: Some(cert),
            client_key_path: Some(key),
            ca_bundle_path: Some(ca),
            ..UpstreamConfig::default()
        };
        assert!(matches!(
            build_client_manager(&upstream, &TimeoutConfig::default()),
            Err(StartupError::Tls(_))
        ));
    }
}
