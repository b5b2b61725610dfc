// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::{process, sync::Arc, time::Duration};

use relational_auth_gateway::{
    api::router,
    auth::{KeySetCache, TokenValidator},
    config::{GatewayConfig, LogFormat, DEFAULT_LOG_FILTER},
    providers::CognitoClient,
    state::{AppState, AuthConfig},
};
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Upper bound on a single identity provider call.
const PROVIDER_TIMEOUT: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() {
    let config = match GatewayConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Invalid configuration: {e}");
            process::exit(1);
        }
    };

    init_tracing(config.log_format);

    if let Err(e) = run(config).await {
        error!(error = %e, "Auth gateway stopped");
        process::exit(1);
    }
}

fn init_tracing(format: LogFormat) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Json => registry.with(fmt::layer().json()).init(),
        LogFormat::Pretty => registry.with(fmt::layer()).init(),
    }
}

async fn run(config: GatewayConfig) -> Result<(), Box<dyn std::error::Error>> {
    let http = reqwest::Client::builder().timeout(PROVIDER_TIMEOUT).build()?;

    let keys = KeySetCache::over_http(http.clone())
        .with_cache_ttl(config.jwks_cache_ttl)
        .with_min_refresh_interval(config.jwks_min_refresh_interval)
        .with_fetch_timeout(config.jwks_fetch_timeout);
    let validator = TokenValidator::new(Arc::new(keys))
        .with_client_id(&config.client_id)
        .with_leeway(config.leeway_secs);

    let pool = config.user_pool();
    match validator.key_cache().ensure_loaded(&pool).await {
        Ok(()) => info!(%pool, "JWKS loaded"),
        // Not fatal: the readiness probe reports it and requests retry the fetch.
        Err(e) => warn!(%pool, error = %e, "JWKS not available at startup"),
    }

    let mut provider = CognitoClient::new(&config.region, &config.client_id, http);
    if let Some(endpoint) = &config.cognito_endpoint {
        provider = provider.with_endpoint(endpoint);
    }
    if let Some(secret) = &config.client_secret {
        provider = provider.with_client_secret(secret);
    }

    let state = AppState::new(
        AuthConfig {
            validator: Arc::new(validator),
            pool,
        },
        Arc::new(provider),
    );
    let app = router(state, config.is_dev);

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    info!(addr = %config.bind_addr, dev = config.is_dev, "Auth gateway listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Auth gateway shut down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
