// Framework bootstrap for the booking admin service.

use std::io::{self, Result};
use std::net::SocketAddr;
use std::sync::Arc;

use crate::domain::lockout::LockoutGuard;
use crate::domain::normalizer::FieldNormalizer;
use crate::domain::query::QueryCompiler;
use crate::domain::token::TokenCodec;
use crate::frameworks::config::Settings;
use crate::interface_adapters::clients::CloudinaryClient;
use crate::interface_adapters::routes::app;
use crate::interface_adapters::state::AppState;
use crate::use_cases::login::AdminAccount;

fn init_runtime() {
    // Load .env locally; safe to ignore when not present.
    let _ = dotenvy::dotenv();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let json = matches!(std::env::var("LOG_FORMAT").as_deref(), Ok("json"));
    if json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .json()
            .with_current_span(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .compact()
            .init();
    }

    std::panic::set_hook(Box::new(|info| {
        let backtrace = std::backtrace::Backtrace::capture();
        tracing::error!(%info, ?backtrace, "panic");
    }));
}

pub async fn run(listener: tokio::net::TcpListener, settings: Settings) -> Result<()> {
    let address = listener.local_addr()?;
    let state = build_state(settings)?;
    let app = app(state);

    tracing::info!(%address, "listening");

    // Serve app and report errors rather than panicking
    axum::serve(listener, app).await.inspect_err(|e| {
        tracing::error!(error = %e, "server error");
    })
}

pub async fn run_with_config() -> Result<()> {
    init_runtime();

    let settings = Settings::from_env().map_err(|e| {
        tracing::error!(error = %e, "invalid configuration");
        io::Error::other(e)
    })?;

    let address = SocketAddr::from(([0, 0, 0, 0], settings.port));

    // Bind TCP listener with error handling
    let listener = tokio::net::TcpListener::bind(address)
        .await
        .inspect_err(|e| {
            tracing::error!(%address, error = %e, "failed to bind");
        })?;

    run(listener, settings).await
}

fn build_state(settings: Settings) -> Result<AppState> {
    let store = CloudinaryClient::new(settings.store.clone())
        .map_err(|e| io::Error::other(format!("document store client: {e}")))?;
    tracing::debug!(
        api_base = %settings.store.api_base,
        cloud_name = %settings.store.cloud_name,
        resource_type = %settings.store.resource_type,
        "document store client configured"
    );

    let codec = TokenCodec::new(settings.admin.secret.as_bytes());
    let guard = LockoutGuard::new(codec.clone(), settings.lockout);
    let compiler = QueryCompiler::new(
        settings.booking_prefix,
        settings.utc_offset,
        FieldNormalizer::default(),
    );

    Ok(AppState {
        store: Arc::new(store),
        codec,
        guard,
        admin: AdminAccount {
            username: settings.admin.username,
            password: settings.admin.password,
        },
        session_ttl_secs: settings.admin.session_ttl_secs,
        compiler,
    })
}
