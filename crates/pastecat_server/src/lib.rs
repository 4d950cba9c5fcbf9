//! HTTP server wiring for pastecat (routes, middleware and shared state).

/// HTTP error mapping for handlers.
pub mod error;
/// HTTP handlers for the paste endpoints.
pub mod handlers;

pub use error::HttpError;
pub use pastecat_core::{AppError, Config, StoreContext, DEFAULT_PORT};

use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue},
    routing::get,
    Router,
};
use std::future::Future;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use tower_http::{set_header::SetResponseHeaderLayer, timeout::TimeoutLayer, trace::TraceLayer};

/// Room left in the request body for multipart boundaries and part headers.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

/// Shared state passed to HTTP handlers.
#[derive(Clone)]
pub struct AppState {
    pub ctx: Arc<StoreContext>,
}

impl AppState {
    pub fn new(ctx: StoreContext) -> Self {
        Self { ctx: Arc::new(ctx) }
    }
}

/// Create the application router with all routes and middleware.
///
/// # Arguments
/// - `state`: Shared application state.
///
/// # Returns
/// Configured `axum::Router`.
pub fn create_app(state: AppState) -> Router {
    let config = state.ctx.config();
    let body_limit = usize::try_from(config.max_size.as_u64())
        .unwrap_or(usize::MAX)
        .saturating_add(MULTIPART_OVERHEAD);
    let request_timeout = config.request_timeout;

    Router::new()
        .route(
            "/",
            get(handlers::paste::index).post(handlers::paste::create_paste),
        )
        .route("/:id", get(handlers::paste::get_paste))
        .with_state(state)
        .layer(
            tower::ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(TimeoutLayer::new(request_timeout))
                .layer(DefaultBodyLimit::max(body_limit))
                .layer(SetResponseHeaderLayer::overriding(
                    header::X_CONTENT_TYPE_OPTIONS,
                    HeaderValue::from_static("nosniff"),
                )),
        )
}

/// Listener address for `config`.
///
/// `BIND` is either a full socket address or a bare IP that listens on
/// `PORT`. Unparsable values fall back to loopback, and so do public
/// addresses unless `ALLOW_PUBLIC_ACCESS` is set.
pub fn resolve_bind_address(config: &Config) -> SocketAddr {
    let loopback = SocketAddr::from((Ipv4Addr::LOCALHOST, config.port));
    let requested = config
        .bind
        .as_deref()
        .and_then(|raw| parse_bind(raw, config.port))
        .unwrap_or(loopback);

    if requested.ip().is_loopback() || config.allow_public_access {
        return requested;
    }
    tracing::warn!(
        requested = %requested,
        "Public bind needs ALLOW_PUBLIC_ACCESS; listening on loopback instead"
    );
    SocketAddr::from((Ipv4Addr::LOCALHOST, requested.port()))
}

fn parse_bind(raw: &str, port: u16) -> Option<SocketAddr> {
    let raw = raw.trim();
    let parsed = raw
        .parse::<SocketAddr>()
        .or_else(|_| raw.parse::<IpAddr>().map(|ip| SocketAddr::new(ip, port)));
    match parsed {
        Ok(addr) => Some(addr),
        Err(err) => {
            tracing::warn!("Ignoring BIND={:?}: {}", raw, err);
            None
        }
    }
}

/// Run the Axum server with graceful shutdown support.
///
/// # Errors
/// Returns any I/O error produced by `axum::serve`.
pub async fn serve_router(
    listener: tokio::net::TcpListener,
    state: AppState,
    shutdown_signal: impl Future<Output = ()> + Send + 'static,
) -> Result<(), std::io::Error> {
    let app = create_app(state);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal)
        .await
}

/// Log the store usage every `interval` until the returned task is aborted.
///
/// # Returns
/// `None` when `interval` is zero and reporting is disabled.
pub fn spawn_reporter(
    ctx: Arc<StoreContext>,
    interval: std::time::Duration,
) -> Option<tokio::task::JoinHandle<()>> {
    if interval.is_zero() {
        return None;
    }
    Some(tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            tracing::info!("{}", ctx.report());
        }
    }))
}

#[cfg(test)]
mod tests {
    use super::resolve_bind_address;
    use pastecat_core::Config;
    use std::net::SocketAddr;

    fn config(bind: Option<&str>, allow_public_access: bool) -> Config {
        Config {
            port: 4040,
            bind: bind.map(str::to_string),
            allow_public_access,
            ..Config::default()
        }
    }

    #[test]
    fn public_bind_needs_opt_in() {
        let wildcard = Some("0.0.0.0:5050");
        assert_eq!(
            resolve_bind_address(&config(wildcard, false)),
            SocketAddr::from(([127, 0, 0, 1], 5050))
        );
        assert_eq!(
            resolve_bind_address(&config(wildcard, true)),
            SocketAddr::from(([0, 0, 0, 0], 5050))
        );
    }

    #[test]
    fn bare_ip_listens_on_port() {
        assert_eq!(
            resolve_bind_address(&config(Some("::1"), false)),
            "[::1]:4040".parse::<SocketAddr>().expect("addr")
        );
        assert_eq!(
            resolve_bind_address(&config(Some(" 10.0.0.7 "), true)),
            SocketAddr::from(([10, 0, 0, 7], 4040))
        );
    }

    #[test]
    fn missing_or_bad_bind_uses_loopback() {
        let loopback = SocketAddr::from(([127, 0, 0, 1], 4040));
        assert_eq!(resolve_bind_address(&config(None, true)), loopback);
        assert_eq!(resolve_bind_address(&config(Some("bad:host"), true)), loopback);
    }
}
