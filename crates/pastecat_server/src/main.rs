//! pastecat server entrypoint.

use pastecat_core::{Config, StoreContext, DEFAULT_PORT, DEFAULT_SITE_URL};
use pastecat_server::{resolve_bind_address, serve_router, spawn_reporter, AppState};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
struct CliFlags {
    help: bool,
}

fn parse_cli_flags(args: &[String]) -> anyhow::Result<CliFlags> {
    let mut flags = CliFlags::default();
    for arg in args.iter().skip(1) {
        match arg.as_str() {
            "--help" | "-h" => flags.help = true,
            value if value.starts_with('-') => {
                anyhow::bail!(
                    "Unknown option: '{}'. Use --help to see supported options.",
                    value
                );
            }
            value => {
                anyhow::bail!(
                    "Unexpected positional argument: '{}'. Use --help to see supported options.",
                    value
                );
            }
        }
    }
    Ok(flags)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "pastecat=info,pastecat_core=info,pastecat_server=info,tower_http=warn".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args: Vec<String> = std::env::args().collect();
    if parse_cli_flags(&args)?.help {
        print_help();
        return Ok(());
    }

    let config = Config::from_env();
    tracing::info!("siteUrl  = {}", config.site_url);
    tracing::info!("backend  = {}", config.backend);
    tracing::info!("dataDir  = {}", config.data_dir);
    tracing::info!("lifeTime = {:?}", config.lifetime);
    tracing::info!("maxSize  = {}", config.max_size);
    tracing::info!("maxNumber = {}", config.max_number);
    tracing::info!("maxStorage = {}", config.max_storage);

    let bind_addr = resolve_bind_address(&config);
    if !bind_addr.ip().is_loopback() {
        tracing::warn!(
            "Binding to non-localhost address: {} - ensure proper security measures are in place",
            bind_addr
        );
    }
    let report_interval = config.report_interval;

    let ctx = tokio::task::spawn_blocking(move || StoreContext::open(config)).await??;
    let state = AppState::new(ctx);
    let reporter = spawn_reporter(state.ctx.clone(), report_interval);

    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    let actual_addr = listener.local_addr().unwrap_or(bind_addr);
    tracing::info!("pastecat listening on http://{}", actual_addr);

    let ctx = state.ctx.clone();
    let serve_result = serve_router(listener, state, shutdown_signal()).await;
    if let Some(reporter) = reporter {
        reporter.abort();
    }
    tracing::info!("Shutting down. {}", ctx.report());
    serve_result?;
    Ok(())
}

fn print_help() {
    println!("pastecat\n");
    println!("Usage: pastecat [OPTIONS]\n");
    println!("Options:");
    println!("  --help               Show this help message");
    println!("\nEnvironment variables:");
    println!(
        "  SITE_URL             URL of the site (default: {})",
        DEFAULT_SITE_URL
    );
    println!("  PORT                 Server port (default: {})", DEFAULT_PORT);
    println!(
        "  BIND                 Override bind address (e.g. 0.0.0.0:{})",
        DEFAULT_PORT
    );
    println!("  ALLOW_PUBLIC_ACCESS  Allow binding to non-loopback addresses");
    println!("  DATA_DIR             Directory to store all the pastes in (default: data)");
    println!("  BACKEND              Storage backend: fs, mmap or mem (default: fs)");
    println!("  LIFETIME             Lifetime of the pastes, 0 to keep forever (default: 12h)");
    println!("  MAX_SIZE             Maximum size of a paste (default: 1M)");
    println!("  MAX_NUMBER           Maximum number of pastes, 0 for no limit (default: 0)");
    println!("  MAX_STORAGE          Maximum storage of all pastes, 0 for no limit (default: 0)");
    println!("  REQUEST_TIMEOUT      Per-request timeout (default: 30s)");
    println!("  REPORT_INTERVAL      Interval between usage reports, 0 to disable (default: 1m)");
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", err);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                tracing::error!("Failed to install SIGTERM handler: {}", err);
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
    tracing::info!("Shutdown signal received");
}
