//! Fasty server binary.
//!
//! ```text
//! fasty [--config <path>] [--bind <addr>] [--check]
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;

use fasty::config::watcher::{apply_updates, ConfigWatcher};
use fasty::config::{load_config, shared, Config};
use fasty::http::middleware::register_builtins;
use fasty::lifecycle::{shutdown_signal, Housekeeper};
use fasty::observability::{logging, metrics};
use fasty::{App, Controller, ControllerRegistry, HttpServer, MiddlewareRegistry, RequestContext, Response, Shutdown};

#[derive(Debug, Parser)]
#[command(name = "fasty", version, about = "Minimal HTTP request core")]
struct Cli {
    /// Configuration file.
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Override `server.bind_address`.
    #[arg(short, long)]
    bind: Option<String>,

    /// Load and validate the configuration, then exit.
    #[arg(long)]
    check: bool,
}

/// Answers the empty route.
struct Welcome;

impl Controller for Welcome {
    fn handle(&self, request: &mut RequestContext, response: &mut Response) -> fasty::Result<()> {
        let method = request.method().unwrap_or("GET");
        response.write(format!(
            "<!doctype html><title>fasty</title><h1>It works</h1><p>{method} request served.</p>"
        ));
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config_exists = cli.config.exists();
    let mut config = if config_exists {
        load_config(&cli.config)?
    } else {
        Config::default()
    };
    if let Some(bind) = &cli.bind {
        config.set_path("server.bind_address", bind.as_str())?;
        config.validate()?;
    }

    logging::init_logging(&config.settings().observability);
    if !config_exists {
        tracing::warn!(path = %cli.config.display(), "Config file not found, using defaults");
    }

    if cli.check {
        tracing::info!(path = %cli.config.display(), "Configuration is valid");
        return Ok(());
    }

    tracing::info!(
        bind_address = %config.settings().server.bind_address,
        request_timeout_secs = config.settings().server.request_timeout_secs,
        global_middleware = ?config.settings().middleware.global,
        "Configuration loaded"
    );

    let observability = config.settings().observability.clone();
    if observability.metrics_enabled {
        match observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr)?,
            Err(e) => tracing::error!(
                metrics_address = %observability.metrics_address,
                error = %e,
                "Failed to parse metrics address"
            ),
        }
    }

    let bind_address = config.settings().server.bind_address.clone();
    let config = shared(config);

    // Hot reload; the watcher stops when this guard drops.
    let _watcher = if config_exists {
        let (watcher, updates) = ConfigWatcher::new(&cli.config);
        tokio::spawn(apply_updates(Arc::clone(&config), updates));
        Some(watcher.run()?)
    } else {
        None
    };

    let mut controllers = ControllerRegistry::new();
    controllers.register("Index", || Welcome);

    let mut middleware = MiddlewareRegistry::new();
    let limiter = register_builtins(&mut middleware, &config);

    let app = Arc::new(App::new(Arc::clone(&config), controllers, middleware));

    let shutdown = Shutdown::new();
    let housekeeper =
        Housekeeper::new(config, Arc::clone(app.sessions())).with_rate_limiter(limiter);
    tokio::spawn(housekeeper.run(shutdown.subscribe()));

    let signal_shutdown = shutdown.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        signal_shutdown.trigger();
    });

    let listener = TcpListener::bind(&bind_address).await?;
    HttpServer::new(app).run(listener, shutdown.subscribe()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
