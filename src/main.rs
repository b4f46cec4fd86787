use std::{path::Path, sync::Arc};

use clap::Parser;
use color_eyre::{
    Result,
    eyre::{WrapErr, eyre},
};
use gantry::{
    adapters::EchoForwarder,
    config::{self, StoreValidator},
    core::RouteResolver,
    server::ConnectionServer,
    tracing_setup,
};
use tokio::net::TcpListener;

#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    #[clap(subcommand)]
    command: Option<Commands>,

    #[clap(short, long, default_value = "config.txt")]
    config: String,
}

#[derive(Parser, Debug)]
enum Commands {
    /// Validate configuration file
    Validate {
        /// Configuration file to validate
        #[clap(short, long, default_value = "config.txt")]
        config: String,
    },
    /// Initialize a new configuration file
    Init {
        /// Output path for the new config file
        #[clap(short, long, default_value = "config.txt")]
        config: String,
    },
    /// Start the gateway server (default)
    Serve {
        /// Configuration file to use
        #[clap(short, long, default_value = "config.txt")]
        config: String,
    },
}

fn main() -> Result<()> {
    color_eyre::install()?;

    let args = Args::parse();
    let (command, config_path) = match args.command {
        Some(Commands::Validate { config }) => ("validate", config),
        Some(Commands::Init { config }) => ("init", config),
        Some(Commands::Serve { config }) => ("serve", config),
        None => ("serve", args.config),
    };

    match command {
        "validate" => return validate_config_command(&config_path),
        "init" => return init_config_command(&config_path),
        _ => {}
    }

    tracing_setup::init_tracing().map_err(|e| eyre!("Failed to initialize tracing: {}", e))?;

    // One thread runs everything: the runtime's I/O driver is the readiness
    // facility and all connection tasks multiplex on it.
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .wrap_err("Failed to build the reactor runtime")?;

    runtime.block_on(serve(&config_path))
}

async fn serve(config_path: &str) -> Result<()> {
    tracing::info!(config = config_path, "loading gateway configuration");

    let store = config::load(config_path)
        .map(Arc::new)
        .wrap_err_with(|| format!("Failed to load config from {config_path}"))?;

    let warnings =
        StoreValidator::validate(&store).map_err(|e| eyre!("Invalid configuration:\n{e}"))?;
    for warning in &warnings {
        tracing::warn!(%warning, "configuration warning");
    }

    for service in store.services() {
        tracing::info!(
            service = %service.name,
            host = %service.host,
            port = service.port,
            default_exposure = %service.default_exposure,
            routes = service.routes.len(),
            "configured service"
        );
    }

    let bind_addr = store
        .gateway
        .bind_addr()
        .ok_or_else(|| eyre!("GATEWAY_PORT is not set; the gateway cannot listen"))?;

    // Setup failures past this point are fatal: the gateway cannot serve
    // without its listening socket.
    let listener = TcpListener::bind(&bind_addr)
        .await
        .wrap_err_with(|| format!("Failed to bind {bind_addr}"))?;

    let resolver = Arc::new(RouteResolver::new(store));
    let server = Arc::new(ConnectionServer::new(resolver, Arc::new(EchoForwarder)));

    tokio::select! {
        result = server.run(listener) => result.wrap_err("Server error"),
        signal = tokio::signal::ctrl_c() => {
            signal.wrap_err("Failed to listen for shutdown signal")?;
            tracing::info!("Shutdown signal received");
            Ok(())
        }
    }
}

/// Validate configuration file and exit
fn validate_config_command(config_path: &str) -> Result<()> {
    println!("Validating configuration file: {config_path}");

    if !Path::new(config_path).exists() {
        eprintln!("Error: configuration file '{config_path}' not found");
        std::process::exit(1);
    }

    let store = match config::load(config_path) {
        Ok(store) => {
            println!("Configuration parsing: OK");
            store
        }
        Err(e) => {
            eprintln!("Configuration parsing failed:");
            eprintln!("   {e}");
            std::process::exit(1);
        }
    };

    match StoreValidator::validate(&store) {
        Ok(warnings) => {
            println!("Configuration validation: OK");
            for warning in &warnings {
                println!("   warning: {warning}");
            }
            println!();
            println!("Configuration summary:");
            if let Some(addr) = store.gateway.bind_addr() {
                println!("   - Listen address: {addr}");
            } else {
                println!("   - Listen address: (GATEWAY_PORT not set)");
            }
            println!("   - Services: {}", store.service_count());
            println!("   - Keep-alive: {}", store.gateway.keep_alive);
            Ok(())
        }
        Err(e) => {
            eprintln!("Configuration validation failed:");
            eprintln!("{e}");
            println!();
            println!("Common fixes:");
            println!("   - Give every service a HOST and a positive PORT");
            println!("   - Start route PATH values with '/'");
            println!("   - Use PUBLIC, PRIVATE or PROTECTED for exposure levels");
            std::process::exit(1);
        }
    }
}

/// Initialize a new configuration file
fn init_config_command(config_path: &str) -> Result<()> {
    let path = Path::new(config_path);
    if path.exists() {
        eprintln!("Error: configuration file '{config_path}' already exists");
        std::process::exit(1);
    }

    let default_config = r#"# Gantry gateway configuration

# Gateway-level settings come before the first section.
GATEWAY_PORT=8080
GATEWAY_HOST=0.0.0.0
# KEEP-ALIVE=true
# IDLE-TIMEOUT=30s

# One section per backend service.
[order-service]
HOST=127.0.0.1
PORT=5002
DEFAULT-EXPOSURE=PUBLIC
DEFAULT-AUTH=false

# Per-route overrides. A route is committed once PATH and METHOD are both
# set, so put EXPOSURE/AUTH lines first.
[order-service.routes]
EXPOSURE=PRIVATE
AUTH=true
PATH=/orders/:id
METHOD=GET
"#;

    std::fs::write(path, default_config).wrap_err("Failed to write config file")?;
    println!("Created default configuration at: {config_path}");
    println!("   Run 'gantry serve --config {config_path}' to start the gateway");
    Ok(())
}
