use clap::Parser;
use kirie::config::Config;
use std::path::PathBuf;

/// Kirie - image optimization proxy with edge response caching
#[derive(Parser, Debug)]
#[command(name = "kirie")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.yaml")]
    config: PathBuf,

    /// Run the edge cache tier instead of the transform tier
    #[arg(long)]
    edge: bool,

    /// Test configuration and exit
    #[arg(long)]
    test: bool,
}

#[tokio::main]
async fn main() {
    // Parse command-line arguments
    let args = Args::parse();

    // Load Kirie configuration from file
    let config = Config::from_file(&args.config).unwrap_or_else(|e| {
        eprintln!("Failed to load configuration: {}", e);
        std::process::exit(1);
    });

    // Initialize logging subsystem
    kirie::logging::init_subscriber(config.server.log_json)
        .expect("Failed to initialize logging subsystem");

    tracing::info!(
        config_file = %args.config.display(),
        server_address = %config.server.address,
        server_port = config.server.port,
        allowed_domains = config.upstream.allowed_domains.len(),
        edge_enabled = config.edge.is_some(),
        "Configuration loaded successfully"
    );

    if args.test {
        println!("Configuration OK");
        return;
    }

    let result = if args.edge {
        kirie::server::run_edge(config).await
    } else {
        kirie::server::run_transform(config).await
    };

    if let Err(e) = result {
        tracing::error!(error = %e, "Server exited with error");
        std::process::exit(1);
    }
}
