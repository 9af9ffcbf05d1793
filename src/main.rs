//! swift-auth binary entry point.

use clap::Parser;
use tracing_subscriber::EnvFilter;

use swift_qr_auth::cli::{login, Cli, Commands};

#[tokio::main]
async fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();

    let cli = Cli::parse();
    let config_path = cli.config.as_deref();

    let result = match cli.command {
        Commands::Login(args) => login::handle_login(config_path, args.session).await,
        Commands::CheckConfig => login::handle_check_config(config_path),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
