//! CLI entry point for swift-auth.

pub mod login;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Swift QR login CLI
#[derive(Parser, Debug)]
#[command(name = "swift-auth", version, about = "Remote QR-code login against the Swift identity provider")]
pub struct Cli {
    /// Config file (defaults to ~/.swift-auth/config.toml when present)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Request a QR code and wait for the phone to approve it
    Login(LoginArgs),
    /// Load and validate configuration without contacting the provider
    CheckConfig,
}

/// Arguments for the `login` subcommand.
#[derive(Parser, Debug)]
pub struct LoginArgs {
    /// Session identifier to correlate the attempt with (random when omitted)
    #[arg(long)]
    pub session: Option<String>,
}
