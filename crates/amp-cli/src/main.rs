//! # amp CLI Entry Point
//!
//! Assembles subcommands and dispatches to handler modules.

use clap::Parser;

/// Agent mandate protocol CLI.
///
/// Generates signing keys, drives the authorization flow end to end
/// in-process, and inspects issued authorization tokens.
#[derive(Parser, Debug)]
#[command(name = "amp", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Generate an Ed25519 seed and public key.
    Keygen(amp_cli::keygen::KeygenArgs),
    /// Run the end-to-end authorization demo.
    Demo(amp_cli::demo::DemoArgs),
    /// Inspect a serialized authorization token.
    Token(amp_cli::token::TokenArgs),
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Keygen(args) => amp_cli::keygen::run(args),
        Commands::Demo(args) => amp_cli::demo::run(args),
        Commands::Token(args) => amp_cli::token::run(args),
    }
}
