//! # Token Subcommand
//!
//! Inspects a serialized authorization token (as printed by `amp demo`):
//! parses it, reports the bound subject and amount, and whether the
//! validity window has passed.

use std::io::Read;
use std::path::PathBuf;

use clap::Args;

use amp_core::Timestamp;
use amp_token::AuthorizationToken;

/// Arguments for the token subcommand.
#[derive(Args, Debug)]
pub struct TokenArgs {
    /// Path to a token JSON file; reads stdin when omitted.
    #[arg(long)]
    pub file: Option<PathBuf>,
}

/// Parse and report on a token.
pub fn run(args: TokenArgs) -> anyhow::Result<()> {
    let json = match args.file {
        Some(path) => std::fs::read_to_string(path)?,
        None => {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf)?;
            buf
        }
    };
    let token: AuthorizationToken = serde_json::from_str(&json)?;
    let now = Timestamp::now();
    println!("subject      {}", token.subject);
    println!("issuer       {}", token.issuer);
    println!(
        "bound_amount {} {}",
        token.bound_amount.value(),
        token.bound_amount.currency().as_str()
    );
    println!("issued_at    {}", token.issued_at);
    println!("expires_at   {}", token.expires_at);
    if token.is_expired(&now) {
        println!("status       EXPIRED");
    } else {
        println!(
            "status       VALID ({}s remaining)",
            token.expires_at.secs_since(&now)
        );
    }
    Ok(())
}
