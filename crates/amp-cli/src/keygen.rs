//! # Keygen Subcommand
//!
//! Generates an Ed25519 seed and its public key for merchant, network,
//! or device-credential registration. The seed is the private material;
//! it is printed once and never stored.

use clap::Args;
use rand::RngCore;
use serde::Serialize;

use amp_crypto::Ed25519KeyPair;

/// Arguments for the keygen subcommand.
#[derive(Args, Debug)]
pub struct KeygenArgs {
    /// Derive deterministically from a 64-char hex seed instead of the
    /// OS CSPRNG (fixtures only — never for production keys).
    #[arg(long)]
    pub seed: Option<String>,
}

#[derive(Serialize)]
struct KeygenOutput {
    seed: String,
    public_key: String,
}

/// Generate (or re-derive) a key pair and print it as JSON.
pub fn run(args: KeygenArgs) -> anyhow::Result<()> {
    let seed_hex = match args.seed {
        Some(seed) => seed,
        None => {
            let mut bytes = [0u8; 32];
            rand::rngs::OsRng.fill_bytes(&mut bytes);
            bytes.iter().map(|b| format!("{b:02x}")).collect()
        }
    };
    let seed_bytes = parse_seed(&seed_hex)?;
    let keypair = Ed25519KeyPair::from_seed(&seed_bytes);
    let output = KeygenOutput {
        seed: seed_hex,
        public_key: keypair.public_key().to_hex(),
    };
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn parse_seed(hex: &str) -> anyhow::Result<[u8; 32]> {
    if hex.len() != 64 {
        anyhow::bail!("seed must be 64 hex characters, got {}", hex.len());
    }
    let mut out = [0u8; 32];
    for (i, byte) in out.iter_mut().enumerate() {
        *byte = u8::from_str_radix(&hex[i * 2..i * 2 + 2], 16)
            .map_err(|e| anyhow::anyhow!("invalid hex in seed: {e}"))?;
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seed_roundtrip_is_deterministic() {
        let seed = parse_seed(&"ab".repeat(32)).unwrap();
        let a = Ed25519KeyPair::from_seed(&seed);
        let b = Ed25519KeyPair::from_seed(&seed);
        assert_eq!(a.public_key(), b.public_key());
    }

    #[test]
    fn malformed_seed_rejected() {
        assert!(parse_seed("abc").is_err());
        assert!(parse_seed(&"zz".repeat(32)).is_err());
    }
}
