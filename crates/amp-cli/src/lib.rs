//! # amp-cli — Mandate Protocol Command-Line Interface
//!
//! ## Subcommands
//!
//! - `keygen` — Ed25519 seed and public key generation
//! - `demo` — drive the full authorization flow in-process
//! - `token` — inspect a serialized authorization token
//!
//! ## Crate Policy
//!
//! - CLI construction (argument parsing) is separated from business logic.
//! - Handler functions delegate to domain crates — no protocol logic here.

pub mod demo;
pub mod keygen;
pub mod token;
