//! # Demo Subcommand
//!
//! Drives the complete authorization flow in-process: a 5000 JPY intent,
//! a two-line cart priced from an in-memory catalog, merchant and payer
//! signatures, optional step-up suspension/resumption, device
//! attestation, token issuance, and settlement. Prints each state as the
//! session advances and the issued token as JSON.

use std::sync::Arc;

use clap::Args;
use tracing::info;

use amp_core::{Amount, CredentialId, CurrencyCode, MerchantId, PaymentMethodId, SessionId, UserId};
use amp_crypto::{CredentialRecord, DeviceAssertion, Ed25519KeyPair};
use amp_mandate::{
    CartSelection, InMemoryCatalog, InMemoryKeyRegistry, IntentConstraints, PaymentMethod,
    PriceAndStock, SignatureProof, SignerRole,
};
use amp_session::{AuthorizationFlow, FlowConfig, InMemorySessionStore, StepUpOutcome};
use amp_token::InMemoryTokenStore;

/// Arguments for the demo subcommand.
#[derive(Args, Debug)]
pub struct DemoArgs {
    /// Use a payment method flagged as requiring step-up, exercising the
    /// suspension/resumption sub-protocol.
    #[arg(long)]
    pub step_up: bool,

    /// Report the step-up outcome as cancelled instead of successful
    /// (implies --step-up); the session fails and no token is issued.
    #[arg(long)]
    pub cancel_step_up: bool,
}

struct Shopper {
    keypair: Ed25519KeyPair,
    credential_id: CredentialId,
    counter: u32,
}

impl Shopper {
    fn attest(&mut self, flow: &AuthorizationFlow, session_id: &SessionId) -> anyhow::Result<DeviceAssertion> {
        let descriptor = flow.request_user_auth(session_id)?;
        self.counter += 1;
        Ok(DeviceAssertion::create(
            &self.keypair,
            self.credential_id.clone(),
            &descriptor.relying_party_id,
            &descriptor.challenge,
            "https://pay.example",
            self.counter,
        )?)
    }
}

fn jpy(v: &str) -> anyhow::Result<Amount> {
    Ok(Amount::new(v, CurrencyCode::new("JPY")?)?)
}

/// Run the end-to-end scenario.
pub fn run(args: DemoArgs) -> anyhow::Result<()> {
    let step_up = args.step_up || args.cancel_step_up;

    let catalog = InMemoryCatalog::new();
    catalog.stock(
        "mug",
        PriceAndStock {
            description: "Ceramic mug".into(),
            unit_price: jpy("2250")?,
            available_quantity: 10,
            category: Some("kitchen".into()),
        },
    );
    catalog.stock(
        "tea",
        PriceAndStock {
            description: "Tea sampler".into(),
            unit_price: jpy("1500")?,
            available_quantity: 20,
            category: Some("pantry".into()),
        },
    );

    let merchant_id = MerchantId::new("merchant-tokyo-1");
    let merchant_kp = Ed25519KeyPair::generate();
    let mut shopper = Shopper {
        keypair: Ed25519KeyPair::generate(),
        credential_id: CredentialId::new("cred-demo-shopper"),
        counter: 0,
    };

    let keys = InMemoryKeyRegistry::new();
    keys.register_merchant(merchant_id.clone(), merchant_kp.public_key());
    keys.register_credential(CredentialRecord {
        credential_id: shopper.credential_id.clone(),
        public_key: shopper.keypair.public_key(),
        counter: 0,
    });

    let flow = AuthorizationFlow::new(
        FlowConfig::default(),
        Arc::new(InMemorySessionStore::new()),
        Arc::new(catalog),
        Arc::new(keys),
        Arc::new(InMemoryTokenStore::new()),
    );

    let session_id = flow.create_session(UserId::new("demo-shopper"));
    info!(session = %session_id, step_up, "demo flow started");
    println!("session {session_id}");

    flow.submit_intent(&session_id, jpy("5000")?, IntentConstraints::default())?;
    let assertion = shopper.attest(&flow, &session_id)?;
    let session = flow.submit_signature(
        &session_id,
        SignerRole::Payer,
        SignatureProof::DeviceAttestation { assertion },
    )?;
    println!("state {}", session.state);

    let cart = flow.submit_cart_selection(
        &session_id,
        merchant_id.clone(),
        &[
            CartSelection { sku: "mug".into(), quantity: 1 },
            CartSelection { sku: "tea".into(), quantity: 1 },
        ],
        jpy("375")?,
        jpy("0")?,
        Some("Chiyoda-ku, Tokyo".into()),
    )?;
    let cart_contents = cart
        .as_cart()
        .ok_or_else(|| anyhow::anyhow!("cart mandate expected"))?;
    println!(
        "state CART_PROPOSED total {} {}",
        cart_contents.total.value(),
        cart_contents.total.currency().as_str()
    );

    let merchant_sig = merchant_kp.sign_digest(&cart.digest()?);
    let session = flow.submit_signature(
        &session_id,
        SignerRole::Merchant,
        SignatureProof::Ed25519 {
            key_ref: merchant_id.to_string(),
            signature: merchant_sig,
        },
    )?;
    println!("state {}", session.state);

    let assertion = shopper.attest(&flow, &session_id)?;
    let session = flow.submit_signature(
        &session_id,
        SignerRole::Payer,
        SignatureProof::DeviceAttestation { assertion },
    )?;
    println!("state {}", session.state);

    flow.select_payment_method(
        &session_id,
        PaymentMethod {
            id: PaymentMethodId::new("pm-visa-4242"),
            display: "Visa ···4242".into(),
            requires_step_up: step_up,
        },
    )?;
    flow.request_user_auth(&session_id)?;
    println!("state {}", flow.session(&session_id)?.state);

    if step_up {
        let context = flow.begin_step_up(&session_id)?;
        println!("state STEP_UP_SUSPENDED challenge_url {}", context.challenge_url);
        let outcome = if args.cancel_step_up {
            StepUpOutcome::Cancelled
        } else {
            StepUpOutcome::Success
        };
        let state =
            flow.submit_step_up_outcome(&context.step_up_session_id, outcome, &session_id)?;
        println!("state {state}");
        if args.cancel_step_up {
            println!("no token issued");
            return Ok(());
        }
    }

    let assertion = shopper.attest(&flow, &session_id)?;
    let token = flow.submit_attestation(&session_id, &assertion)?;
    println!("state {}", flow.session(&session_id)?.state);
    println!("{}", serde_json::to_string_pretty(&token)?);

    let settled = flow.settle(&session_id, &token.value)?;
    info!(session = %session_id, "demo flow settled");
    println!("state {}", settled.state);
    Ok(())
}
