//! gm-keys - Generate or inspect the gmcast bot keypair

use anyhow::{Context, Result};
use clap::Parser;
use libgmcast::Identity;
use nostr_sdk::{Keys, ToBech32};
use secrecy::SecretString;
use serde::Serialize;

#[derive(Parser)]
#[command(name = "gm-keys")]
#[command(version)]
#[command(about = "Generate a Nostr keypair for gm-send, or show the npub of an existing secret")]
struct Cli {
    /// Print the npub for an existing secret (nsec or hex) instead of generating
    #[arg(long, value_name = "SECRET")]
    check: Option<String>,

    /// Output as JSON
    #[arg(long)]
    json: bool,
}

/// JSON output of `gm-keys --json`
#[derive(Serialize)]
struct KeyOutput<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    nsec: Option<&'a str>,
    npub: &'a str,
    public_key_hex: String,
}

impl<'a> KeyOutput<'a> {
    fn new(identity: &'a Identity, nsec: Option<&'a str>) -> Self {
        Self {
            nsec,
            npub: identity.npub(),
            public_key_hex: identity.public_key_hex(),
        }
    }
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(&cli) {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn run(cli: &Cli) -> Result<()> {
    match &cli.check {
        Some(secret) => check(secret, cli.json),
        None => generate(cli.json),
    }
}

fn generate(as_json: bool) -> Result<()> {
    let keys = Keys::generate();
    let nsec = keys
        .secret_key()
        .to_bech32()
        .context("Failed to encode secret key")?;
    let identity = Identity::from_keys(keys);

    if as_json {
        let out = KeyOutput::new(&identity, Some(&nsec));
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    println!("Private Key (KEEP SECRET!):");
    println!("  {}", nsec);
    println!();
    println!("Public Key (safe to share):");
    println!("  {}", identity.npub());
    println!("  {}", identity.profile_url());
    println!();
    println!("Put the private key in the gm-send environment:");
    println!("  PRIVATE_KEY_NSEC={}", nsec);

    Ok(())
}

fn check(secret: &str, as_json: bool) -> Result<()> {
    let identity = Identity::from_secret(&SecretString::from(secret.to_string()))
        .context("Secret key rejected")?;

    if as_json {
        let out = KeyOutput::new(&identity, None);
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        println!("Public key (npub): {}", identity.npub());
        println!("Public key (hex): {}", identity.public_key_hex());
    }

    Ok(())
}
