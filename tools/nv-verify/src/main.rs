//! nv-verify: run a single ownership check from the command line.
//!
//! Useful for operators debugging their setup before submitting a proof, and
//! for checking signing parameters of a chain configuration.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use node_verification::adapters::DohResolver;
use node_verification::verifiers::{
    DirectChallengeVerifier, DomainOwnershipVerifier, PortCheckVerifier,
};
use node_verification::{
    ChainParameterResolver, MessageSignatureVerifier, VerificationConfig, VerificationOutcome,
};

/// nv-verify: node-ownership verification checks
#[derive(Parser, Debug)]
#[command(name = "nv-verify", version)]
#[command(about = "Run node-ownership verification checks")]
struct Args {
    /// TOML configuration file (NV_* environment overrides still apply)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Verify a compact signature over a message
    Message {
        #[arg(long)]
        message: String,
        /// Address the signature claims to come from
        #[arg(long)]
        address: String,
        /// Base64 compact signature
        #[arg(long)]
        signature: String,
        /// Chain whose signing parameters apply (default: configured chain)
        #[arg(long)]
        chain: Option<String>,
    },
    /// Check a domain's TXT token and that it resolves to the node
    Dns {
        #[arg(long)]
        domain: String,
        #[arg(long)]
        token: String,
        #[arg(long)]
        ip: String,
    },
    /// Fetch the challenge file from the node
    Http {
        #[arg(long)]
        ip: String,
        #[arg(long)]
        token: String,
    },
    /// Read the token from the node's port-check port
    Port {
        #[arg(long)]
        ip: String,
        #[arg(long)]
        token: String,
    },
    /// Print the resolved signing parameters
    Params {
        #[arg(long)]
        chain: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let args = Args::parse();

    let filter = EnvFilter::try_from_env("NV_LOG").unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let config = load_config(args.config.as_deref())?;
    debug!(chain = %config.chain.name, "Configuration ready");

    match args.command {
        Command::Message {
            message,
            address,
            signature,
            chain,
        } => {
            let resolver = Arc::new(ChainParameterResolver::new(config.chain.clone()));
            let verifier = MessageSignatureVerifier::new(resolver);
            Ok(report(verifier.verify_for_chain(
                &message,
                &address,
                &signature,
                chain.as_deref(),
            )))
        }
        Command::Dns { domain, token, ip } => {
            let resolver = DohResolver::new(&config.dns).context("building DoH client")?;
            let verifier = DomainOwnershipVerifier::new(Arc::new(resolver), config.dns.timeout);
            Ok(report(verifier.verify(&domain, &token, &ip).await))
        }
        Command::Http { ip, token } => {
            let verifier =
                DirectChallengeVerifier::new(&config.http_file).context("building HTTP client")?;
            Ok(report(verifier.verify(&ip, &token).await))
        }
        Command::Port { ip, token } => {
            let verifier = PortCheckVerifier::new(&config.port_check);
            Ok(report(verifier.verify(&ip, &token).await))
        }
        Command::Params { chain } => {
            let resolver = ChainParameterResolver::new(config.chain.clone());
            let params = resolver
                .resolve(chain.as_deref(), None)
                .context("resolving signing parameters")?;

            println!("chain:                {}", chain.as_deref().unwrap_or(resolver.active_chain()));
            println!("message_prefix (hex): {}", hex::encode(&params.message_prefix));
            println!("message_prefix:       {:?}", String::from_utf8_lossy(&params.message_prefix));
            println!("pub_key_hash_version: 0x{:02x}", params.pub_key_hash_version);
            println!("address_prefix:       {}", params.address_prefix);
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn load_config(path: Option<&std::path::Path>) -> Result<VerificationConfig> {
    match path {
        Some(path) => VerificationConfig::load(path).context("loading configuration"),
        None => {
            let mut config = VerificationConfig::default();
            config.apply_env(|key| std::env::var(key).ok());
            config.validate().context("validating configuration")?;
            Ok(config)
        }
    }
}

fn report(outcome: VerificationOutcome) -> ExitCode {
    match outcome.error {
        None => {
            println!("valid");
            ExitCode::SUCCESS
        }
        Some(error) => {
            println!("invalid [{}]: {error}", error.code());
            ExitCode::FAILURE
        }
    }
}
