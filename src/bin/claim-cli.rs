use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};

use web3d_claim::auth::{admin_message, claim_message, unix_now, SIGNATURE_HEADER, TIMESTAMP_HEADER};
use web3d_claim::chain::AdminSigner;
use web3d_claim::WalletAddress;

/// ========= CLI =========

#[derive(Parser, Debug)]
#[command(name = "claim-cli", version, about = "Web3D claim service helper CLI")]
struct Cli {
    /// Hex private key; defaults to ADMIN_PRIVATE_KEY
    #[arg(long, env = "ADMIN_PRIVATE_KEY", hide_env_values = true)]
    key: Option<String>,

    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the checksummed address of the key
    Address,

    /// Print admin authorization headers for curl
    AdminHeaders {
        /// Unix timestamp to sign (default: now)
        #[arg(long)]
        timestamp: Option<u64>,
    },

    /// Sign a claim proof for the key's own wallet and print the request body
    SignClaim {
        #[arg(long)]
        timestamp: Option<u64>,
    },
}

fn signer(key: Option<String>) -> Result<AdminSigner> {
    let key = key.ok_or_else(|| anyhow!("no key given (use --key or ADMIN_PRIVATE_KEY)"))?;
    Ok(AdminSigner::from_hex(&key)?)
}

fn signature_hex(sig: [u8; 65]) -> String {
    format!("0x{}", hex::encode(sig))
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let signer = signer(cli.key)?;
    match cli.cmd {
        Commands::Address => {
            println!("{}", signer.address().to_checksum());
        }
        Commands::AdminHeaders { timestamp } => {
            let ts = timestamp.unwrap_or_else(unix_now);
            let sig = signer.sign_message(&admin_message(ts))?;
            println!("-H '{SIGNATURE_HEADER}: {}' -H '{TIMESTAMP_HEADER}: {ts}'", signature_hex(sig));
        }
        Commands::SignClaim { timestamp } => {
            let ts = timestamp.unwrap_or_else(unix_now);
            let address: &WalletAddress = signer.address();
            let sig = signer.sign_message(&claim_message(address, ts))?;
            let body = serde_json::json!({
                "address": address.to_checksum(),
                "signature": signature_hex(sig),
                "timestamp": ts,
            });
            println!("{}", serde_json::to_string_pretty(&body)?);
        }
    }
    Ok(())
}
