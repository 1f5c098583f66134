use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Parser, Subcommand};
use serde_json::Value;

use cloudfauxnt::security::{Clock, CustomPolicy, SystemClock, UrlSigner};

#[derive(Parser)]
#[command(name = "cloudfauxnt-cli")]
#[command(about = "Signing and health tool for the CloudFauxnt edge", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print a canned-policy signed URL
    Sign {
        /// RSA private key (PKCS#8 or PKCS#1 PEM)
        #[arg(short, long)]
        private_key: PathBuf,

        #[arg(short, long)]
        key_pair_id: String,

        /// Full URL as clients will request it, e.g. http://localhost:9001/private/a.txt
        #[arg(short, long)]
        url: String,

        /// Seconds until the URL expires
        #[arg(short, long, default_value_t = 3600)]
        ttl: i64,
    },
    /// Print signed cookies granting a wildcard resource
    Cookies {
        #[arg(short, long)]
        private_key: PathBuf,

        #[arg(short, long)]
        key_pair_id: String,

        /// Resource pattern, e.g. http://localhost:9001/private/*
        #[arg(short, long)]
        resource: String,

        #[arg(short, long, default_value_t = 3600)]
        ttl: i64,
    },
    /// Query the edge health endpoint
    Health {
        #[arg(short, long, default_value = "http://localhost:9001")]
        url: String,

        #[arg(long, default_value = "/health")]
        path: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Sign {
            private_key,
            key_pair_id,
            url,
            ttl,
        } => {
            let signer = load_signer(&private_key, key_pair_id)?;
            let expires = SystemClock.now() + ttl;
            println!("{}", signer.sign_canned_url(&url, expires));
        }
        Commands::Cookies {
            private_key,
            key_pair_id,
            resource,
            ttl,
        } => {
            let signer = load_signer(&private_key, key_pair_id)?;
            let policy = CustomPolicy::new(resource, SystemClock.now() + ttl);
            for (name, value) in signer.signed_cookies(&policy) {
                println!("{}={}", name, value);
            }
        }
        Commands::Health { url, path } => {
            let client = reqwest::Client::builder()
                .timeout(Duration::from_secs(5))
                .build()?;
            let res = client
                .get(format!("{}{}", url.trim_end_matches('/'), path))
                .send()
                .await?;
            print_response(res).await?;
        }
    }

    Ok(())
}

fn load_signer(path: &Path, key_pair_id: String) -> Result<UrlSigner, Box<dyn std::error::Error>> {
    let pem = std::fs::read_to_string(path)?;
    let signer = UrlSigner::from_pem(&pem, key_pair_id)
        .map_err(|e| format!("{}: not a usable RSA private key: {}", path.display(), e))?;
    Ok(signer)
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: edge returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        std::process::exit(1);
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
