use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_LENGTH, CONTENT_TYPE};
use std::path::PathBuf;
use std::time::Duration;

use upload_proxy::http::{UPLOAD_ASYNC_PATH, UPLOAD_PATH};
use upload_proxy::token::{Claim, Operation, TokenIssuer};

#[derive(Parser)]
#[command(name = "upload-cli")]
#[command(about = "Operator CLI for the upload proxy", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Mint an upload token for one target
    Token {
        /// PEM RSA private key matching the proxy's verification key
        #[arg(short, long)]
        key: PathBuf,
        #[arg(short, long, default_value = "default")]
        namespace: String,
        /// Target volume claim name
        name: String,
        /// Authorize the asynchronous upload path instead
        #[arg(long = "async")]
        async_upload: bool,
        #[arg(long, default_value_t = 300)]
        ttl_secs: u64,
    },
    /// Upload a file through the proxy
    Upload {
        #[arg(short, long, default_value = "https://localhost:8443")]
        url: String,
        #[arg(short, long)]
        token: String,
        /// CA certificate for the proxy's server certificate (PEM)
        #[arg(long)]
        ca: Option<PathBuf>,
        #[arg(long = "async")]
        async_upload: bool,
        file: PathBuf,
    },
    /// Check whether the target is ready to receive an upload
    Probe {
        #[arg(short, long, default_value = "https://localhost:8443")]
        url: String,
        #[arg(short, long)]
        token: String,
        #[arg(long)]
        ca: Option<PathBuf>,
        #[arg(long = "async")]
        async_upload: bool,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Token {
            key,
            namespace,
            name,
            async_upload,
            ttl_secs,
        } => {
            let pem = std::fs::read(&key)?;
            let issuer = TokenIssuer::from_private_key_pem(&pem, Duration::from_secs(ttl_secs))?;
            let claim = Claim::upload(operation(async_upload), namespace, name);
            println!("{}", issuer.issue(&claim)?);
        }
        Commands::Upload {
            url,
            token,
            ca,
            async_upload,
            file,
        } => {
            let client = client(ca.as_ref())?;
            let f = tokio::fs::File::open(&file).await?;
            let len = f.metadata().await?.len();

            let mut headers = auth_headers(&token)?;
            headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/octet-stream"));
            headers.insert(CONTENT_LENGTH, HeaderValue::from(len));

            let res = client
                .post(format!("{}{}", url.trim_end_matches('/'), path(async_upload)))
                .headers(headers)
                .body(reqwest::Body::from(f))
                .send()
                .await?;
            print_response(res).await?;
        }
        Commands::Probe {
            url,
            token,
            ca,
            async_upload,
        } => {
            let client = client(ca.as_ref())?;
            let res = client
                .head(format!("{}{}", url.trim_end_matches('/'), path(async_upload)))
                .headers(auth_headers(&token)?)
                .send()
                .await?;
            print_response(res).await?;
        }
    }

    Ok(())
}

fn operation(async_upload: bool) -> Operation {
    if async_upload {
        Operation::UploadAsync
    } else {
        Operation::Upload
    }
}

fn path(async_upload: bool) -> &'static str {
    if async_upload {
        UPLOAD_ASYNC_PATH
    } else {
        UPLOAD_PATH
    }
}

fn client(ca: Option<&PathBuf>) -> Result<reqwest::Client, Box<dyn std::error::Error>> {
    let mut builder = reqwest::Client::builder();
    if let Some(ca) = ca {
        let pem = std::fs::read(ca)?;
        builder = builder.add_root_certificate(reqwest::Certificate::from_pem(&pem)?);
    }
    Ok(builder.build()?)
}

fn auth_headers(token: &str) -> Result<HeaderMap, Box<dyn std::error::Error>> {
    let mut headers = HeaderMap::new();
    headers.insert(AUTHORIZATION, HeaderValue::from_str(&format!("Bearer {token}"))?);
    Ok(headers)
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    let text = res.text().await.unwrap_or_default();
    if status.is_success() {
        println!("{status}");
        if !text.is_empty() {
            println!("{text}");
        }
    } else {
        eprintln!("Error: proxy returned status {status}");
        if !text.is_empty() {
            eprintln!("Response: {text}");
        }
    }
    Ok(())
}
