use anyhow::{Context, Result};
use async_trait::async_trait;
use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::PathBuf;
use tokio::net::TcpListener;
use tracing::{error, info};

use crate::client::Request;
use crate::config::ServerConfig;
use crate::crypto::HashAlgorithm;
use crate::rpc::{Api, Exchange, Handler};
use crate::utils::{init_logging, now, Abort};

/// CLI for the JSON API demo service and client.
#[derive(Parser)]
#[clap(name = "jsonapi", version)]
pub struct Cli {
    #[clap(subcommand)]
    pub cmd: Cmd,
}

#[derive(Subcommand)]
pub enum Cmd {
    /// Run the echo service (`/echo` open, `/signed/echo` signed)
    Serve {
        /// Path to a TOML config file
        #[clap(long)]
        config: Option<PathBuf>,

        /// bind address (host:port), overrides the config file
        #[clap(long)]
        bind: Option<String>,

        /// shared secret for `/signed/echo`
        #[clap(long, env = "JSONAPI_KEY")]
        key: Option<String>,

        /// freshness window in seconds (0 disables)
        #[clap(long)]
        max_age: Option<i64>,
    },
    /// Send one request and print the JSON response
    Call {
        /// full URL, e.g. http://127.0.0.1:8080/echo
        url: String,

        /// JSON payload
        #[clap(long, default_value = "null")]
        data: String,

        /// send as a write (POST body) instead of a read (GET query)
        #[clap(long)]
        write: bool,

        /// sign the request with this secret
        #[clap(long, env = "JSONAPI_KEY", default_value = "")]
        key: String,

        #[clap(long, value_enum, default_value = "sha256")]
        hash: HashAlgorithm,

        /// request timestamp, defaults to now
        #[clap(long)]
        timestamp: Option<i64>,
    },
}

#[derive(Debug, Default, Deserialize)]
struct EchoRequest {
    #[serde(default)]
    value: Value,
}

#[derive(Debug, Serialize)]
struct EchoResponse {
    value_is: Value,
}

async fn echo(mut ex: Exchange) -> Result<EchoResponse, Abort> {
    let req: EchoRequest = ex.bind().await?;
    Ok(EchoResponse { value_is: req.value })
}

/// Echo that requires a fresh, correctly signed request.
struct SignedEcho {
    key: String,
    max_age: i64,
}

#[async_trait]
impl Handler for SignedEcho {
    type Output = EchoResponse;

    async fn serve_json(&self, mut ex: Exchange) -> Result<EchoResponse, Abort> {
        let req: EchoRequest = ex.bind().await?;
        ex.authenticate(&self.key, self.max_age)?;
        Ok(EchoResponse { value_is: req.value })
    }
}

/// The demo service served by `jsonapi serve`.
pub fn echo_api(cfg: &ServerConfig) -> Api {
    Api::new(cfg.api_config())
        .bind("/echo", echo)
        .bind("/signed/echo", SignedEcho { key: cfg.key.clone(), max_age: cfg.max_age })
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("failed to listen for ctrl-c: {:?}", e);
    }
    info!("Shutting down server...");
}

pub async fn run_cli() -> Result<()> {
    init_logging();
    let cli = Cli::parse();

    match cli.cmd {
        Cmd::Serve { config, bind, key, max_age } => {
            let mut cfg = match config {
                Some(path) => ServerConfig::load(&path)?,
                None => ServerConfig::default(),
            };
            if let Some(b) = bind {
                cfg.bind = b;
            }
            if let Some(k) = key {
                cfg.key = k;
            }
            if let Some(m) = max_age {
                cfg.max_age = m;
            }

            let listener = TcpListener::bind(&cfg.bind)
                .await
                .with_context(|| format!("binding {}", cfg.bind))?;
            echo_api(&cfg).serve(listener, shutdown_signal()).await?;
            info!("Server stopped");
            Ok(())
        }
        Cmd::Call { url, data, write, key, hash, timestamp } => {
            let value: Value = serde_json::from_str(&data).context("--data is not valid JSON")?;
            let mut req = if write { Request::post(&url, &value)? } else { Request::get(&url, &value)? };
            req.sign(hash, &key, timestamp.unwrap_or_else(now));
            let rsp: Value = req.send(&reqwest::Client::new()).await?;
            println!("{}", serde_json::to_string_pretty(&rsp)?);
            Ok(())
        }
    }
}
