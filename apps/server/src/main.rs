pub mod schedule;
pub mod simulation;
pub mod web;

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Parser;
use crac_fuzzy::FuzzyEngine;
use tracing::info;

use crate::web::{create_web_server, WebState};

#[derive(Parser, Debug)]
#[command(name = "crac-server")]
#[command(about = "Fuzzy CRAC power controller over HTTP")]
struct Args {
    /// Address to listen on
    #[arg(long, default_value = "0.0.0.0")]
    host: IpAddr,

    #[arg(short, long, default_value_t = 5500)]
    port: u16,

    /// Room temperature setpoint used by the simulation (°C)
    #[arg(long, default_value_t = 22.0)]
    setpoint: f64,

    /// trace, debug, info, warn or error
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn parse_level(name: &str) -> Result<tracing::Level> {
    Ok(match name {
        "trace" => tracing::Level::TRACE,
        "debug" => tracing::Level::DEBUG,
        "info" => tracing::Level::INFO,
        "warn" => tracing::Level::WARN,
        "error" => tracing::Level::ERROR,
        other => bail!("unknown log level '{}'", other),
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    tracing_subscriber::fmt()
        .with_max_level(parse_level(&args.log_level)?)
        .init();

    let engine = FuzzyEngine::new().context("failed to build the fuzzy engine")?;
    let state = WebState::new(Arc::new(engine), args.setpoint);

    info!("setpoint {:.1}°C", args.setpoint);
    create_web_server(state, SocketAddr::new(args.host, args.port)).await
}
