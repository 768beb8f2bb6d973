use anyhow::{anyhow, Result};
use chrono::Utc;
use itertools::Itertools;
use tokio::sync::mpsc;

use std::env;

use codetrack::config::Config;
use codetrack::lcapi::proxy;
use codetrack::lcbot::{self, commands::Commands};
use codetrack::scheduler;

const USAGE: &str = "usage: codetrack [bot | proxy | watch | run <command...>]";

/// Runs a single command against the store and prints the reply.
async fn run_once(config: &Config, args: &[String]) -> Result<()> {
    let commands = Commands::open(config)?;
    let input = args.iter().join(" ");
    let response = commands.run_command(&input, Utc::now()).await?;
    println!("{response}");
    Ok(())
}

/// Runs the reminder scheduler without Discord, printing each notification.
async fn watch(config: &Config) -> Result<()> {
    let commands = Commands::open(config)?;
    let (tx, mut rx) = mpsc::channel(32);
    tokio::spawn(scheduler::run(commands.store(), tx));

    while let Some(intent) = rx.recv().await {
        log::info!("[watch] {}", intent.title);
        println!("{intent}\n");
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Begin logger
    env_logger::init();

    let config = Config::from_env()?;
    let args = env::args().skip(1).collect::<Vec<_>>();

    match args.first().map(String::as_str) {
        None | Some("bot") => lcbot::run_bot(&config).await,
        Some("proxy") => proxy::serve(&config.proxy_bind, &config.graphql_url).await,
        Some("watch") => watch(&config).await,
        Some("run") if args.len() > 1 => run_once(&config, &args[1..]).await,
        Some(other) => Err(anyhow!("Unknown mode '{other}'. {USAGE}")),
    }
}
