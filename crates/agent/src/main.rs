// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Cormorant agent daemon (cord)
//!
//! Long-running process that keeps the machine's native scheduler converged
//! with the synced manifest directory, reports heartbeats and discovered
//! entries to the collector, and never runs a job itself.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod client;
mod config;
mod loops;
mod token;

use crate::client::{CollectorClient, EnrollRequest};
use crate::config::Config;
use cor_core::JobConfigStore;
use cor_engine::{CommandWrapper, Discovery, Reconciler};
use cor_manifest::Parser;
use fs2::FileExt;
use std::path::{Path, PathBuf};
use tokio::sync::watch;
use tracing::{info, warn};

struct Args {
    config: PathBuf,
    once: bool,
    version: bool,
}

fn parse_args(argv: &[String]) -> Result<Args, String> {
    let mut args = Args {
        config: PathBuf::from("agent.toml"),
        once: false,
        version: false,
    };
    let mut iter = argv.iter().skip(1);
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--config" => {
                let value = iter.next().ok_or("--config requires a path")?;
                args.config = PathBuf::from(value);
            }
            "--once" => args.once = true,
            "--version" => args.version = true,
            other => {
                return Err(format!(
                    "unknown argument: {}\nusage: cord [--config <path>] [--once] [--version]",
                    other
                ))
            }
        }
    }
    Ok(args)
}

#[tokio::main]
async fn main() {
    let argv: Vec<String> = std::env::args().collect();
    let args = match parse_args(&argv) {
        Ok(args) => args,
        Err(message) => {
            eprintln!("{}", message);
            std::process::exit(2);
        }
    };

    if args.version {
        println!("cord {}", env!("CARGO_PKG_VERSION"));
        return;
    }

    if let Err(e) = run(args).await {
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}

async fn run(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load(&args.config)?;
    let state_dir = config.state_dir()?;
    std::fs::create_dir_all(&state_dir)?;

    // one agent per state dir; a second instance would interleave native
    // scheduler mutations
    let _lock = acquire_lock(&state_dir.join("agent.pid"))?;
    let _log_guard = setup_logging(&config)?;

    info!(version = env!("CARGO_PKG_VERSION"), "starting cormorant agent");

    let adapter = cor_adapters::native_adapter(&state_dir);
    let wrapper = CommandWrapper::new(
        config.helper_path(),
        JobConfigStore::new(state_dir.join("jobs")),
    );
    let reconciler = Reconciler::new(adapter.clone(), wrapper);
    let parser = Parser::new(&config.manifests.dir);

    if args.once {
        let definitions = parser.parse_all()?;
        let changes = reconciler.reconcile(&definitions).await?;
        info!(changes, "single reconciliation pass complete");
        println!("applied {} changes", changes);
        return Ok(());
    }

    let client = CollectorClient::new(config.collector.url.clone());
    let token_path = state_dir.join("endpoint-token.json");
    let credentials = match token::load(&token_path)? {
        Some(data) => {
            info!(endpoint_id = data.endpoint_id, "using existing endpoint token");
            data
        }
        None => {
            let data = enroll(&client, &config).await?;
            token::save(&token_path, &data)?;
            info!(endpoint_id = data.endpoint_id, "endpoint enrolled");
            data
        }
    };
    let client = client.with_token(credentials.token.clone());

    // initial pass before the timers start; desired-state fetch failure
    // keeps the current scheduler state
    match parser.parse_all() {
        Ok(definitions) => match reconciler.reconcile(&definitions).await {
            Ok(changes) => info!(changes, "initial reconciliation complete"),
            Err(e) => warn!(error = %e, "initial reconciliation failed"),
        },
        Err(e) => {
            warn!(error = %e, "desired-state fetch failed, keeping current scheduler state")
        }
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let tasks = vec![
        tokio::spawn(loops::reconcile_loop(
            reconciler,
            parser,
            config.intervals.reconcile,
            shutdown_rx.clone(),
        )),
        tokio::spawn(loops::heartbeat_loop(
            client.clone(),
            credentials.endpoint_id,
            config.intervals.heartbeat,
            shutdown_rx.clone(),
        )),
        tokio::spawn(loops::discovery_loop(
            Discovery::new(adapter),
            client,
            credentials.endpoint_id,
            config.intervals.discovery,
            shutdown_rx,
        )),
    ];

    wait_for_shutdown().await?;
    info!("shutdown signal received");
    let _ = shutdown_tx.send(true);
    // each loop finishes its in-flight native-scheduler operation first
    for task in tasks {
        let _ = task.await;
    }
    info!("agent stopped");
    Ok(())
}

async fn enroll(
    client: &CollectorClient,
    config: &Config,
) -> Result<token::TokenData, Box<dyn std::error::Error>> {
    let Some(enrollment_token) = config.collector.enrollment_token.clone() else {
        return Err(
            "no endpoint token found and no collector.enrollment_token configured".into(),
        );
    };
    info!("no endpoint token found, enrolling endpoint");

    let request = EnrollRequest {
        name: config.agent_name(),
        hostname: config.hostname(),
        machine_id: token::machine_id(),
        platform: std::env::consts::OS.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    };
    let client = client.clone();
    let response =
        tokio::task::spawn_blocking(move || client.enroll(&request, &enrollment_token)).await??;
    Ok(token::TokenData {
        endpoint_id: response.endpoint_id,
        token: response.token,
    })
}

fn acquire_lock(path: &Path) -> Result<std::fs::File, Box<dyn std::error::Error>> {
    use std::io::Write;

    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .write(true)
        .open(path)?;
    if file.try_lock_exclusive().is_err() {
        return Err(format!("another cord instance holds {}", path.display()).into());
    }
    file.set_len(0)?;
    writeln!(file, "{}", std::process::id())?;
    Ok(file)
}

fn setup_logging(
    config: &Config,
) -> Result<Option<tracing_appender::non_blocking::WorkerGuard>, Box<dyn std::error::Error>> {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    match &config.agent.log_file {
        Some(path) => {
            let dir = path.parent().unwrap_or_else(|| Path::new("."));
            std::fs::create_dir_all(dir)?;
            let name = path.file_name().ok_or("agent.log_file must name a file")?;
            let appender = tracing_appender::rolling::never(dir, name);
            let (non_blocking, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().with_writer(non_blocking).with_ansi(false))
                .init();
            Ok(Some(guard))
        }
        None => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer())
                .init();
            Ok(None)
        }
    }
}

#[cfg(unix)]
async fn wait_for_shutdown() -> Result<(), std::io::Error> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;
    tokio::select! {
        _ = sigterm.recv() => info!("received SIGTERM"),
        _ = sigint.recv() => info!("received SIGINT"),
    }
    Ok(())
}

#[cfg(not(unix))]
async fn wait_for_shutdown() -> Result<(), std::io::Error> {
    tokio::signal::ctrl_c().await
}
