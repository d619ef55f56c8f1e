// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Hermod service directory server.
//!
//! The master is the authoritative registry of machines, endpoints,
//! services and topics for a hermod deployment. State is held in
//! memory only; restarting the master empties the registry.
//!
//! # Usage
//!
//! ```bash
//! # Listen on the default address (tcp://0.0.0.0:5555)
//! hermod-master
//!
//! # Explicit listen URL and debug logging
//! hermod-master tcp://0.0.0.0:7700 --log-level debug
//!
//! # Settings from a JSON config file
//! hermod-master --config master.json
//! ```

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

use hermod::directory::ServiceDirectory;
use hermod::rpc::Dispatcher;
use hermod::runtime::{EventLoop, PeriodicTask};
use hermod::transport::{listen, ListenOptions};
use hermod::MasterConfig;

/// Hermod service directory (master)
#[derive(Parser, Debug)]
#[command(name = "hermod-master")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Listen URL (tcp://host:port, ipc://path or inproc://name)
    #[arg(default_value = "tcp://0.0.0.0:5555")]
    master_address: String,

    /// Configuration file (JSON); the listen URL argument wins over
    /// the file's listen_address
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Event loop worker threads (default: hardware concurrency)
    #[arg(long)]
    threads: Option<usize>,
}

fn main() -> ExitCode {
    let args = Args::parse();

    if let Err(e) = init_logging(&args.log_level) {
        eprintln!("failed to initialize logging: {e}");
        return ExitCode::FAILURE;
    }

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

fn init_logging(level: &str) -> anyhow::Result<()> {
    let level = match level {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    // route the library's `log` records into the same stream
    tracing_log::LogTracer::init().context("log bridge")?;

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .with_thread_ids(true)
        .finish();
    tracing::subscriber::set_global_default(subscriber).context("subscriber")?;
    Ok(())
}

fn run(args: Args) -> anyhow::Result<()> {
    let mut config = match &args.config {
        Some(path) => {
            info!("loading config from {}", path.display());
            MasterConfig::from_file(path)?
        }
        None => MasterConfig::default(),
    };
    if args.config.is_none() || args.master_address != "tcp://0.0.0.0:5555" {
        config.listen_address = args.master_address.clone();
    }
    if let Some(threads) = args.threads {
        config.worker_threads = threads;
    }
    config.validate()?;

    let listen_url = config.listen_url()?;

    let event_loop = if config.worker_threads == 0 {
        EventLoop::default_pool()
    } else {
        EventLoop::new(config.worker_threads)
    };

    let directory = ServiceDirectory::new(&listen_url);
    let dispatcher = Arc::new(Dispatcher::new());
    directory.bind(&dispatcher);

    let options = build_listen_options(&config)?;
    let server = match listen(&listen_url, Arc::clone(&dispatcher), options) {
        Ok(server) => server,
        Err(e) => {
            // listen failure is the one fatal startup error: exit 1
            return Err(e).context(format!("cannot listen on {listen_url}"));
        }
    };

    info!("master listening on {}", server.local_url());
    info!("serving {} methods", dispatcher.signatures().len());

    // housekeeping: periodic registry/call statistics on the loop
    let stats_task = PeriodicTask::new(&event_loop);
    let stats_directory = directory.clone();
    let stats_metrics = server.metrics_handle();
    stats_task
        .set_name("master-stats")
        .and_then(|()| stats_task.set_period(config.stats_period()))
        .and_then(|()| {
            stats_task.set_callback(move || {
                info!(
                    "registry: {}; calls dispatched: {} ({} wire errors)",
                    stats_directory.summary(),
                    stats_metrics.calls_dispatched(),
                    stats_metrics.wire_errors()
                );
            })
        })
        .map_err(|e| anyhow::anyhow!("stats task setup: {e}"))?;
    stats_task
        .start(false)
        .map_err(|e| anyhow::anyhow!("stats task start: {e}"))?;

    println!("ready.");

    // serve until the process is killed
    server.join();

    stats_task.stop();
    event_loop.shutdown();
    info!("master stopped");
    Ok(())
}

#[cfg(feature = "tls")]
fn build_listen_options(config: &MasterConfig) -> anyhow::Result<ListenOptions> {
    let tls = if config.tls_enabled {
        let cert = config
            .tls_cert_path
            .as_deref()
            .context("tls_cert_path missing")?;
        let key = config
            .tls_key_path
            .as_deref()
            .context("tls_key_path missing")?;
        info!("tls enabled");
        Some(hermod::transport::tls::load_server_config(cert, key)?)
    } else {
        None
    };
    Ok(ListenOptions {
        max_message_size: config.max_message_size,
        tls,
    })
}

#[cfg(not(feature = "tls"))]
fn build_listen_options(config: &MasterConfig) -> anyhow::Result<ListenOptions> {
    if config.tls_enabled {
        anyhow::bail!("tls_enabled set but this build lacks the 'tls' feature");
    }
    Ok(ListenOptions {
        max_message_size: config.max_message_size,
    })
}
