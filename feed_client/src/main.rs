//! Feed Client — subscribes to the price feed and prints updates to stdout.
//!
//! The binary builds a `FeedManager` from CLI arguments, connects, and drains
//! the update stream until Ctrl+C. With `--history`, it first requests the
//! history of `--symbol` and prints the resolved series.
//!
//! Usage example:
//! ```bash
//! feed_client --server-ip 192.168.0.10 --mode live-with-fallback --watchlist ./symbols.txt
//! ```
//!
//! The watchlist file contains symbols separated by commas, spaces, or new
//! lines. Without one, the full known universe is used.
#![warn(missing_docs)]
mod args;

use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use clap::Parser;
use log::{error, info};

use feed_client::manager::{FeedManager, ManagerConfig};
use feed_common::symbols::{Symbol, WatchlistParser};
use feed_common::{FeedError, Result};

use crate::args::Args;

fn main() -> Result<()> {
    init_logger();
    let args = Args::parse();

    let shutdown = Arc::new(AtomicBool::new(false));
    {
        let shutdown = shutdown.clone();
        ctrlc::set_handler(move || {
            info!("Ctrl+C received. Shutting down client...");
            shutdown.store(true, Ordering::SeqCst);
        })
        .map_err(|e| FeedError::Format(format!("Failed to set Ctrl+C handler: {}", e)))?;
    }

    let watchlist = match &args.watchlist {
        Some(path) => read_watchlist(path)?,
        None => Symbol::universe(),
    };
    info!("Watchlist: {:?}", watchlist);

    let manager = FeedManager::new(ManagerConfig {
        mode: args.mode,
        server_ip: args.server_ip.trim().replace('"', ""),
        command_port: args.command_port,
        data_port: args.data_port,
        watchlist,
        ..ManagerConfig::default()
    });
    let updates = manager.updates();
    manager.connect()?;

    if let Some(interval) = args.history {
        let handle = manager.request_history(args.symbol, interval)?;
        match handle.wait() {
            Ok(ticks) => {
                info!("History for {} over {}: {} points", args.symbol, interval, ticks.len());
                for tick in &ticks {
                    info!(
                        "  {} Price={:.2} Volume={} Time={}",
                        tick.symbol, tick.price, tick.volume, tick.timestamp
                    );
                }
            }
            Err(e) => error!("History request failed: {}", e),
        }
    }

    info!("Client is running. Press Ctrl+C to exit.");
    while !shutdown.load(Ordering::Relaxed) {
        match updates.recv_timeout(Duration::from_millis(500)) {
            Ok(tick) => {
                info!(
                    "TICK: {} Price={:.2} Change={:+.2} ({:+.2}%) Volume={} Time={}",
                    tick.symbol,
                    tick.price,
                    tick.change,
                    tick.percent_change * 100.0,
                    tick.volume,
                    tick.timestamp
                );
            }
            Err(crossbeam_channel::RecvTimeoutError::Timeout) => continue,
            Err(crossbeam_channel::RecvTimeoutError::Disconnected) => break,
        }
    }

    manager.disconnect()?;
    info!("Client stopped");
    Ok(())
}

/// Read and parse the watchlist file, trimming surrounding quotes from the
/// CLI-provided path so quoted Windows paths work.
fn read_watchlist(raw: &PathBuf) -> Result<Vec<Symbol>> {
    let path = normalize_path(raw);
    if !path.is_file() {
        return Err(FeedError::ParseWatchlistFile(format!(
            "{} is not a file",
            path.display()
        )));
    }
    let file = File::open(path).map_err(FeedError::Io)?;
    Symbol::parse_from_file(BufReader::new(file))
}

fn normalize_path(raw: &PathBuf) -> PathBuf {
    let raw = raw.to_string_lossy();
    let trimmed = raw.trim();
    let no_quotes = trimmed
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .unwrap_or(trimmed);
    PathBuf::from(no_quotes)
}

fn init_logger() {
    env_logger::Builder::new()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();
}
