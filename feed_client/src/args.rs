//! Command-line arguments for the feed client binary.

use clap::Parser;
use std::path::PathBuf;

use feed_common::interval::Interval;
use feed_common::net::{COMMAND_PORT, DATA_PORT};
use feed_common::symbols::Symbol;

use feed_client::manager::Mode;

/// Command-line arguments.
#[derive(Parser, Debug)]
#[command(about = "Real-time price feed client")]
pub struct Args {
    /// Server IP address.
    #[arg(long, default_value = "127.0.0.1")]
    pub server_ip: String,

    /// Server TCP request port.
    #[arg(long, default_value_t = COMMAND_PORT)]
    pub command_port: u16,

    /// Server UDP data port.
    #[arg(long, default_value_t = DATA_PORT)]
    pub data_port: u16,

    /// Data source policy.
    #[arg(long, value_enum, default_value_t = Mode::LiveWithFallback)]
    pub mode: Mode,

    /// Watchlist file with symbols separated by commas, spaces, or new lines.
    /// Defaults to the full known universe.
    #[arg(long)]
    pub watchlist: Option<PathBuf>,

    /// Request the history of `--symbol` over this interval before streaming.
    #[arg(long, value_enum)]
    pub history: Option<Interval>,

    /// Symbol used with `--history`.
    #[arg(long, value_enum, ignore_case = true, default_value_t = Symbol::AAPL)]
    pub symbol: Symbol,
}
