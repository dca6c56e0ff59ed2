//! Tick sources feeding the hub.
//!
//! Two sources exist and exactly one runs per server process:
//!
//! - `UpstreamConsumer` reads JSON tick datagrams from an external feed on a
//!   dedicated UDP port. Malformed datagrams are logged and skipped.
//! - `spawn_simulator` produces synthetic ticks for a fixed symbol set when no
//!   upstream feed is available.
//!
//! Both deliver into the same channel, so the hub never knows which one it is
//! consuming from.

use std::collections::HashMap;
use std::io::ErrorKind;
use std::net::{SocketAddr, UdpSocket};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::Sender;
use log::{info, warn};

use feed_common::generator::SyntheticGenerator;
use feed_common::symbols::Symbol;
use feed_common::{Result, Tick};

/// Period between synthetic tick rounds.
pub const SIMULATION_PERIOD_MS: u64 = 500;

/// Read timeout on the upstream socket, so shutdown is noticed promptly.
const READ_TIMEOUT_MS: u64 = 500;

/// Consumes JSON tick datagrams from an external upstream feed.
pub struct UpstreamConsumer {
    socket: UdpSocket,
}

impl UpstreamConsumer {
    /// Bind the consumer to `bind_addr` (e.g. `0.0.0.0:8082`).
    pub fn new(bind_addr: &str) -> Result<Self> {
        let socket = UdpSocket::bind(bind_addr)?;
        socket.set_read_timeout(Some(Duration::from_millis(READ_TIMEOUT_MS)))?;
        Ok(Self { socket })
    }

    /// The bound local address.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    /// Blocking receive loop. Decoded ticks go to `tick_tx`; malformed
    /// datagrams are counted and skipped. Returns once `shutdown` is set.
    pub fn run(self, tick_tx: Sender<Tick>, shutdown: Arc<AtomicBool>) -> Result<()> {
        info!("Upstream consumer listening on {}", self.socket.local_addr()?);
        let mut buf = [0u8; 4096];
        let mut malformed: u64 = 0;

        while !shutdown.load(Ordering::SeqCst) {
            match self.socket.recv_from(&mut buf) {
                Ok((size, source)) => match Tick::from_json_bytes(&buf[..size]) {
                    Ok(tick) => {
                        if tick_tx.send(tick).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        malformed += 1;
                        warn!(
                            "Skipping malformed tick from {} ({} so far): {}",
                            source, malformed, e
                        );
                    }
                },
                Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {
                    continue;
                }
                Err(e) => return Err(e.into()),
            }
        }
        info!("Upstream consumer stopped ({} malformed datagrams skipped)", malformed);
        Ok(())
    }
}

/// Spawn the synthetic tick source.
///
/// Every `period` it advances the walk for all `symbols` and sends one tick
/// each into `tick_tx`. Exits when `shutdown` is set or the hub is gone.
pub fn spawn_simulator(
    symbols: Vec<Symbol>,
    period: Duration,
    tick_tx: Sender<Tick>,
    shutdown: Arc<AtomicBool>,
) -> JoinHandle<()> {
    thread::spawn(move || {
        info!("Simulation source started for {} symbols", symbols.len());
        let mut last_prices: HashMap<Symbol, f64> = HashMap::new();

        while !shutdown.load(Ordering::SeqCst) {
            for symbol in &symbols {
                let tick =
                    SyntheticGenerator::next_tick(&symbol.to_string(), last_prices.get(symbol).copied());
                last_prices.insert(*symbol, tick.price);
                if tick_tx.send(tick).is_err() {
                    return;
                }
            }
            thread::sleep(period);
        }
    })
}
