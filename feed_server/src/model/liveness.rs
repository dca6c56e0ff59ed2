//! Keep-alive tracking for subscribed clients.
//!
//! Subscribers send `PING` datagrams to the data socket while they are alive.
//! `LivenessMonitor` records the last time each address was heard from;
//! a periodic sweep returns the addresses that fell silent so the hub can
//! drop their subscriptions. Time is measured with `std::time::Instant`,
//! which is monotonic and immune to wall-clock changes.

use std::collections::HashMap;
use std::net::{SocketAddr, UdpSocket};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use log::debug;

/// Tracks when each subscriber address was last heard from.
pub struct LivenessMonitor {
    last_seen: HashMap<SocketAddr, Instant>,
    timeout: Duration,
}

impl LivenessMonitor {
    /// Create a monitor that considers an address dead after `timeout` of silence.
    pub fn new(timeout: Duration) -> Self {
        Self {
            last_seen: HashMap::new(),
            timeout,
        }
    }

    /// Record activity (a ping or any request) from `addr`.
    pub fn record(&mut self, addr: SocketAddr) {
        self.last_seen.insert(addr, Instant::now());
    }

    /// Stop tracking `addr`, e.g. after an explicit unsubscribe.
    pub fn forget(&mut self, addr: SocketAddr) {
        self.last_seen.remove(&addr);
    }

    /// Remove and return every address that exceeded the timeout.
    pub fn sweep(&mut self) -> Vec<SocketAddr> {
        let now = Instant::now();
        let timeout = self.timeout;
        let mut timed_out = Vec::new();

        self.last_seen.retain(|addr, seen| {
            if now.duration_since(*seen) > timeout {
                timed_out.push(*addr);
                false
            } else {
                true
            }
        });
        timed_out
    }

    /// Whether `addr` is currently tracked as live.
    pub fn is_live(&self, addr: &SocketAddr) -> bool {
        self.last_seen.contains_key(addr)
    }

    /// Number of tracked addresses.
    pub fn tracked(&self) -> usize {
        self.last_seen.len()
    }
}

/// Spawn a background thread that reads datagrams from the data `socket` and,
/// when a `PING` message is observed, refreshes the sender in `monitor`.
pub fn spawn_ping_listener(socket: Arc<UdpSocket>, monitor: Arc<Mutex<LivenessMonitor>>) {
    thread::spawn(move || {
        let mut buf = [0u8; 128];
        loop {
            if let Ok((size, addr)) = socket.recv_from(&mut buf) {
                if size >= 4 && &buf[..4] == b"PING" {
                    debug!("Received ping from {}", addr);
                    if let Ok(mut monitor) = monitor.lock() {
                        monitor.record(addr);
                    }
                }
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(port: u16) -> SocketAddr {
        format!("127.0.0.1:{}", port).parse().unwrap()
    }

    #[test]
    fn fresh_addresses_survive_a_sweep() {
        let mut monitor = LivenessMonitor::new(Duration::from_secs(5));
        monitor.record(addr(9001));
        assert!(monitor.sweep().is_empty());
        assert!(monitor.is_live(&addr(9001)));
    }

    #[test]
    fn silent_addresses_are_swept_out() {
        let mut monitor = LivenessMonitor::new(Duration::from_millis(20));
        monitor.record(addr(9001));
        monitor.record(addr(9002));
        thread::sleep(Duration::from_millis(40));
        monitor.record(addr(9002));

        let timed_out = monitor.sweep();
        assert_eq!(timed_out, vec![addr(9001)]);
        assert!(!monitor.is_live(&addr(9001)));
        assert!(monitor.is_live(&addr(9002)));
        assert_eq!(monitor.tracked(), 1);
    }

    #[test]
    fn forget_drops_tracking_immediately() {
        let mut monitor = LivenessMonitor::new(Duration::from_secs(5));
        monitor.record(addr(9001));
        monitor.forget(addr(9001));
        assert!(!monitor.is_live(&addr(9001)));
        assert!(monitor.sweep().is_empty());
    }
}
