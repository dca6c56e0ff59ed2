//! Ingestion and broadcast hub.
//!
//! The hub is the single owner of the history buffer and the subscriber
//! registry. Ticks are applied in arrival order on one thread (the binary's
//! `select!` loop), so per-symbol history always reflects the order the hub
//! observed. Snapshot and history answers are built from the same state that
//! the broadcast path writes, never from a separate copy.

use std::net::SocketAddr;

use crossbeam_channel::Receiver;
use log::info;

use feed_common::Tick;
use feed_common::protocol::Event;

use crate::model::history::{HISTORY_BUFFER_CAPACITY, HistoryBuffer};
use crate::registry::{RegistryConfig, SubscriberRegistry};

/// Hub configuration.
#[derive(Debug, Clone)]
pub struct HubConfig {
    /// Ticks retained per symbol.
    pub buffer_capacity: usize,
    /// Subscriber queue sizing and overflow policy.
    pub registry: RegistryConfig,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            buffer_capacity: HISTORY_BUFFER_CAPACITY,
            registry: RegistryConfig::default(),
        }
    }
}

/// Single-threaded owner of history and subscriptions.
pub struct Hub {
    history: HistoryBuffer,
    registry: SubscriberRegistry,
    ticks_ingested: u64,
}

impl Hub {
    /// Create a hub from `config`.
    pub fn new(config: HubConfig) -> Self {
        Self {
            history: HistoryBuffer::new(config.buffer_capacity),
            registry: SubscriberRegistry::new(config.registry),
            ticks_ingested: 0,
        }
    }

    /// Register `addr` as a subscriber, returning the receivers its stream
    /// task drains. Re-subscribing replaces the previous stream.
    pub fn subscribe(&mut self, addr: SocketAddr) -> (Receiver<Event>, Receiver<()>) {
        info!("Subscriber registered: {}", addr);
        self.registry.register(addr)
    }

    /// Remove `addr` and stop its stream task. Unknown addresses are a no-op.
    pub fn unsubscribe(&mut self, addr: SocketAddr) -> bool {
        let removed = self.registry.remove(addr);
        if removed {
            info!("Subscriber removed: {}", addr);
        }
        removed
    }

    /// Record `tick` in the history window and broadcast it to every
    /// subscriber. Returns the subscribers removed by the overflow policy.
    pub fn apply_tick(&mut self, tick: Tick) -> Vec<SocketAddr> {
        self.ticks_ingested += 1;
        let event = Event::StockPrice(tick.clone());
        self.history.push(tick);
        self.registry.broadcast(&event)
    }

    /// Snapshot answer: the latest retained tick per symbol.
    pub fn snapshot_event(&self) -> Event {
        Event::AllStocks(self.history.latest_per_symbol())
    }

    /// History answer for `symbol`, echoing the client's `request_id`.
    ///
    /// An unseen symbol yields an empty series; the client decides whether to
    /// fall back to synthetic data.
    pub fn history_event(&self, request_id: u64, symbol: &str) -> Event {
        Event::HistoricalData {
            request_id,
            ticks: self.history.series(symbol),
        }
    }

    /// Number of live subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.registry.len()
    }

    /// Total ticks applied since startup.
    pub fn ticks_ingested(&self) -> u64 {
        self.ticks_ingested
    }

    /// Stop all stream tasks.
    pub fn shutdown(&mut self) {
        info!(
            "Hub shutting down: {} subscribers, {} ticks ingested, {} events dropped",
            self.registry.len(),
            self.ticks_ingested,
            self.registry.total_dropped()
        );
        self.registry.stop_all();
    }
}
