//! Subscriber registry and broadcast fan-out.
//!
//! Each subscriber owns a bounded outbound queue drained by its stream task.
//! Broadcast is fire-and-forget: the hub `try_send`s into every queue and
//! never waits, so one slow subscriber cannot stall ingestion or delivery to
//! the others. A full queue triggers the configured `OverflowPolicy`.
//!
//! The registry keeps a receiver clone for every queue; that is what lets the
//! `DropOldest` policy evict the oldest queued event from the sending side
//! (crossbeam channels are multi-consumer).

use std::collections::HashMap;
use std::net::SocketAddr;

use clap::ValueEnum;
use crossbeam_channel::{Receiver, Sender, TrySendError, bounded};
use log::{debug, warn};
use strum_macros::Display;

use feed_common::protocol::Event;

/// What to do with a subscriber whose outbound queue is full.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Display)]
#[clap(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum OverflowPolicy {
    /// Evict the oldest queued event to make room; the subscriber stays
    /// connected but loses intermediate data.
    DropOldest,
    /// Remove the lagging subscriber and stop its stream task.
    Disconnect,
}

/// Configuration for the subscriber registry.
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Outbound queue capacity per subscriber.
    pub queue_capacity: usize,
    /// Overflow policy applied when a queue is full.
    pub policy: OverflowPolicy,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 256,
            policy: OverflowPolicy::DropOldest,
        }
    }
}

/// State held per subscriber.
struct Subscription {
    data_tx: Sender<Event>,
    /// Receiver clone used to evict the oldest event under `DropOldest`.
    evict_rx: Receiver<Event>,
    stop_tx: Sender<()>,
    /// Events dropped for this subscriber due to overflow.
    dropped: u64,
}

/// Tracks live subscriber handles keyed by their UDP reply address.
pub struct SubscriberRegistry {
    subscriptions: HashMap<SocketAddr, Subscription>,
    config: RegistryConfig,
    total_dropped: u64,
    total_disconnected: u64,
}

impl SubscriberRegistry {
    /// Create an empty registry with the given configuration.
    pub fn new(config: RegistryConfig) -> Self {
        Self {
            subscriptions: HashMap::new(),
            config,
            total_dropped: 0,
            total_disconnected: 0,
        }
    }

    /// Register `addr`, returning the data and stop receivers for its stream task.
    ///
    /// A repeated registration replaces the previous one; dropping the old
    /// subscription's stop sender makes the old stream task exit.
    pub fn register(&mut self, addr: SocketAddr) -> (Receiver<Event>, Receiver<()>) {
        if self.subscriptions.remove(&addr).is_some() {
            debug!("Replacing existing subscription for {}", addr);
        }
        let (data_tx, data_rx) = bounded(self.config.queue_capacity);
        let (stop_tx, stop_rx) = bounded(1);
        self.subscriptions.insert(
            addr,
            Subscription {
                data_tx,
                evict_rx: data_rx.clone(),
                stop_tx,
                dropped: 0,
            },
        );
        (data_rx, stop_rx)
    }

    /// Remove `addr` and signal its stream task to stop.
    pub fn remove(&mut self, addr: SocketAddr) -> bool {
        match self.subscriptions.remove(&addr) {
            Some(subscription) => {
                let _ = subscription.stop_tx.try_send(());
                true
            }
            None => false,
        }
    }

    /// Deliver `event` to every subscriber, fire-and-forget.
    ///
    /// Returns the addresses removed because of the overflow policy or a
    /// closed queue. One handle's failure never blocks the others.
    pub fn broadcast(&mut self, event: &Event) -> Vec<SocketAddr> {
        let mut to_remove = Vec::new();
        for (addr, subscription) in self.subscriptions.iter_mut() {
            match subscription.data_tx.try_send(event.clone()) {
                Ok(()) => {}
                Err(TrySendError::Full(event)) => match self.config.policy {
                    OverflowPolicy::DropOldest => {
                        let _ = subscription.evict_rx.try_recv();
                        subscription.dropped += 1;
                        self.total_dropped += 1;
                        if subscription.data_tx.try_send(event).is_err() {
                            to_remove.push(*addr);
                        }
                    }
                    OverflowPolicy::Disconnect => to_remove.push(*addr),
                },
                Err(TrySendError::Disconnected(_)) => to_remove.push(*addr),
            }
        }
        for addr in &to_remove {
            self.remove(*addr);
            self.total_disconnected += 1;
            warn!("Subscriber {} removed: outbound queue overflow", addr);
        }
        to_remove
    }

    /// Signal every stream task to stop and clear the registry.
    pub fn stop_all(&mut self) {
        for (addr, subscription) in self.subscriptions.drain() {
            let _ = subscription.stop_tx.try_send(());
            debug!("Stopped stream for {}", addr);
        }
    }

    /// Whether `addr` is currently registered.
    pub fn contains(&self, addr: &SocketAddr) -> bool {
        self.subscriptions.contains_key(addr)
    }

    /// Number of registered subscribers.
    pub fn len(&self) -> usize {
        self.subscriptions.len()
    }

    /// Whether the registry has no subscribers.
    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty()
    }

    /// Events dropped for `addr` due to overflow.
    pub fn dropped_for(&self, addr: &SocketAddr) -> u64 {
        self.subscriptions
            .get(addr)
            .map(|s| s.dropped)
            .unwrap_or(0)
    }

    /// Total events dropped across all subscribers.
    pub fn total_dropped(&self) -> u64 {
        self.total_dropped
    }

    /// Total subscribers removed by the overflow policy.
    pub fn total_disconnected(&self) -> u64 {
        self.total_disconnected
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use feed_common::Tick;

    fn make_event(price: f64) -> Event {
        Event::StockPrice(Tick {
            symbol: "AAPL".to_string(),
            price,
            change: 0.0,
            percent_change: 0.0,
            volume: 2000,
            timestamp: Utc::now(),
        })
    }

    fn addr(port: u16) -> SocketAddr {
        format!("127.0.0.1:{}", port).parse().unwrap()
    }

    #[test]
    fn each_subscriber_gets_exactly_one_copy() {
        let mut registry = SubscriberRegistry::new(RegistryConfig::default());
        let receivers: Vec<_> = (0..3).map(|i| registry.register(addr(9100 + i)).0).collect();

        let removed = registry.broadcast(&make_event(100.0));
        assert!(removed.is_empty());

        for rx in &receivers {
            assert_eq!(rx.len(), 1);
            match rx.recv().unwrap() {
                Event::StockPrice(tick) => assert_eq!(tick.price, 100.0),
                other => panic!("unexpected event {:?}", other),
            }
        }
    }

    #[test]
    fn drop_oldest_evicts_exactly_the_oldest() {
        let config = RegistryConfig {
            queue_capacity: 2,
            policy: OverflowPolicy::DropOldest,
        };
        let mut registry = SubscriberRegistry::new(config);
        let (data_rx, _stop_rx) = registry.register(addr(9200));

        registry.broadcast(&make_event(1.0));
        registry.broadcast(&make_event(2.0));
        let removed = registry.broadcast(&make_event(3.0));

        assert!(removed.is_empty());
        assert!(registry.contains(&addr(9200)));
        assert_eq!(registry.dropped_for(&addr(9200)), 1);
        assert_eq!(registry.total_dropped(), 1);

        let prices: Vec<f64> = data_rx
            .try_iter()
            .map(|e| match e {
                Event::StockPrice(t) => t.price,
                other => panic!("unexpected event {:?}", other),
            })
            .collect();
        assert_eq!(prices, vec![2.0, 3.0]);
    }

    #[test]
    fn disconnect_policy_removes_the_lagging_subscriber() {
        let config = RegistryConfig {
            queue_capacity: 1,
            policy: OverflowPolicy::Disconnect,
        };
        let mut registry = SubscriberRegistry::new(config);
        let lagging = addr(9300);
        let healthy = addr(9301);
        let (_lag_rx, _lag_stop) = registry.register(lagging);
        let (healthy_rx, _healthy_stop) = registry.register(healthy);

        registry.broadcast(&make_event(1.0));
        // Drain only the healthy subscriber.
        assert!(healthy_rx.recv().is_ok());

        let removed = registry.broadcast(&make_event(2.0));
        assert_eq!(removed, vec![lagging]);
        assert!(!registry.contains(&lagging));
        assert!(registry.contains(&healthy));
        assert_eq!(registry.total_disconnected(), 1);
    }

    #[test]
    fn re_registration_replaces_the_previous_subscription() {
        let mut registry = SubscriberRegistry::new(RegistryConfig::default());
        let (old_rx, old_stop) = registry.register(addr(9400));
        let (new_rx, _new_stop) = registry.register(addr(9400));
        assert_eq!(registry.len(), 1);

        // The old stop channel disconnects, which is how the old stream exits.
        assert!(old_stop.try_recv().is_err());

        registry.broadcast(&make_event(5.0));
        assert_eq!(new_rx.len(), 1);
        assert_eq!(old_rx.len(), 0);
    }

    #[test]
    fn remove_signals_the_stream_task() {
        let mut registry = SubscriberRegistry::new(RegistryConfig::default());
        let (_data_rx, stop_rx) = registry.register(addr(9500));
        assert!(registry.remove(addr(9500)));
        assert!(stop_rx.try_recv().is_ok());
        assert!(!registry.remove(addr(9500)));
        assert!(registry.is_empty());
    }
}
