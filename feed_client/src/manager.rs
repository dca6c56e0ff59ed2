//! Connection and subscription management.
//!
//! `FeedManager` is the single entry point for consuming the feed. One
//! connection per manager; `connect`/`disconnect` are idempotent. All state
//! mutation funnels through a single update channel: the UDP reader, the
//! simulation seed, and the fallback timer all send `Tick`s into it, and one
//! state task applies them to the price map and forwards them to every
//! `updates()` listener. Readers never touch the maps directly, so there is
//! exactly one writer.
//!
//! History requests are correlated by a monotonic id minted here and echoed
//! back by the server. Each request races the reply against a timeout; the
//! losing side finds its pending entry already gone and the result is
//! synthesized locally instead, so `HistoryHandle::wait` always resolves.

use std::collections::HashMap;
use std::io::ErrorKind;
use std::net::UdpSocket;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use clap::ValueEnum;
use crossbeam_channel::{Receiver, Sender, bounded, unbounded};
use log::{debug, info, warn};
use rand::Rng;
use strum_macros::Display;

use feed_common::generator::SyntheticGenerator;
use feed_common::interval::Interval;
use feed_common::net::{COMMAND_PORT, DATA_PORT, addr};
use feed_common::protocol::{Event, Request};
use feed_common::symbols::Symbol;
use feed_common::{FeedError, Result, Tick};

use crate::transport::RequestSender;

/// How long a history request waits for the server before synthesizing.
pub const HISTORY_TIMEOUT_MS: u64 = 5000;
/// Period of the synthetic fallback timer.
pub const FALLBACK_PERIOD_MS: u64 = 1000;
/// Read timeout on the client data socket, so shutdown is noticed promptly.
const READ_TIMEOUT_MS: u64 = 500;

/// Data source policy for a manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Display)]
#[clap(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum Mode {
    /// Server data only; a dead channel means no updates.
    Live,
    /// No server at all; every tick is generated locally.
    Simulated,
    /// Server data while the channel is up, synthetic ticks once it fails.
    LiveWithFallback,
}

impl Mode {
    fn is_live(self) -> bool {
        matches!(self, Mode::Live | Mode::LiveWithFallback)
    }
}

/// Manager configuration.
#[derive(Debug, Clone)]
pub struct ManagerConfig {
    /// Data source policy.
    pub mode: Mode,
    /// Server IP for both the TCP request channel and the UDP data channel.
    pub server_ip: String,
    /// Server TCP request port.
    pub command_port: u16,
    /// Server UDP data port (ping target).
    pub data_port: u16,
    /// How long a history request waits before synthesizing a fallback.
    pub history_timeout: Duration,
    /// Period of the fallback timer.
    pub fallback_period: Duration,
    /// Symbols the simulation seed and the fallback timer draw from.
    pub watchlist: Vec<Symbol>,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            mode: Mode::LiveWithFallback,
            server_ip: "127.0.0.1".to_string(),
            command_port: COMMAND_PORT,
            data_port: DATA_PORT,
            history_timeout: Duration::from_millis(HISTORY_TIMEOUT_MS),
            fallback_period: Duration::from_millis(FALLBACK_PERIOD_MS),
            watchlist: Symbol::universe(),
        }
    }
}

/// State shared between the manager and its background threads.
struct Shared {
    /// Latest tick per symbol, written only by the state task.
    prices: Mutex<HashMap<String, Tick>>,
    /// Resolved history series keyed by (symbol, interval label).
    cache: Mutex<HashMap<(String, String), Vec<Tick>>>,
    /// In-flight history requests awaiting a reply.
    pending: Mutex<HashMap<u64, Sender<Vec<Tick>>>>,
    /// Live `updates()` listeners.
    taps: Mutex<Vec<Sender<Tick>>>,
    /// Whether the server channel is believed healthy.
    channel_up: AtomicBool,
    next_request_id: AtomicU64,
}

impl Shared {
    fn new() -> Self {
        Self {
            prices: Mutex::new(HashMap::new()),
            cache: Mutex::new(HashMap::new()),
            pending: Mutex::new(HashMap::new()),
            taps: Mutex::new(Vec::new()),
            channel_up: AtomicBool::new(false),
            next_request_id: AtomicU64::new(1),
        }
    }
}

/// Per-connection state, dropped on disconnect.
struct Session {
    update_tx: Sender<Tick>,
    /// Local UDP (ip, port) the server replies to; absent in simulation.
    udp_addr: Option<(String, String)>,
    shutdown: Arc<AtomicBool>,
    /// Whether this session's fallback timer is running. Owned by the
    /// session so a timer left over from a previous connection can neither
    /// veto arming nor clear the flag of the current one.
    fallback_armed: Arc<AtomicBool>,
}

/// Client-side subscription manager.
pub struct FeedManager {
    config: ManagerConfig,
    shared: Arc<Shared>,
    session: Mutex<Option<Session>>,
}

impl FeedManager {
    /// Create a disconnected manager.
    pub fn new(config: ManagerConfig) -> Self {
        Self {
            config,
            shared: Arc::new(Shared::new()),
            session: Mutex::new(None),
        }
    }

    /// Establish the feed. Calling this on a connected manager is a no-op.
    pub fn connect(&self) -> Result<()> {
        let mut session = self.session.lock()?;
        if session.is_some() {
            debug!("connect() on an already connected manager, ignoring");
            return Ok(());
        }

        let shutdown = Arc::new(AtomicBool::new(false));
        let fallback_armed = Arc::new(AtomicBool::new(false));
        let (update_tx, update_rx) = unbounded::<Tick>();
        self.spawn_state_task(update_rx);

        let udp_addr = if self.config.mode.is_live() {
            Some(self.start_live_channel(&update_tx, &shutdown, &fallback_armed)?)
        } else {
            self.start_simulation(&update_tx, &shutdown, &fallback_armed);
            None
        };

        *session = Some(Session {
            update_tx,
            udp_addr,
            shutdown,
            fallback_armed,
        });
        info!("Feed manager connected (mode: {})", self.config.mode);
        Ok(())
    }

    /// Tear the feed down. Calling this on a disconnected manager is a no-op.
    ///
    /// In-flight history requests resolve with synthesized data: dropping
    /// their pending senders wakes the waiters immediately.
    pub fn disconnect(&self) -> Result<()> {
        let mut session = self.session.lock()?;
        let Some(session) = session.take() else {
            debug!("disconnect() on an already disconnected manager, ignoring");
            return Ok(());
        };

        if self.shared.channel_up.load(Ordering::SeqCst) {
            if let Some((ip, port)) = &session.udp_addr {
                let command_addr = addr(&self.config.server_ip, self.config.command_port);
                let _ = RequestSender::send_request(&command_addr, &Request::unsubscribe(ip, port));
            }
        }

        session.shutdown.store(true, Ordering::SeqCst);
        self.shared.channel_up.store(false, Ordering::SeqCst);

        let drained = match self.shared.pending.lock() {
            Ok(mut pending) => pending.drain().count(),
            Err(_) => 0,
        };
        if drained > 0 {
            info!("Disconnected with {} history requests in flight", drained);
        }
        info!("Feed manager disconnected");
        Ok(())
    }

    /// Stream of every update the manager applies, in application order.
    ///
    /// Each call registers an independent listener; all of them receive every
    /// tick. Listeners survive reconnects.
    pub fn updates(&self) -> Receiver<Tick> {
        let (tap_tx, tap_rx) = unbounded();
        if let Ok(mut taps) = self.shared.taps.lock() {
            taps.push(tap_tx);
        }
        tap_rx
    }

    /// The latest known tick per symbol. Empty before any data arrived.
    pub fn snapshot(&self) -> Result<HashMap<String, Tick>> {
        let prices = self.shared.prices.lock()?;
        Ok(prices.clone())
    }

    /// Request the history of `symbol` over `interval`.
    ///
    /// Resolution order: cache, then the server (when the channel is up),
    /// then locally synthesized data after the timeout. The returned handle
    /// always resolves.
    pub fn request_history(&self, symbol: Symbol, interval: Interval) -> Result<HistoryHandle> {
        let key = (symbol.to_string(), interval.to_string());
        if let Some(ticks) = self.shared.cache.lock()?.get(&key) {
            debug!("History cache hit for {}/{}", key.0, key.1);
            return Ok(HistoryHandle::ready(ticks.clone()));
        }

        if !self.shared.channel_up.load(Ordering::SeqCst) {
            return Ok(HistoryHandle::ready(self.synthesize_and_cache(&key)?));
        }

        let udp_addr = {
            let session = self.session.lock()?;
            session.as_ref().and_then(|s| s.udp_addr.clone())
        };
        let Some((ip, port)) = udp_addr else {
            return Ok(HistoryHandle::ready(self.synthesize_and_cache(&key)?));
        };

        let request_id = self.shared.next_request_id.fetch_add(1, Ordering::SeqCst);
        let (reply_tx, reply_rx) = bounded::<Vec<Tick>>(1);
        self.shared.pending.lock()?.insert(request_id, reply_tx);

        let request = Request::history(&ip, &port, request_id, &key.0, &key.1);
        let command_addr = addr(&self.config.server_ip, self.config.command_port);
        if let Err(e) = RequestSender::send_request(&command_addr, &request) {
            warn!("History request {} failed to send: {}", request_id, e);
            self.shared.pending.lock()?.remove(&request_id);
            self.mark_channel_down();
            return Ok(HistoryHandle::ready(self.synthesize_and_cache(&key)?));
        }

        Ok(self.spawn_history_waiter(request_id, key, reply_rx))
    }

    /// Race the server reply against the configured timeout.
    fn spawn_history_waiter(
        &self,
        request_id: u64,
        key: (String, String),
        reply_rx: Receiver<Vec<Tick>>,
    ) -> HistoryHandle {
        let (result_tx, result_rx) = bounded::<Vec<Tick>>(1);
        let shared = Arc::clone(&self.shared);
        let timeout = self.config.history_timeout;

        thread::spawn(move || {
            let ticks = match reply_rx.recv_timeout(timeout) {
                Ok(ticks) if !ticks.is_empty() => ticks,
                Ok(_) => {
                    debug!("History reply {} was empty, synthesizing", request_id);
                    SyntheticGenerator::history_series(&key.0, &key.1)
                }
                Err(_) => {
                    debug!("History request {} timed out, synthesizing", request_id);
                    SyntheticGenerator::history_series(&key.0, &key.1)
                }
            };
            if let Ok(mut pending) = shared.pending.lock() {
                pending.remove(&request_id);
            }
            // First resolution wins; a concurrent request for the same key
            // resolves with the already-cached series.
            let ticks = match shared.cache.lock() {
                Ok(mut cache) => cache.entry(key).or_insert(ticks).clone(),
                Err(_) => ticks,
            };
            let _ = result_tx.send(ticks);
        });
        HistoryHandle { rx: result_rx }
    }

    fn synthesize_and_cache(&self, key: &(String, String)) -> Result<Vec<Tick>> {
        let mut cache = self.shared.cache.lock()?;
        let ticks = cache
            .entry(key.clone())
            .or_insert_with(|| SyntheticGenerator::history_series(&key.0, &key.1))
            .clone();
        Ok(ticks)
    }

    /// The state task is the single writer of the price map.
    fn spawn_state_task(&self, update_rx: Receiver<Tick>) {
        let shared = Arc::clone(&self.shared);
        thread::spawn(move || {
            for tick in update_rx.iter() {
                if let Ok(mut prices) = shared.prices.lock() {
                    prices.insert(tick.symbol.clone(), tick.clone());
                }
                if let Ok(mut taps) = shared.taps.lock() {
                    taps.retain(|tap| tap.send(tick.clone()).is_ok());
                }
            }
        });
    }

    /// Bind the data socket, subscribe, and start the reader and ping loops.
    fn start_live_channel(
        &self,
        update_tx: &Sender<Tick>,
        shutdown: &Arc<AtomicBool>,
        fallback_armed: &Arc<AtomicBool>,
    ) -> Result<(String, String)> {
        let socket = Arc::new(UdpSocket::bind("0.0.0.0:0")?);
        socket.set_read_timeout(Some(Duration::from_millis(READ_TIMEOUT_MS)))?;
        let local_addr = socket.local_addr()?;
        let ip = local_addr.ip().to_string();
        let port = local_addr.port().to_string();
        info!("UDP data socket listening on: {}", local_addr);

        let command_addr = addr(&self.config.server_ip, self.config.command_port);
        let subscribed = RequestSender::send_request(&command_addr, &Request::subscribe(&ip, &port))
            .and_then(|_| {
                RequestSender::send_request(&command_addr, &Request::snapshot(&ip, &port))
            });
        match subscribed {
            Ok(()) => self.shared.channel_up.store(true, Ordering::SeqCst),
            Err(e) => {
                warn!("Failed to reach server at {}: {}", command_addr, e);
                self.mark_channel_down_with(update_tx, shutdown, fallback_armed);
            }
        }

        self.spawn_reader(
            Arc::clone(&socket),
            update_tx.clone(),
            Arc::clone(shutdown),
            Arc::clone(fallback_armed),
        );
        RequestSender::start_ping_thread(
            socket,
            addr(&self.config.server_ip, self.config.data_port),
            Arc::clone(shutdown),
        );
        Ok((ip, port))
    }

    /// Route incoming datagrams: price updates and snapshots go to the update
    /// channel, history replies resolve their pending entry.
    fn spawn_reader(
        &self,
        socket: Arc<UdpSocket>,
        update_tx: Sender<Tick>,
        shutdown: Arc<AtomicBool>,
        fallback_armed: Arc<AtomicBool>,
    ) {
        let shared = Arc::clone(&self.shared);
        let fallback = (self.config.mode == Mode::LiveWithFallback).then(|| {
            (self.config.watchlist.clone(), self.config.fallback_period)
        });
        thread::spawn(move || {
            let mut buf = [0u8; 65536];
            while !shutdown.load(Ordering::Relaxed) {
                let size = match socket.recv(&mut buf) {
                    Ok(size) => size,
                    Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {
                        continue;
                    }
                    Err(e) => {
                        warn!("Data socket receive error: {}", e);
                        shared.channel_up.store(false, Ordering::SeqCst);
                        if let Some((watchlist, period)) = fallback {
                            arm_fallback_timer(
                                &shared,
                                watchlist,
                                period,
                                &update_tx,
                                &shutdown,
                                &fallback_armed,
                            );
                        }
                        break;
                    }
                };
                match Event::from_json_bytes(&buf[..size]) {
                    Ok(Event::StockPrice(tick)) => {
                        if update_tx.send(tick).is_err() {
                            break;
                        }
                    }
                    Ok(Event::AllStocks(ticks)) => {
                        for tick in ticks {
                            if update_tx.send(tick).is_err() {
                                return;
                            }
                        }
                    }
                    Ok(Event::HistoricalData { request_id, ticks }) => {
                        let waiter = shared
                            .pending
                            .lock()
                            .ok()
                            .and_then(|mut pending| pending.remove(&request_id));
                        match waiter {
                            Some(reply_tx) => {
                                let _ = reply_tx.try_send(ticks);
                            }
                            None => debug!("Late history reply {}, discarding", request_id),
                        }
                    }
                    Err(_) => {
                        debug!(
                            "Received non-event datagram: {}",
                            String::from_utf8_lossy(&buf[..size])
                        );
                    }
                }
            }
        });
    }

    /// Seed the price map and run everything off the fallback timer.
    fn start_simulation(
        &self,
        update_tx: &Sender<Tick>,
        shutdown: &Arc<AtomicBool>,
        fallback_armed: &Arc<AtomicBool>,
    ) {
        for symbol in &self.config.watchlist {
            let tick = SyntheticGenerator::next_tick(&symbol.to_string(), None);
            let _ = update_tx.send(tick);
        }
        self.spawn_fallback_timer(update_tx, shutdown, fallback_armed);
    }

    fn mark_channel_down(&self) {
        let handles = self.session.lock().ok().and_then(|session| {
            session.as_ref().map(|s| {
                (
                    s.update_tx.clone(),
                    Arc::clone(&s.shutdown),
                    Arc::clone(&s.fallback_armed),
                )
            })
        });
        match handles {
            Some((update_tx, shutdown, armed)) => {
                self.mark_channel_down_with(&update_tx, &shutdown, &armed)
            }
            None => self.shared.channel_up.store(false, Ordering::SeqCst),
        }
    }

    fn mark_channel_down_with(
        &self,
        update_tx: &Sender<Tick>,
        shutdown: &Arc<AtomicBool>,
        fallback_armed: &Arc<AtomicBool>,
    ) {
        self.shared.channel_up.store(false, Ordering::SeqCst);
        if self.config.mode == Mode::LiveWithFallback {
            self.spawn_fallback_timer(update_tx, shutdown, fallback_armed);
        }
    }

    fn spawn_fallback_timer(
        &self,
        update_tx: &Sender<Tick>,
        shutdown: &Arc<AtomicBool>,
        fallback_armed: &Arc<AtomicBool>,
    ) {
        arm_fallback_timer(
            &self.shared,
            self.config.watchlist.clone(),
            self.config.fallback_period,
            update_tx,
            shutdown,
            fallback_armed,
        );
    }

    /// Number of unresolved history requests.
    #[cfg(test)]
    fn pending_len(&self) -> usize {
        self.shared.pending.lock().map(|p| p.len()).unwrap_or(0)
    }
}

/// Every period, walk 1-3 random watchlist symbols forward from their last
/// known price and push the ticks through the update channel.
///
/// `armed` belongs to one session: it is swapped here so a session arms at
/// most one timer, and the spawned thread clears only its own session's flag
/// on exit. A stale timer winding down cannot block a fresh connection from
/// arming its own.
fn arm_fallback_timer(
    shared: &Arc<Shared>,
    watchlist: Vec<Symbol>,
    period: Duration,
    update_tx: &Sender<Tick>,
    shutdown: &Arc<AtomicBool>,
    armed: &Arc<AtomicBool>,
) {
    if armed.swap(true, Ordering::SeqCst) {
        return;
    }
    let shared = Arc::clone(shared);
    let update_tx = update_tx.clone();
    let shutdown = Arc::clone(shutdown);
    let armed = Arc::clone(armed);
    info!("Fallback timer armed ({} symbols)", watchlist.len());

    thread::spawn(move || {
        let mut rng = rand::rng();
        while !shutdown.load(Ordering::Relaxed) {
            thread::sleep(period);
            if shutdown.load(Ordering::Relaxed) || watchlist.is_empty() {
                break;
            }
            let count = rng.random_range(1..=3usize.min(watchlist.len()));
            for _ in 0..count {
                let symbol = watchlist[rng.random_range(0..watchlist.len())];
                let last_price = shared
                    .prices
                    .lock()
                    .ok()
                    .and_then(|prices| prices.get(&symbol.to_string()).map(|t| t.price));
                let tick = SyntheticGenerator::next_tick(&symbol.to_string(), last_price);
                if update_tx.send(tick).is_err() {
                    armed.store(false, Ordering::SeqCst);
                    return;
                }
            }
        }
        armed.store(false, Ordering::SeqCst);
    });
}

impl Drop for FeedManager {
    fn drop(&mut self) {
        let _ = self.disconnect();
    }
}

/// Future-like handle to a history request.
pub struct HistoryHandle {
    rx: Receiver<Vec<Tick>>,
}

impl HistoryHandle {
    /// A handle that resolves immediately with `ticks`.
    fn ready(ticks: Vec<Tick>) -> Self {
        let (tx, rx) = bounded(1);
        let _ = tx.send(ticks);
        Self { rx }
    }

    /// Block until the request resolves. Guaranteed to return within the
    /// manager's history timeout plus scheduling slack.
    pub fn wait(self) -> Result<Vec<Tick>> {
        self.rx
            .recv()
            .map_err(|e| FeedError::ChannelRecv(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use feed_common::interval::SeriesPlan;
    use std::io::Read;
    use std::net::TcpListener;

    fn simulated_config() -> ManagerConfig {
        ManagerConfig {
            mode: Mode::Simulated,
            fallback_period: Duration::from_millis(50),
            watchlist: vec![Symbol::AAPL, Symbol::MSFT],
            ..ManagerConfig::default()
        }
    }

    /// TCP listener that accepts requests and optionally replies with a
    /// canned history event over UDP.
    fn spawn_fake_server(reply_empty_history: bool) -> u16 {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        thread::spawn(move || {
            let udp = UdpSocket::bind("127.0.0.1:0").unwrap();
            for stream in listener.incoming() {
                let Ok(mut stream) = stream else { continue };
                let mut buf = Vec::new();
                if stream.read_to_end(&mut buf).is_err() {
                    continue;
                }
                let Ok(request) = Request::from_bytes(&buf) else {
                    continue;
                };
                if !reply_empty_history {
                    continue;
                }
                if let feed_common::protocol::RequestKind::History { request_id, .. } = request.kind
                {
                    let event = Event::HistoricalData {
                        request_id,
                        ticks: vec![],
                    };
                    // Reply the way the real server does: peer IP + named port.
                    let target = format!("127.0.0.1:{}", request.port);
                    udp.send_to(&event.to_json_bytes().unwrap(), target).unwrap();
                }
            }
        });
        port
    }

    #[test]
    fn snapshot_is_empty_before_connect() {
        let manager = FeedManager::new(simulated_config());
        assert!(manager.snapshot().unwrap().is_empty());
    }

    #[test]
    fn simulated_connect_seeds_the_snapshot() {
        let config = simulated_config();
        let watchlist_len = config.watchlist.len();
        let manager = FeedManager::new(config);
        manager.connect().unwrap();
        thread::sleep(Duration::from_millis(200));

        let snapshot = manager.snapshot().unwrap();
        assert!(snapshot.contains_key("AAPL"));
        assert!(snapshot.contains_key("MSFT"));
        assert!(snapshot.len() <= watchlist_len);
        let now = Utc::now();
        for tick in snapshot.values() {
            assert!(tick.timestamp <= now);
        }
        manager.disconnect().unwrap();
    }

    #[test]
    fn connect_and_disconnect_are_idempotent() {
        let manager = FeedManager::new(simulated_config());
        manager.connect().unwrap();
        manager.connect().unwrap();
        manager.disconnect().unwrap();
        manager.disconnect().unwrap();
    }

    #[test]
    fn updates_stream_receives_fallback_ticks() {
        let manager = FeedManager::new(simulated_config());
        let updates = manager.updates();
        manager.connect().unwrap();

        // Seed ticks plus at least one fallback round.
        let mut received = 0;
        while received < 3 {
            updates.recv_timeout(Duration::from_secs(2)).unwrap();
            received += 1;
        }
        manager.disconnect().unwrap();
    }

    #[test]
    fn reconnect_rearms_the_fallback_timer() {
        let mut config = simulated_config();
        config.fallback_period = Duration::from_millis(300);
        let manager = FeedManager::new(config);

        // Disconnect mid-period so the old timer thread is still asleep when
        // the new session connects.
        manager.connect().unwrap();
        thread::sleep(Duration::from_millis(50));
        manager.disconnect().unwrap();
        manager.connect().unwrap();

        let updates = manager.updates();
        // The reconnect seeds at most one tick per watchlist symbol (two
        // here); anything beyond that must come from the new session's timer.
        for _ in 0..4 {
            updates
                .recv_timeout(Duration::from_secs(2))
                .expect("no fallback ticks after reconnect");
        }
        manager.disconnect().unwrap();
    }

    #[test]
    fn simulated_history_is_synthesized_and_cached() {
        let manager = FeedManager::new(simulated_config());
        manager.connect().unwrap();

        let first = manager
            .request_history(Symbol::AAPL, Interval::OneWeek)
            .unwrap()
            .wait()
            .unwrap();
        assert_eq!(first.len(), SeriesPlan::for_label("1w").point_count);

        let second = manager
            .request_history(Symbol::AAPL, Interval::OneWeek)
            .unwrap()
            .wait()
            .unwrap();
        assert_eq!(first, second);
        manager.disconnect().unwrap();
    }

    #[test]
    fn silent_server_resolves_history_via_timeout() {
        let port = spawn_fake_server(false);
        let manager = FeedManager::new(ManagerConfig {
            mode: Mode::Live,
            command_port: port,
            history_timeout: Duration::from_millis(200),
            watchlist: vec![Symbol::AAPL],
            ..ManagerConfig::default()
        });
        manager.connect().unwrap();

        let ticks = manager
            .request_history(Symbol::NVDA, Interval::OneDay)
            .unwrap()
            .wait()
            .unwrap();
        assert_eq!(ticks.len(), SeriesPlan::for_label("1d").point_count);
        assert_eq!(manager.pending_len(), 0);
        manager.disconnect().unwrap();
    }

    #[test]
    fn empty_server_reply_falls_back_to_synthetic_data() {
        let port = spawn_fake_server(true);
        let manager = FeedManager::new(ManagerConfig {
            mode: Mode::Live,
            command_port: port,
            history_timeout: Duration::from_secs(5),
            watchlist: vec![Symbol::AAPL],
            ..ManagerConfig::default()
        });
        manager.connect().unwrap();

        let ticks = manager
            .request_history(Symbol::TSLA, Interval::OneMonth)
            .unwrap()
            .wait()
            .unwrap();
        assert_eq!(ticks.len(), SeriesPlan::for_label("1m").point_count);
        assert_eq!(manager.pending_len(), 0);
        manager.disconnect().unwrap();
    }

    #[test]
    fn concurrent_history_requests_share_one_cached_series() {
        let port = spawn_fake_server(false);
        let manager = FeedManager::new(ManagerConfig {
            mode: Mode::Live,
            command_port: port,
            history_timeout: Duration::from_millis(200),
            watchlist: vec![Symbol::AAPL],
            ..ManagerConfig::default()
        });
        manager.connect().unwrap();

        // Both miss the cache and go in flight; the first resolution caches
        // and the second resolves with the cached series.
        let first_handle = manager
            .request_history(Symbol::GOOGL, Interval::OneDay)
            .unwrap();
        let second_handle = manager
            .request_history(Symbol::GOOGL, Interval::OneDay)
            .unwrap();
        let first = first_handle.wait().unwrap();
        let second = second_handle.wait().unwrap();
        assert_eq!(first, second);

        let third = manager
            .request_history(Symbol::GOOGL, Interval::OneDay)
            .unwrap()
            .wait()
            .unwrap();
        assert_eq!(first, third);
        assert_eq!(manager.pending_len(), 0);
        manager.disconnect().unwrap();
    }

    #[test]
    fn disconnect_resolves_in_flight_history() {
        let port = spawn_fake_server(false);
        let manager = FeedManager::new(ManagerConfig {
            mode: Mode::Live,
            command_port: port,
            history_timeout: Duration::from_secs(30),
            watchlist: vec![Symbol::AAPL],
            ..ManagerConfig::default()
        });
        manager.connect().unwrap();

        let handle = manager
            .request_history(Symbol::IBM, Interval::OneYear)
            .unwrap();
        manager.disconnect().unwrap();

        // The dropped pending sender wakes the waiter well before the timeout.
        let ticks = handle.wait().unwrap();
        assert_eq!(ticks.len(), SeriesPlan::for_label("1y").point_count);
        assert_eq!(manager.pending_len(), 0);
    }

    #[test]
    fn unreachable_server_arms_the_fallback_timer() {
        let manager = FeedManager::new(ManagerConfig {
            mode: Mode::LiveWithFallback,
            // Reserved port nobody listens on.
            command_port: 1,
            fallback_period: Duration::from_millis(50),
            watchlist: vec![Symbol::AAPL],
            ..ManagerConfig::default()
        });
        let updates = manager.updates();
        manager.connect().unwrap();

        let tick = updates.recv_timeout(Duration::from_secs(2)).unwrap();
        assert_eq!(tick.symbol, "AAPL");
        manager.disconnect().unwrap();
    }
}
