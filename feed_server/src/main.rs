//! Price feed server.
//!
//! This binary wires the library pieces together:
//!
//! - One tick source runs per process: the upstream UDP consumer, or the
//!   in-process simulation when `--simulate` is given.
//! - The TCP command receiver decodes client requests and forwards them with
//!   the client's UDP reply address.
//! - The hub loop (`select!` below) is the single writer of history and the
//!   subscriber registry. It applies ticks, answers snapshot/history requests
//!   with one-off datagrams, and spawns a stream thread per subscriber.
//! - The ping listener plus a periodic sweep evict subscribers that stopped
//!   sending keep-alives.
//!
//! Ctrl-C flips a shutdown flag and pokes the hub loop, which drains pending
//! ticks, stops every stream thread, and exits.
#![warn(missing_docs)]

use std::net::{SocketAddr, UdpSocket};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use clap::Parser;
use crossbeam_channel::{Sender, bounded, select, unbounded};
use log::{error, info, warn};

use feed_common::Result;
use feed_common::net::{COMMAND_PORT, DATA_PORT, PING_TIMEOUT_SECS, UPSTREAM_PORT, addr};
use feed_common::protocol::{Event, Request, RequestKind};
use feed_common::symbols::Symbol;

use feed_server::commands::CommandReceiver;
use feed_server::hub::{Hub, HubConfig};
use feed_server::ingest::{SIMULATION_PERIOD_MS, UpstreamConsumer, spawn_simulator};
use feed_server::model::history::HISTORY_BUFFER_CAPACITY;
use feed_server::model::liveness::{LivenessMonitor, spawn_ping_listener};
use feed_server::registry::{OverflowPolicy, RegistryConfig};
use feed_server::stream::handle_subscriber_stream;

/// Command-line arguments.
#[derive(Parser, Debug)]
#[command(about = "Real-time price feed server")]
struct Args {
    /// TCP port for client requests.
    #[arg(long, default_value_t = COMMAND_PORT)]
    command_port: u16,

    /// UDP port events are sent from and pings received on.
    #[arg(long, default_value_t = DATA_PORT)]
    data_port: u16,

    /// UDP port for the upstream tick feed.
    #[arg(long, default_value_t = UPSTREAM_PORT)]
    upstream_port: u16,

    /// Generate synthetic ticks instead of consuming the upstream feed.
    #[arg(long)]
    simulate: bool,

    /// What to do with a subscriber whose queue is full.
    #[arg(long, value_enum, default_value_t = OverflowPolicy::DropOldest)]
    overflow_policy: OverflowPolicy,

    /// Outbound queue capacity per subscriber.
    #[arg(long, default_value_t = 256)]
    subscriber_queue: usize,
}

fn main() -> Result<()> {
    init_logger();
    let args = Args::parse();

    let udp_socket = Arc::new(UdpSocket::bind(addr("0.0.0.0", args.data_port))?);
    info!("UDP data socket created on: {}", udp_socket.local_addr()?);

    let monitor = Arc::new(Mutex::new(LivenessMonitor::new(Duration::from_secs(
        PING_TIMEOUT_SECS,
    ))));
    spawn_ping_listener(Arc::clone(&udp_socket), Arc::clone(&monitor));
    let (timeout_tx, timeout_rx) = unbounded::<SocketAddr>();
    spawn_liveness_sweeper(Arc::clone(&monitor), timeout_tx);

    let (cmd_tx, cmd_rx) = unbounded::<(Request, SocketAddr)>();
    let command_receiver = CommandReceiver::new(&addr("0.0.0.0", args.command_port))?;
    thread::spawn(move || {
        if let Err(e) = command_receiver.receive_loop(cmd_tx) {
            error!("Command receiver failed: {:?}", e);
        }
    });

    let shutdown = Arc::new(AtomicBool::new(false));
    let (shutdown_tx, shutdown_rx) = bounded::<()>(1);
    let shutdown_flag = Arc::clone(&shutdown);
    ctrlc::set_handler(move || {
        shutdown_flag.store(true, Ordering::SeqCst);
        let _ = shutdown_tx.try_send(());
    })
    .map_err(|e| feed_common::FeedError::Format(format!("Failed to set Ctrl-C handler: {}", e)))?;

    let (tick_tx, tick_rx) = unbounded();
    if args.simulate {
        spawn_simulator(
            Symbol::universe(),
            Duration::from_millis(SIMULATION_PERIOD_MS),
            tick_tx,
            Arc::clone(&shutdown),
        );
    } else {
        let consumer = UpstreamConsumer::new(&addr("0.0.0.0", args.upstream_port))?;
        let shutdown_clone = Arc::clone(&shutdown);
        thread::spawn(move || {
            if let Err(e) = consumer.run(tick_tx, shutdown_clone) {
                error!("Upstream consumer failed: {:?}", e);
            }
        });
    }

    let mut hub = Hub::new(HubConfig {
        buffer_capacity: HISTORY_BUFFER_CAPACITY,
        registry: RegistryConfig {
            queue_capacity: args.subscriber_queue,
            policy: args.overflow_policy,
        },
    });
    info!(
        "Hub started (overflow policy: {}, queue capacity: {})",
        args.overflow_policy, args.subscriber_queue
    );

    loop {
        select! {
            recv(tick_rx) -> msg => match msg {
                Ok(tick) => {
                    for removed in hub.apply_tick(tick) {
                        forget_subscriber(&monitor, removed);
                    }
                }
                Err(_) => break,
            },
            recv(cmd_rx) -> msg => if let Ok((request, reply_addr)) = msg {
                handle_request(&mut hub, &monitor, &udp_socket, request, reply_addr);
            },
            recv(timeout_rx) -> msg => if let Ok(silent_addr) = msg {
                if hub.unsubscribe(silent_addr) {
                    info!("Stream for {} closed: ping timeout", silent_addr);
                }
            },
            recv(shutdown_rx) -> _ => break,
        }
        if shutdown.load(Ordering::SeqCst) {
            break;
        }
    }

    // Apply anything the source delivered before it noticed the flag.
    while let Ok(tick) = tick_rx.try_recv() {
        hub.apply_tick(tick);
    }
    hub.shutdown();
    info!("Server stopped");
    Ok(())
}

/// Dispatch one decoded client request.
fn handle_request(
    hub: &mut Hub,
    monitor: &Arc<Mutex<LivenessMonitor>>,
    socket: &Arc<UdpSocket>,
    request: Request,
    reply_addr: SocketAddr,
) {
    if let Ok(mut monitor) = monitor.lock() {
        monitor.record(reply_addr);
    }

    match request.kind {
        RequestKind::Subscribe => {
            let (data_rx, stop_rx) = hub.subscribe(reply_addr);
            let socket_clone = Arc::clone(socket);
            thread::spawn(move || {
                if let Err(e) = handle_subscriber_stream(socket_clone, reply_addr, data_rx, stop_rx)
                {
                    error!("Subscriber stream error: {:?}", e);
                }
            });
            info!("A stream has been created for the client on UDP address: {}", reply_addr);
        }
        RequestKind::Unsubscribe => {
            hub.unsubscribe(reply_addr);
            forget_subscriber(monitor, reply_addr);
        }
        RequestKind::Snapshot => {
            send_event(socket, reply_addr, &hub.snapshot_event());
        }
        RequestKind::History { request_id, symbol, .. } => {
            send_event(socket, reply_addr, &hub.history_event(request_id, &symbol));
        }
    }
}

/// One-off event delivery for snapshot and history answers.
fn send_event(socket: &Arc<UdpSocket>, target: SocketAddr, event: &Event) {
    match event.to_json_bytes() {
        Ok(data) => {
            if let Err(e) = socket.send_to(&data, target) {
                warn!("Failed to send reply to {}: {}", target, e);
            }
        }
        Err(e) => error!("Failed to serialize reply for {}: {}", target, e),
    }
}

fn forget_subscriber(monitor: &Arc<Mutex<LivenessMonitor>>, addr: SocketAddr) {
    if let Ok(mut monitor) = monitor.lock() {
        monitor.forget(addr);
    }
}

/// Periodically sweep the liveness monitor and report silent subscribers.
fn spawn_liveness_sweeper(monitor: Arc<Mutex<LivenessMonitor>>, timeout_tx: Sender<SocketAddr>) {
    thread::spawn(move || {
        let check_interval = Duration::from_secs(1);
        loop {
            thread::sleep(check_interval);
            let timed_out = match monitor.lock() {
                Ok(mut monitor) => monitor.sweep(),
                Err(_) => continue,
            };
            for silent_addr in timed_out {
                if timeout_tx.send(silent_addr).is_err() {
                    return;
                }
            }
        }
    });
}

fn init_logger() {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();
}
