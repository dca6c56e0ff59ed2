//! Per-subscriber delivery task.
//!
//! Each subscriber gets its own thread that drains the bounded queue filled by
//! the hub and writes JSON-encoded events to the subscriber's UDP address.
//! The task exits on a stop signal, on queue disconnect, or on a send error;
//! either way the failure stays local to this one subscriber.

use std::net::{SocketAddr, UdpSocket};
use std::sync::Arc;

use crossbeam_channel::{Receiver, select};
use log::{debug, error};

use feed_common::Result;
use feed_common::protocol::Event;

/// Drain `data_rx` and deliver every event to `target` over `socket`.
///
/// Terminates when:
/// - a stop signal arrives on `stop_rx` (or its sender is dropped),
/// - the data queue disconnects (subscription removed), or
/// - a serialization or send error occurs.
pub fn handle_subscriber_stream(
    socket: Arc<UdpSocket>,
    target: SocketAddr,
    data_rx: Receiver<Event>,
    stop_rx: Receiver<()>,
) -> Result<()> {
    loop {
        select! {
            recv(stop_rx) -> _ => break,
            recv(data_rx) -> msg => match msg {
                Ok(event) => match event.to_json_bytes() {
                    Ok(data) => {
                        if let Err(e) = socket.send_to(&data, target) {
                            error!("Failed to send UDP packet to {}: {}", target, e);
                            break;
                        }
                    }
                    Err(e) => {
                        error!("Failed to serialize event for {}: {}", target, e);
                        break;
                    }
                },
                Err(_) => break,
            }
        }
    }
    debug!("Stream task for {} finished", target);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use crossbeam_channel::bounded;
    use feed_common::Tick;
    use std::thread;
    use std::time::Duration;

    fn make_event(price: f64) -> Event {
        Event::StockPrice(Tick {
            symbol: "AAPL".to_string(),
            price,
            change: 0.5,
            percent_change: 0.25,
            volume: 3000,
            timestamp: Utc::now(),
        })
    }

    #[test]
    fn events_arrive_at_the_target_socket() {
        let receiver = UdpSocket::bind("127.0.0.1:0").unwrap();
        receiver
            .set_read_timeout(Some(Duration::from_secs(2)))
            .unwrap();
        let target = receiver.local_addr().unwrap();
        let sender = Arc::new(UdpSocket::bind("127.0.0.1:0").unwrap());

        let (data_tx, data_rx) = bounded(8);
        let (stop_tx, stop_rx) = bounded(1);
        let handle = thread::spawn(move || handle_subscriber_stream(sender, target, data_rx, stop_rx));

        data_tx.send(make_event(187.5)).unwrap();

        let mut buf = [0u8; 2048];
        let (size, _) = receiver.recv_from(&mut buf).unwrap();
        let event = Event::from_json_bytes(&buf[..size]).unwrap();
        match event {
            Event::StockPrice(tick) => {
                assert_eq!(tick.symbol, "AAPL");
                assert_eq!(tick.price, 187.5);
            }
            other => panic!("unexpected event {:?}", other),
        }

        stop_tx.send(()).unwrap();
        assert!(handle.join().unwrap().is_ok());
    }

    #[test]
    fn task_exits_when_the_queue_disconnects() {
        let receiver = UdpSocket::bind("127.0.0.1:0").unwrap();
        let target = receiver.local_addr().unwrap();
        let sender = Arc::new(UdpSocket::bind("127.0.0.1:0").unwrap());

        let (data_tx, data_rx) = bounded::<Event>(8);
        let (_stop_tx, stop_rx) = bounded(1);
        let handle = thread::spawn(move || handle_subscriber_stream(sender, target, data_rx, stop_rx));

        drop(data_tx);
        assert!(handle.join().unwrap().is_ok());
    }
}
