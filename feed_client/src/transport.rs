//! Low-level request delivery and keep-alive pings.
//!
//! Requests travel over short-lived TCP connections: connect, write one
//! encoded `Request`, close. Subscribed clients additionally send `PING`
//! datagrams from their data socket so the server's liveness sweep keeps
//! them registered.

use std::io::{ErrorKind, Write};
use std::net::{TcpStream, UdpSocket};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use log::{debug, error, info};

use feed_common::Result;
use feed_common::net::PING_PERIOD_MS;
use feed_common::protocol::Request;

/// Helper type for sending requests to the server.
pub struct RequestSender;

impl RequestSender {
    /// Send one encoded request over a fresh TCP connection.
    pub fn send_request(command_addr: &str, request: &Request) -> Result<()> {
        let bytes = request.to_bytes()?;
        let mut stream = TcpStream::connect(command_addr)?;
        stream.write_all(&bytes)?;
        debug!("Request {:?} sent to {}", request.kind, command_addr);
        Ok(())
    }

    /// Spawn the keep-alive loop, sending `PING` to `target_addr` every
    /// ping period until `shutdown` is set.
    pub fn start_ping_thread(socket: Arc<UdpSocket>, target_addr: String, shutdown: Arc<AtomicBool>) {
        info!("Ping thread started. Target: {}", target_addr);
        thread::spawn(move || {
            let interval = Duration::from_millis(PING_PERIOD_MS);
            while !shutdown.load(Ordering::Relaxed) {
                thread::sleep(interval);
                if shutdown.load(Ordering::Relaxed) {
                    break;
                }
                match socket.send_to(b"PING", &target_addr) {
                    Ok(_) => debug!("PING sent to {}", target_addr),
                    Err(ref e) if e.kind() == ErrorKind::ConnectionReset => continue,
                    Err(e) => error!("Failed to send PING: {}", e),
                }
            }
            info!("Ping thread stopping...");
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use std::net::TcpListener;

    #[test]
    fn request_arrives_intact_over_tcp() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        let request = Request::subscribe("127.0.0.1", "9123");
        RequestSender::send_request(&addr.to_string(), &request).unwrap();

        let (mut stream, _) = listener.accept().unwrap();
        let mut buf = Vec::new();
        stream.read_to_end(&mut buf).unwrap();
        assert_eq!(Request::from_bytes(&buf).unwrap(), request);
    }

    #[test]
    fn send_fails_when_nothing_listens() {
        let request = Request::snapshot("127.0.0.1", "9124");
        assert!(RequestSender::send_request("127.0.0.1:1", &request).is_err());
    }
}
