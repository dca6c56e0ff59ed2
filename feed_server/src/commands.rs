//! TCP command receiver.
//!
//! Clients send one binary-encoded `Request` per short-lived TCP connection.
//! Each decoded request is forwarded into the hub channel together with the
//! client's UDP reply address, built from the connection's source IP and the
//! port the client named in the request. A malformed request only fails that
//! one connection; the accept loop keeps serving everybody else.

use std::io::Read;
use std::net::{SocketAddr, TcpListener, TcpStream};

use crossbeam_channel::Sender;
use log::{debug, info, warn};

use feed_common::protocol::Request;
use feed_common::{FeedError, Result};

/// Accepts client connections and decodes their requests.
pub struct CommandReceiver {
    listener: TcpListener,
}

impl CommandReceiver {
    /// Bind the receiver to `bind_addr` (e.g. `0.0.0.0:8080`).
    pub fn new(bind_addr: &str) -> Result<Self> {
        let listener = TcpListener::bind(bind_addr)?;
        Ok(Self { listener })
    }

    /// The bound local address.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Blocking accept loop. Every decoded request is sent to `tx` with the
    /// client's UDP reply address.
    ///
    /// Per-connection failures are logged and skipped. The loop itself only
    /// ends when the hub side of `tx` is gone.
    pub fn receive_loop(self, tx: Sender<(Request, SocketAddr)>) -> Result<()> {
        info!("Command TCP server is started on {}", self.listener.local_addr()?);

        for stream in self.listener.incoming() {
            match stream {
                Ok(stream) => match Self::handle_connection(stream) {
                    Ok((request, reply_addr)) => {
                        debug!("Received request {:?} from {}", request, reply_addr);
                        if tx.send((request, reply_addr)).is_err() {
                            // Hub is gone, nothing left to serve.
                            break;
                        }
                    }
                    Err(e) => warn!("Dropping malformed request: {}", e),
                },
                Err(e) => warn!("TCP connection error: {}", e),
            }
        }
        Ok(())
    }

    /// Read and decode one request from a freshly accepted connection.
    fn handle_connection(mut stream: TcpStream) -> Result<(Request, SocketAddr)> {
        let peer_addr = stream.peer_addr()?;
        let mut buf = [0u8; 4096];
        let size = stream.read(&mut buf)?;
        let request = Request::from_bytes(&buf[..size])?;
        let port: u16 = request
            .port
            .parse()
            .map_err(|e| FeedError::Format(format!("Invalid UDP port in request: {}", e)))?;
        let reply_addr = SocketAddr::new(peer_addr.ip(), port);
        Ok((request, reply_addr))
    }
}
