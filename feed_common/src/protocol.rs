//! Wire protocol shared by client and server.
//!
//! Two payload families travel between the sides:
//!
//! - `Request` — client→server, sent as a compact `bincode` message over a
//!   short-lived TCP connection. Every request carries the UDP address the
//!   client wants answers delivered to.
//! - `Event` — server→client, sent as a JSON datagram over UDP. Events use a
//!   `{"event": ..., "data": ...}` envelope so consumers can dispatch on the
//!   event name (`stock-price`, `all-stocks`, `historical-data`).
//!
//! History correlation uses a client-minted monotonic `request_id` echoed back
//! in the `historical-data` event, so concurrent requests for different
//! symbols or intervals cannot cross-resolve.
use std::net::SocketAddr;

use bincode::{Decode, Encode};
use serde::{Deserialize, Serialize};

use crate::{FeedError, Tick};

/// Request payload sent from client to server.
#[derive(Debug, Clone, PartialEq, Decode, Encode, Serialize, Deserialize)]
pub struct Request {
    /// IP address the client receives UDP events on.
    pub address: String,
    /// UDP port as a string.
    pub port: String,
    /// What the client is asking for.
    pub kind: RequestKind,
}

/// The operation a `Request` asks the server to perform.
#[derive(Debug, Clone, PartialEq, Decode, Encode, Serialize, Deserialize)]
pub enum RequestKind {
    /// Register for the `stock-price` broadcast.
    Subscribe,
    /// Deregister from the broadcast.
    Unsubscribe,
    /// Ask for the latest tick per symbol (`all-stocks` reply).
    Snapshot,
    /// Ask for the buffered history of one symbol (`historical-data` reply).
    History {
        /// Client-minted correlation id, echoed back in the reply.
        request_id: u64,
        /// Symbol to fetch history for.
        symbol: String,
        /// Interval label (informational; the server returns its buffer).
        interval: String,
    },
}

impl Request {
    /// Creates a request with the given reply address and kind.
    pub fn new(address: &str, port: &str, kind: RequestKind) -> Self {
        Request {
            address: String::from(address),
            port: String::from(port),
            kind,
        }
    }

    /// Creates a subscription request.
    pub fn subscribe(address: &str, port: &str) -> Self {
        Self::new(address, port, RequestKind::Subscribe)
    }

    /// Creates an unsubscription request.
    pub fn unsubscribe(address: &str, port: &str) -> Self {
        Self::new(address, port, RequestKind::Unsubscribe)
    }

    /// Creates a snapshot request.
    pub fn snapshot(address: &str, port: &str) -> Self {
        Self::new(address, port, RequestKind::Snapshot)
    }

    /// Creates a history request for `symbol` over `interval`.
    pub fn history(
        address: &str,
        port: &str,
        request_id: u64,
        symbol: &str,
        interval: &str,
    ) -> Self {
        Self::new(
            address,
            port,
            RequestKind::History {
                request_id,
                symbol: String::from(symbol),
                interval: String::from(interval),
            },
        )
    }

    /// Build the UDP reply address from the embedded fields.
    pub fn udp_addr(&self) -> Result<SocketAddr, std::net::AddrParseError> {
        format!("{}:{}", self.address, self.port).parse()
    }

    /// Encode the request with bincode for transmission.
    pub fn to_bytes(&self) -> Result<Vec<u8>, FeedError> {
        let bytes = bincode::encode_to_vec(self, bincode::config::standard())?;
        Ok(bytes)
    }

    /// Decode a request from bincode bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, FeedError> {
        let (request, _) = bincode::decode_from_slice(bytes, bincode::config::standard())?;
        Ok(request)
    }
}

/// Event payload sent from server to client as a JSON datagram.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum Event {
    /// One freshly ingested tick, broadcast to every subscriber.
    StockPrice(Tick),
    /// Latest tick per symbol, answering a snapshot request.
    AllStocks(Vec<Tick>),
    /// Buffered history for one symbol, answering a history request.
    #[serde(rename_all = "camelCase")]
    HistoricalData {
        /// Correlation id copied from the originating request.
        request_id: u64,
        /// Buffered ticks, oldest first. Empty if the symbol was never seen.
        ticks: Vec<Tick>,
    },
}

impl Event {
    /// Encode the event to JSON bytes.
    pub fn to_json_bytes(&self) -> Result<Vec<u8>, FeedError> {
        let json = serde_json::to_vec(self)?;
        Ok(json)
    }

    /// Decode an event from a JSON datagram.
    pub fn from_json_bytes(bytes: &[u8]) -> Result<Self, FeedError> {
        let event = serde_json::from_slice(bytes)?;
        Ok(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn sample_tick() -> Tick {
        Tick {
            symbol: "MSFT".to_string(),
            price: 352.4,
            change: 2.4,
            percent_change: 2.4 / 352.4,
            volume: 4100,
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn request_round_trips_through_bincode() {
        let req = Request::history("127.0.0.1", "9000", 7, "AAPL", "1w");
        let bytes = req.to_bytes().unwrap();
        assert_eq!(Request::from_bytes(&bytes).unwrap(), req);
    }

    #[test]
    fn udp_addr_is_built_from_fields() {
        let req = Request::subscribe("127.0.0.1", "9000");
        assert_eq!(req.udp_addr().unwrap().port(), 9000);
    }

    #[test]
    fn event_names_match_the_wire_protocol() {
        let price = Event::StockPrice(sample_tick());
        let json = String::from_utf8(price.to_json_bytes().unwrap()).unwrap();
        assert!(json.contains("\"event\":\"stock-price\""));

        let all = Event::AllStocks(vec![sample_tick()]);
        let json = String::from_utf8(all.to_json_bytes().unwrap()).unwrap();
        assert!(json.contains("\"event\":\"all-stocks\""));

        let hist = Event::HistoricalData {
            request_id: 42,
            ticks: vec![],
        };
        let json = String::from_utf8(hist.to_json_bytes().unwrap()).unwrap();
        assert!(json.contains("\"event\":\"historical-data\""));
        assert!(json.contains("\"requestId\":42"));
    }

    #[test]
    fn historical_event_preserves_request_id() {
        let event = Event::HistoricalData {
            request_id: 99,
            ticks: vec![sample_tick()],
        };
        let bytes = event.to_json_bytes().unwrap();
        match Event::from_json_bytes(&bytes).unwrap() {
            Event::HistoricalData { request_id, ticks } => {
                assert_eq!(request_id, 99);
                assert_eq!(ticks.len(), 1);
            }
            other => panic!("expected historical-data, got {:?}", other),
        }
    }
}
