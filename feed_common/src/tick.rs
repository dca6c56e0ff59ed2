//! Tick data model and JSON encoding helpers.
//!
//! A `Tick` is one point-in-time price observation for a symbol. The same record
//! travels three routes: upstream ingestion into the server, server-to-client
//! event payloads, and synthetic generation on the client. Field names on the
//! wire are camelCase and the timestamp is an ISO-8601 string, matching the
//! upstream producer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::FeedError;

/// One price observation for a single symbol.
///
/// Immutable once produced. `percent_change` is `change / price` except when
/// `price` is exactly zero, in which case producers store `0.0`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tick {
    /// Symbol identifier (e.g., `AAPL`).
    pub symbol: String,
    /// Last observed price.
    pub price: f64,
    /// Absolute price change against the previous observation.
    pub change: f64,
    /// Relative change, `change / price` (guarded against `price == 0`).
    #[serde(rename = "percentChange")]
    pub percent_change: f64,
    /// Traded volume associated with this tick.
    pub volume: u64,
    /// UTC timestamp, serialized as an ISO-8601 string.
    pub timestamp: DateTime<Utc>,
}

impl Tick {
    /// Encode the tick to JSON bytes.
    pub fn to_json_bytes(&self) -> Result<Vec<u8>, FeedError> {
        let json = serde_json::to_vec(self)?;
        Ok(json)
    }

    /// Decode a tick from a JSON payload.
    ///
    /// Used by the server's upstream consumer; a decode failure there is a
    /// skip-and-continue condition, never fatal.
    pub fn from_json_bytes(bytes: &[u8]) -> Result<Self, FeedError> {
        let tick = serde_json::from_slice(bytes)?;
        Ok(tick)
    }
}
