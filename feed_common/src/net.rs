//! Shared networking constants and helpers used by client and server.

/// TCP port for the request channel (client -> server).
pub const COMMAND_PORT: u16 = 8080;
/// UDP port for event streaming and pings (server <-> client).
pub const DATA_PORT: u16 = 8081;
/// UDP port on which the server ingests upstream tick records.
pub const UPSTREAM_PORT: u16 = 8082;

/// Keep-alive ping period used by subscribed clients, in milliseconds.
pub const PING_PERIOD_MS: u64 = 2000;
/// Silence threshold after which the server drops a subscriber, in seconds.
pub const PING_TIMEOUT_SECS: u64 = 5;

/// Helper to format an IPv4 address with a port like "ip:port".
pub fn addr(ip: &str, port: u16) -> String {
    format!("{}:{}", ip, port)
}
