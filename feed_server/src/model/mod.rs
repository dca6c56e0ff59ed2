//! Domain state owned by the server.
//!
//! - `history` — bounded per-symbol tick retention.
//! - `liveness` — keep-alive tracking for subscribed clients.

pub mod history;
pub mod liveness;
