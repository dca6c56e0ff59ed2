//! Price feed server library.
//!
//! The server consumes an external tick stream, retains a bounded per-symbol
//! history window, and fans every tick out to subscribed clients over UDP.
//! The pieces, wired together by the binary in `main.rs`:
//!
//! - `ingest` — upstream tick consumer (JSON datagrams) and the in-process
//!   simulation source used when no upstream feed exists.
//! - `model::history` — per-symbol bounded FIFO of recent ticks.
//! - `registry` — subscriber table with bounded per-subscriber queues and an
//!   explicit overflow policy.
//! - `hub` — single owner of history and registry; applies ticks in arrival
//!   order and answers snapshot/history requests.
//! - `commands` — TCP receiver decoding client requests.
//! - `stream` — per-subscriber delivery task draining its queue to UDP.
//! - `model::liveness` — keep-alive tracking that evicts silent subscribers.
#![warn(missing_docs)]
pub mod commands;
pub mod hub;
pub mod ingest;
pub mod model;
pub mod registry;
pub mod stream;
