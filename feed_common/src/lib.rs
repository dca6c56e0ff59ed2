//!
//! Shared types and utilities for the price feed server and client.
//!
//! This crate aggregates everything both sides of the wire agree on:
//! - `error` — unified error type `FeedError` used across the workspace.
//! - `result` — handy `Result<T, FeedError>` alias.
//! - `tick` — the `Tick` price record and its JSON wire encoding.
//! - `symbols` — the known symbol universe and watchlist parsing helpers.
//! - `interval` — history interval labels and their series plans.
//! - `protocol` — request and event payloads exchanged between client and server.
//! - `generator` — synthetic bounded-walk price generation.
//! - `net` — networking constants and small helpers.
#![warn(missing_docs)]
pub mod error;
pub mod generator;
pub mod interval;
pub mod net;
pub mod protocol;
pub mod result;
pub mod symbols;
pub mod tick;

pub use error::FeedError;
pub use result::Result;
pub use tick::Tick;
