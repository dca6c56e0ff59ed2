//! Price feed client library.
//!
//! `manager::FeedManager` is the public surface: connect once, read live
//! updates and snapshots, request per-symbol history. `transport` holds the
//! low-level request send and keep-alive ping helpers it builds on.
#![warn(missing_docs)]
pub mod manager;
pub mod transport;
