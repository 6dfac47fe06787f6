//! End-to-end tests exercising a real server dispatch loop against a
//! real client connection over an in-process duplex pipe.
//!
//! No netns or daemon process is needed here: the protocol runs
//! entirely between two in-memory halves of a `tokio::io::duplex`, so
//! every test is just `cargo test --test integration`.

mod handshake;
mod flush_cancel;
mod infra;
mod malformed;
mod oversize;
mod throughput;
