//! Server-side 9P2000 connection: handshake, request dispatch, and
//! shutdown (C4).

pub mod connection;
pub mod error;

pub use connection::{AttachCallback, AttachInfo, Connection, ConnectionHandle, ReceiveCallback};
pub use error::ServerError;
