//! Wire-format primitives and the 9P2000 message codec.
//!
//! This crate has no knowledge of sockets, tasks, or connection state —
//! it only knows how to turn bytes into typed values and back. The
//! sibling `ninep-transport`, `ninep-server`, and `ninep-client` crates
//! build the engine proper on top of it.

pub mod config;
pub mod data;
pub mod error;
pub mod fid;
pub mod message;
pub mod qid;
pub mod stat;
pub mod tag;

pub use config::{ConfigError, EngineConfig};
pub use error::{DecodeError, EncodeError};
pub use fid::{Fid, NOFID};
pub use message::{
    decode_message, encode_message, Frame, FrameDecodeError, Message, Request, Response,
    FRAME_HEADER_LEN,
};
pub use qid::{Qid, QID_SIZE};
pub use stat::Stat;
pub use tag::{Tag, NOTAG};
