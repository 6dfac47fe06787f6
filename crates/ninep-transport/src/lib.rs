//! Byte-stream transport: the buffered packet reader and the
//! serialized frame writer built on top of `tokio::io::split`.

pub mod error;
pub mod reader;
pub mod writer;

pub use error::TransportError;
pub use reader::{DecodedFrame, PacketReader};
pub use writer::FrameWriter;
