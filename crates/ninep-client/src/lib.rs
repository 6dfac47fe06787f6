pub mod connection;
pub mod error;
pub mod fid_allocator;
pub mod tag_allocator;

pub use connection::{Call, ClientConnection};
pub use error::ClientError;
pub use fid_allocator::FidAllocator;
pub use tag_allocator::TagAllocator;
