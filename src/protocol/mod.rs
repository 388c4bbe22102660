//! Wire protocol between the client proxy and the pool server.
//!
//! Messages are JSON, framed with a 4-byte big-endian length prefix so
//! message boundaries survive the byte-stream transport:
//! - **Handshake**: one raw byte right after accept — `'1'` a slot was
//!   bound, `'0'` the pool is exhausted
//! - **Request frame**: `[length: 4 bytes BE][{"method": ..., "params": [...]}]`
//! - **Response frame**: `[length: 4 bytes BE][{"status": 0|1, ...}]`

pub mod codec;
pub mod command;
pub mod response;

pub use codec::{
    encode_message, read_frame, read_message, write_message, MAX_MESSAGE_SIZE, POOL_EXHAUSTED,
    SLOT_BOUND,
};
pub use command::{Call, Method, Request};
pub use response::Response;
