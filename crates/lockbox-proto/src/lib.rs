//! Wire types and RPC framing for lockbox.
//!
//! Both transports speak the same request/response types: the HTTP surface
//! maps them directly to JSON bodies, the RPC surface wraps them in framed
//! envelopes. The codec here is pure apart from the async frame I/O helpers;
//! no transport policy lives in this crate.

pub mod api;
pub mod codec;
pub mod rpc;

pub use api::*;
pub use codec::{read_frame, write_frame, FrameError, MAX_FRAME_LEN};
pub use rpc::{ErrorCode, RpcError, RpcMethod, RpcRequest, RpcResponse};
