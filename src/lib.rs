//! A synchronous, embeddable RPC core: a packed message header, a manual
//! binary codec, pluggable byte-oriented transports, and a client/server
//! dispatch runtime that does not assume an async executor.
//!
//! Generated interface stubs (not provided by this crate) are expected to sit
//! on top of [`codec::Codec`] on the client side and [`service::Service`] on
//! the server side, exactly as eRPC's code generator targets its C++ runtime.

pub mod arbitrator;
pub mod buffer;
pub mod client;
pub mod codec;
pub mod crc;
pub mod error;
pub mod logging;
pub mod pool;
pub mod server;
pub mod service;
pub mod text_service;
pub mod transport;

pub use arbitrator::ArbitratedClient;
pub use buffer::{Cursor, MessageBuffer};
pub use client::ClientManager;
pub use codec::{BasicCodec, Codec, CodecConfig, MessageHeader, MessageType};
pub use error::{Result, RpcError};
pub use pool::{DynamicBufferFactory, MessageBufferFactory, StaticBufferPool};
pub use server::Server;
pub use service::{Invocation, Service, ServiceTable};
pub use transport::Transport;

/// The current version of this crate.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
