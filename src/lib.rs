//! Host-to-application communication layer for a replicated state-machine
//! engine.
//!
//! An external consensus engine drives an [`application::Application`]
//! through a narrow lifecycle (info, validate, deliver, commit,
//! begin/end block) over one of two client shapes: [`client::SocketClient`],
//! a pipelined, reconnecting client over a length-delimited byte stream, and
//! [`local_client::LocalClient`], a degenerate in-process client for
//! embedding an Application without a transport at all. [`server::SocketServer`]
//! is the socket client's counterpart, serializing every call into the
//! Application behind a single mutex regardless of how many connections are
//! open concurrently.

pub mod application;
pub mod client;
pub mod codec;
pub mod config;
pub mod error;
pub mod local_client;
pub mod logging;
pub mod reqres;
pub mod server;
pub mod throttle;
pub mod types;

pub use application::{Application, BaseApplication};
pub use client::SocketClient;
pub use config::{Address, ClientConfig, ServerConfig, Transport};
pub use error::{ClientError, ServerError};
pub use local_client::LocalClient;
pub use reqres::ReqRes;
pub use server::SocketServer;
pub use types::{Request, Response, Result, ResultCode};

/// The current version of this crate.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
