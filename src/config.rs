//! Tunable constants and address/transport parsing.

use std::time::Duration;

use crate::error::{ClientError, ServerError};

/// Request-queue depth before `…Async` enqueue blocks (or times out).
pub const DEFAULT_REQUEST_QUEUE_SIZE: usize = 256;
/// Refuse to decode any envelope declaring a length larger than this.
pub const DEFAULT_MAX_RESPONSE_SIZE: usize = 1024 * 1024;
/// Idle time before the throttle timer auto-injects a `Flush`.
pub const DEFAULT_FLUSH_THROTTLE: Duration = Duration::from_millis(20);
/// Delay between reconnect attempts.
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(3);
/// How long `…Async` enqueue waits for room in a full request queue before
/// giving up with a transient `QueueFull` error, rather than blocking
/// indefinitely.
pub const DEFAULT_ENQUEUE_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub request_queue_size: usize,
    pub max_response_size: usize,
    pub flush_throttle: Duration,
    pub reconnect_delay: Duration,
    /// If `true`, `SocketClient::new` fails immediately on connect failure
    /// rather than retrying in the background.
    pub must_connect: bool,
    pub enqueue_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            request_queue_size: DEFAULT_REQUEST_QUEUE_SIZE,
            max_response_size: DEFAULT_MAX_RESPONSE_SIZE,
            flush_throttle: DEFAULT_FLUSH_THROTTLE,
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
            must_connect: false,
            enqueue_timeout: DEFAULT_ENQUEUE_TIMEOUT,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub max_request_size: usize,
    /// Buffered response-channel depth per connection.
    pub response_buffer: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            max_request_size: DEFAULT_MAX_RESPONSE_SIZE,
            response_buffer: 1000,
        }
    }
}

/// A parsed `<proto>://<addr>` endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Address {
    Tcp(String),
    Unix(String),
}

impl Address {
    pub fn parse(raw: &str) -> std::result::Result<Self, String> {
        let (proto, addr) = raw
            .split_once("://")
            .ok_or_else(|| format!("address missing proto:// prefix: {raw}"))?;
        match proto {
            "tcp" => Ok(Address::Tcp(addr.to_string())),
            "unix" => Ok(Address::Unix(addr.to_string())),
            other => Err(format!("unknown address protocol: {other}")),
        }
    }
}

impl Address {
    pub fn parse_for_client(raw: &str) -> std::result::Result<Self, ClientError> {
        Address::parse(raw).map_err(ClientError::InvalidAddress)
    }

    pub fn parse_for_server(raw: &str) -> std::result::Result<Self, ServerError> {
        Address::parse(raw).map_err(ServerError::InvalidAddress)
    }
}

/// Transport selector string, `socket` or `grpc`, as named on the wire-level
/// external interface. This crate implements only the `socket` transport
/// (the RPC/`grpc` variant is out of scope here, specified only at the
/// Application-interface level); `Transport::parse` is exposed so embedding
/// code can validate a configured selector before choosing which client/
/// server type to construct — neither `SocketClient::new` nor
/// `SocketServer::serve` takes a `Transport` themselves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    Socket,
    Grpc,
}

impl Transport {
    pub fn parse(raw: &str) -> std::result::Result<Self, String> {
        match raw {
            "socket" => Ok(Transport::Socket),
            "grpc" => Ok(Transport::Grpc),
            other => Err(format!("unknown transport selector: {other}")),
        }
    }
}
