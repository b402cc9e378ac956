//! Error kinds for the socket client and server, per the error-handling design.
//!
//! These replace the ad-hoc `IpcError` the transport layer used to reach for;
//! every variant here corresponds to one of the error kinds called out for
//! the client/server boundary.

use thiserror::Error;

/// Errors surfaced by [`crate::client::SocketClient`].
#[derive(Debug, Error)]
pub enum ClientError {
    /// A read, write, or connect on the underlying stream failed.
    #[error("transport error: {0}")]
    Transport(#[from] std::io::Error),

    /// The response received did not match the variant of the oldest
    /// in-flight request. The connection is unrecoverable and is torn down.
    #[error("protocol desync: expected {expected}, got {got}")]
    ProtocolDesync {
        expected: &'static str,
        got: &'static str,
    },

    /// The server returned an `Exception` response.
    #[error("server exception: {0}")]
    ServerException(String),

    /// The request queue was full and the enqueue timed out.
    #[error("request queue full")]
    QueueFull,

    /// A sync call was made (or a latch awaited) while no connection is
    /// established and none will be retried (`must_connect` client stopped).
    #[error("not connected")]
    NotConnected,

    /// Envelope encode/decode failure.
    #[error("codec error: {0}")]
    Codec(#[from] crate::codec::CodecError),

    /// The address string did not parse as `<proto>://<addr>`.
    #[error("invalid address: {0}")]
    InvalidAddress(String),
}

/// Errors surfaced by [`crate::server::SocketServer`].
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("codec error: {0}")]
    Codec(#[from] crate::codec::CodecError),

    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("unsupported transport selector: {0}")]
    UnsupportedTransport(String),
}
