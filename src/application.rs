//! The Application capability set the host drives.
//!
//! The upstream design made block-lifecycle methods an optional capability
//! an Application could choose to implement. Here they're ordinary trait
//! methods with no-op default bodies, so every Application is block-aware by
//! construction; [`BaseApplication`] is provided for embedders that want
//! every method to be a no-op except the ones they override.

use async_trait::async_trait;

use crate::types::{
    BeginBlockRequest, EndBlockResponse, InitChainRequest, Info, QueryRequest, QueryResponse,
    Result,
};

#[async_trait]
pub trait Application: Send + Sync {
    /// Idempotent query of the Application's identity and last-committed
    /// state.
    async fn info(&self) -> Info {
        Info::default()
    }

    /// Configuration side effect; returns a free-form log line.
    async fn set_option(&self, _key: &str, _value: &str) -> String {
        String::new()
    }

    /// Mutates application state. Called once per transaction within a
    /// block, between `begin_block` and `end_block`.
    async fn deliver_tx(&self, tx: &[u8]) -> Result;

    /// Side-effect-free mempool validation.
    async fn check_tx(&self, tx: &[u8]) -> Result {
        let _ = tx;
        Result::ok()
    }

    /// Side-effect-free read.
    async fn query(&self, req: QueryRequest) -> QueryResponse {
        let _ = req;
        QueryResponse::default()
    }

    /// Finalizes state for the current block; returns an application-state
    /// digest in `Result::data`.
    async fn commit(&self) -> Result {
        Result::ok()
    }

    /// Called once at genesis with the initial validator set.
    async fn init_chain(&self, _req: InitChainRequest) {}

    /// Marks the start of a new block.
    async fn begin_block(&self, _req: BeginBlockRequest) {}

    /// Marks the end of a block; returns validator-set changes to apply.
    async fn end_block(&self, _height: u64) -> EndBlockResponse {
        EndBlockResponse::default()
    }
}

/// No-op `Application` for embedders that only care about a subset of
/// methods; wrap it and override what you need, or use it directly in tests
/// that only exercise transport behavior.
#[derive(Debug, Default)]
pub struct BaseApplication;

#[async_trait]
impl Application for BaseApplication {
    async fn deliver_tx(&self, _tx: &[u8]) -> Result {
        Result::ok()
    }
}
