//! The in-process client: calls the Application directly under a shared
//! mutex and synthesizes an already-completed [`ReqRes`] for every call, so
//! the local and networked clients present the same surface.

use std::sync::Arc;

use tokio::sync::Mutex as AsyncMutex;

use crate::application::Application;
use crate::client::ResponseCallback;
use crate::reqres::ReqRes;
use crate::types::{
    BeginBlockRequest, EndBlockResponse, InitChainRequest, Info, QueryRequest, QueryResponse,
    Request, Response, Result,
};

pub struct LocalClient {
    app: AsyncMutex<Box<dyn Application>>,
    response_cb: parking_lot::Mutex<Option<ResponseCallback>>,
}

impl LocalClient {
    pub fn new(app: Box<dyn Application>) -> Arc<Self> {
        Arc::new(LocalClient {
            app: AsyncMutex::new(app),
            response_cb: parking_lot::Mutex::new(None),
        })
    }

    pub fn set_response_callback(&self, cb: ResponseCallback) {
        *self.response_cb.lock() = Some(cb);
    }

    pub fn error(&self) -> Option<String> {
        None
    }

    fn notify(&self, request: &Request, response: &Response) {
        if let Some(cb) = self.response_cb.lock().clone() {
            cb(request, response);
        }
    }

    fn deliver(&self, request: Request, response: Response) -> Arc<ReqRes> {
        self.notify(&request, &response);
        ReqRes::completed(request, response)
    }

    // ---- Async variants (completed synchronously, as upstream does) ----

    pub async fn flush_async(self: &Arc<Self>) -> Arc<ReqRes> {
        ReqRes::completed(Request::Flush, Response::Flush)
    }

    pub async fn echo_async(self: &Arc<Self>, msg: String) -> Arc<ReqRes> {
        let response = Response::Echo(msg.clone());
        self.deliver(Request::Echo(msg), response)
    }

    pub async fn info_async(self: &Arc<Self>) -> Arc<ReqRes> {
        let info = self.app.lock().await.info().await;
        self.deliver(Request::Info, Response::Info(info))
    }

    pub async fn set_option_async(self: &Arc<Self>, key: String, value: String) -> Arc<ReqRes> {
        let log = self.app.lock().await.set_option(&key, &value).await;
        self.deliver(
            Request::SetOption {
                key,
                value,
            },
            Response::SetOption { log },
        )
    }

    pub async fn deliver_tx_async(self: &Arc<Self>, tx: Vec<u8>) -> Arc<ReqRes> {
        let res = self.app.lock().await.deliver_tx(&tx).await;
        self.deliver(Request::DeliverTx(tx), Response::DeliverTx(res))
    }

    pub async fn check_tx_async(self: &Arc<Self>, tx: Vec<u8>) -> Arc<ReqRes> {
        let res = self.app.lock().await.check_tx(&tx).await;
        self.deliver(Request::CheckTx(tx), Response::CheckTx(res))
    }

    pub async fn query_async(self: &Arc<Self>, req: QueryRequest) -> Arc<ReqRes> {
        let res = self.app.lock().await.query(req.clone()).await;
        self.deliver(Request::Query(req), Response::Query(res))
    }

    pub async fn commit_async(self: &Arc<Self>) -> Arc<ReqRes> {
        let res = self.app.lock().await.commit().await;
        self.deliver(Request::Commit, Response::Commit(res))
    }

    pub async fn init_chain_async(self: &Arc<Self>, req: InitChainRequest) -> Arc<ReqRes> {
        self.app.lock().await.init_chain(req.clone()).await;
        self.deliver(Request::InitChain(req), Response::InitChain)
    }

    pub async fn begin_block_async(self: &Arc<Self>, req: BeginBlockRequest) -> Arc<ReqRes> {
        self.app.lock().await.begin_block(req.clone()).await;
        self.deliver(Request::BeginBlock(req), Response::BeginBlock)
    }

    pub async fn end_block_async(self: &Arc<Self>, height: u64) -> Arc<ReqRes> {
        let res = self.app.lock().await.end_block(height).await;
        self.deliver(Request::EndBlock { height }, Response::EndBlock(res))
    }

    // ---- Sync variants: fully synchronous, no queueing. Each still
    // synthesizes the (request, response) pair for the global callback, per
    // the same contract the async variants (and the networked client)
    // honor. ----

    pub async fn flush_sync(self: &Arc<Self>) {
        self.notify(&Request::Flush, &Response::Flush);
    }

    pub async fn echo_sync(self: &Arc<Self>, msg: String) -> String {
        self.notify(&Request::Echo(msg.clone()), &Response::Echo(msg.clone()));
        msg
    }

    pub async fn info_sync(self: &Arc<Self>) -> Info {
        let info = self.app.lock().await.info().await;
        self.notify(&Request::Info, &Response::Info(info.clone()));
        info
    }

    pub async fn set_option_sync(self: &Arc<Self>, key: String, value: String) -> String {
        let log = self.app.lock().await.set_option(&key, &value).await;
        self.notify(
            &Request::SetOption { key, value },
            &Response::SetOption { log: log.clone() },
        );
        log
    }

    pub async fn deliver_tx_sync(self: &Arc<Self>, tx: Vec<u8>) -> Result {
        let res = self.app.lock().await.deliver_tx(&tx).await;
        self.notify(&Request::DeliverTx(tx), &Response::DeliverTx(res.clone()));
        res
    }

    pub async fn check_tx_sync(self: &Arc<Self>, tx: Vec<u8>) -> Result {
        let res = self.app.lock().await.check_tx(&tx).await;
        self.notify(&Request::CheckTx(tx), &Response::CheckTx(res.clone()));
        res
    }

    pub async fn query_sync(self: &Arc<Self>, req: QueryRequest) -> QueryResponse {
        let res = self.app.lock().await.query(req.clone()).await;
        self.notify(&Request::Query(req), &Response::Query(res.clone()));
        res
    }

    pub async fn commit_sync(self: &Arc<Self>) -> Result {
        let res = self.app.lock().await.commit().await;
        self.notify(&Request::Commit, &Response::Commit(res.clone()));
        res
    }

    pub async fn init_chain_sync(self: &Arc<Self>, req: InitChainRequest) {
        self.app.lock().await.init_chain(req.clone()).await;
        self.notify(&Request::InitChain(req), &Response::InitChain);
    }

    pub async fn begin_block_sync(self: &Arc<Self>, req: BeginBlockRequest) {
        self.app.lock().await.begin_block(req.clone()).await;
        self.notify(&Request::BeginBlock(req), &Response::BeginBlock);
    }

    pub async fn end_block_sync(self: &Arc<Self>, height: u64) -> EndBlockResponse {
        let res = self.app.lock().await.end_block(height).await;
        self.notify(
            &Request::EndBlock { height },
            &Response::EndBlock(res.clone()),
        );
        res
    }
}
