//! The socket client: a pipelined, reconnecting, ordered request/response
//! engine over a TCP or Unix-domain byte stream.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use socket2::SockRef;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, BufWriter};
use tokio::net::{TcpStream, UnixStream};
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use crate::codec::{read_message, write_message};
use crate::config::{Address, ClientConfig};
use crate::error::ClientError;
use crate::reqres::ReqRes;
use crate::throttle::{ThrottleTicks, ThrottleTimer};
use crate::types::{
    BeginBlockRequest, InitChainRequest, QueryRequest, QueryResponse, Request, Response,
};

type StdResult<T> = std::result::Result<T, ClientError>;

pub type ResponseCallback = Arc<dyn Fn(&Request, &Response) + Send + Sync>;
pub type ConnectCallback = Arc<dyn Fn() + Send + Sync>;

type BoxRead = Box<dyn AsyncRead + Unpin + Send>;
type BoxWrite = Box<dyn AsyncWrite + Unpin + Send>;

async fn dial(address: &Address) -> std::io::Result<(BoxRead, BoxWrite)> {
    match address {
        Address::Tcp(addr) => {
            let stream = TcpStream::connect(addr).await?;
            stream.set_nodelay(true)?;
            let sock_ref = SockRef::from(&stream);
            let _ = sock_ref.set_recv_buffer_size(1 << 20);
            let _ = sock_ref.set_send_buffer_size(1 << 20);
            let (r, w) = tokio::io::split(stream);
            Ok((Box::new(r), Box::new(w)))
        }
        Address::Unix(path) => {
            let stream = UnixStream::connect(path).await?;
            let (r, w) = tokio::io::split(stream);
            Ok((Box::new(r), Box::new(w)))
        }
    }
}

/// Shared, short-critical-section state: the in-flight queue, the most
/// recent transport error, and both callbacks. Per the load-bearing
/// invariant in the design notes, this is the single mutex family covering
/// `{conn, err, in-flight queue, callbacks}` (split into independent
/// fields, each held only for the duration of a single read-modify-write,
/// never across an `.await`).
struct Shared {
    in_flight: Mutex<VecDeque<Arc<ReqRes>>>,
    last_err: Mutex<Option<String>>,
    response_cb: Mutex<Option<ResponseCallback>>,
    connect_cb: Mutex<Option<ConnectCallback>>,
    connected: AtomicBool,
    stopped: AtomicBool,
}

impl Shared {
    fn new() -> Arc<Self> {
        Arc::new(Shared {
            in_flight: Mutex::new(VecDeque::new()),
            last_err: Mutex::new(None),
            response_cb: Mutex::new(None),
            connect_cb: Mutex::new(None),
            connected: AtomicBool::new(false),
            stopped: AtomicBool::new(false),
        })
    }

    fn set_err(&self, err: impl ToString) {
        *self.last_err.lock() = Some(err.to_string());
    }

    /// Release every outstanding latch with no response and clear the
    /// queue. Called as part of a connection reset.
    fn drain_in_flight(&self) {
        let mut queue = self.in_flight.lock();
        for reqres in queue.drain(..) {
            reqres.fail();
        }
    }

    /// Match an inbound response against the head of the in-flight queue,
    /// deliver it, and invoke the global callback. Returns an error (and
    /// leaves the queue alone) if the response can't be matched, which the
    /// caller treats as connection-fatal.
    fn deliver(&self, response: Response) -> StdResult<()> {
        let reqres = self.in_flight.lock().pop_front();
        let Some(reqres) = reqres else {
            return Err(ClientError::ProtocolDesync {
                expected: "<nothing pending>",
                got: response.variant_name(),
            });
        };

        if let Response::Exception(msg) = &response {
            // Fail, not complete: an Exception tears the connection down, and
            // a caller waiting on this record should see the same "connection
            // died, consult Error()" outcome as every other request drained
            // off the queue, not a delivered-but-wrong-shaped response.
            reqres.fail();
            return Err(ClientError::ServerException(msg.clone()));
        }

        if !response.matches_request(reqres.request()) {
            return Err(ClientError::ProtocolDesync {
                expected: reqres.request().variant_name(),
                got: response.variant_name(),
            });
        }

        reqres.set_response(response.clone());
        if let Some(cb) = self.response_cb.lock().clone() {
            cb(reqres.request(), &response);
        }
        Ok(())
    }
}

/// A pipelined, reconnecting socket client.
pub struct SocketClient {
    shared: Arc<Shared>,
    request_tx: Mutex<mpsc::Sender<Arc<ReqRes>>>,
    throttle: Mutex<ThrottleTimer>,
    config: ClientConfig,
}

impl SocketClient {
    /// Connect to `address`. If `config.must_connect`, a failed first
    /// connection attempt is returned as an error; otherwise the client is
    /// returned immediately and retries in the background.
    pub async fn new(address: Address, config: ClientConfig) -> StdResult<Arc<Self>> {
        let shared = Shared::new();
        let (request_tx, request_rx) = mpsc::channel(config.request_queue_size);
        let (throttle, ticks) = ThrottleTimer::new(config.flush_throttle);

        let client = Arc::new(SocketClient {
            shared,
            request_tx: Mutex::new(request_tx),
            throttle: Mutex::new(throttle),
            config: config.clone(),
        });

        if config.must_connect {
            let (reader, writer) = dial(&address).await.map_err(ClientError::Transport)?;
            client.shared.connected.store(true, Ordering::SeqCst);
            tokio::spawn(supervisor(client.clone(), address, Some((reader, writer, request_rx, ticks))));
            return Ok(client);
        }

        match dial(&address).await {
            Ok((reader, writer)) => {
                client.shared.connected.store(true, Ordering::SeqCst);
                tokio::spawn(supervisor(
                    client.clone(),
                    address,
                    Some((reader, writer, request_rx, ticks)),
                ));
            }
            Err(e) => {
                client.shared.set_err(&e);
                tokio::spawn(supervisor(client.clone(), address, None));
            }
        }
        Ok(client)
    }

    pub fn set_response_callback(&self, cb: ResponseCallback) {
        *self.shared.response_cb.lock() = Some(cb);
    }

    pub fn set_connect_callback(&self, cb: ConnectCallback) {
        *self.shared.connect_cb.lock() = Some(cb);
    }

    pub fn error(&self) -> Option<String> {
        self.shared.last_err.lock().clone()
    }

    pub fn is_connected(&self) -> bool {
        self.shared.connected.load(Ordering::SeqCst)
    }

    async fn enqueue(self: &Arc<Self>, request: Request) -> StdResult<Arc<ReqRes>> {
        let reqres = ReqRes::new(request.clone());
        match &request {
            Request::Flush => self.throttle.lock().unset(),
            _ => self.throttle.lock().set(),
        }
        let tx = self.request_tx.lock().clone();
        match tokio::time::timeout(self.config.enqueue_timeout, tx.send(reqres.clone())).await {
            Ok(Ok(())) => Ok(reqres),
            Ok(Err(_)) => Err(ClientError::NotConnected),
            Err(_) => Err(ClientError::QueueFull),
        }
    }

    // ---- Async variants ----

    pub async fn echo_async(self: &Arc<Self>, msg: String) -> StdResult<Arc<ReqRes>> {
        self.enqueue(Request::Echo(msg)).await
    }

    pub async fn flush_async(self: &Arc<Self>) -> StdResult<Arc<ReqRes>> {
        self.enqueue(Request::Flush).await
    }

    pub async fn info_async(self: &Arc<Self>) -> StdResult<Arc<ReqRes>> {
        self.enqueue(Request::Info).await
    }

    pub async fn set_option_async(
        self: &Arc<Self>,
        key: String,
        value: String,
    ) -> StdResult<Arc<ReqRes>> {
        self.enqueue(Request::SetOption { key, value }).await
    }

    pub async fn deliver_tx_async(self: &Arc<Self>, tx: Vec<u8>) -> StdResult<Arc<ReqRes>> {
        self.enqueue(Request::DeliverTx(tx)).await
    }

    pub async fn check_tx_async(self: &Arc<Self>, tx: Vec<u8>) -> StdResult<Arc<ReqRes>> {
        self.enqueue(Request::CheckTx(tx)).await
    }

    pub async fn commit_async(self: &Arc<Self>) -> StdResult<Arc<ReqRes>> {
        self.enqueue(Request::Commit).await
    }

    pub async fn query_async(self: &Arc<Self>, req: QueryRequest) -> StdResult<Arc<ReqRes>> {
        self.enqueue(Request::Query(req)).await
    }

    pub async fn init_chain_async(
        self: &Arc<Self>,
        req: InitChainRequest,
    ) -> StdResult<Arc<ReqRes>> {
        self.enqueue(Request::InitChain(req)).await
    }

    pub async fn begin_block_async(
        self: &Arc<Self>,
        req: BeginBlockRequest,
    ) -> StdResult<Arc<ReqRes>> {
        self.enqueue(Request::BeginBlock(req)).await
    }

    pub async fn end_block_async(self: &Arc<Self>, height: u64) -> StdResult<Arc<ReqRes>> {
        self.enqueue(Request::EndBlock { height }).await
    }

    // ---- Sync variants: enqueue, force a flush, await the latch ----

    async fn sync_call(self: &Arc<Self>, request: Request) -> StdResult<Response> {
        let reqres = self.enqueue(request).await?;
        self.flush_sync().await?;
        reqres.wait().await.ok_or(ClientError::NotConnected)
    }

    pub async fn flush_sync(self: &Arc<Self>) -> StdResult<()> {
        let reqres = self.enqueue(Request::Flush).await?;
        reqres.wait().await.ok_or(ClientError::NotConnected)?;
        Ok(())
    }

    pub async fn echo_sync(self: &Arc<Self>, msg: String) -> StdResult<String> {
        match self.sync_call(Request::Echo(msg)).await? {
            Response::Echo(s) => Ok(s),
            other => unexpected("Echo", other),
        }
    }

    pub async fn info_sync(self: &Arc<Self>) -> StdResult<crate::types::Info> {
        match self.sync_call(Request::Info).await? {
            Response::Info(info) => Ok(info),
            other => unexpected("Info", other),
        }
    }

    pub async fn set_option_sync(
        self: &Arc<Self>,
        key: String,
        value: String,
    ) -> StdResult<String> {
        match self.sync_call(Request::SetOption { key, value }).await? {
            Response::SetOption { log } => Ok(log),
            other => unexpected("SetOption", other),
        }
    }

    pub async fn deliver_tx_sync(self: &Arc<Self>, tx: Vec<u8>) -> StdResult<crate::types::Result> {
        match self.sync_call(Request::DeliverTx(tx)).await? {
            Response::DeliverTx(res) => Ok(res),
            other => unexpected("DeliverTx", other),
        }
    }

    pub async fn check_tx_sync(self: &Arc<Self>, tx: Vec<u8>) -> StdResult<crate::types::Result> {
        match self.sync_call(Request::CheckTx(tx)).await? {
            Response::CheckTx(res) => Ok(res),
            other => unexpected("CheckTx", other),
        }
    }

    pub async fn commit_sync(self: &Arc<Self>) -> StdResult<crate::types::Result> {
        match self.sync_call(Request::Commit).await? {
            Response::Commit(res) => Ok(res),
            other => unexpected("Commit", other),
        }
    }

    pub async fn query_sync(self: &Arc<Self>, req: QueryRequest) -> StdResult<QueryResponse> {
        match self.sync_call(Request::Query(req)).await? {
            Response::Query(res) => Ok(res),
            other => unexpected("Query", other),
        }
    }

    pub async fn init_chain_sync(self: &Arc<Self>, req: InitChainRequest) -> StdResult<()> {
        match self.sync_call(Request::InitChain(req)).await? {
            Response::InitChain => Ok(()),
            other => unexpected("InitChain", other),
        }
    }

    pub async fn begin_block_sync(self: &Arc<Self>, req: BeginBlockRequest) -> StdResult<()> {
        match self.sync_call(Request::BeginBlock(req)).await? {
            Response::BeginBlock => Ok(()),
            other => unexpected("BeginBlock", other),
        }
    }

    pub async fn end_block_sync(
        self: &Arc<Self>,
        height: u64,
    ) -> StdResult<crate::types::EndBlockResponse> {
        match self.sync_call(Request::EndBlock { height }).await? {
            Response::EndBlock(res) => Ok(res),
            other => unexpected("EndBlock", other),
        }
    }
}

fn unexpected<T>(expected: &'static str, got: Response) -> StdResult<T> {
    Err(ClientError::ProtocolDesync {
        expected,
        got: got.variant_name(),
    })
}

type FirstEpoch = (BoxRead, BoxWrite, mpsc::Receiver<Arc<ReqRes>>, ThrottleTicks);

/// Owns the entire post-construction lifecycle: run one connection epoch to
/// completion, tear it down (`stop_for_error`, idempotent by construction
/// since only this task ever calls it), then either stop (`must_connect`)
/// or back off and reconnect. Exactly one supervisor task exists per
/// client for its whole lifetime.
async fn supervisor(client: Arc<SocketClient>, address: Address, first_epoch: Option<FirstEpoch>) {
    let mut pending = first_epoch;
    loop {
        let (reader, writer, request_rx, ticks) = match pending.take() {
            Some(epoch) => epoch,
            None => {
                tokio::time::sleep(client.config.reconnect_delay).await;
                match dial(&address).await {
                    Ok((reader, writer)) => {
                        let (request_tx, request_rx) =
                            mpsc::channel(client.config.request_queue_size);
                        let (throttle, ticks) = ThrottleTimer::new(client.config.flush_throttle);
                        *client.request_tx.lock() = request_tx;
                        *client.throttle.lock() = throttle;
                        client.shared.connected.store(true, Ordering::SeqCst);
                        info!("socket client reconnected");
                        if let Some(cb) = client.shared.connect_cb.lock().clone() {
                            cb();
                        }
                        (reader, writer, request_rx, ticks)
                    }
                    Err(e) => {
                        debug!(error = %e, "reconnect attempt failed");
                        continue;
                    }
                }
            }
        };

        let (fail_tx, mut fail_rx) = mpsc::channel::<ClientError>(2);
        let (quit_tx, quit_rx) = watch::channel(false);

        let sender = tokio::spawn(sender_task(
            client.shared.clone(),
            writer,
            request_rx,
            ticks,
            fail_tx.clone(),
            quit_rx.clone(),
        ));
        let receiver = tokio::spawn(receiver_task(
            client.shared.clone(),
            reader,
            client.config.max_response_size,
            fail_tx,
            quit_rx,
        ));

        // Wait for the first failure, then tear both tasks down.
        let err = fail_rx.recv().await;
        let _ = quit_tx.send(true);
        let _ = sender.await;
        let _ = receiver.await;

        client.shared.connected.store(false, Ordering::SeqCst);
        if let Some(e) = err {
            client.shared.set_err(&e);
        }
        warn!(error = ?client.shared.last_err.lock(), "socket client connection failed");
        client.shared.drain_in_flight();

        if client.config.must_connect {
            client.shared.stopped.store(true, Ordering::SeqCst);
            return;
        }
        // loop back around into the reconnect branch above
    }
}

async fn sender_task(
    shared: Arc<Shared>,
    writer: BoxWrite,
    mut request_rx: mpsc::Receiver<Arc<ReqRes>>,
    ticks: ThrottleTicks,
    fail_tx: mpsc::Sender<ClientError>,
    mut quit_rx: watch::Receiver<bool>,
) {
    let mut writer = BufWriter::new(writer);
    loop {
        tokio::select! {
            _ = quit_rx.changed() => {
                if *quit_rx.borrow() {
                    return;
                }
            }
            maybe_req = request_rx.recv() => {
                let Some(reqres) = maybe_req else { return };
                let is_flush = matches!(reqres.request(), Request::Flush);
                shared.in_flight.lock().push_back(reqres.clone());
                if let Err(e) = write_message(&mut writer, reqres.request()).await {
                    let _ = fail_tx.try_send(ClientError::Transport(e));
                    return;
                }
                if is_flush {
                    if let Err(e) = writer.flush().await {
                        let _ = fail_tx.try_send(ClientError::Transport(e));
                        return;
                    }
                }
            }
            _ = ticks.tick() => {
                let flush_reqres = ReqRes::new(Request::Flush);
                shared.in_flight.lock().push_back(flush_reqres.clone());
                if let Err(e) = write_message(&mut writer, flush_reqres.request()).await {
                    let _ = fail_tx.try_send(ClientError::Transport(e));
                    return;
                }
                if let Err(e) = writer.flush().await {
                    let _ = fail_tx.try_send(ClientError::Transport(e));
                    return;
                }
            }
        }
    }
}

async fn receiver_task(
    shared: Arc<Shared>,
    reader: BoxRead,
    max_response_size: usize,
    fail_tx: mpsc::Sender<ClientError>,
    mut quit_rx: watch::Receiver<bool>,
) {
    let mut reader = BufReader::new(reader);
    loop {
        tokio::select! {
            _ = quit_rx.changed() => {
                if *quit_rx.borrow() {
                    return;
                }
            }
            result = read_message::<_, Response>(&mut reader, max_response_size) => {
                match result {
                    Ok(response) => {
                        if let Err(e) = shared.deliver(response) {
                            let _ = fail_tx.try_send(e);
                            return;
                        }
                    }
                    Err(e) => {
                        let _ = fail_tx.try_send(ClientError::Codec(e));
                        return;
                    }
                }
            }
        }
    }
}
