//! The socket server: accepts connections, decodes framed requests, and
//! dispatches them serially to one Application instance shared by every
//! connection.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::io::{AsyncWriteExt, BufReader, BufWriter};
use tokio::net::{TcpListener, UnixListener};
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, error, info, warn};

use crate::application::Application;
use crate::codec::{read_message, write_message};
use crate::config::{Address, ServerConfig};
use crate::error::ServerError;
use crate::types::{Request, Response};

type ConnectionId = u64;

/// A running socket server. Dropping this does not stop the accept loop;
/// call [`SocketServer::stop`] (or drop the returned join handle) to do so.
pub struct SocketServer {
    next_conn_id: AtomicU64,
}

impl SocketServer {
    /// Bind `address` and serve `app` until the process exits or the
    /// returned task is aborted. All calls into `app`, across every
    /// connection, are serialized through `app_mutex` — this is the single
    /// load-bearing invariant that lets a non-thread-safe Application be
    /// driven by multiple connections at once.
    pub async fn serve(
        address: Address,
        app: Arc<dyn Application>,
        config: ServerConfig,
    ) -> std::result::Result<(), ServerError> {
        let server = Arc::new(SocketServer {
            next_conn_id: AtomicU64::new(0),
        });
        let app_mutex = Arc::new(Mutex::new(()));

        match address {
            Address::Tcp(addr) => {
                let listener = TcpListener::bind(&addr).await?;
                info!(%addr, "socket server listening (tcp)");
                loop {
                    let (stream, peer) = listener.accept().await?;
                    let _ = stream.set_nodelay(true);
                    let conn_id = server.next_conn_id.fetch_add(1, Ordering::SeqCst);
                    debug!(conn_id, %peer, "accepted connection");
                    let (reader, writer) = tokio::io::split(stream);
                    spawn_connection(
                        conn_id,
                        reader,
                        writer,
                        app.clone(),
                        app_mutex.clone(),
                        config.clone(),
                    );
                }
            }
            Address::Unix(path) => {
                let listener = UnixListener::bind(&path)?;
                info!(%path, "socket server listening (unix)");
                loop {
                    let (stream, _) = listener.accept().await?;
                    let conn_id = server.next_conn_id.fetch_add(1, Ordering::SeqCst);
                    debug!(conn_id, "accepted connection");
                    let (reader, writer) = tokio::io::split(stream);
                    spawn_connection(
                        conn_id,
                        reader,
                        writer,
                        app.clone(),
                        app_mutex.clone(),
                        config.clone(),
                    );
                }
            }
        }
    }
}

fn spawn_connection<R, W>(
    conn_id: ConnectionId,
    reader: R,
    writer: W,
    app: Arc<dyn Application>,
    app_mutex: Arc<Mutex<()>>,
    config: ServerConfig,
) where
    R: tokio::io::AsyncRead + Unpin + Send + 'static,
    W: tokio::io::AsyncWrite + Unpin + Send + 'static,
{
    let (response_tx, response_rx) = mpsc::channel::<Response>(config.response_buffer);

    let reader_handle = tokio::spawn(handle_requests(
        conn_id,
        reader,
        app,
        app_mutex,
        response_tx,
        config.max_request_size,
    ));
    let writer_handle = tokio::spawn(handle_responses(conn_id, writer, response_rx));

    tokio::spawn(async move {
        // Either task failing tears the whole connection down promptly:
        // whichever finishes first has its sibling aborted rather than left
        // to block on a read/write that will never complete now.
        let mut reader_handle = reader_handle;
        let mut writer_handle = writer_handle;
        tokio::select! {
            _ = &mut reader_handle => writer_handle.abort(),
            _ = &mut writer_handle => reader_handle.abort(),
        }
        debug!(conn_id, "connection closed");
    });
}

async fn handle_requests<R>(
    conn_id: ConnectionId,
    reader: R,
    app: Arc<dyn Application>,
    app_mutex: Arc<Mutex<()>>,
    response_tx: mpsc::Sender<Response>,
    max_request_size: usize,
) where
    R: tokio::io::AsyncRead + Unpin + Send,
{
    let mut reader = BufReader::new(reader);
    loop {
        let request: Request = match read_message(&mut reader, max_request_size).await {
            Ok(req) => req,
            Err(e) => {
                debug!(conn_id, error = %e, "connection read failed, closing");
                return;
            }
        };

        let response = {
            let _guard = app_mutex.lock().await;
            handle_request(&app, request).await
        };

        if response_tx.send(response).await.is_err() {
            return;
        }
    }
}

/// Dispatch one request to `app`. Must be called with the shared
/// Application mutex held by the caller.
async fn handle_request(app: &Arc<dyn Application>, request: Request) -> Response {
    match request {
        Request::Echo(msg) => Response::Echo(msg),
        Request::Flush => Response::Flush,
        Request::Info => Response::Info(app.info().await),
        Request::SetOption { key, value } => Response::SetOption {
            log: app.set_option(&key, &value).await,
        },
        Request::DeliverTx(tx) => Response::DeliverTx(app.deliver_tx(&tx).await),
        Request::CheckTx(tx) => Response::CheckTx(app.check_tx(&tx).await),
        Request::Commit => Response::Commit(app.commit().await),
        Request::Query(req) => Response::Query(app.query(req).await),
        Request::InitChain(req) => {
            app.init_chain(req).await;
            Response::InitChain
        }
        Request::BeginBlock(req) => {
            app.begin_block(req).await;
            Response::BeginBlock
        }
        Request::EndBlock { height } => Response::EndBlock(app.end_block(height).await),
    }
}

async fn handle_responses<W>(
    conn_id: ConnectionId,
    writer: W,
    mut response_rx: mpsc::Receiver<Response>,
) where
    W: tokio::io::AsyncWrite + Unpin + Send,
{
    let mut writer = BufWriter::new(writer);
    while let Some(response) = response_rx.recv().await {
        let is_flush = matches!(response, Response::Flush);
        if let Err(e) = write_message(&mut writer, &response).await {
            warn!(conn_id, error = %e, "failed writing response, closing connection");
            return;
        }
        if is_flush {
            if let Err(e) = writer.flush().await {
                error!(conn_id, error = %e, "failed flushing writer, closing connection");
                return;
            }
        }
    }
}
