//! The TCP-facing connection-pool server.
//!
//! The server runs a fixed number of worker event loops; each worker owns
//! a private [`Pool`] built once at startup. Accepted connections are
//! assigned to workers round-robin and stay with that worker for their
//! whole life. Within a worker, Connect/Receive/Close events are
//! processed to completion one at a time, so pool operations need no
//! locking and each connection's requests are answered strictly in
//! arrival order; ordering across connections is unspecified.

pub mod dispatch;

use std::sync::Arc;
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, oneshot};

use crate::config::ServerConfig;
use crate::driver::DriverFactory;
use crate::error::{PoolError, PoolResult};
use crate::logging;
use crate::pool::{ConnId, Pool};
use crate::protocol::{codec, Response};

pub use dispatch::dispatch;

/// Events a connection task hands to its worker's event loop.
enum WorkerEvent {
    Connect {
        conn: ConnId,
        reply: oneshot::Sender<bool>,
    },
    Receive {
        conn: ConnId,
        payload: Vec<u8>,
        reply: oneshot::Sender<Response>,
    },
    Close {
        conn: ConnId,
    },
}

/// The connection-pool server.
pub struct PoolServer {
    config: ServerConfig,
    factory: Arc<dyn DriverFactory>,
}

impl PoolServer {
    pub fn new(config: ServerConfig, factory: Arc<dyn DriverFactory>) -> Self {
        Self { config, factory }
    }

    /// Initialize logging, bind the configured address, and serve until
    /// the listener fails.
    pub async fn run(self) -> PoolResult<()> {
        logging::init(&self.config.log_destination)?;
        let addr = format!("{}:{}", self.config.host, self.config.port);
        let listener = TcpListener::bind(&addr).await?;
        self.serve(listener).await
    }

    /// Serve connections from an already-bound listener.
    pub async fn serve(self, listener: TcpListener) -> PoolResult<()> {
        let local = listener.local_addr()?;
        tracing::info!("connection pool server listening on {}", local);

        let worker_count = self.config.worker_count.max(1);
        let mut workers = Vec::with_capacity(worker_count);
        for worker_id in 0..worker_count {
            let (tx, rx) = mpsc::channel(64);
            let factory = Arc::clone(&self.factory);
            let pool_size = self.config.worker_conn_count;
            let call_timeout = self.config.request_timeout;
            tokio::spawn(async move {
                let pool = Pool::create(worker_id, pool_size, factory.as_ref()).await;
                worker_loop(pool, rx, call_timeout).await;
            });
            workers.push(tx);
        }

        let mut next_conn: ConnId = 0;
        loop {
            let (stream, peer) = listener.accept().await?;
            next_conn += 1;
            let conn = next_conn;
            let worker = workers[(conn as usize - 1) % worker_count].clone();
            tokio::spawn(async move {
                if let Err(e) = serve_connection(stream, conn, worker).await {
                    tracing::warn!(
                        "client connection error [conn:{}][peer:{}]: {}",
                        conn,
                        peer,
                        e
                    );
                }
            });
        }
    }
}

/// One worker's event loop. Owns its pool for the life of the worker;
/// events run to completion one at a time.
async fn worker_loop(
    mut pool: Pool,
    mut events: mpsc::Receiver<WorkerEvent>,
    call_timeout: Option<Duration>,
) {
    let worker = pool.worker_id();
    while let Some(event) = events.recv().await {
        match event {
            WorkerEvent::Connect { conn, reply } => {
                let slot = pool.acquire(conn);
                match slot {
                    Some(slot) => tracing::info!(
                        "client bound [conn:{}][worker:{}][slot:{}]",
                        conn,
                        worker,
                        slot
                    ),
                    None => tracing::warn!("pool exhausted [conn:{}][worker:{}]", conn, worker),
                }
                let _ = reply.send(slot.is_some());
            }
            WorkerEvent::Receive {
                conn,
                payload,
                reply,
            } => {
                let response = dispatch(&mut pool, conn, &payload, call_timeout).await;
                let _ = reply.send(response);
            }
            WorkerEvent::Close { conn } => {
                pool.release(conn);
                tracing::info!("client disconnected [conn:{}][worker:{}]", conn, worker);
            }
        }
    }
}

/// Serve one accepted connection, making sure its binding is released no
/// matter how the relay ends.
async fn serve_connection(
    mut stream: TcpStream,
    conn: ConnId,
    worker: mpsc::Sender<WorkerEvent>,
) -> PoolResult<()> {
    let result = relay(&mut stream, conn, &worker).await;
    let _ = worker.send(WorkerEvent::Close { conn }).await;
    result
}

/// The relay loop: handshake, then one framed response per framed
/// request, in arrival order.
async fn relay(
    stream: &mut TcpStream,
    conn: ConnId,
    worker: &mpsc::Sender<WorkerEvent>,
) -> PoolResult<()> {
    let (reply, bound) = oneshot::channel();
    worker
        .send(WorkerEvent::Connect { conn, reply })
        .await
        .map_err(|_| worker_gone())?;
    let bound = bound.await.map_err(|_| worker_gone())?;
    let handshake = if bound {
        codec::SLOT_BOUND
    } else {
        codec::POOL_EXHAUSTED
    };
    stream.write_all(&[handshake]).await?;
    stream.flush().await?;

    loop {
        let payload = match codec::read_frame(stream).await {
            Ok(Some(payload)) => payload,
            Ok(None) => return Ok(()),
            Err(PoolError::MessageTooLarge) => {
                // Framing cannot be resynced past an oversized frame;
                // answer it and drop the connection.
                let response = Response::fail(PoolError::MessageTooLarge.to_string());
                codec::write_message(stream, &response).await?;
                return Err(PoolError::MessageTooLarge);
            }
            Err(e) => return Err(e),
        };

        let (reply, response) = oneshot::channel();
        worker
            .send(WorkerEvent::Receive {
                conn,
                payload,
                reply,
            })
            .await
            .map_err(|_| worker_gone())?;
        let response = response.await.map_err(|_| worker_gone())?;
        codec::write_message(stream, &response).await?;
    }
}

fn worker_gone() -> PoolError {
    PoolError::Protocol("worker event loop is gone".to_string())
}
