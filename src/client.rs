//! Client-side proxy for the connection-pool server.
//!
//! [`PoolClient`] speaks the pool wire protocol and implements
//! [`Driver`], so application code cannot tell a pooled remote connection
//! from a direct one. One client owns one connection — and therefore one
//! pool slot — for its whole life. It is not safe for concurrent use
//! without external serialization; every operation takes `&mut self`.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use serde_json::Value;
use tokio::io::AsyncReadExt;
use tokio::net::TcpStream;
use tokio::time;

use crate::config::ClientConfig;
use crate::driver::{BindArgs, Driver, Row};
use crate::error::{PoolError, PoolResult};
use crate::protocol::{codec, Method, Request, Response};

static NEXT_INSTANCE: AtomicU64 = AtomicU64::new(1);

/// A pooled database connection, used like any other [`Driver`].
#[derive(Debug)]
pub struct PoolClient {
    stream: TcpStream,
    driver_name: String,
    instance: u64,
}

impl PoolClient {
    /// Connect with default retry settings.
    pub async fn connect(addr: &str) -> PoolResult<Self> {
        Self::connect_with(addr, ClientConfig::default()).await
    }

    /// Connect, retrying with backoff until a slot-bound handshake is
    /// received or the retry budget is spent.
    ///
    /// A connect failure, a missing handshake, and a pool-exhausted
    /// handshake all count as failed attempts. Exhausting the budget is a
    /// construction failure — the returned client is always usable.
    pub async fn connect_with(addr: &str, config: ClientConfig) -> PoolResult<Self> {
        let attempts = config.connect_retries.max(1);
        let mut last_error = None;
        for attempt in 1..=attempts {
            match Self::try_connect(addr, &config).await {
                Ok(client) => return Ok(client),
                Err(e) => {
                    tracing::debug!(
                        "handshake attempt {}/{} to {} failed: {}",
                        attempt,
                        attempts,
                        addr,
                        e
                    );
                    last_error = Some(e);
                    if attempt < attempts {
                        time::sleep(config.retry_backoff).await;
                    }
                }
            }
        }
        let reason = last_error.map(|e| e.to_string()).unwrap_or_default();
        Err(PoolError::Construction(format!(
            "connection pool at {addr} is unreachable: {reason}"
        )))
    }

    async fn try_connect(addr: &str, config: &ClientConfig) -> PoolResult<Self> {
        let mut stream = TcpStream::connect(addr).await?;
        let mut handshake = [0u8; 1];
        time::timeout(config.handshake_timeout, stream.read_exact(&mut handshake))
            .await
            .map_err(|_| PoolError::Construction("no handshake received".to_string()))??;
        match handshake[0] {
            codec::SLOT_BOUND => {}
            codec::POOL_EXHAUSTED => {
                return Err(PoolError::Construction("pool exhausted".to_string()));
            }
            other => {
                return Err(PoolError::Protocol(format!(
                    "unexpected handshake byte 0x{other:02x}"
                )));
            }
        }
        let mut client = Self {
            stream,
            driver_name: String::new(),
            instance: NEXT_INSTANCE.fetch_add(1, Ordering::Relaxed),
        };
        // Learn the backend's name once so driver_name() answers locally.
        let name = client.call(Method::GetDriverName, Vec::new()).await?;
        client.driver_name = name.as_str().unwrap_or_default().to_string();
        Ok(client)
    }

    /// One request/response round trip. Requests and responses are
    /// strictly paired on this connection; there is no pipelining.
    async fn call(&mut self, method: Method, params: Vec<Value>) -> PoolResult<Value> {
        let request = Request::new(method, params);
        codec::write_message(&mut self.stream, &request).await?;
        let response: Response = codec::read_message(&mut self.stream)
            .await?
            .ok_or_else(|| PoolError::Protocol("connection closed before response".to_string()))?;
        if response.is_ok() {
            Ok(response.result.unwrap_or(Value::Null))
        } else {
            Err(PoolError::Backend(response.message.unwrap_or_default()))
        }
    }

    async fn call_sql(&mut self, method: Method, sql: &str, bind: BindArgs) -> PoolResult<Value> {
        let params = vec![Value::String(sql.to_string()), serde_json::to_value(bind)?];
        self.call(method, params).await
    }
}

#[async_trait]
impl Driver for PoolClient {
    async fn query(&mut self, sql: &str, bind: BindArgs) -> PoolResult<u64> {
        let result = self.call_sql(Method::Query, sql, bind).await?;
        result
            .as_u64()
            .ok_or_else(|| PoolError::Protocol("affected-row count is not an integer".to_string()))
    }

    async fn fetch_all(&mut self, sql: &str, bind: BindArgs) -> PoolResult<Vec<Row>> {
        let result = self.call_sql(Method::FetchAll, sql, bind).await?;
        serde_json::from_value(result)
            .map_err(|e| PoolError::Protocol(format!("invalid fetchAll result: {e}")))
    }

    async fn fetch(&mut self, sql: &str, bind: BindArgs) -> PoolResult<Option<Row>> {
        match self.call_sql(Method::Fetch, sql, bind).await? {
            Value::Null => Ok(None),
            Value::Object(row) => Ok(Some(row)),
            other => Err(PoolError::Protocol(format!("invalid fetch result: {other}"))),
        }
    }

    async fn fetch_one(&mut self, sql: &str, bind: BindArgs) -> PoolResult<Value> {
        self.call_sql(Method::FetchOne, sql, bind).await
    }

    async fn last_insert_id(&mut self, sequence: Option<&str>) -> PoolResult<Value> {
        let params = match sequence {
            Some(seq) => vec![Value::String(seq.to_string())],
            None => Vec::new(),
        };
        self.call(Method::LastInsertId, params).await
    }

    async fn last_row_count(&mut self) -> PoolResult<u64> {
        let result = self.call(Method::LastRowCount, Vec::new()).await?;
        result
            .as_u64()
            .ok_or_else(|| PoolError::Protocol("row count is not an integer".to_string()))
    }

    async fn begin_transaction(&mut self) -> PoolResult<()> {
        self.call(Method::BeginTransaction, Vec::new()).await?;
        Ok(())
    }

    async fn commit(&mut self) -> PoolResult<()> {
        self.call(Method::Commit, Vec::new()).await?;
        Ok(())
    }

    async fn rollback(&mut self) -> PoolResult<()> {
        self.call(Method::Rollback, Vec::new()).await?;
        Ok(())
    }

    fn driver_name(&self) -> &str {
        &self.driver_name
    }

    fn instance_id(&self) -> u64 {
        self.instance
    }
}

/// Builder for a [`PoolClient`] with tuned connection settings.
pub struct PoolClientBuilder {
    addr: String,
    config: ClientConfig,
}

impl PoolClientBuilder {
    pub fn new(addr: &str) -> Self {
        Self {
            addr: addr.to_string(),
            config: ClientConfig::default(),
        }
    }

    /// Connection attempts before construction fails.
    pub fn connect_retries(mut self, retries: u32) -> Self {
        self.config.connect_retries = retries;
        self
    }

    /// Pause between attempts.
    pub fn retry_backoff(mut self, backoff: std::time::Duration) -> Self {
        self.config.retry_backoff = backoff;
        self
    }

    /// How long to wait for the server's handshake byte.
    pub fn handshake_timeout(mut self, timeout: std::time::Duration) -> Self {
        self.config.handshake_timeout = timeout;
        self
    }

    pub async fn build(self) -> PoolResult<PoolClient> {
        PoolClient::connect_with(&self.addr, self.config).await
    }
}
