//! Common test utilities for pool server tests
//!
//! Provides shared helper functions for:
//! - A canned backend driver standing in for a real database adapter
//! - Driver factories (reliable and failing)
//! - Spawning an in-process pool server on an ephemeral port

#![allow(dead_code)]

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::net::TcpListener;

use dbpool::{
    BindArgs, Driver, DriverFactory, PoolError, PoolResult, PoolServer, Row, ServerConfig,
};

/// A canned in-memory backend. Statements containing `missing` fail the
/// way a real backend would; the statement `SLOW` stalls long enough to
/// trip any reasonable deadline.
pub struct StubDriver {
    instance: u64,
    last_rows: u64,
    in_transaction: bool,
}

impl StubDriver {
    pub fn new(instance: u64) -> Self {
        Self {
            instance,
            last_rows: 0,
            in_transaction: false,
        }
    }
}

#[async_trait]
impl Driver for StubDriver {
    async fn query(&mut self, sql: &str, _bind: BindArgs) -> PoolResult<u64> {
        if sql.contains("missing") {
            return Err(PoolError::Backend(
                "ORA-00942: table or view does not exist".to_string(),
            ));
        }
        if sql == "SLOW" {
            tokio::time::sleep(Duration::from_secs(5)).await;
        }
        self.last_rows = 1;
        Ok(1)
    }

    async fn fetch_all(&mut self, _sql: &str, _bind: BindArgs) -> PoolResult<Vec<Row>> {
        let rows = [
            json!({"ID": 1, "NAME": "Ada"}),
            json!({"ID": 2, "NAME": "Grace"}),
        ];
        Ok(rows
            .iter()
            .map(|row| row.as_object().unwrap().clone())
            .collect())
    }

    async fn fetch(&mut self, sql: &str, _bind: BindArgs) -> PoolResult<Option<Row>> {
        if sql.contains("empty") {
            return Ok(None);
        }
        Ok(Some(json!({"ID": 1, "NAME": "Ada"}).as_object().unwrap().clone()))
    }

    async fn fetch_one(&mut self, _sql: &str, _bind: BindArgs) -> PoolResult<Value> {
        Ok(json!(1))
    }

    async fn last_insert_id(&mut self, sequence: Option<&str>) -> PoolResult<Value> {
        Ok(match sequence {
            Some(_) => json!(42),
            None => Value::Null,
        })
    }

    async fn last_row_count(&mut self) -> PoolResult<u64> {
        Ok(self.last_rows)
    }

    async fn begin_transaction(&mut self) -> PoolResult<()> {
        self.in_transaction = true;
        Ok(())
    }

    async fn commit(&mut self) -> PoolResult<()> {
        self.in_transaction = false;
        Ok(())
    }

    async fn rollback(&mut self) -> PoolResult<()> {
        self.in_transaction = false;
        Ok(())
    }

    fn driver_name(&self) -> &str {
        "stub"
    }

    fn instance_id(&self) -> u64 {
        self.instance
    }
}

/// Hands out [`StubDriver`]s with increasing instance ids.
pub struct StubFactory {
    counter: AtomicU64,
}

impl StubFactory {
    pub fn new() -> Self {
        Self {
            counter: AtomicU64::new(0),
        }
    }
}

#[async_trait]
impl DriverFactory for StubFactory {
    async fn create(&self) -> PoolResult<Box<dyn Driver>> {
        let instance = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(Box::new(StubDriver::new(instance)))
    }
}

/// Fails every invocation whose ordinal appears in `fail_on`.
pub struct FlakyFactory {
    counter: AtomicU64,
    fail_on: Vec<u64>,
}

impl FlakyFactory {
    pub fn new(fail_on: Vec<u64>) -> Self {
        Self {
            counter: AtomicU64::new(0),
            fail_on,
        }
    }
}

#[async_trait]
impl DriverFactory for FlakyFactory {
    async fn create(&self) -> PoolResult<Box<dyn Driver>> {
        let ordinal = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail_on.contains(&ordinal) {
            return Err(PoolError::Construction(
                "backend refused the connection".to_string(),
            ));
        }
        Ok(Box::new(StubDriver::new(ordinal)))
    }
}

/// Spawn a pool server backed by [`StubFactory`] on an ephemeral port and
/// return its address.
pub async fn spawn_server(workers: usize, pool_size: usize) -> String {
    spawn_server_with_timeout(workers, pool_size, Some(Duration::from_secs(30))).await
}

pub async fn spawn_server_with_timeout(
    workers: usize,
    pool_size: usize,
    request_timeout: Option<Duration>,
) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    let config = ServerConfig {
        worker_count: workers,
        worker_conn_count: pool_size,
        request_timeout,
        ..ServerConfig::default()
    };
    let server = PoolServer::new(config, Arc::new(StubFactory::new()));
    tokio::spawn(async move {
        let _ = server.serve(listener).await;
    });
    addr
}
