//! Request dispatch: one wire message in, one wire response out.
//!
//! Backend failures are converted to `status: 0` responses at this
//! boundary; they never surface as transport errors, so the connection
//! and its binding survive every failed operation.

use std::time::Duration;

use serde_json::Value;
use tokio::time;

use crate::driver::{Driver, Row};
use crate::error::{PoolError, PoolResult};
use crate::pool::{ConnId, Pool};
use crate::protocol::{Call, Method, Request, Response};

/// Decode `raw` and run the named operation on the driver bound to
/// `conn`.
///
/// Edge policy, in order: an unparseable payload or missing method is
/// answered without consulting the pool; a connection with no bound slot
/// is rejected; an operation name outside the driver contract is
/// rejected; only then is the driver invoked, under `call_timeout` when
/// one is configured.
pub async fn dispatch(
    pool: &mut Pool,
    conn: ConnId,
    raw: &[u8],
    call_timeout: Option<Duration>,
) -> Response {
    let worker = pool.worker_id();

    let request: Request = match serde_json::from_slice(raw) {
        Ok(request) => request,
        Err(_) => {
            tracing::warn!(
                "malformed request [conn:{}][worker:{}]: {}",
                conn,
                worker,
                String::from_utf8_lossy(raw)
            );
            return Response::fail(PoolError::MalformedRequest.to_string());
        }
    };
    if request.method.is_empty() {
        tracing::warn!(
            "malformed request [conn:{}][worker:{}]: empty method",
            conn,
            worker
        );
        return Response::fail(PoolError::MalformedRequest.to_string());
    }

    let Some(slot) = pool.resolve(conn) else {
        tracing::warn!(
            "no driver bound [conn:{}][worker:{}][method:{}]",
            conn,
            worker,
            request.method
        );
        return Response::fail(PoolError::NoDriverBound.to_string());
    };
    let slot_id = slot.id();

    let call = match request
        .method
        .parse::<Method>()
        .and_then(|method| Call::decode(method, &request.params))
    {
        Ok(call) => call,
        Err(e) => {
            tracing::warn!(
                "dispatch rejected [conn:{}][worker:{}][slot:{}][method:{}]: {}",
                conn,
                worker,
                slot_id,
                request.method,
                e
            );
            return Response::fail(e.to_string());
        }
    };

    let driver = slot.driver_mut();
    let outcome = match call_timeout {
        Some(limit) => match time::timeout(limit, execute(driver, call)).await {
            Ok(outcome) => outcome,
            Err(_) => Err(PoolError::Timeout(limit)),
        },
        None => execute(driver, call).await,
    };

    let params = Value::Array(request.params).to_string();
    match outcome {
        Ok(response) => {
            tracing::info!(
                "operation ok [conn:{}][worker:{}][slot:{}][method:{}] params={}",
                conn,
                worker,
                slot_id,
                request.method,
                params
            );
            response
        }
        Err(e) => {
            tracing::warn!(
                "operation failed [conn:{}][worker:{}][slot:{}][method:{}] params={}: {}",
                conn,
                worker,
                slot_id,
                request.method,
                params,
                e
            );
            Response::fail(e.to_string())
        }
    }
}

async fn execute(driver: &mut dyn Driver, call: Call) -> PoolResult<Response> {
    match call {
        Call::Query { sql, bind } => Ok(Response::ok(driver.query(&sql, bind).await?.into())),
        Call::Fetch { sql, bind } => {
            let row = driver.fetch(&sql, bind).await?;
            Ok(Response::ok(match row {
                Some(row) => Value::Object(lowercase_keys(row)),
                None => Value::Null,
            }))
        }
        Call::FetchAll { sql, bind } => {
            let rows = driver.fetch_all(&sql, bind).await?;
            Ok(Response::ok(Value::Array(
                rows.into_iter()
                    .map(|row| Value::Object(lowercase_keys(row)))
                    .collect(),
            )))
        }
        Call::FetchOne { sql, bind } => Ok(Response::ok(driver.fetch_one(&sql, bind).await?)),
        Call::LastInsertId { sequence } => {
            Ok(Response::ok(driver.last_insert_id(sequence.as_deref()).await?))
        }
        Call::LastRowCount => Ok(Response::ok(driver.last_row_count().await?.into())),
        Call::BeginTransaction => {
            driver.begin_transaction().await?;
            Ok(Response::ok_empty())
        }
        Call::Commit => {
            driver.commit().await?;
            Ok(Response::ok_empty())
        }
        Call::Rollback => {
            driver.rollback().await?;
            Ok(Response::ok_empty())
        }
        Call::GetDriverName => Ok(Response::ok(Value::String(driver.driver_name().to_string()))),
    }
}

/// Field names are reported lower-case regardless of how the backend
/// cases them.
fn lowercase_keys(row: Row) -> Row {
    row.into_iter()
        .map(|(key, value)| (key.to_lowercase(), value))
        .collect()
}
