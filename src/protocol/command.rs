use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::driver::BindArgs;
use crate::error::PoolError;

/// A wire request: operation name plus positional arguments.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    pub method: String,
    #[serde(default)]
    pub params: Vec<Value>,
}

impl Request {
    pub fn new(method: Method, params: Vec<Value>) -> Self {
        Self {
            method: method.as_str().to_string(),
            params,
        }
    }
}

/// The closed set of operations a client may invoke on its bound driver.
///
/// Names are resolved once, at the decode boundary; anything outside this
/// set is answered as an unsupported operation without touching the
/// driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Query,
    Fetch,
    FetchAll,
    FetchOne,
    LastInsertId,
    LastRowCount,
    BeginTransaction,
    Commit,
    Rollback,
    GetDriverName,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Query => "query",
            Method::Fetch => "fetch",
            Method::FetchAll => "fetchAll",
            Method::FetchOne => "fetchOne",
            Method::LastInsertId => "lastInsertId",
            Method::LastRowCount => "lastRowCount",
            Method::BeginTransaction => "beginTransaction",
            Method::Commit => "commit",
            Method::Rollback => "rollback",
            Method::GetDriverName => "getDriverName",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Method {
    type Err = PoolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "query" => Ok(Method::Query),
            "fetch" => Ok(Method::Fetch),
            "fetchAll" => Ok(Method::FetchAll),
            "fetchOne" => Ok(Method::FetchOne),
            "lastInsertId" => Ok(Method::LastInsertId),
            "lastRowCount" => Ok(Method::LastRowCount),
            "beginTransaction" => Ok(Method::BeginTransaction),
            "commit" => Ok(Method::Commit),
            "rollback" => Ok(Method::Rollback),
            "getDriverName" => Ok(Method::GetDriverName),
            _ => Err(PoolError::UnsupportedOperation(s.to_string())),
        }
    }
}

/// A request decoded into a typed operation, its arguments applied in
/// declared order.
#[derive(Debug, Clone)]
pub enum Call {
    Query { sql: String, bind: BindArgs },
    Fetch { sql: String, bind: BindArgs },
    FetchAll { sql: String, bind: BindArgs },
    FetchOne { sql: String, bind: BindArgs },
    LastInsertId { sequence: Option<String> },
    LastRowCount,
    BeginTransaction,
    Commit,
    Rollback,
    GetDriverName,
}

impl Call {
    /// Decode the arguments for an already-resolved method. Arguments
    /// beyond the declared ones are ignored.
    pub fn decode(method: Method, params: &[Value]) -> Result<Call, PoolError> {
        match method {
            Method::Query => {
                let (sql, bind) = sql_and_bind(method, params)?;
                Ok(Call::Query { sql, bind })
            }
            Method::Fetch => {
                let (sql, bind) = sql_and_bind(method, params)?;
                Ok(Call::Fetch { sql, bind })
            }
            Method::FetchAll => {
                let (sql, bind) = sql_and_bind(method, params)?;
                Ok(Call::FetchAll { sql, bind })
            }
            Method::FetchOne => {
                let (sql, bind) = sql_and_bind(method, params)?;
                Ok(Call::FetchOne { sql, bind })
            }
            Method::LastInsertId => {
                let sequence = match params.first() {
                    None | Some(Value::Null) => None,
                    Some(Value::String(seq)) => Some(seq.clone()),
                    Some(_) => return Err(invalid(method, "sequence name must be a string")),
                };
                Ok(Call::LastInsertId { sequence })
            }
            Method::LastRowCount => Ok(Call::LastRowCount),
            Method::BeginTransaction => Ok(Call::BeginTransaction),
            Method::Commit => Ok(Call::Commit),
            Method::Rollback => Ok(Call::Rollback),
            Method::GetDriverName => Ok(Call::GetDriverName),
        }
    }
}

fn sql_and_bind(method: Method, params: &[Value]) -> Result<(String, BindArgs), PoolError> {
    let sql = match params.first() {
        Some(Value::String(sql)) => sql.clone(),
        _ => return Err(invalid(method, "first argument must be a SQL string")),
    };
    let bind = match params.get(1) {
        None | Some(Value::Null) => BindArgs::default(),
        Some(value) => serde_json::from_value(value.clone()).map_err(|_| {
            invalid(method, "second argument must be an array or object of bind values")
        })?,
    };
    Ok((sql, bind))
}

fn invalid(method: Method, detail: &str) -> PoolError {
    PoolError::Protocol(format!("invalid params for {method}: {detail}"))
}
