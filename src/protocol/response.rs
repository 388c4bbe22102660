use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A wire response. `status` 1 carries `result`; `status` 0 carries
/// `message`. Unused fields are omitted on the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    pub status: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl Response {
    /// Success with a result value.
    pub fn ok(result: Value) -> Self {
        Self {
            status: 1,
            result: Some(result),
            message: None,
        }
    }

    /// Success for operations with no meaningful return value.
    pub fn ok_empty() -> Self {
        Self {
            status: 1,
            result: None,
            message: None,
        }
    }

    /// Failure carrying a diagnostic message.
    pub fn fail(message: impl Into<String>) -> Self {
        Self {
            status: 0,
            result: None,
            message: Some(message.into()),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_success_shape_omits_message() {
        let encoded = serde_json::to_value(Response::ok(json!(1))).unwrap();
        assert_eq!(encoded, json!({"status": 1, "result": 1}));
    }

    #[test]
    fn test_empty_success_carries_status_only() {
        let encoded = serde_json::to_value(Response::ok_empty()).unwrap();
        assert_eq!(encoded, json!({"status": 1}));
    }

    #[test]
    fn test_failure_shape_omits_result() {
        let encoded = serde_json::to_value(Response::fail("no driver bound to this connection"))
            .unwrap();
        assert_eq!(
            encoded,
            json!({"status": 0, "message": "no driver bound to this connection"})
        );
    }

    #[test]
    fn test_decode_tolerates_absent_fields() {
        let response: Response = serde_json::from_value(json!({"status": 1})).unwrap();
        assert!(response.is_ok());
        assert!(response.result.is_none());
        assert!(response.message.is_none());
    }
}
