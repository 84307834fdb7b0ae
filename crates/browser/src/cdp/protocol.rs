//! CDP wire types
//!
//! The fundamental message shapes for DevTools Protocol traffic. Kept
//! minimal; domain-specific payloads stay as raw `Value`s.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Request ID - monotonically increasing per connection.
pub type RequestId = u64;

/// Target ID assigned by the browser.
pub type TargetId = String;

/// Session ID for attached targets.
pub type SessionId = String;

/// Request sent to the browser.
#[derive(Debug, Clone, Serialize)]
pub struct CdpRequest {
    pub id: RequestId,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
    #[serde(rename = "sessionId", skip_serializing_if = "Option::is_none")]
    pub session_id: Option<SessionId>,
}

/// Response from the browser, matched to a request by id.
#[derive(Debug, Clone, Deserialize)]
pub struct CdpResponse {
    pub id: RequestId,
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<CdpProtocolError>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CdpProtocolError {
    pub code: i32,
    pub message: String,
    #[serde(default)]
    pub data: Option<Value>,
}

/// Event pushed by the browser (no request id).
#[derive(Debug, Clone, Deserialize)]
pub struct CdpEvent {
    pub method: String,
    #[serde(default)]
    pub params: Option<Value>,
    #[serde(rename = "sessionId", default)]
    pub session_id: Option<SessionId>,
}

/// Any inbound message: a response or an event.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum CdpMessage {
    Response(CdpResponse),
    Event(CdpEvent),
}

/// Result of Target.attachToTarget.
#[derive(Debug, Clone, Deserialize)]
pub struct AttachToTargetResult {
    #[serde(rename = "sessionId")]
    pub session_id: SessionId,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_serializes_without_empty_fields() {
        let req = CdpRequest {
            id: 1,
            method: "Browser.getVersion".to_string(),
            params: None,
            session_id: None,
        };
        let text = serde_json::to_string(&req).unwrap();
        assert_eq!(text, r#"{"id":1,"method":"Browser.getVersion"}"#);
    }

    #[test]
    fn request_carries_session_id() {
        let req = CdpRequest {
            id: 2,
            method: "Page.navigate".to_string(),
            params: Some(json!({"url": "https://example.test"})),
            session_id: Some("SID".to_string()),
        };
        let value: Value = serde_json::to_value(&req).unwrap();
        assert_eq!(value["sessionId"], "SID");
        assert_eq!(value["params"]["url"], "https://example.test");
    }

    #[test]
    fn inbound_message_disambiguates_response_and_event() {
        let response: CdpMessage =
            serde_json::from_str(r#"{"id":3,"result":{"ok":true}}"#).unwrap();
        assert!(matches!(response, CdpMessage::Response(r) if r.id == 3));

        let event: CdpMessage = serde_json::from_str(
            r#"{"method":"Runtime.consoleAPICalled","params":{},"sessionId":"S"}"#,
        )
        .unwrap();
        assert!(matches!(event, CdpMessage::Event(e) if e.method == "Runtime.consoleAPICalled"));
    }

    #[test]
    fn error_response_deserializes() {
        let response: CdpResponse =
            serde_json::from_str(r#"{"id":4,"error":{"code":-32000,"message":"nope"}}"#).unwrap();
        let error = response.error.unwrap();
        assert_eq!(error.code, -32000);
        assert_eq!(error.message, "nope");
    }
}
