//! Line-delimited JSON-RPC 2.0 over stdio
//!
//! The MCP method surface: `initialize`, `tools/list`, `tools/call`,
//! `ping`. Requests without an id are notifications and get no response.
//! Malformed lines answer with a parse error instead of killing the loop.

use serde::Deserialize;
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tools::{Arguments, Dispatcher};

pub const PROTOCOL_VERSION: &str = "2024-11-05";
const SERVER_NAME: &str = "browser-mcp";

const PARSE_ERROR: i64 = -32700;
const INVALID_PARAMS: i64 = -32602;
const METHOD_NOT_FOUND: i64 = -32601;

#[derive(Debug, Deserialize)]
struct Request {
    #[serde(default)]
    id: Option<Value>,
    method: String,
    #[serde(default)]
    params: Option<Value>,
}

/// Serve requests line by line until the reader closes.
pub async fn serve<R, W>(dispatcher: &Dispatcher, reader: R, mut writer: W) -> std::io::Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = BufReader::new(reader).lines();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }

        let request: Request = match serde_json::from_str(&line) {
            Ok(request) => request,
            Err(e) => {
                tracing::warn!(error = %e, "unparseable request line");
                let response = json!({
                    "jsonrpc": "2.0",
                    "id": Value::Null,
                    "error": { "code": PARSE_ERROR, "message": format!("Parse error: {e}") },
                });
                write_line(&mut writer, &response).await?;
                continue;
            }
        };

        let Some(id) = request.id else {
            tracing::debug!(method = %request.method, "notification ignored");
            continue;
        };

        let response = match handle_method(dispatcher, &request.method, request.params).await {
            Ok(result) => json!({ "jsonrpc": "2.0", "id": id, "result": result }),
            Err((code, message)) => json!({
                "jsonrpc": "2.0",
                "id": id,
                "error": { "code": code, "message": message },
            }),
        };
        write_line(&mut writer, &response).await?;
    }
    Ok(())
}

async fn handle_method(
    dispatcher: &Dispatcher,
    method: &str,
    params: Option<Value>,
) -> Result<Value, (i64, String)> {
    match method {
        "initialize" => Ok(json!({
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": { "tools": {} },
            "serverInfo": {
                "name": SERVER_NAME,
                "version": env!("CARGO_PKG_VERSION"),
            },
        })),
        "ping" => Ok(json!({})),
        "tools/list" => Ok(json!({ "tools": dispatcher.listings() })),
        "tools/call" => {
            let params = params.unwrap_or(Value::Null);
            let Some(name) = params["name"].as_str() else {
                return Err((INVALID_PARAMS, "missing tool name".to_string()));
            };
            let arguments: Arguments = match params.get("arguments") {
                Some(Value::Object(map)) => map.clone(),
                None | Some(Value::Null) => Arguments::new(),
                Some(_) => {
                    return Err((INVALID_PARAMS, "arguments must be an object".to_string()))
                }
            };
            let result = dispatcher.dispatch(name, arguments).await;
            serde_json::to_value(&result)
                .map_err(|e| (INVALID_PARAMS, format!("unserializable result: {e}")))
        }
        other => Err((METHOD_NOT_FOUND, format!("Method not found: {other}"))),
    }
}

async fn write_line<W>(writer: &mut W, value: &Value) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let text = value.to_string();
    writer.write_all(text.as_bytes()).await?;
    writer.write_all(b"\n").await?;
    writer.flush().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use browser::{BrowserSession, MockEngine, SessionConfig};

    fn mock_dispatcher() -> Dispatcher {
        let engine = Arc::new(MockEngine::new());
        let session = Arc::new(BrowserSession::new(SessionConfig::default(), engine));
        Dispatcher::for_session(session)
    }

    async fn roundtrip(input: &str) -> Vec<Value> {
        let dispatcher = mock_dispatcher();
        let mut output = Vec::new();
        serve(&dispatcher, input.as_bytes(), &mut output)
            .await
            .unwrap();
        String::from_utf8(output)
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }

    #[tokio::test]
    async fn initialize_reports_server_info() {
        let responses =
            roundtrip(r#"{"jsonrpc":"2.0","id":1,"method":"initialize","params":{}}"#).await;
        assert_eq!(responses.len(), 1);
        let result = &responses[0]["result"];
        assert_eq!(result["protocolVersion"], PROTOCOL_VERSION);
        assert_eq!(result["serverInfo"]["name"], "browser-mcp");
        assert!(result["capabilities"]["tools"].is_object());
    }

    #[tokio::test]
    async fn tools_list_returns_the_full_set() {
        let responses = roundtrip(r#"{"jsonrpc":"2.0","id":2,"method":"tools/list"}"#).await;
        let tools = responses[0]["result"]["tools"].as_array().unwrap();
        assert_eq!(tools.len(), 21);
        assert!(tools.iter().any(|t| t["name"] == "browser_navigate"));
    }

    #[tokio::test]
    async fn tools_call_runs_a_tool_end_to_end() {
        let request = r#"{"jsonrpc":"2.0","id":3,"method":"tools/call","params":{"name":"browser_navigate","arguments":{"url":"https://a.test"}}}"#;
        let responses = roundtrip(request).await;
        let result = &responses[0]["result"];
        assert_eq!(result["isError"], false);
        let text = result["content"][0]["text"].as_str().unwrap();
        assert!(text.contains("Navigated to: https://a.test"));
    }

    #[tokio::test]
    async fn tools_call_with_unknown_tool_still_answers_with_an_envelope() {
        let request = r#"{"jsonrpc":"2.0","id":4,"method":"tools/call","params":{"name":"nope"}}"#;
        let responses = roundtrip(request).await;
        let result = &responses[0]["result"];
        assert_eq!(result["isError"], true);
        assert_eq!(result["content"][0]["text"], "Tool 'nope' not found");
    }

    #[tokio::test]
    async fn unknown_method_is_a_jsonrpc_error() {
        let responses = roundtrip(r#"{"jsonrpc":"2.0","id":5,"method":"resources/list"}"#).await;
        assert_eq!(responses[0]["error"]["code"], METHOD_NOT_FOUND);
    }

    #[tokio::test]
    async fn garbage_line_answers_a_parse_error_and_keeps_serving() {
        let input = "not json at all\n{\"jsonrpc\":\"2.0\",\"id\":6,\"method\":\"ping\"}\n";
        let responses = roundtrip(input).await;
        assert_eq!(responses.len(), 2);
        assert_eq!(responses[0]["error"]["code"], PARSE_ERROR);
        assert!(responses[1]["result"].is_object());
    }

    #[tokio::test]
    async fn notifications_get_no_response() {
        let input = r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#;
        let responses = roundtrip(input).await;
        assert!(responses.is_empty());
    }
}
