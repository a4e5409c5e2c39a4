//! Decoding of a single stream record
//!
//! Three record shapes are understood:
//! - SSE lines: `data: {json}`, with comments (`:`) and `event:`/`id:`/`retry:` fields skipped
//! - bare JSON objects, one per line
//! - `kind:payload` shorthand (`tok`, `token`, `tool_call`, `tool_result`, `status`, `error`)

use serde_json::{Map, Value};

use a2abase_core::run::{RunStatusUpdate, StreamEvent};

/// Decode one record (without its delimiter). `None` means the record
/// carries no output (blank line, keepalive, SSE bookkeeping).
pub fn decode_record(bytes: &[u8]) -> Option<StreamEvent> {
    let bytes = bytes.strip_suffix(b"\r").unwrap_or(bytes);
    let line = match std::str::from_utf8(bytes) {
        Ok(line) => line,
        Err(e) => {
            return Some(StreamEvent::decode_error(
                format!("record is not valid UTF-8: {}", e),
                String::from_utf8_lossy(bytes),
            ))
        }
    };

    let trimmed = line.trim_start();
    if trimmed.trim_end().is_empty() || trimmed.starts_with(':') {
        return None;
    }

    if let Some(data) = trimmed.strip_prefix("data:") {
        let data = data.trim();
        if data.is_empty() || data == "[DONE]" {
            return None;
        }
        return decode_json(data, line);
    }
    if ["event:", "id:", "retry:"]
        .iter()
        .any(|field| trimmed.starts_with(field))
    {
        return None;
    }
    if trimmed.starts_with('{') {
        return decode_json(trimmed.trim_end(), line);
    }

    decode_shorthand(trimmed, line)
}

fn decode_shorthand(record: &str, raw: &str) -> Option<StreamEvent> {
    let Some((kind, payload)) = record.split_once(':') else {
        return Some(StreamEvent::decode_error("record has no kind prefix", raw));
    };

    let event = match kind.trim() {
        "tok" | "token" => StreamEvent::token(payload),
        "status" => StreamEvent::status(RunStatusUpdate::parse(payload)),
        "error" => StreamEvent::service_error(payload.trim()),
        "tool_call" => match parse_object(payload) {
            Some(obj) => tool_call(&obj),
            None => StreamEvent::ToolCall {
                name: payload.trim().to_string(),
                arguments: Value::Null,
                call_id: None,
            },
        },
        "tool_result" => match parse_object(payload) {
            Some(obj) if obj.contains_key("output") || obj.contains_key("result") => {
                tool_result(&obj)
            }
            _ => StreamEvent::ToolResult {
                name: None,
                output: serde_json::from_str(payload.trim())
                    .unwrap_or_else(|_| Value::String(payload.to_string())),
                success: None,
                call_id: None,
            },
        },
        other => {
            return Some(StreamEvent::decode_error(
                format!("unknown record kind {:?}", other),
                raw,
            ))
        }
    };
    Some(event)
}

fn parse_object(payload: &str) -> Option<Map<String, Value>> {
    match serde_json::from_str::<Value>(payload.trim()) {
        Ok(Value::Object(obj)) => Some(obj),
        _ => None,
    }
}

fn decode_json(data: &str, raw: &str) -> Option<StreamEvent> {
    let obj = match serde_json::from_str::<Value>(data) {
        Ok(Value::Object(obj)) => obj,
        Ok(_) => return Some(StreamEvent::decode_error("record is not a JSON object", raw)),
        Err(e) => return Some(StreamEvent::decode_error(format!("invalid JSON: {}", e), raw)),
    };

    let Some(kind) = str_field(&obj, &["type"]) else {
        return Some(StreamEvent::decode_error("JSON record has no type", raw));
    };

    let event = match kind.as_str() {
        "ping" | "heartbeat" => return None,
        "token" | "text" | "content" | "delta" => {
            StreamEvent::token(str_field(&obj, &["text", "content", "delta"]).unwrap_or_default())
        }
        "assistant" => StreamEvent::token(assistant_text(&obj)),
        "tool_call" => tool_call(&obj),
        "tool" | "tool_result" => tool_result(&obj),
        "status" => match str_field(&obj, &["status", "status_type"]) {
            Some(status) => StreamEvent::Status {
                status: RunStatusUpdate::parse(&status),
                message: str_field(&obj, &["message"]),
            },
            None => return Some(StreamEvent::decode_error("status record has no status", raw)),
        },
        "error" => StreamEvent::service_error(
            str_field(&obj, &["message", "error", "content"])
                .unwrap_or_else(|| "unspecified error".to_string()),
        ),
        other => StreamEvent::Status {
            status: RunStatusUpdate::Other(other.to_string()),
            message: str_field(&obj, &["message"]),
        },
    };
    Some(event)
}

/// Assistant records carry their text either directly or as a JSON-encoded
/// `{"role": "assistant", "content": ...}` string.
fn assistant_text(obj: &Map<String, Value>) -> String {
    match obj.get("content") {
        Some(Value::String(content)) => match serde_json::from_str::<Value>(content) {
            Ok(Value::Object(inner)) => str_field(&inner, &["content"]).unwrap_or_default(),
            _ => content.clone(),
        },
        Some(Value::Object(inner)) => str_field(inner, &["content"]).unwrap_or_default(),
        _ => String::new(),
    }
}

fn tool_call(obj: &Map<String, Value>) -> StreamEvent {
    StreamEvent::ToolCall {
        name: str_field(obj, &["name", "function_name", "tool"]).unwrap_or_default(),
        arguments: value_field(obj, &["arguments", "args", "input"]),
        call_id: str_field(obj, &["call_id", "tool_call_id", "id"]),
    }
}

fn tool_result(obj: &Map<String, Value>) -> StreamEvent {
    StreamEvent::ToolResult {
        name: str_field(obj, &["name", "function_name", "tool"]),
        output: value_field(obj, &["output", "result", "content"]),
        success: obj.get("success").and_then(Value::as_bool),
        call_id: str_field(obj, &["call_id", "tool_call_id", "id"]),
    }
}

fn str_field(obj: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter()
        .find_map(|key| obj.get(*key).and_then(Value::as_str))
        .map(ToString::to_string)
}

fn value_field(obj: &Map<String, Value>, keys: &[&str]) -> Value {
    keys.iter()
        .find_map(|key| obj.get(*key).cloned())
        .unwrap_or(Value::Null)
}

#[cfg(test)]
mod tests {
    use super::*;
    use a2abase_core::run::ErrorOrigin;
    use serde_json::json;

    #[test]
    fn test_blank_and_bookkeeping_lines_are_skipped() {
        for line in ["", "   ", "\r", ": ping", "event: message", "id: 42", "data: [DONE]", "data:"] {
            assert_eq!(decode_record(line.as_bytes()), None, "{:?}", line);
        }
    }

    #[test]
    fn test_shorthand_token_keeps_whitespace() {
        assert_eq!(decode_record(b"tok: spaced "), Some(StreamEvent::token(" spaced ")));
        assert_eq!(decode_record(b"token:a:b"), Some(StreamEvent::token("a:b")));
    }

    #[test]
    fn test_assistant_json_string_content() {
        let line = json!({
            "type": "assistant",
            "content": "{\"role\": \"assistant\", \"content\": \"Hello\"}"
        });
        let record = format!("data: {}", line);
        assert_eq!(decode_record(record.as_bytes()), Some(StreamEvent::token("Hello")));
    }

    #[test]
    fn test_status_and_error_records() {
        let event = decode_record(br#"data: {"type":"status","status":"failed","message":"boom"}"#);
        assert_eq!(
            event,
            Some(StreamEvent::Status {
                status: RunStatusUpdate::Failed,
                message: Some("boom".to_string()),
            })
        );

        let event = decode_record(br#"{"type":"error","message":"quota exceeded"}"#).unwrap();
        assert_eq!(event, StreamEvent::service_error("quota exceeded"));
        assert!(event.is_terminal());
    }

    #[test]
    fn test_tool_records() {
        let call = decode_record(
            br#"data: {"type":"tool_call","name":"sb_shell_tool","arguments":{"cmd":"ls"},"id":"c1"}"#,
        )
        .unwrap();
        assert_eq!(
            call,
            StreamEvent::ToolCall {
                name: "sb_shell_tool".to_string(),
                arguments: json!({"cmd": "ls"}),
                call_id: Some("c1".to_string()),
            }
        );

        let result = decode_record(br#"data: {"type":"tool","name":"sb_shell_tool","output":"a.txt","success":true}"#)
            .unwrap();
        assert!(matches!(
            result,
            StreamEvent::ToolResult { success: Some(true), .. }
        ));

        let bare = decode_record(b"tool_call:browser_tool").unwrap();
        assert!(matches!(bare, StreamEvent::ToolCall { ref name, .. } if name == "browser_tool"));
    }

    #[test]
    fn test_unknown_json_type_passes_through_as_status() {
        let event = decode_record(br#"data: {"type":"browser_state","message":"loaded"}"#).unwrap();
        assert_eq!(
            event,
            StreamEvent::Status {
                status: RunStatusUpdate::Other("browser_state".to_string()),
                message: Some("loaded".to_string()),
            }
        );
        assert!(!event.is_terminal());
    }

    #[test]
    fn test_malformed_json_keeps_raw_record() {
        match decode_record(b"data: {\"type\": ").unwrap() {
            StreamEvent::Error { origin, raw, .. } => {
                assert_eq!(origin, ErrorOrigin::Decode);
                assert_eq!(raw.as_deref(), Some("data: {\"type\": "));
            }
            other => panic!("Expected decode error, got {:?}", other),
        }
        assert!(matches!(
            decode_record(b"no delimiter here"),
            Some(StreamEvent::Error { origin: ErrorOrigin::Decode, .. })
        ));
    }
}
