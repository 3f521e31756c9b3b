use serde_json::{Value, json};

/// Renders a `RECORD` input line.
pub fn record_line(namespace: &str, stream: &str, data: Value, emitted_at: i64) -> String {
    json!({
        "type": "RECORD",
        "record": {
            "namespace": namespace,
            "stream": stream,
            "data": data,
            "emitted_at": emitted_at,
        }
    })
    .to_string()
}

/// Renders a `STATE` input line carrying `state` as its payload.
pub fn state_line(state: Value) -> String {
    json!({"type": "STATE", "state": state}).to_string()
}
