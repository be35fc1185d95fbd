use serde_json::Value;

/// Raw body shapes the transport mechanisms may hand back. Everything funnels
/// through [`payload_text`] so downstream code always sees a string.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Empty,
    Text(String),
    Bytes(Vec<u8>),
    Json(Value),
}

/// Normalize any payload shape to text. Total: unknown shapes degrade to an
/// empty string rather than an error.
pub fn payload_text(payload: &Payload) -> String {
    match payload {
        Payload::Empty => String::new(),
        Payload::Text(text) => text.clone(),
        Payload::Bytes(bytes) => decode_bytes(bytes),
        Payload::Json(value) => value_text(value),
    }
}

fn decode_bytes(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(text) => text.to_string(),
        // Invalid UTF-8 still decodes byte-by-byte so diagnostics keep
        // something inspectable instead of dropping the body.
        Err(_) => bytes.iter().map(|&b| b as char).collect(),
    }
}

/// Extract text from a structured carrier: scalars stringify, known
/// body-holding fields are searched one level deep, and anything else
/// serializes whole unless that yields an empty `{}`/`[]`.
pub fn value_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(text) => text.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Object(map) => {
            for key in ["text", "body", "message", "error", "raw"] {
                match map.get(key) {
                    Some(Value::String(text)) if !text.is_empty() => return text.clone(),
                    Some(Value::Object(inner)) if key == "body" => {
                        if let Some(data) = inner.get("data") {
                            let nested = value_text(data);
                            if !nested.is_empty() {
                                return nested;
                            }
                        }
                    }
                    _ => {}
                }
            }
            if let Some(Value::Array(items)) = map.get("body").and_then(|b| b.get("data")) {
                let joined = items
                    .iter()
                    .map(value_text)
                    .collect::<Vec<_>>()
                    .join("\n");
                if !joined.is_empty() {
                    return joined;
                }
            }
            serialize_unless_empty(value)
        }
        Value::Array(_) => serialize_unless_empty(value),
    }
}

fn serialize_unless_empty(value: &Value) -> String {
    match serde_json::to_string(value) {
        Ok(text) if text != "{}" && text != "[]" => text,
        _ => String::new(),
    }
}
