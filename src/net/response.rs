use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Uniform result of one logical HTTP call, independent of which transport
/// mechanism answered. `ok` is purely the status class; `data` carries parsed
/// structured content only when it was expected and parsing produced an
/// object or array, while `raw` always holds the normalized body text.
#[derive(Debug, Clone, Default)]
pub struct ApiResponse {
    pub ok: bool,
    pub status: u16,
    pub data: Option<Value>,
    pub raw: String,
    pub content_type: Option<String>,
    pub headers: Option<BTreeMap<String, String>>,
}

impl ApiResponse {
    /// The sentinel for "no mechanism produced a response". Reportable, not a
    /// crash; callers fall through to the next cascade source.
    pub fn zero() -> Self {
        Self::default()
    }

    pub fn data_object(&self) -> Option<&Map<String, Value>> {
        self.data.as_ref().and_then(Value::as_object)
    }

    pub fn has_structured_data(&self) -> bool {
        matches!(&self.data, Some(Value::Object(_)) | Some(Value::Array(_)))
    }

    pub fn has_payload(&self) -> bool {
        !self.raw.is_empty() || self.data.is_some()
    }

    pub fn is_auth_failure(&self) -> bool {
        self.status == 401 || self.status == 403
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn zero_response_is_inert() {
        let zero = ApiResponse::zero();
        assert!(!zero.ok);
        assert_eq!(zero.status, 0);
        assert!(!zero.has_payload());
        assert!(!zero.has_structured_data());
    }

    #[test]
    fn structured_data_requires_object_or_array() {
        let mut response = ApiResponse::zero();
        response.data = Some(json!("scalar"));
        assert!(!response.has_structured_data());
        response.data = Some(json!({"k": 1}));
        assert!(response.has_structured_data());
    }
}
