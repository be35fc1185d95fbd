use anyhow::Result;
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;

use crate::net::payload::{Payload, payload_text};
use crate::net::response::ApiResponse;
use crate::trace::Trace;

/// How the promotion fallback participates in a call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FallbackMode {
    /// Promote only when structured data was expected and the primary result
    /// is unusable (anonymized/empty body despite a 2xx).
    #[default]
    Auto,
    /// Always prefer the page-context call; used when callers know it is
    /// strictly more capable (e.g. fetching pre-hydration markup).
    Prefer,
    /// Never run the fallback.
    Disable,
}

#[derive(Debug, Clone)]
pub struct TransportRequest {
    pub url: String,
    pub method: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
    pub timeout: Duration,
    pub expect_json: bool,
    pub fallback: FallbackMode,
}

impl TransportRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method: "GET".to_string(),
            headers: Vec::new(),
            body: None,
            timeout: Duration::from_millis(7_000),
            expect_json: false,
            fallback: FallbackMode::Auto,
        }
    }
}

/// What a mechanism hands back before normalization.
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: u16,
    pub body: Payload,
    pub content_type: Option<String>,
    pub headers: Option<BTreeMap<String, String>>,
}

/// One request mechanism. `send` returns `Err` when the mechanism is
/// unavailable or failed outright; the chain then tries the next one.
pub trait Transport {
    fn name(&self) -> &'static str;
    fn send(&self, request: &TransportRequest) -> Result<RawResponse>;
}

/// Ordered list of request mechanisms behind one interface. Callers never
/// branch on which mechanism answered.
pub struct TransportChain {
    mechanisms: Vec<Box<dyn Transport>>,
    page_fallback: Option<Box<dyn Transport>>,
}

impl TransportChain {
    pub fn new(
        mechanisms: Vec<Box<dyn Transport>>,
        page_fallback: Option<Box<dyn Transport>>,
    ) -> Self {
        Self {
            mechanisms,
            page_fallback,
        }
    }

    pub fn empty() -> Self {
        Self {
            mechanisms: Vec::new(),
            page_fallback: None,
        }
    }

    /// Run one logical call: first mechanism that returns any response wins,
    /// after the promotion check. Total failure yields the zero response.
    pub fn send(&self, request: &TransportRequest, trace: &Trace) -> ApiResponse {
        let mut primary: Option<(&'static str, ApiResponse)> = None;
        for mechanism in &self.mechanisms {
            match mechanism.send(request) {
                Ok(raw) => {
                    primary = Some((mechanism.name(), finalize(raw, request.expect_json)));
                    break;
                }
                Err(err) => {
                    trace.debug(format!(
                        "transport {} failed url={} err={err}",
                        mechanism.name(),
                        request.url
                    ));
                }
            }
        }

        let Some((mechanism_name, result)) = primary else {
            trace.debug(format!("no transport produced a response url={}", request.url));
            return ApiResponse::zero();
        };

        let promoted = self.promote(request, result, trace);
        trace.debug(format!(
            "call done url={} transport={} status={} bytes={}",
            request.url,
            mechanism_name,
            promoted.status,
            promoted.raw.len()
        ));
        promoted
    }

    fn promote(&self, request: &TransportRequest, result: ApiResponse, trace: &Trace) -> ApiResponse {
        match request.fallback {
            FallbackMode::Disable => return result,
            FallbackMode::Prefer => {
                if let Some(fallback) = self.run_fallback(request, trace)
                    && fallback.ok
                {
                    return fallback;
                }
                return result;
            }
            FallbackMode::Auto => {}
        }

        if request.expect_json && !result.has_structured_data() {
            if let Some(fallback) = self.run_fallback(request, trace)
                && fallback.ok
                && fallback.has_payload()
            {
                trace.debug(format!(
                    "promoted to page-context fallback url={}",
                    request.url
                ));
                return fallback;
            }
        }
        result
    }

    fn run_fallback(&self, request: &TransportRequest, trace: &Trace) -> Option<ApiResponse> {
        let fallback = self.page_fallback.as_ref()?;
        match fallback.send(request) {
            Ok(raw) => Some(finalize(raw, request.expect_json)),
            Err(err) => {
                trace.debug(format!(
                    "fallback {} failed url={} err={err}",
                    fallback.name(),
                    request.url
                ));
                None
            }
        }
    }
}

fn is_json_content_type(content_type: Option<&str>) -> bool {
    content_type
        .map(|value| {
            let lowered = value.to_ascii_lowercase();
            lowered.contains("application/json") || lowered.contains("+json")
        })
        .unwrap_or(false)
}

/// Collapse a mechanism-specific payload into the uniform response shape.
fn finalize(raw: RawResponse, expect_json: bool) -> ApiResponse {
    let text = payload_text(&raw.body);
    let wants_json = expect_json || is_json_content_type(raw.content_type.as_deref());

    let data = if wants_json {
        match &raw.body {
            Payload::Json(value) if value.is_object() || value.is_array() => Some(value.clone()),
            _ => serde_json::from_str::<Value>(text.trim())
                .ok()
                .filter(|parsed| parsed.is_object() || parsed.is_array()),
        }
    } else {
        None
    };

    ApiResponse {
        ok: (200..300).contains(&raw.status),
        status: raw.status,
        data,
        raw: text,
        content_type: raw.content_type,
        headers: raw.headers,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct CannedTransport {
        name: &'static str,
        response: Result<RawResponse, String>,
        calls: Arc<AtomicUsize>,
    }

    impl CannedTransport {
        fn ok(name: &'static str, status: u16, body: Payload) -> (Self, Arc<AtomicUsize>) {
            let calls = Arc::new(AtomicUsize::new(0));
            (
                Self {
                    name,
                    response: Ok(RawResponse {
                        status,
                        body,
                        content_type: Some("application/json".to_string()),
                        headers: None,
                    }),
                    calls: calls.clone(),
                },
                calls,
            )
        }

        fn failing(name: &'static str) -> Self {
            Self {
                name,
                response: Err("unavailable".to_string()),
                calls: Arc::new(AtomicUsize::new(0)),
            }
        }
    }

    impl Transport for CannedTransport {
        fn name(&self) -> &'static str {
            self.name
        }

        fn send(&self, _request: &TransportRequest) -> Result<RawResponse> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.response {
                Ok(raw) => Ok(raw.clone()),
                Err(msg) => Err(anyhow::anyhow!(msg.clone())),
            }
        }
    }

    fn json_request() -> TransportRequest {
        let mut request = TransportRequest::get("https://chatgpt.com/backend-api/conversation/x");
        request.expect_json = true;
        request
    }

    #[test]
    fn first_usable_mechanism_wins() {
        let (first, first_calls) =
            CannedTransport::ok("first", 200, Payload::Json(json!({"title": "t"})));
        let (second, second_calls) =
            CannedTransport::ok("second", 200, Payload::Json(json!({"other": true})));
        let chain = TransportChain::new(vec![Box::new(first), Box::new(second)], None);

        let response = chain.send(&json_request(), &Trace::default());
        assert!(response.ok);
        assert_eq!(response.data.unwrap()["title"], "t");
        assert_eq!(first_calls.load(Ordering::SeqCst), 1);
        assert_eq!(second_calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn failing_mechanisms_fall_through() {
        let (usable, _) = CannedTransport::ok("third", 200, Payload::Json(json!({"ok": 1})));
        let chain = TransportChain::new(
            vec![
                Box::new(CannedTransport::failing("first")),
                Box::new(CannedTransport::failing("second")),
                Box::new(usable),
            ],
            None,
        );
        let response = chain.send(&json_request(), &Trace::default());
        assert!(response.ok);
        assert!(response.has_structured_data());
    }

    #[test]
    fn empty_json_body_promotes_to_fallback() {
        let (primary, _) = CannedTransport::ok("primary", 200, Payload::Text(String::new()));
        let (fallback, fallback_calls) =
            CannedTransport::ok("page", 200, Payload::Json(json!({"title": "from fallback"})));
        let chain = TransportChain::new(vec![Box::new(primary)], Some(Box::new(fallback)));

        let response = chain.send(&json_request(), &Trace::default());
        assert!(response.ok);
        assert_eq!(response.data.unwrap()["title"], "from fallback");
        assert_eq!(fallback_calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn usable_primary_skips_fallback() {
        let (primary, _) = CannedTransport::ok("primary", 200, Payload::Json(json!({"k": 1})));
        let (fallback, fallback_calls) =
            CannedTransport::ok("page", 200, Payload::Json(json!({"k": 2})));
        let chain = TransportChain::new(vec![Box::new(primary)], Some(Box::new(fallback)));

        let response = chain.send(&json_request(), &Trace::default());
        assert_eq!(response.data.unwrap()["k"], 1);
        assert_eq!(fallback_calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn prefer_mode_always_takes_fallback() {
        let (primary, _) = CannedTransport::ok("primary", 200, Payload::Text("shell".to_string()));
        let (fallback, _) = CannedTransport::ok("page", 200, Payload::Text("full".to_string()));
        let chain = TransportChain::new(vec![Box::new(primary)], Some(Box::new(fallback)));

        let mut request = TransportRequest::get("https://chatgpt.com/c/x");
        request.fallback = FallbackMode::Prefer;
        let response = chain.send(&request, &Trace::default());
        assert_eq!(response.raw, "full");
    }

    #[test]
    fn disable_mode_never_runs_fallback() {
        let (primary, _) = CannedTransport::ok("primary", 200, Payload::Text(String::new()));
        let (fallback, fallback_calls) =
            CannedTransport::ok("page", 200, Payload::Json(json!({"k": 2})));
        let chain = TransportChain::new(vec![Box::new(primary)], Some(Box::new(fallback)));

        let mut request = json_request();
        request.fallback = FallbackMode::Disable;
        let response = chain.send(&request, &Trace::default());
        assert!(response.data.is_none());
        assert_eq!(fallback_calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn total_failure_yields_zero_response() {
        let chain = TransportChain::new(vec![Box::new(CannedTransport::failing("only"))], None);
        let response = chain.send(&json_request(), &Trace::default());
        assert!(!response.ok);
        assert_eq!(response.status, 0);
        assert!(response.data.is_none());
    }

    #[test]
    fn non_json_content_is_left_as_raw() {
        let raw = RawResponse {
            status: 200,
            body: Payload::Text("<html></html>".to_string()),
            content_type: Some("text/html".to_string()),
            headers: None,
        };
        let response = finalize(raw, false);
        assert!(response.ok);
        assert!(response.data.is_none());
        assert_eq!(response.raw, "<html></html>");
    }
}
