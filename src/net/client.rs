use std::time::Duration;

use crate::config::CiteConfig;
use crate::net::response::ApiResponse;
use crate::net::transport::{FallbackMode, TransportChain, TransportRequest};
use crate::page::PageContext;
use crate::trace::Trace;

/// Options for one logical call. URLs may be relative to the page location;
/// a missing timeout takes the configured default.
#[derive(Debug, Clone)]
pub struct CallOptions {
    pub url: String,
    pub method: &'static str,
    pub headers: Vec<(&'static str, String)>,
    pub body: Option<String>,
    pub timeout_ms: Option<u64>,
    pub expect_json: bool,
    pub fallback: FallbackMode,
}

impl CallOptions {
    pub fn json(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method: "GET",
            headers: vec![("Accept", "application/json".to_string())],
            body: None,
            timeout_ms: None,
            expect_json: true,
            fallback: FallbackMode::Auto,
        }
    }

    pub fn html(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method: "GET",
            headers: vec![("Accept", "text/html,application/xhtml+xml".to_string())],
            body: None,
            timeout_ms: None,
            expect_json: false,
            fallback: FallbackMode::Auto,
        }
    }

    pub fn bearer(mut self, token: &str) -> Self {
        self.headers
            .push(("Authorization", format!("Bearer {token}")));
        self
    }

    pub fn timeout_ms(mut self, ms: u64) -> Self {
        self.timeout_ms = Some(ms);
        self
    }

    pub fn fallback(mut self, mode: FallbackMode) -> Self {
        self.fallback = mode;
        self
    }
}

/// Builds one logical call on top of the transport chain: URL resolution,
/// same-origin auth-context header injection, default timeout. Callers never
/// need a separate failure branch; total failure is the zero response.
pub struct ApiClient<'a> {
    page: &'a PageContext,
    chain: TransportChain,
    cfg: &'a CiteConfig,
    trace: &'a Trace,
}

impl<'a> ApiClient<'a> {
    pub fn new(
        page: &'a PageContext,
        chain: TransportChain,
        cfg: &'a CiteConfig,
        trace: &'a Trace,
    ) -> Self {
        Self {
            page,
            chain,
            cfg,
            trace,
        }
    }

    pub fn page(&self) -> &PageContext {
        self.page
    }

    pub fn config(&self) -> &CiteConfig {
        self.cfg
    }

    pub fn trace(&self) -> &Trace {
        self.trace
    }

    pub fn call(&self, options: CallOptions) -> ApiResponse {
        let url = self.page.resolve(&options.url);

        let mut headers: Vec<(String, String)> = options
            .headers
            .into_iter()
            .map(|(name, value)| (name.to_string(), value))
            .collect();
        self.apply_context_headers(&url, &mut headers);

        let request = TransportRequest {
            url: url.clone(),
            method: options.method.to_string(),
            headers,
            body: options.body,
            timeout: Duration::from_millis(
                options.timeout_ms.unwrap_or(self.cfg.timeouts.request_ms),
            ),
            expect_json: options.expect_json,
            fallback: options.fallback,
        };

        self.trace
            .debug(format!("call {} {}", request.method, request.url));
        self.chain.send(&request, self.trace)
    }

    /// Same-origin workspace/device headers pulled from the page's own cookie
    /// jar; never fabricated, and never overwriting a caller-set header.
    fn apply_context_headers(&self, url: &str, headers: &mut Vec<(String, String)>) {
        let lowered = url.to_ascii_lowercase();
        if !lowered.contains("chatgpt.com") && !lowered.contains("chat.openai.com") {
            return;
        }

        let mut ensure = |name: &str, value: Option<String>| {
            let Some(value) = value else {
                return;
            };
            let exists = headers
                .iter()
                .any(|(existing, _)| existing.eq_ignore_ascii_case(name));
            if !exists {
                headers.push((name.to_string(), value));
            }
        };

        ensure("chatgpt-account-id", self.page.cookie_value("_account"));
        ensure("oai-device-id", self.page.cookie_value("oai-did"));
        ensure("oai-language", self.page.language.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::payload::Payload;
    use crate::net::transport::{RawResponse, Transport};
    use anyhow::Result;
    use std::sync::Mutex;

    struct RecordingTransport {
        seen: &'static Mutex<Vec<TransportRequest>>,
    }

    static SEEN: Mutex<Vec<TransportRequest>> = Mutex::new(Vec::new());

    impl Transport for RecordingTransport {
        fn name(&self) -> &'static str {
            "recording"
        }

        fn send(&self, request: &TransportRequest) -> Result<RawResponse> {
            self.seen.lock().unwrap().push(request.clone());
            Ok(RawResponse {
                status: 200,
                body: Payload::Json(serde_json::json!({"ok": true})),
                content_type: Some("application/json".to_string()),
                headers: None,
            })
        }
    }

    #[test]
    fn relative_urls_resolve_and_context_headers_apply() {
        let mut page =
            PageContext::new("https://chatgpt.com/c/0190aaaa-bbbb-cccc-dddd-eeeeffff0000");
        page.cookie = Some("_account=acct-1; oai-did=dev-9".to_string());
        page.language = Some("en-US".to_string());
        let cfg = CiteConfig::default();
        let trace = Trace::default();
        let chain = TransportChain::new(vec![Box::new(RecordingTransport { seen: &SEEN })], None);
        let client = ApiClient::new(&page, chain, &cfg, &trace);

        let response = client.call(CallOptions::json("/api/auth/session"));
        assert!(response.ok);

        let seen = SEEN.lock().unwrap();
        let request = seen.last().unwrap();
        assert_eq!(request.url, "https://chatgpt.com/api/auth/session");
        assert_eq!(request.timeout, Duration::from_millis(7_000));
        let header = |name: &str| {
            request
                .headers
                .iter()
                .find(|(key, _)| key.eq_ignore_ascii_case(name))
                .map(|(_, value)| value.clone())
        };
        assert_eq!(header("chatgpt-account-id").as_deref(), Some("acct-1"));
        assert_eq!(header("oai-device-id").as_deref(), Some("dev-9"));
        assert_eq!(header("oai-language").as_deref(), Some("en-US"));
    }
}
