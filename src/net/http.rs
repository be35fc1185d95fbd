use anyhow::{Context, Result};
use reqwest::blocking::Client;
use reqwest::header::CONTENT_TYPE;
use std::collections::BTreeMap;

use crate::config::CiteConfig;
use crate::net::payload::Payload;
use crate::net::transport::{RawResponse, Transport, TransportChain, TransportRequest};
use crate::page::PageContext;

/// Carries the page's session cookies; the mechanism most likely to be
/// treated as the signed-in user.
struct SessionTransport {
    client: Client,
    cookie: Option<String>,
}

/// Plain client without any credential passthrough.
struct DirectTransport {
    client: Client,
}

/// Same-origin call bound to the page's own credential context: cookies plus
/// `Origin`/`Referer` so the backend sees an in-page request.
struct PageFetchTransport {
    client: Client,
    cookie: Option<String>,
    origin: Option<String>,
    referer: String,
}

fn run_request(
    client: &Client,
    request: &TransportRequest,
    extra_headers: &[(String, String)],
) -> Result<RawResponse> {
    let method = reqwest::Method::from_bytes(request.method.as_bytes())
        .with_context(|| format!("invalid method {}", request.method))?;
    let mut builder = client
        .request(method, &request.url)
        .timeout(request.timeout);
    for (name, value) in request.headers.iter().chain(extra_headers) {
        builder = builder.header(name.as_str(), value.as_str());
    }
    if let Some(body) = &request.body {
        builder = builder.body(body.clone());
    }

    let response = builder
        .send()
        .with_context(|| format!("request failed: {}", request.url))?;

    let status = response.status().as_u16();
    let content_type = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(ToOwned::to_owned);
    let mut headers = BTreeMap::new();
    for (name, value) in response.headers() {
        if let Ok(text) = value.to_str() {
            headers.insert(name.as_str().to_ascii_lowercase(), text.to_string());
        }
    }
    let bytes = response.bytes().context("failed to read response body")?;

    Ok(RawResponse {
        status,
        body: Payload::Bytes(bytes.to_vec()),
        content_type,
        headers: Some(headers),
    })
}

impl Transport for SessionTransport {
    fn name(&self) -> &'static str {
        "session"
    }

    fn send(&self, request: &TransportRequest) -> Result<RawResponse> {
        let mut extra = Vec::new();
        if let Some(cookie) = &self.cookie {
            extra.push(("Cookie".to_string(), cookie.clone()));
        }
        run_request(&self.client, request, &extra)
    }
}

impl Transport for DirectTransport {
    fn name(&self) -> &'static str {
        "direct"
    }

    fn send(&self, request: &TransportRequest) -> Result<RawResponse> {
        run_request(&self.client, request, &[])
    }
}

impl Transport for PageFetchTransport {
    fn name(&self) -> &'static str {
        "page-fetch"
    }

    fn send(&self, request: &TransportRequest) -> Result<RawResponse> {
        let mut extra = Vec::new();
        if let Some(cookie) = &self.cookie {
            extra.push(("Cookie".to_string(), cookie.clone()));
        }
        if let Some(origin) = &self.origin {
            extra.push(("Origin".to_string(), origin.clone()));
        }
        extra.push(("Referer".to_string(), self.referer.clone()));
        run_request(&self.client, request, &extra)
    }
}

fn build_client(with_cookie_store: bool) -> Result<Client> {
    Client::builder()
        .cookie_store(with_cookie_store)
        .build()
        .context("failed to build http client")
}

/// Assemble the mechanism list for a page. Priority reflects which mechanism
/// most reliably carries session credentials; mechanisms that fail to build
/// are simply absent, matching an environment where a primitive is
/// unavailable. Offline mode yields an empty chain, so every call resolves
/// to the zero response and the cascade falls through to DOM and defaults.
pub fn build_chain(page: &PageContext, cfg: &CiteConfig) -> TransportChain {
    if cfg.offline {
        return TransportChain::empty();
    }

    let mut mechanisms: Vec<Box<dyn Transport>> = Vec::new();
    if let Ok(client) = build_client(true) {
        mechanisms.push(Box::new(SessionTransport {
            client,
            cookie: page.cookie.clone(),
        }));
    }
    if let Ok(client) = build_client(false) {
        mechanisms.push(Box::new(DirectTransport { client }));
    }

    let page_fallback: Option<Box<dyn Transport>> = build_client(true).ok().map(|client| {
        Box::new(PageFetchTransport {
            client,
            cookie: page.cookie.clone(),
            origin: page.origin(),
            referer: page.url.clone(),
        }) as Box<dyn Transport>
    });

    TransportChain::new(mechanisms, page_fallback)
}
