use percent_encoding::percent_decode_str;
use reqwest::Url;

/// Everything the capture pipeline may read from the page environment:
/// location, cookie jar, saved markup, and UI language. Passed explicitly so
/// the core never reaches for ambient globals and stays testable without a
/// browser.
#[derive(Debug, Clone, Default)]
pub struct PageContext {
    pub url: String,
    pub cookie: Option<String>,
    pub markup: Option<String>,
    pub language: Option<String>,
}

impl PageContext {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    pub fn markup(&self) -> Option<&str> {
        self.markup.as_deref()
    }

    pub fn parsed_url(&self) -> Option<Url> {
        Url::parse(&self.url).ok()
    }

    pub fn origin(&self) -> Option<String> {
        let parsed = self.parsed_url()?;
        let host = parsed.host_str()?;
        let mut origin = format!("{}://{}", parsed.scheme(), host);
        if let Some(port) = parsed.port() {
            origin.push(':');
            origin.push_str(&port.to_string());
        }
        Some(origin)
    }

    pub fn host(&self) -> Option<String> {
        self.parsed_url()
            .and_then(|u| u.host_str().map(|h| h.to_ascii_lowercase()))
    }

    /// Canonical host for share URLs; the legacy host keeps its identity so
    /// saved links resolve in the same workspace they came from.
    pub fn default_share_host(&self) -> &'static str {
        match self.host() {
            Some(host) if host.contains("chat.openai.com") => "https://chat.openai.com",
            _ => "https://chatgpt.com",
        }
    }

    /// Resolve a possibly-relative path against the page location.
    pub fn resolve(&self, target: &str) -> String {
        if let Some(base) = self.parsed_url()
            && let Ok(joined) = base.join(target)
        {
            return joined.to_string();
        }
        target.to_string()
    }

    /// Look up one cookie by name in the serialized cookie string.
    pub fn cookie_value(&self, name: &str) -> Option<String> {
        let jar = self.cookie.as_deref()?;
        if name.is_empty() {
            return None;
        }
        for pair in jar.split(';') {
            let trimmed = pair.trim();
            let Some((key, value)) = trimmed.split_once('=') else {
                continue;
            };
            if key.trim() != name {
                continue;
            }
            let decoded = percent_decode_str(value).decode_utf8();
            return Some(match decoded {
                Ok(text) => text.into_owned(),
                Err(_) => value.to_string(),
            });
        }
        None
    }
}
