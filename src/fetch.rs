use crate::{FetchError, ScrapeError};
use reqwest::{
    header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE},
    Client, Url,
};
use serde_json::Value;
use std::{borrow::Cow, collections::BTreeMap};
use tracing::debug;

pub type Headers = BTreeMap<String, String>;

/// Browser-like headers sent with every scrape request.
pub const DEFAULT_HEADERS: &[(&str, &str)] = &[
    (
        "User-Agent",
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/122.0.0.0 Safari/537.36",
    ),
    (
        "Accept",
        "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8",
    ),
    ("Accept-Language", "en-US,en;q=0.5"),
    ("Connection", "keep-alive"),
    ("Upgrade-Insecure-Requests", "1"),
    ("Sec-Fetch-Dest", "document"),
    ("Sec-Fetch-Mode", "navigate"),
    ("Sec-Fetch-Site", "none"),
    ("Sec-Fetch-User", "?1"),
    ("Cache-Control", "max-age=0"),
];

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Fetched {
    pub body: Vec<u8>,
    pub content_type: String,
}

impl Fetched {
    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }
}

#[async_trait::async_trait]
pub trait Fetch {
    async fn fetch(&self, url: &str, headers: &Headers) -> Result<Fetched, FetchError>;
}

#[derive(Debug, Clone, Default)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_client(client: Client) -> Self {
        HttpFetcher { client }
    }
}

#[async_trait::async_trait]
impl Fetch for HttpFetcher {
    async fn fetch(&self, url: &str, headers: &Headers) -> Result<Fetched, FetchError> {
        let parsed = parse_url(url)?;

        let request = self.client.get(parsed).headers(header_map(headers)?);

        debug!("Visit {}", url);
        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        let body = response.bytes().await?.to_vec();

        Ok(Fetched { body, content_type })
    }
}

pub fn parse_url(url: &str) -> Result<Url, FetchError> {
    Url::parse(url).map_err(|e| FetchError::InvalidUrl {
        url: url.to_string(),
        reason: e.to_string(),
    })
}

/// Header names are case-insensitive: of two entries naming the same header
/// only the later one is kept.
pub fn header_map(headers: &Headers) -> Result<HeaderMap, FetchError> {
    let mut map = HeaderMap::new();
    for (name, value) in headers {
        let invalid = |reason: String| FetchError::InvalidHeader {
            name: name.clone(),
            reason,
        };
        let header_name =
            HeaderName::from_bytes(name.as_bytes()).map_err(|e| invalid(e.to_string()))?;
        let header_value = HeaderValue::from_str(value).map_err(|e| invalid(e.to_string()))?;
        map.insert(header_name, header_value);
    }
    Ok(map)
}

/// Custom headers are given on the command line as a JSON object. Numbers and
/// booleans are sent as their text, `null` entries are skipped.
pub fn parse_headers(raw: &str) -> Result<Headers, ScrapeError> {
    let Value::Object(map) = serde_json::from_str::<Value>(raw)? else {
        return Err(ScrapeError::Usage(
            "Custom headers must be a JSON object".to_string(),
        ));
    };

    let mut headers = Headers::new();
    for (name, value) in map {
        let value = match value {
            Value::Null => continue,
            Value::String(s) => s,
            Value::Number(n) => n.to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Array(_) | Value::Object(_) => {
                return Err(ScrapeError::Usage(format!(
                    "Header {:?} must be a string, number or boolean",
                    name
                )))
            }
        };
        set_header(&mut headers, &name, value);
    }
    Ok(headers)
}

/// Inserts `name`, replacing any entry that differs only in letter case.
fn set_header(headers: &mut Headers, name: &str, value: String) {
    headers.retain(|existing, _| !existing.eq_ignore_ascii_case(name));
    headers.insert(name.to_string(), value);
}

/// Default browser headers, overridden by `custom`, plus a `Referer` pointing
/// at the origin of `url`.
pub fn scrape_headers(url: &str, custom: &Headers) -> Result<Headers, FetchError> {
    let origin = parse_url(url)?.origin().ascii_serialization();

    let mut headers: Headers = DEFAULT_HEADERS
        .iter()
        .map(|(name, value)| (name.to_string(), value.to_string()))
        .collect();
    for (name, value) in custom {
        set_header(&mut headers, name, value.clone());
    }
    set_header(&mut headers, "Referer", origin);

    Ok(headers)
}
