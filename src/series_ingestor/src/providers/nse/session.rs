use async_trait::async_trait;
use indexmap::IndexMap;
use reqwest::{
    Client,
    header::{self, HeaderMap, HeaderName, HeaderValue},
};
use snafu::ResultExt;
use tracing::debug;

use crate::providers::{
    BodySnafu, ClientBuildSnafu, FetchedPayload, HandshakeSnafu, InvalidHeaderNameSnafu,
    InvalidHeaderValueSnafu, ProviderError, ProviderInitError, RequestSnafu, SessionProvider,
};

/// Session provider for the exchange website.
///
/// Every fetch first hits the base origin to collect fresh session cookies,
/// then issues the real request with those cookies attached. No cookie state
/// survives between fetches.
pub struct NseSession {
    client: Client,
    base_url: String,
}

impl NseSession {
    /// Creates a new session provider.
    ///
    /// `headers` are sent with every request (browser user agent, language).
    /// `accept-encoding` is dropped: the client negotiates compression itself
    /// and only then decodes the body transparently.
    pub fn new(
        base_url: impl Into<String>,
        headers: &IndexMap<String, String>,
    ) -> Result<Self, ProviderInitError> {
        let mut default_headers = HeaderMap::new();
        for (name, value) in headers {
            let header_name = HeaderName::from_bytes(name.trim().as_bytes())
                .context(InvalidHeaderNameSnafu { name: name.clone() })?;
            if header_name == header::ACCEPT_ENCODING {
                debug!(value = %value, "ignoring configured accept-encoding header");
                continue;
            }
            let header_value = HeaderValue::from_str(value.trim())
                .context(InvalidHeaderValueSnafu { name: name.clone() })?;
            default_headers.insert(header_name, header_value);
        }

        let client = Client::builder()
            .default_headers(default_headers)
            .build()
            .context(ClientBuildSnafu)?;

        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Joins the base URL and an endpoint path with exactly one slash.
    pub fn url_for(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

/// Collapses every `Set-Cookie` header into a single `Cookie` header value.
fn session_cookies(headers: &HeaderMap) -> Option<String> {
    let pairs: Vec<&str> = headers
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .filter_map(|c| c.split(';').next())
        .map(str::trim)
        .filter(|pair| pair.contains('='))
        .collect();

    if pairs.is_empty() {
        None
    } else {
        Some(pairs.join("; "))
    }
}

#[async_trait]
impl SessionProvider for NseSession {
    async fn try_fetch(&self, path: &str) -> Result<FetchedPayload, ProviderError> {
        let warmup = self
            .client
            .get(&self.base_url)
            .send()
            .await
            .context(HandshakeSnafu {
                url: self.base_url.clone(),
            })?;
        let cookies = session_cookies(warmup.headers());
        debug!(
            status = warmup.status().as_u16(),
            has_cookies = cookies.is_some(),
            "session warm-up done"
        );

        let url = self.url_for(path);
        let mut request = self.client.get(&url);
        if let Some(cookie) = cookies {
            request = request.header(header::COOKIE, cookie);
        }

        let response = request.send().await.context(RequestSnafu { url: url.clone() })?;
        let status = response.status().as_u16();
        let body = response.text().await.context(BodySnafu { url })?;

        Ok(FetchedPayload { status, body })
    }
}
