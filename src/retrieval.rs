use std::time::Duration;

use base64::Engine;
use reqwest::{header, Client};
use serde::Deserialize;

use crate::{
    page::{HttpClient, HttpResponse, Page},
    types::{Category, ScrapeError},
};

pub const DEFAULT_MIN_PAYLOAD_BYTES: usize = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Direct request carrying the browser session's cookies.
    SessionRequest,
    /// `fetch` run inside the page with the page's own credentials.
    InPageFetch,
}

impl Strategy {
    pub fn name(&self) -> &'static str {
        match self {
            Strategy::SessionRequest => "session-request",
            Strategy::InPageFetch => "in-page-fetch",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Payload {
    pub bytes: Vec<u8>,
    pub content_type: Option<String>,
    pub strategy: Strategy,
}

/// Accepts a response only when it is a 200 of the expected media class and
/// big enough not to be a placeholder.
pub fn validate(
    resp: &HttpResponse,
    category: Category,
    min_bytes: usize,
) -> Result<(), ScrapeError> {
    if resp.status != 200 {
        return Err(ScrapeError::InvalidPayload(format!("status {}", resp.status)));
    }
    let content_type = resp
        .content_type
        .as_deref()
        .map(|c| c.trim().to_ascii_lowercase())
        .unwrap_or_default();
    let class_ok = content_type.starts_with(category.media_class())
        || (category == Category::Video && content_type.starts_with("application/octet-stream"));
    if !class_ok {
        return Err(ScrapeError::InvalidPayload(format!(
            "content-type {:?} is not {}*",
            content_type,
            category.media_class()
        )));
    }
    if resp.body.len() < min_bytes {
        return Err(ScrapeError::InvalidPayload(format!(
            "{} bytes, expected at least {}",
            resp.body.len(),
            min_bytes
        )));
    }
    Ok(())
}

fn in_page_fetch_script(url: &str) -> String {
    let url = serde_json::Value::String(url.to_string()).to_string();
    format!(
        r#"(async () => {{
    try {{
        const res = await fetch({}, {{ credentials: 'include' }});
        const blob = await res.blob();
        const buf = new Uint8Array(await blob.arrayBuffer());
        let bin = '';
        for (let i = 0; i < buf.length; i += 0x8000) {{
            bin += String.fromCharCode.apply(null, buf.subarray(i, i + 0x8000));
        }}
        return JSON.stringify({{
            status: res.status,
            contentType: res.headers.get('content-type') || blob.type,
            body: btoa(bin),
        }});
    }} catch (e) {{
        return JSON.stringify({{ error: String(e) }});
    }}
}})()"#,
        url
    )
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct InPageResult {
    status: Option<u16>,
    content_type: Option<String>,
    body: Option<String>,
    error: Option<String>,
}

fn cookie_header<P: Page>(page: &P) -> Option<String> {
    match page.cookies() {
        Ok(cookies) if !cookies.is_empty() => Some(
            cookies
                .iter()
                .map(|(k, v)| format!("{}={}", k, v))
                .collect::<Vec<String>>()
                .join("; "),
        ),
        _ => None,
    }
}

pub struct RetrievalChain<H: HttpClient> {
    http: H,
    strategies: Vec<Strategy>,
    min_bytes: usize,
    target: String,
}

impl<H: HttpClient> RetrievalChain<H> {
    pub fn new(http: H, min_bytes: usize, target: &str) -> Self {
        RetrievalChain {
            http,
            strategies: vec![Strategy::SessionRequest, Strategy::InPageFetch],
            min_bytes,
            target: target.into(),
        }
    }

    pub fn http(&self) -> &H {
        &self.http
    }

    async fn session_request<P: Page>(
        &self,
        page: &P,
        url: &str,
    ) -> Result<HttpResponse, ScrapeError> {
        let cookies = cookie_header(page);
        self.http
            .get(url, cookies.as_deref())
            .await
            .map_err(ScrapeError::Transport)
    }

    fn in_page_fetch<P: Page>(&self, page: &P, url: &str) -> Result<HttpResponse, ScrapeError> {
        let value = page.evaluate(&in_page_fetch_script(url))?;
        let raw = value
            .as_str()
            .ok_or_else(|| ScrapeError::Transport("in-page fetch returned nothing".into()))?;
        let res: InPageResult = serde_json::from_str(raw)
            .map_err(|e| ScrapeError::Transport(format!("in-page fetch result: {}", e)))?;
        if let Some(e) = res.error {
            return Err(ScrapeError::Transport(e));
        }
        let body = match res.body {
            Some(b) => base64::engine::general_purpose::STANDARD
                .decode(b)
                .map_err(|e| ScrapeError::Transport(format!("in-page fetch body: {}", e)))?,
            None => vec![],
        };
        Ok(HttpResponse {
            status: res.status.unwrap_or(0),
            content_type: res.content_type,
            body,
        })
    }

    /// Tries each strategy in order and returns the first valid payload.
    pub async fn retrieve<P: Page>(
        &self,
        page: &P,
        media_url: &str,
        category: Category,
    ) -> Result<Payload, ScrapeError> {
        let mut last_err = None;
        for strategy in &self.strategies {
            let res = match strategy {
                Strategy::SessionRequest => self.session_request(page, media_url).await,
                Strategy::InPageFetch => self.in_page_fetch(page, media_url),
            };
            let checked = res.and_then(|r| validate(&r, category, self.min_bytes).map(|_| r));
            match checked {
                Ok(r) => {
                    debug!(
                        target: self.target.as_str(),
                        "{} retrieved {} ({} bytes)",
                        strategy.name(),
                        media_url,
                        r.body.len()
                    );
                    return Ok(Payload {
                        bytes: r.body,
                        content_type: r.content_type,
                        strategy: *strategy,
                    });
                }
                Err(e) => {
                    warn!(
                        target: self.target.as_str(),
                        "{} failed for {}: {}",
                        strategy.name(),
                        media_url,
                        e
                    );
                    last_err = Some(e);
                }
            }
        }
        Err(last_err.unwrap_or_else(|| ScrapeError::InvalidPayload("no strategy configured".into())))
    }
}

/// The primary strategy's client: a plain reqwest client that presents the
/// browser's cookies and user agent.
pub struct SessionClient {
    client: Client,
    referer: String,
}

impl SessionClient {
    pub fn new(user_agent: &str, referer: &str, timeout: Duration) -> Result<Self, ScrapeError> {
        let client = Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .build()
            .map_err(|e| ScrapeError::Transport(e.to_string()))?;
        Ok(SessionClient {
            client,
            referer: referer.into(),
        })
    }
}

impl HttpClient for SessionClient {
    async fn get(&self, url: &str, cookie_header: Option<&str>) -> Result<HttpResponse, String> {
        let mut req = self.client.get(url).header(header::REFERER, &self.referer);
        if let Some(c) = cookie_header {
            req = req.header(header::COOKIE, c);
        }
        let res = req.send().await.map_err(|e| e.to_string())?;
        let status = res.status().as_u16();
        let content_type = res
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.to_string());
        let body = res.bytes().await.map_err(|e| e.to_string())?.to_vec();
        Ok(HttpResponse {
            status,
            content_type,
            body,
        })
    }
}
