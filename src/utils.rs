use reqwest::Url;
use sha2::{Digest, Sha256};

pub const DEFAULT_OUTPUT_DIR: &str = "./descargas";
pub const DEFAULT_BASE_URL: &str = "https://www.facebook.com";

lazy_static! {
    pub static ref BASE_URL: String = match std::env::var("FEEDGRAB_BASE_URL") {
        Ok(u) if !u.trim().is_empty() => u.trim_end_matches('/').to_string(),
        _ => DEFAULT_BASE_URL.into(),
    };
    pub static ref USER_AGENT: String = match std::env::var("FEEDGRAB_USER_AGENT") {
        Ok(ua) if !ua.trim().is_empty() => ua,
        _ => "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
              (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36"
            .into(),
    };
}

pub fn normalize_url(base_url: &str, url: &str) -> Option<String> {
    let url = url.trim();
    if url.is_empty() {
        return None;
    }
    if let Some(rest) = url.strip_prefix("//") {
        return normalize_url(base_url, &format!("https://{}", rest));
    }
    let mut parsed = match Url::parse(url) {
        Ok(u) => u,
        Err(_) if url.starts_with('/') => {
            Url::parse(&format!("{}{}", base_url.trim_end_matches('/'), url)).ok()?
        }
        Err(_) => return None,
    };
    // we remove the fragments (#)
    parsed.set_fragment(None);
    Some(parsed.to_string())
}

/// Turns a protocol-relative media url into an https one. Anything that is
/// neither absolute http(s) nor protocol-relative is rejected.
pub fn to_https(src: &str) -> Option<String> {
    let src = src.trim();
    if let Some(rest) = src.strip_prefix("//") {
        return Some(format!("https://{}", rest));
    }
    if src.starts_with("http://") || src.starts_with("https://") {
        return Some(src.to_string());
    }
    None
}

/// Registrable domain of the base url, `www.` stripped.
pub fn target_domain(base_url: &str) -> Option<String> {
    let u = Url::parse(base_url).ok()?;
    let host = u.host_str()?;
    Some(host.strip_prefix("www.").unwrap_or(host).to_string())
}

pub fn is_target_domain(url: &str, domain: &str) -> bool {
    match Url::parse(url) {
        Ok(u) => match u.host_str() {
            Some(host) => host == domain || host.ends_with(&format!(".{}", domain)),
            None => false,
        },
        Err(_) => false,
    }
}

/// Replaces anything outside `[word, -, _, ., space]` with `_`.
pub fn sanitize_filename(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_alphanumeric() || matches!(c, '_' | '-' | '.' | ' ') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// First 8 hex chars of the sha256 of `input`.
pub fn short_hash(input: &str) -> String {
    let digest = Sha256::digest(input.as_bytes());
    digest[..4].iter().map(|b| format!("{:02x}", b)).collect()
}

pub fn profile_url(base_url: &str, profile: &str) -> String {
    format!("{}/{}", base_url.trim_end_matches('/'), profile)
}
