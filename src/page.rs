//! The browser and HTTP surface the engine talks to.
//!
//! Everything the crawler does against the live page goes through [`Page`];
//! the authenticated CDN request goes through [`HttpClient`]. Both are
//! implemented for real in `browser_controller` and `retrieval`, and by
//! in-memory fakes in tests.

use std::{collections::HashMap, time::Duration};

use crate::types::BrowserError;

/// Snapshot of a DOM element taken at query time.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Element {
    pub attributes: HashMap<String, String>,
    pub inner_text: String,
    pub visible: bool,
}

impl Element {
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(|v| v.as_str())
    }

    /// Builds an element from headless_chrome's flat `[name, value, name, value..]` list.
    pub fn from_attribute_list(list: &[String], inner_text: String, visible: bool) -> Self {
        let attributes = list
            .chunks(2)
            .filter_map(|pair| match pair {
                [k, v] => Some((k.clone(), v.clone())),
                _ => None,
            })
            .collect();
        Element {
            attributes,
            inner_text,
            visible,
        }
    }
}

pub trait Page {
    fn navigate(&self, url: &str, timeout: Duration) -> Result<(), BrowserError>;

    fn current_url(&self) -> String;

    /// Evaluates `script`, awaiting it if it is a promise.
    fn evaluate(&self, script: &str) -> Result<serde_json::Value, BrowserError>;

    fn query_selector(&self, selector: &str) -> Result<Option<Element>, BrowserError>;

    fn query_selector_all(&self, selector: &str) -> Result<Vec<Element>, BrowserError>;

    /// First match of `selector` inside any (same-origin) iframe document.
    fn query_selector_in_frames(&self, selector: &str) -> Result<Option<Element>, BrowserError>;

    /// Clicks the first match of `selector`; `false` when nothing matched.
    fn click(&self, selector: &str) -> Result<bool, BrowserError>;

    fn press_key(&self, key: &str) -> Result<(), BrowserError>;

    fn cookies(&self) -> Result<Vec<(String, String)>, BrowserError>;
}

#[derive(Debug, Clone, Default)]
pub struct HttpResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

#[allow(async_fn_in_trait)]
pub trait HttpClient {
    async fn get(&self, url: &str, cookie_header: Option<&str>) -> Result<HttpResponse, String>;
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn element_from_attribute_list() {
        let list = vec![
            "src".to_string(),
            "https://scontent.x/a.jpg".to_string(),
            "class".to_string(),
            "photo big".to_string(),
            "dangling".to_string(),
        ];
        let el = Element::from_attribute_list(&list, "hi".into(), true);
        assert_eq!(el.attribute("src"), Some("https://scontent.x/a.jpg"));
        assert_eq!(el.attribute("class"), Some("photo big"));
        assert_eq!(el.attribute("dangling"), None);
        assert_eq!(el.inner_text, "hi");
    }
}
