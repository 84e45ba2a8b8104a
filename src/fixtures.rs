//! In-memory stand-ins for the browser page and the HTTP client.

use std::{
    cell::RefCell,
    collections::{HashMap, VecDeque},
    time::Duration,
};

use serde_json::{json, Value};

use crate::{
    page::{Element, HttpClient, HttpResponse, Page},
    pager::{DOCUMENT_HEIGHT_SCRIPT, SCROLL_TO_BOTTOM_SCRIPT},
    types::BrowserError,
};

pub const FEED_BATCH_HEIGHT: i64 = 1000;

#[derive(Default, Clone)]
pub struct FakeDoc {
    pub fixed: HashMap<String, Vec<Element>>,
    /// Content revealed one batch per scroll-to-bottom.
    pub batches: Vec<HashMap<String, Vec<Element>>>,
    pub ancestor_batches: Vec<Vec<String>>,
    pub frames: HashMap<String, Element>,
    pub fixed_height: Option<i64>,
    pub clicks: HashMap<String, String>,
}

impl FakeDoc {
    pub fn with(mut self, selector: &str, el: Element) -> Self {
        self.fixed.entry(selector.to_string()).or_default().push(el);
        self
    }

    pub fn with_batch(mut self, entries: Vec<(&str, Element)>) -> Self {
        let mut batch: HashMap<String, Vec<Element>> = HashMap::new();
        for (sel, el) in entries {
            batch.entry(sel.to_string()).or_default().push(el);
        }
        self.batches.push(batch);
        self
    }

    pub fn with_frame(mut self, selector: &str, el: Element) -> Self {
        self.frames.insert(selector.to_string(), el);
        self
    }

    pub fn with_click(mut self, selector: &str, target_url: &str) -> Self {
        self.clicks
            .insert(selector.to_string(), target_url.to_string());
        self
    }

    pub fn height(mut self, h: i64) -> Self {
        self.fixed_height = Some(h);
        self
    }
}

pub fn el(attrs: &[(&str, &str)]) -> Element {
    Element {
        attributes: attrs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect(),
        inner_text: String::new(),
        visible: true,
    }
}

pub fn text_el(text: &str) -> Element {
    Element {
        inner_text: text.to_string(),
        visible: true,
        ..Element::default()
    }
}

pub fn anchor(href: &str) -> Element {
    el(&[("href", href)])
}

#[derive(Default)]
struct State {
    docs: HashMap<String, FakeDoc>,
    current: String,
    scrolls: usize,
    nav_errors: HashMap<String, VecDeque<BrowserError>>,
    navigations: Vec<String>,
    keys: Vec<String>,
    in_page: HashMap<String, Value>,
    in_page_calls: Vec<String>,
}

#[derive(Default)]
pub struct FakePage {
    state: RefCell<State>,
}

impl FakePage {
    pub fn new() -> Self {
        FakePage::default()
    }

    pub fn doc(self, url: &str, doc: FakeDoc) -> Self {
        self.state.borrow_mut().docs.insert(url.to_string(), doc);
        self
    }

    pub fn fail_navigation(self, url: &str, errors: Vec<BrowserError>) -> Self {
        self.state
            .borrow_mut()
            .nav_errors
            .insert(url.to_string(), errors.into());
        self
    }

    /// Response of the in-page `fetch` for `url`.
    pub fn in_page_response(self, url: &str, status: u16, content_type: &str, body: &[u8]) -> Self {
        use base64::Engine;
        let encoded = base64::engine::general_purpose::STANDARD.encode(body);
        let v = json!({"status": status, "contentType": content_type, "body": encoded});
        self.state
            .borrow_mut()
            .in_page
            .insert(url.to_string(), Value::String(v.to_string()));
        self
    }

    pub fn set_current(&self, url: &str) {
        let mut s = self.state.borrow_mut();
        s.current = url.to_string();
        s.scrolls = 0;
    }

    pub fn navigations(&self) -> Vec<String> {
        self.state.borrow().navigations.clone()
    }

    pub fn navigation_count(&self, url: &str) -> usize {
        self.state
            .borrow()
            .navigations
            .iter()
            .filter(|u| u.as_str() == url)
            .count()
    }

    pub fn in_page_calls(&self) -> Vec<String> {
        self.state.borrow().in_page_calls.clone()
    }

    pub fn keys(&self) -> Vec<String> {
        self.state.borrow().keys.clone()
    }

    fn visible_batches(s: &State) -> usize {
        match s.docs.get(&s.current) {
            Some(d) if !d.batches.is_empty() || !d.ancestor_batches.is_empty() => {
                let total = d.batches.len().max(d.ancestor_batches.len());
                (s.scrolls + 1).min(total)
            }
            _ => 0,
        }
    }
}

impl Page for FakePage {
    fn navigate(&self, url: &str, _timeout: Duration) -> Result<(), BrowserError> {
        let mut s = self.state.borrow_mut();
        s.navigations.push(url.to_string());
        if let Some(queue) = s.nav_errors.get_mut(url) {
            if let Some(e) = queue.pop_front() {
                return Err(e);
            }
        }
        s.current = url.to_string();
        s.scrolls = 0;
        Ok(())
    }

    fn current_url(&self) -> String {
        self.state.borrow().current.clone()
    }

    fn evaluate(&self, script: &str) -> Result<Value, BrowserError> {
        let mut s = self.state.borrow_mut();
        if script == SCROLL_TO_BOTTOM_SCRIPT {
            s.scrolls += 1;
            return Ok(Value::Null);
        }
        if script == DOCUMENT_HEIGHT_SCRIPT {
            let visible = Self::visible_batches(&s) as i64;
            let h = match s.docs.get(&s.current).and_then(|d| d.fixed_height) {
                Some(h) => h,
                None => FEED_BATCH_HEIGHT * visible.max(1),
            };
            return Ok(json!(h));
        }
        if script.contains("closest('a')") {
            let visible = Self::visible_batches(&s);
            let hrefs: Vec<String> = match s.docs.get(&s.current) {
                Some(d) => d
                    .ancestor_batches
                    .iter()
                    .take(visible)
                    .flatten()
                    .cloned()
                    .collect(),
                None => vec![],
            };
            return Ok(Value::String(json!(hrefs).to_string()));
        }
        if script.contains("credentials: 'include'") {
            let hit = s
                .in_page
                .iter()
                .find(|(url, _)| script.contains(&json!(url).to_string()))
                .map(|(url, v)| (url.clone(), v.clone()));
            return match hit {
                Some((url, v)) => {
                    s.in_page_calls.push(url);
                    Ok(v)
                }
                None => {
                    s.in_page_calls.push(String::new());
                    Ok(Value::String(
                        json!({"error": "TypeError: Failed to fetch"}).to_string(),
                    ))
                }
            };
        }
        Ok(Value::Null)
    }

    fn query_selector(&self, selector: &str) -> Result<Option<Element>, BrowserError> {
        Ok(self.query_selector_all(selector)?.into_iter().next())
    }

    fn query_selector_all(&self, selector: &str) -> Result<Vec<Element>, BrowserError> {
        let s = self.state.borrow();
        let visible = Self::visible_batches(&s);
        let doc = match s.docs.get(&s.current) {
            Some(d) => d,
            None => return Ok(vec![]),
        };
        let mut out = doc.fixed.get(selector).cloned().unwrap_or_default();
        for batch in doc.batches.iter().take(visible) {
            if let Some(els) = batch.get(selector) {
                out.extend(els.iter().cloned());
            }
        }
        Ok(out)
    }

    fn query_selector_in_frames(&self, selector: &str) -> Result<Option<Element>, BrowserError> {
        let s = self.state.borrow();
        Ok(s.docs
            .get(&s.current)
            .and_then(|d| d.frames.get(selector).cloned()))
    }

    fn click(&self, selector: &str) -> Result<bool, BrowserError> {
        let target = {
            let s = self.state.borrow();
            s.docs
                .get(&s.current)
                .and_then(|d| d.clicks.get(selector).cloned())
        };
        match target {
            Some(url) => {
                self.set_current(&url);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn press_key(&self, key: &str) -> Result<(), BrowserError> {
        self.state.borrow_mut().keys.push(key.to_string());
        Ok(())
    }

    fn cookies(&self) -> Result<Vec<(String, String)>, BrowserError> {
        Ok(vec![("c_user".into(), "1".into()), ("xs".into(), "t".into())])
    }
}

#[derive(Default)]
pub struct FakeHttp {
    responses: HashMap<String, Result<HttpResponse, String>>,
    calls: RefCell<Vec<(String, Option<String>)>>,
}

impl FakeHttp {
    pub fn new() -> Self {
        FakeHttp::default()
    }

    pub fn respond(mut self, url: &str, status: u16, content_type: &str, body: Vec<u8>) -> Self {
        self.responses.insert(
            url.to_string(),
            Ok(HttpResponse {
                status,
                content_type: Some(content_type.to_string()),
                body,
            }),
        );
        self
    }

    pub fn fail(mut self, url: &str, err: &str) -> Self {
        self.responses.insert(url.to_string(), Err(err.to_string()));
        self
    }

    pub fn calls(&self) -> Vec<(String, Option<String>)> {
        self.calls.borrow().clone()
    }
}

impl HttpClient for FakeHttp {
    async fn get(&self, url: &str, cookie_header: Option<&str>) -> Result<HttpResponse, String> {
        self.calls
            .borrow_mut()
            .push((url.to_string(), cookie_header.map(|c| c.to_string())));
        match self.responses.get(url) {
            Some(r) => r.clone(),
            None => Ok(HttpResponse {
                status: 404,
                content_type: Some("text/html".into()),
                body: b"not found".to_vec(),
            }),
        }
    }
}

pub fn jpeg(len: usize) -> Vec<u8> {
    let mut v = vec![0xFF, 0xD8, 0xFF, 0xE0];
    v.resize(len, 0x42);
    v
}
