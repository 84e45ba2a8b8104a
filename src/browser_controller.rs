use anyhow::{anyhow, Context, Result};
use headless_chrome::{browser::default_executable, Browser, LaunchOptions, Tab};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

use crate::{
    page::{Element, Page},
    types::BrowserError,
};

// we read elements through a script so every query is a plain json value
const SNAPSHOT_FN: &str = r#"(e) => ({
    attributes: Array.from(e.attributes).flatMap((a) => [a.name, a.value]),
    innerText: e.innerText || '',
    visible: !!(e.offsetWidth || e.offsetHeight || e.getClientRects().length),
})"#;

fn snapshot_script(selector: &str) -> String {
    format!(
        "JSON.stringify(Array.from(document.querySelectorAll({})).map({}))",
        serde_json::Value::String(selector.to_string()),
        SNAPSHOT_FN
    )
}

// cross-origin frames throw on contentDocument and are skipped
fn frame_snapshot_script(selector: &str) -> String {
    format!(
        r#"JSON.stringify(Array.from(document.querySelectorAll('iframe')).flatMap((f) => {{
    try {{
        const doc = f.contentDocument;
        return doc ? Array.from(doc.querySelectorAll({})).map({}) : [];
    }} catch (e) {{
        return [];
    }}
}}))"#,
        serde_json::Value::String(selector.to_string()),
        SNAPSHOT_FN
    )
}

fn exists_script(selector: &str) -> String {
    format!(
        "document.querySelector({}) !== null",
        serde_json::Value::String(selector.to_string())
    )
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Snapshot {
    attributes: Vec<String>,
    inner_text: String,
    visible: bool,
}

fn parse_snapshots(value: Value) -> Result<Vec<Element>, BrowserError> {
    let raw = match value.as_str() {
        Some(s) => s,
        None => return Ok(vec![]),
    };
    let snaps: Vec<Snapshot> = serde_json::from_str(raw)
        .map_err(|e| BrowserError::Failed(format!("bad element snapshot: {}", e)))?;
    Ok(snaps
        .into_iter()
        .map(|s| Element::from_attribute_list(&s.attributes, s.inner_text, s.visible))
        .collect())
}

fn classify(e: anyhow::Error) -> BrowserError {
    let msg = format!("{:#}", e);
    let lower = msg.to_lowercase();
    if lower.contains("timeout") || lower.contains("timed out") {
        BrowserError::Timeout(msg)
    } else {
        BrowserError::Failed(msg)
    }
}

pub struct BrowserController {
    browser: Browser,
}

impl BrowserController {
    pub fn new(headless: bool, idle_timeout: Duration) -> Result<Self> {
        let is_docker = std::env::var("IN_DOCKER").is_ok();
        let path = default_executable().map_err(|e| anyhow!("could not find chrome: {}", e))?;
        let options = LaunchOptions::default_builder()
            .path(Some(path))
            .headless(headless)
            .window_size(Some((1366, 768)))
            .idle_browser_timeout(idle_timeout)
            // warning only do this if in docker env
            .sandbox(!is_docker)
            .build()
            .map_err(|e| anyhow!("invalid launch options: {}", e))?;
        let browser = Browser::new(options).context("browser launching error")?;

        Ok(BrowserController { browser })
    }

    /// Opens the single tab a run works in.
    pub fn new_page(&self, user_agent: &str) -> Result<ChromePage> {
        let tab = self.browser.new_tab().context("could not create new tab")?;
        tab.set_user_agent(user_agent, Some("es-ES,es;q=0.9,en;q=0.8"), None)
            .context("could not set user agent")?;
        debug!("tab ready");
        Ok(ChromePage { tab })
    }
}

/// [`Page`] backed by a live chrome tab.
pub struct ChromePage {
    tab: Arc<Tab>,
}

impl Page for ChromePage {
    fn navigate(&self, url: &str, timeout: Duration) -> Result<(), BrowserError> {
        self.tab.set_default_timeout(timeout);
        self.tab.navigate_to(url).map_err(classify)?;
        self.tab.wait_until_navigated().map_err(classify)?;
        Ok(())
    }

    fn current_url(&self) -> String {
        self.tab.get_url()
    }

    fn evaluate(&self, script: &str) -> Result<Value, BrowserError> {
        let remote = self.tab.evaluate(script, true).map_err(classify)?;
        Ok(remote.value.unwrap_or(Value::Null))
    }

    fn query_selector(&self, selector: &str) -> Result<Option<Element>, BrowserError> {
        Ok(self.query_selector_all(selector)?.into_iter().next())
    }

    fn query_selector_all(&self, selector: &str) -> Result<Vec<Element>, BrowserError> {
        parse_snapshots(self.evaluate(&snapshot_script(selector))?)
    }

    fn query_selector_in_frames(&self, selector: &str) -> Result<Option<Element>, BrowserError> {
        let found = parse_snapshots(self.evaluate(&frame_snapshot_script(selector))?)?;
        Ok(found.into_iter().next())
    }

    fn click(&self, selector: &str) -> Result<bool, BrowserError> {
        if self.evaluate(&exists_script(selector))? != Value::Bool(true) {
            return Ok(false);
        }
        let el = self.tab.find_element(selector).map_err(classify)?;
        el.click().map_err(classify)?;
        Ok(true)
    }

    fn press_key(&self, key: &str) -> Result<(), BrowserError> {
        self.tab.press_key(key).map_err(classify)?;
        Ok(())
    }

    fn cookies(&self) -> Result<Vec<(String, String)>, BrowserError> {
        let cookies = self.tab.get_cookies().map_err(classify)?;
        Ok(cookies.into_iter().map(|c| (c.name, c.value)).collect())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn snapshots_become_elements() {
        let raw = serde_json::json!([
            {"attributes": ["src", "https://scontent.x/1.jpg", "class", "photo"], "innerText": "", "visible": true},
            {"attributes": [], "innerText": "#playa", "visible": false},
        ])
        .to_string();
        let els = parse_snapshots(Value::String(raw)).unwrap();
        assert_eq!(els.len(), 2);
        assert_eq!(els[0].attribute("src"), Some("https://scontent.x/1.jpg"));
        assert_eq!(els[0].attribute("class"), Some("photo"));
        assert_eq!(els[1].inner_text, "#playa");
        assert!(!els[1].visible);
        assert!(parse_snapshots(Value::Null).unwrap().is_empty());
        assert!(parse_snapshots(Value::String("{".into())).is_err());
    }

    #[test]
    fn timeouts_are_told_apart() {
        assert!(classify(anyhow!("The event waited for never came: Timeout")).is_timeout());
        assert!(classify(anyhow!("navigation timed out")).is_timeout());
        assert!(!classify(anyhow!("net::ERR_NAME_NOT_RESOLVED")).is_timeout());
    }

    #[test]
    fn selectors_are_quoted() {
        let s = snapshot_script("img[src*=\"scontent\"]");
        assert!(s.contains(r#"document.querySelectorAll("img[src*=\"scontent\"]")"#));
        assert!(frame_snapshot_script("video").contains("contentDocument"));
        assert_eq!(exists_script("h1"), r#"document.querySelector("h1") !== null"#);
    }
}
