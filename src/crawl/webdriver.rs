use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::{json, Value};

use super::BrowsingSurface;
use crate::config::Config;

const SCROLL_SCRIPT: &str = "window.scrollTo(0, document.body.scrollHeight);";
const HEIGHT_SCRIPT: &str = "return document.body ? document.body.scrollHeight : null;";
const HREFS_SCRIPT: &str =
    "return Array.from(document.querySelectorAll(arguments[0])).map(e => e.getAttribute('href')).filter(h => h);";

/// A headless browser session driven over the W3C WebDriver protocol
/// (chromedriver, geckodriver, a Selenium grid, ...)
pub struct WebDriverSurface {
    client: reqwest::Client,
    session_url: String,
    closed: bool,
}

impl WebDriverSurface {
    /// Start a new headless session
    pub async fn connect(config: &Config) -> Result<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.call_timeout() {
            builder = builder.timeout(timeout);
        }
        let client = builder.build()?;
        let base = config.crawler.webdriver_url.trim_end_matches('/').to_string();

        let capabilities = json!({
            "capabilities": {
                "alwaysMatch": {
                    "goog:chromeOptions": { "args": ["--headless=new", "--disable-gpu"] },
                    "moz:firefoxOptions": { "args": ["-headless"] }
                }
            }
        });

        let response: Value = client
            .post(format!("{}/session", base))
            .json(&capabilities)
            .send()
            .await
            .with_context(|| format!("Failed to reach WebDriver at {}", base))?
            .json()
            .await
            .context("Failed to parse WebDriver session response")?;

        let session_id = session_id(&response)?;
        tracing::debug!(session_id = %session_id, "WebDriver session started");

        Ok(Self {
            client,
            session_url: format!("{}/session/{}", base, session_id),
            closed: false,
        })
    }

    async fn command(&self, path: &str, body: Value) -> Result<Value> {
        let response: Value = self
            .client
            .post(format!("{}/{}", self.session_url, path))
            .json(&body)
            .send()
            .await
            .with_context(|| format!("WebDriver command {} failed", path))?
            .json()
            .await
            .with_context(|| format!("WebDriver command {} returned invalid JSON", path))?;

        command_value(response)
    }

    async fn execute(&self, script: &str, args: Value) -> Result<Value> {
        self.command("execute/sync", json!({ "script": script, "args": args }))
            .await
    }
}

fn session_id(response: &Value) -> Result<String> {
    response["value"]["sessionId"]
        .as_str()
        .or_else(|| response["sessionId"].as_str())
        .map(str::to_string)
        .ok_or_else(|| anyhow::anyhow!("WebDriver did not return a session id: {}", response))
}

/// Unwrap `{"value": ...}`, surfacing WebDriver errors
fn command_value(mut response: Value) -> Result<Value> {
    let value = response["value"].take();
    if let Some(error) = value.get("error").and_then(Value::as_str) {
        let message = value.get("message").and_then(Value::as_str).unwrap_or("");
        anyhow::bail!("WebDriver error {}: {}", error, message);
    }
    Ok(value)
}

#[async_trait]
impl BrowsingSurface for WebDriverSurface {
    async fn navigate(&mut self, url: &str) -> Result<()> {
        self.command("url", json!({ "url": url })).await?;
        Ok(())
    }

    async fn scroll_to_bottom(&mut self) -> Result<()> {
        self.execute(SCROLL_SCRIPT, json!([])).await?;
        Ok(())
    }

    async fn content_height(&mut self) -> Result<Option<u64>> {
        Ok(self.execute(HEIGHT_SCRIPT, json!([])).await?.as_u64())
    }

    async fn link_hrefs(&mut self, selector: &str) -> Result<Vec<String>> {
        let value = self.execute(HREFS_SCRIPT, json!([selector])).await?;
        Ok(value
            .as_array()
            .map(|hrefs| {
                hrefs
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        self.client
            .delete(&self.session_url)
            .send()
            .await
            .context("Failed to end WebDriver session")?;
        tracing::debug!("WebDriver session closed");
        Ok(())
    }
}
