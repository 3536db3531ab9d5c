//! CDP-backed browser session.
//!
//! Owns one Browser + Page pair per application and drives everything
//! through inline JavaScript evaluation.

use async_trait::async_trait;
use chromiumoxide::page::ScreenshotParams;
use chromiumoxide::{Browser, BrowserConfig, Page};
use futures::StreamExt;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value as JsonValue;
use tokio::task::JoinHandle;
use tokio::time::{sleep, Duration};
use tracing::{debug, info, warn};

use crate::browser::{BrowserSession, SessionFactory};
use crate::config::Config;
use crate::error::{EngineError, Result};
use crate::models::{ChallengeInfo, FieldKind, FormField, ScanOutcome, SubmitOutcome};

/// Keywords whose presence in the post-submit snapshot counts as success.
const SUCCESS_KEYWORDS: &[&str] = &[
    "thank you",
    "application received",
    "application submitted",
    "successfully submitted",
    "we have received",
    "confirmation",
];

pub struct CdpSessionFactory {
    headless: bool,
}

impl CdpSessionFactory {
    pub fn new(config: &Config) -> Self {
        Self {
            headless: config.headless,
        }
    }
}

#[async_trait]
impl SessionFactory for CdpSessionFactory {
    async fn open(&self) -> Result<Box<dyn BrowserSession>> {
        let session = CdpSession::launch(self.headless).await?;
        Ok(Box::new(session))
    }
}

pub struct CdpSession {
    browser: Browser,
    page: Page,
    handler_task: JoinHandle<()>,
    current_url: Option<String>,
}

impl CdpSession {
    /// Launch a fresh browser and a blank page.
    pub async fn launch(headless: bool) -> Result<Self> {
        info!("🚀 launching browser session (headless: {})", headless);

        let mut builder = BrowserConfig::builder().args(vec![
            "--disable-gpu",
            "--no-sandbox",
            "--disable-dev-shm-usage",
            "--disable-blink-features=AutomationControlled",
        ]);
        if headless {
            builder = builder.new_headless_mode();
        } else {
            builder = builder.with_head();
        }
        let config = builder
            .build()
            .map_err(|e| EngineError::SessionOpenFailed { detail: e })?;

        let (browser, mut handler) = Browser::launch(config).await.map_err(|e| {
            EngineError::SessionOpenFailed {
                detail: e.to_string(),
            }
        })?;

        // Drain browser events in the background for the session's lifetime.
        let handler_task = tokio::spawn(async move {
            while let Some(h) = handler.next().await {
                if h.is_err() {
                    break;
                }
            }
        });

        // Brief settle so the browser state is in sync.
        sleep(Duration::from_millis(300)).await;

        let page = browser.new_page("about:blank").await.map_err(|e| {
            EngineError::SessionOpenFailed {
                detail: e.to_string(),
            }
        })?;

        Ok(Self {
            browser,
            page,
            handler_task,
            current_url: None,
        })
    }

    async fn eval(&self, js_code: impl Into<String>) -> Result<JsonValue> {
        let result = self.page.evaluate(js_code.into()).await?;
        Ok(result.into_value()?)
    }

    async fn eval_as<T: DeserializeOwned>(&self, js_code: impl Into<String>) -> Result<T> {
        let value = self.eval(js_code).await?;
        Ok(serde_json::from_value(value)?)
    }

    async fn page_url(&self) -> Option<String> {
        self.page.url().await.ok().flatten()
    }

    /// Best-effort screenshot evidence for a challenge session.
    async fn capture_screenshot(&self) -> Option<String> {
        let bytes = self
            .page
            .screenshot(ScreenshotParams::builder().build())
            .await
            .ok()?;
        let path = std::env::temp_dir().join(format!("captcha-{}.png", uuid::Uuid::new_v4()));
        match std::fs::write(&path, bytes) {
            Ok(()) => Some(path.to_string_lossy().to_string()),
            Err(e) => {
                warn!("⚠️ failed to save challenge screenshot: {}", e);
                None
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawField {
    label: String,
    #[serde(rename = "type")]
    dom_type: String,
    required: bool,
    selector: String,
}

#[derive(Debug, Deserialize)]
struct RawChallenge {
    found: bool,
    #[serde(default)]
    kind: String,
}

#[async_trait]
impl BrowserSession for CdpSession {
    async fn navigate(&mut self, url: &str) -> Result<()> {
        debug!("navigating to {}", url);
        self.page
            .goto(url)
            .await
            .map_err(|e| EngineError::NavigationFailed {
                url: url.to_string(),
                detail: e.to_string(),
            })?;
        if let Err(e) = self.page.wait_for_navigation().await {
            // Some job boards never fire a clean load event; proceed and let
            // the field scan decide whether the page is usable.
            debug!("navigation wait ended early: {}", e);
        }
        sleep(Duration::from_millis(500)).await;
        self.current_url = self.page_url().await.or_else(|| Some(url.to_string()));
        Ok(())
    }

    async fn scan_fields(&mut self) -> Result<ScanOutcome> {
        if let Some(info) = self.detect_challenge().await? {
            return Ok(ScanOutcome::ChallengeDetected(info));
        }

        let raw: Vec<RawField> = self
            .eval_as(SCAN_FIELDS_JS)
            .await
            .map_err(|e| EngineError::adapter("scan", e))?;

        let fields = raw
            .into_iter()
            .filter(|f| !f.label.trim().is_empty())
            .map(|f| FormField {
                label: f.label,
                kind: FieldKind::from_dom(&f.dom_type),
                is_required: f.required,
                handle: f.selector,
            })
            .collect::<Vec<_>>();

        debug!("📝 scan found {} fillable fields", fields.len());
        Ok(ScanOutcome::Fields(fields))
    }

    async fn detect_challenge(&mut self) -> Result<Option<ChallengeInfo>> {
        let raw: RawChallenge = self
            .eval_as(DETECT_CHALLENGE_JS)
            .await
            .map_err(|e| EngineError::adapter("detect_challenge", e))?;

        if !raw.found {
            return Ok(None);
        }

        let page_url = self
            .page_url()
            .await
            .or_else(|| self.current_url.clone())
            .unwrap_or_default();
        let screenshot_path = self.capture_screenshot().await;
        info!("🚨 challenge detected ({}) at {}", raw.kind, page_url);

        Ok(Some(ChallengeInfo {
            kind: raw.kind,
            page_url,
            screenshot_path,
        }))
    }

    async fn fill_field(&mut self, handle: &str, value: &str) -> Result<bool> {
        let js = format!(
            "{}({}, {})",
            FILL_FIELD_JS,
            serde_json::to_string(handle)?,
            serde_json::to_string(value)?,
        );
        let filled: bool = self
            .eval_as(js)
            .await
            .map_err(|e| EngineError::adapter("fill", e))?;
        Ok(filled)
    }

    async fn submit(&mut self) -> Result<SubmitOutcome> {
        let url_before = self.page_url().await.unwrap_or_default();

        let clicked: bool = self
            .eval_as(CLICK_SUBMIT_JS)
            .await
            .map_err(|e| EngineError::adapter("submit", e))?;
        if !clicked {
            return Ok(SubmitOutcome {
                success: false,
                detail: "no submit control found".to_string(),
            });
        }

        // Give the site a moment to process before reading the result page.
        sleep(Duration::from_secs(3)).await;

        let snapshot: String = self
            .eval_as("document.body ? document.body.innerText.slice(0, 4000) : ''")
            .await
            .unwrap_or_default();
        let snapshot_lower = snapshot.to_lowercase();

        if let Some(keyword) = SUCCESS_KEYWORDS
            .iter()
            .find(|k| snapshot_lower.contains(**k))
        {
            return Ok(SubmitOutcome {
                success: true,
                detail: format!("success keyword: {}", keyword),
            });
        }

        let url_after = self.page_url().await.unwrap_or_default();
        if !url_after.is_empty() && url_after != url_before {
            // Best-effort signal only; some sites redirect on errors too.
            return Ok(SubmitOutcome {
                success: true,
                detail: "url changed".to_string(),
            });
        }

        Ok(SubmitOutcome {
            success: false,
            detail: "no success signal after submit".to_string(),
        })
    }

    async fn close(&mut self) {
        if let Err(e) = self.browser.close().await {
            warn!("⚠️ error closing browser session: {}", e);
        }
        self.handler_task.abort();
    }
}

const SCAN_FIELDS_JS: &str = r#"
(() => {
    const visible = (el) => {
        const rect = el.getBoundingClientRect();
        return rect.width > 0 && rect.height > 0 && !el.disabled && el.type !== 'hidden';
    };
    const labelFor = (el) => {
        if (el.id) {
            const tag = document.querySelector(`label[for="${el.id}"]`);
            if (tag && tag.innerText.trim()) return tag.innerText.trim();
        }
        const wrap = el.closest('label');
        if (wrap && wrap.innerText.trim()) return wrap.innerText.trim();
        return el.getAttribute('aria-label') || el.placeholder || el.name || '';
    };
    const selectorFor = (el, index) => {
        if (el.id) return `#${CSS.escape(el.id)}`;
        if (el.name) return `${el.tagName.toLowerCase()}[name="${CSS.escape(el.name)}"]`;
        return `${el.tagName.toLowerCase()}:nth-of-type(${index + 1})`;
    };
    const fields = [];
    const elements = document.querySelectorAll('input, textarea, select');
    elements.forEach((el, index) => {
        if (!visible(el)) return;
        if (['submit', 'button', 'image', 'reset', 'file'].includes(el.type)) return;
        fields.push({
            label: labelFor(el).slice(0, 200),
            type: el.tagName.toLowerCase() === 'input' ? el.type : el.tagName.toLowerCase(),
            required: el.required === true,
            selector: selectorFor(el, index),
        });
    });
    return fields;
})()
"#;

const DETECT_CHALLENGE_JS: &str = r#"
(() => {
    const markers = [
        ['iframe[src*="recaptcha"]', 'recaptcha'],
        ['.g-recaptcha', 'recaptcha'],
        ['iframe[src*="hcaptcha"]', 'hcaptcha'],
        ['.h-captcha', 'hcaptcha'],
        ['iframe[src*="turnstile"]', 'turnstile'],
        ['[data-sitekey]', 'sitekey-widget'],
    ];
    for (const [selector, kind] of markers) {
        if (document.querySelector(selector)) {
            return { found: true, kind };
        }
    }
    const text = document.body ? document.body.innerText.toLowerCase() : '';
    if (text.includes('verify you are human') || text.includes("i'm not a robot")) {
        return { found: true, kind: 'text-challenge' };
    }
    return { found: false, kind: '' };
})()
"#;

const FILL_FIELD_JS: &str = r#"
((selector, value) => {
    const el = document.querySelector(selector);
    if (!el) return false;
    const tag = el.tagName.toLowerCase();
    if (tag === 'select') {
        const wanted = value.toLowerCase();
        for (const option of el.options) {
            if (option.text.toLowerCase().includes(wanted) ||
                option.value.toLowerCase() === wanted) {
                el.value = option.value;
                el.dispatchEvent(new Event('change', { bubbles: true }));
                return true;
            }
        }
        return false;
    }
    if (el.type === 'checkbox' || el.type === 'radio') {
        const affirmative = ['yes', 'true', 'on', '1'].includes(value.toLowerCase());
        if (el.checked !== affirmative) el.click();
        return true;
    }
    el.focus();
    el.value = value;
    el.dispatchEvent(new Event('input', { bubbles: true }));
    el.dispatchEvent(new Event('change', { bubbles: true }));
    el.blur();
    return true;
})
"#;

const CLICK_SUBMIT_JS: &str = r#"
(() => {
    const candidates = [
        'button[type="submit"]',
        'input[type="submit"]',
    ];
    for (const selector of candidates) {
        const el = document.querySelector(selector);
        if (el) { el.click(); return true; }
    }
    const words = ['submit', 'apply', 'send application'];
    for (const button of document.querySelectorAll('button, a[role="button"]')) {
        const text = (button.innerText || '').toLowerCase();
        if (words.some((w) => text.includes(w))) {
            button.click();
            return true;
        }
    }
    return false;
})()
"#;
