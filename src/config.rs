use std::time::Duration;

/// Engine configuration.
#[derive(Clone, Debug)]
pub struct Config {
    /// Run browser sessions without a visible window.
    pub headless: bool,
    /// Maximum number of applications processed at the same time.
    pub max_concurrent: usize,
    /// Seconds between queue scans.
    pub scan_interval_secs: u64,
    /// Seconds to wait for a human to solve a challenge.
    pub captcha_timeout_secs: u64,
    /// Seconds between challenge status polls.
    pub captcha_check_interval_secs: u64,
    /// Base delay between field fills, in milliseconds.
    pub field_delay_ms: u64,
    /// Random extra delay added on top of the base fill delay.
    pub field_delay_jitter_ms: u64,
    // --- generative fallback ---
    pub llm_api_key: String,
    pub llm_api_base_url: String,
    pub llm_model_name: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            headless: true,
            max_concurrent: 1,
            scan_interval_secs: 5,
            captcha_timeout_secs: 900,
            captcha_check_interval_secs: 10,
            field_delay_ms: 500,
            field_delay_jitter_ms: 250,
            llm_api_key: String::new(),
            llm_api_base_url: "https://api.openai.com/v1".to_string(),
            llm_model_name: "gpt-4o-mini".to_string(),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let default = Self::default();
        Self {
            headless: std::env::var("HEADLESS").ok().and_then(|v| v.parse().ok()).unwrap_or(default.headless),
            max_concurrent: std::env::var("MAX_CONCURRENT").ok().and_then(|v| v.parse().ok()).unwrap_or(default.max_concurrent),
            scan_interval_secs: std::env::var("SCAN_INTERVAL_SECS").ok().and_then(|v| v.parse().ok()).unwrap_or(default.scan_interval_secs),
            captcha_timeout_secs: std::env::var("CAPTCHA_TIMEOUT_SECS").ok().and_then(|v| v.parse().ok()).unwrap_or(default.captcha_timeout_secs),
            captcha_check_interval_secs: std::env::var("CAPTCHA_CHECK_INTERVAL_SECS").ok().and_then(|v| v.parse().ok()).unwrap_or(default.captcha_check_interval_secs),
            field_delay_ms: std::env::var("FIELD_DELAY_MS").ok().and_then(|v| v.parse().ok()).unwrap_or(default.field_delay_ms),
            field_delay_jitter_ms: std::env::var("FIELD_DELAY_JITTER_MS").ok().and_then(|v| v.parse().ok()).unwrap_or(default.field_delay_jitter_ms),
            llm_api_key: std::env::var("LLM_API_KEY").unwrap_or(default.llm_api_key),
            llm_api_base_url: std::env::var("LLM_API_BASE_URL").unwrap_or(default.llm_api_base_url),
            llm_model_name: std::env::var("LLM_MODEL_NAME").unwrap_or(default.llm_model_name),
        }
    }

    pub fn scan_interval(&self) -> Duration {
        Duration::from_secs(self.scan_interval_secs)
    }

    pub fn captcha_timeout(&self) -> Duration {
        Duration::from_secs(self.captcha_timeout_secs)
    }

    pub fn captcha_check_interval(&self) -> Duration {
        Duration::from_secs(self.captcha_check_interval_secs)
    }
}
