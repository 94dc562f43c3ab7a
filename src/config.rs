use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RetryMode {
    /// Exponential backoff that stops doubling after 6 attempts.
    Standard,
    /// Exponential backoff that keeps doubling for up to 10 attempts.
    Adaptive,
}

/// Timeouts and retry policy for every external call (storage, model, translation).
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ClientOptions {
    pub connect_timeout_secs: u64,
    pub read_timeout_secs: u64,
    pub max_attempts: u32,
    pub retry_mode: RetryMode,
    pub base_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            connect_timeout_secs: 5,
            read_timeout_secs: 60,
            max_attempts: 20,
            retry_mode: RetryMode::Adaptive,
            base_backoff_ms: 200,
            max_backoff_ms: 20_000,
        }
    }
}

impl ClientOptions {
    /// Upper bound for one call: connect plus read.
    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs + self.read_timeout_secs)
    }

    /// Wait after failed attempt number `attempt` (counting from 0).
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = match self.retry_mode {
            RetryMode::Standard => 1u64 << attempt.min(6),
            RetryMode::Adaptive => 1u64 << attempt.min(10),
        };
        Duration::from_millis(
            self.base_backoff_ms
                .saturating_mul(factor)
                .min(self.max_backoff_ms),
        )
    }

    /// Run `op` until it succeeds or `max_attempts` is spent. Only errors
    /// `is_transient` accepts are retried.
    pub fn retry<T>(
        &self,
        what: &str,
        is_transient: impl Fn(&Error) -> bool,
        mut op: impl FnMut() -> Result<T>,
    ) -> Result<T> {
        let attempts = self.max_attempts.max(1);
        let mut attempt = 0;
        loop {
            match op() {
                Ok(value) => return Ok(value),
                Err(e) if attempt + 1 < attempts && is_transient(&e) => {
                    let wait = self.backoff(attempt);
                    log::warn!(
                        "{what} failed (attempt {}/{attempts}): {e}; retrying in {wait:?}",
                        attempt + 1
                    );
                    thread::sleep(wait);
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    /// Key of the styled template in the input store; `None` builds outputs
    /// from a blank document.
    pub template_key: Option<String>,
    /// Program the correction prompt is piped through, with its arguments.
    pub corrector_command: Vec<String>,
    /// Program translation requests are piped through, with its arguments.
    pub translator_command: Vec<String>,
    pub client: ClientOptions,
    pub watchdog_threshold: usize,
    pub watchdog_window_secs: u64,
    pub rule_name: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            template_key: Some("word_template.docx".to_string()),
            corrector_command: Vec::new(),
            translator_command: Vec::new(),
            client: ClientOptions::default(),
            watchdog_threshold: 5,
            watchdog_window_secs: 300,
            rule_name: "document-ingest".to_string(),
        }
    }
}

impl Config {
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("{}: {e}", path.display())))?;
        Self::from_json(&text)
    }

    /// Load `path` when given, defaults otherwise.
    pub fn load_or_default(path: Option<&PathBuf>) -> Result<Self> {
        match path {
            Some(p) => Self::load(p),
            None => Ok(Self::default()),
        }
    }
}
