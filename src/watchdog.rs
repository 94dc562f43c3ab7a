use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use crate::config::Config;
use crate::error::{Error, Result};

pub const DISABLED_SUBJECT: &str = "Event Rule Disabled";
pub const DISABLED_MESSAGE: &str = "WARNING: You have surpassed the alarm threshold for this \
workflow. You have either created an infinite loop to your input storage, or you have tried to \
process too many documents at once. Your event rule was disabled to avoid excess pipeline \
invocations. Either update the languages properly or increase the alarm threshold, then \
re-enable the rule.";
pub const DISABLE_FAILED_SUBJECT: &str = "Event Rule Disabling Failed";
pub const DISABLE_FAILED_MESSAGE: &str = "Please check that you have not created an infinite \
loop. The watchdog was triggered but failed to disable the event rule.";

/// The trigger that starts pipeline runs.
pub trait EventRule: Send + Sync {
    fn name(&self) -> &str;
    fn is_enabled(&self) -> bool;
    fn disable(&self) -> Result<()>;
}

pub trait Notifier: Send + Sync {
    fn publish(&self, subject: &str, message: &str) -> Result<()>;
}

/// Writes notifications to the log.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn publish(&self, subject: &str, message: &str) -> Result<()> {
        log::warn!("[{subject}] {message}");
        Ok(())
    }
}

#[derive(Debug)]
pub struct MemoryEventRule {
    name: String,
    enabled: AtomicBool,
    fail_disable: bool,
}

impl MemoryEventRule {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            enabled: AtomicBool::new(true),
            fail_disable: false,
        }
    }

    /// A rule whose `disable` always fails.
    pub fn stuck(name: impl Into<String>) -> Self {
        Self {
            fail_disable: true,
            ..Self::new(name)
        }
    }
}

impl EventRule for MemoryEventRule {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    fn disable(&self) -> Result<()> {
        if self.fail_disable {
            return Err(Error::EventRule(format!("cannot disable {}", self.name)));
        }
        self.enabled.store(false, Ordering::SeqCst);
        Ok(())
    }
}

#[derive(Debug)]
pub struct Watchdog {
    threshold: usize,
    window: Duration,
    invocations: VecDeque<Instant>,
}

impl Default for Watchdog {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

impl Watchdog {
    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.watchdog_threshold,
            Duration::from_secs(config.watchdog_window_secs),
        )
    }

    pub fn new(threshold: usize, window: Duration) -> Self {
        Self {
            threshold,
            window,
            invocations: VecDeque::new(),
        }
    }

    /// Invocations still inside the window.
    pub fn recent(&self) -> usize {
        self.invocations.len()
    }

    pub fn record(&mut self, rule: &dyn EventRule, notifier: &dyn Notifier) -> Result<bool> {
        self.record_at(Instant::now(), rule, notifier)
    }

    /// Count an invocation at `now`. Returns whether the threshold was
    /// exceeded; in that case the rule has been disabled and the warning
    /// published. A failed disable publishes the failure notice and returns
    /// the error.
    pub fn record_at(
        &mut self,
        now: Instant,
        rule: &dyn EventRule,
        notifier: &dyn Notifier,
    ) -> Result<bool> {
        while let Some(&oldest) = self.invocations.front() {
            if now.saturating_duration_since(oldest) > self.window {
                self.invocations.pop_front();
            } else {
                break;
            }
        }
        self.invocations.push_back(now);

        if self.invocations.len() <= self.threshold {
            return Ok(false);
        }
        if !rule.is_enabled() {
            return Ok(true);
        }

        log::warn!(
            "{} invocations within {:?} (threshold {}); disabling rule {}",
            self.invocations.len(),
            self.window,
            self.threshold,
            rule.name()
        );
        match rule.disable() {
            Ok(()) => {
                log::info!("Disabled event rule: {}", rule.name());
                notifier.publish(DISABLED_SUBJECT, DISABLED_MESSAGE)?;
                Ok(true)
            }
            Err(e) => {
                log::error!("Disabling rule {} failed: {e}", rule.name());
                notifier.publish(DISABLE_FAILED_SUBJECT, DISABLE_FAILED_MESSAGE)?;
                Err(e)
            }
        }
    }
}

/// A watchdog bound to the rule it protects and the channel it reports on.
/// Shared by reference across the workers of a batch.
pub struct Guard<'a> {
    watchdog: Mutex<Watchdog>,
    rule: &'a dyn EventRule,
    notifier: &'a dyn Notifier,
}

impl<'a> Guard<'a> {
    pub fn new(watchdog: Watchdog, rule: &'a dyn EventRule, notifier: &'a dyn Notifier) -> Self {
        Self {
            watchdog: Mutex::new(watchdog),
            rule,
            notifier,
        }
    }

    pub fn rule(&self) -> &dyn EventRule {
        self.rule
    }

    /// The rule is off, whether this guard switched it off or not.
    pub fn tripped(&self) -> bool {
        !self.rule.is_enabled()
    }

    /// Count one failure now. See [`Watchdog::record_at`].
    pub fn record(&self) -> Result<bool> {
        self.watchdog
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .record(self.rule, self.notifier)
    }
}
