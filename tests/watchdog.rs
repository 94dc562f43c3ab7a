use std::sync::Mutex;
use std::time::{Duration, Instant};

use docxide_proof::config::Config;
use docxide_proof::watchdog::{
    DISABLE_FAILED_SUBJECT, DISABLED_SUBJECT, EventRule, Guard, MemoryEventRule, Notifier,
    Watchdog,
};
use docxide_proof::{Error, Result};

#[derive(Default)]
struct Recorder(Mutex<Vec<String>>);

impl Recorder {
    fn subjects(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }
}

impl Notifier for Recorder {
    fn publish(&self, subject: &str, _message: &str) -> Result<()> {
        self.0.lock().unwrap().push(subject.to_string());
        Ok(())
    }
}

#[test]
fn trips_above_threshold_once() {
    let rule = MemoryEventRule::new("ingest");
    let notes = Recorder::default();
    let mut watchdog = Watchdog::new(2, Duration::from_secs(60));
    let now = Instant::now();

    assert!(!watchdog.record_at(now, &rule, &notes).unwrap());
    assert!(!watchdog.record_at(now, &rule, &notes).unwrap());
    assert!(watchdog.record_at(now, &rule, &notes).unwrap());
    assert!(!rule.is_enabled());
    assert!(watchdog.record_at(now, &rule, &notes).unwrap());
    assert_eq!(notes.subjects(), vec![DISABLED_SUBJECT.to_string()]);
}

#[test]
fn old_invocations_leave_the_window() {
    let rule = MemoryEventRule::new("ingest");
    let notes = Recorder::default();
    let mut watchdog = Watchdog::new(1, Duration::from_secs(10));
    let start = Instant::now();

    assert!(!watchdog.record_at(start, &rule, &notes).unwrap());
    let later = start + Duration::from_secs(11);
    assert!(!watchdog.record_at(later, &rule, &notes).unwrap());
    assert_eq!(watchdog.recent(), 1);
    assert!(rule.is_enabled());
}

#[test]
fn failed_disable_is_reported_and_returned() {
    let rule = MemoryEventRule::stuck("ingest");
    let notes = Recorder::default();
    let mut watchdog = Watchdog::new(0, Duration::from_secs(60));

    let err = watchdog.record(&rule, &notes).unwrap_err();
    assert!(matches!(err, Error::EventRule(_)));
    assert!(rule.is_enabled());
    assert_eq!(notes.subjects(), vec![DISABLE_FAILED_SUBJECT.to_string()]);
}

#[test]
fn limits_come_from_the_config() {
    let mut config = Config::default();
    config.watchdog_threshold = 1;
    config.watchdog_window_secs = 30;
    let rule = MemoryEventRule::new("ingest");
    let notes = Recorder::default();
    let mut watchdog = Watchdog::from_config(&config);
    let start = Instant::now();

    assert!(!watchdog.record_at(start, &rule, &notes).unwrap());
    // Outside the 30 second window the first call no longer counts.
    assert!(!watchdog.record_at(start + Duration::from_secs(31), &rule, &notes).unwrap());
    assert!(watchdog.record_at(start + Duration::from_secs(32), &rule, &notes).unwrap());
    assert!(!rule.is_enabled());
}

#[test]
fn default_watchdog_allows_five_calls() {
    let rule = MemoryEventRule::new("ingest");
    let notes = Recorder::default();
    let mut watchdog = Watchdog::default();
    for _ in 0..5 {
        assert!(!watchdog.record(&rule, &notes).unwrap());
    }
    assert!(watchdog.record(&rule, &notes).unwrap());
}

#[test]
fn guard_shares_one_count() {
    let rule = MemoryEventRule::new("ingest");
    let notes = Recorder::default();
    let guard = Guard::new(Watchdog::new(1, Duration::from_secs(60)), &rule, &notes);

    assert!(!guard.tripped());
    assert_eq!(guard.rule().name(), "ingest");
    assert!(!guard.record().unwrap());
    assert!(guard.record().unwrap());
    assert!(guard.tripped());
    assert_eq!(notes.subjects(), vec![DISABLED_SUBJECT.to_string()]);
}
