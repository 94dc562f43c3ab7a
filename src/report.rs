use serde::Serialize;

use crate::correct::TokenDrift;
use crate::error::Result;
use crate::placeholder::ReinsertReport;
use crate::watchdog::Notifier;

pub const SUMMARY_SUBJECT: &str = "Document Processing Results";

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum OutcomeStatus {
    Succeeded {
        output_key: String,
        report: ReinsertReport,
        drift: TokenDrift,
    },
    Failed {
        cause: String,
    },
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DocumentOutcome {
    pub key: String,
    #[serde(flatten)]
    pub status: OutcomeStatus,
}

impl DocumentOutcome {
    pub fn failed(key: impl Into<String>, cause: impl ToString) -> Self {
        Self {
            key: key.into(),
            status: OutcomeStatus::Failed {
                cause: cause.to_string(),
            },
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.status, OutcomeStatus::Succeeded { .. })
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct FailedDocument {
    pub key: String,
    pub cause: String,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct BatchSummary {
    /// Output keys of the documents that made it through.
    pub succeeded: Vec<String>,
    pub failed: Vec<FailedDocument>,
    /// Succeeded documents whose images or tokens did not line up.
    pub with_drift: Vec<String>,
}

impl BatchSummary {
    pub fn from_outcomes(outcomes: &[DocumentOutcome]) -> Self {
        let mut summary = Self::default();
        for outcome in outcomes {
            match &outcome.status {
                OutcomeStatus::Succeeded {
                    output_key,
                    report,
                    drift,
                } => {
                    summary.succeeded.push(output_key.clone());
                    if !report.is_clean() || !drift.is_empty() {
                        summary.with_drift.push(output_key.clone());
                    }
                }
                OutcomeStatus::Failed { cause } => summary.failed.push(FailedDocument {
                    key: outcome.key.clone(),
                    cause: cause.clone(),
                }),
            }
        }
        summary
    }

    /// The notification body.
    pub fn message(&self) -> String {
        let mut success = String::new();
        if self.succeeded.is_empty() {
            success.push_str("No documents were successfully processed.");
        } else {
            success.push_str(
                "The following documents were successfully processed and can be found in the output bucket:\n\n",
            );
            for key in &self.succeeded {
                success.push_str(key);
                success.push_str("\n\n");
            }
        }

        let mut failure = String::new();
        if self.failed.is_empty() {
            failure.push_str("All documents were successfully processed.");
        } else {
            failure.push_str("The following documents could not be processed:\n\n");
            for doc in &self.failed {
                failure.push_str(&format!("{}: {}\n\n", doc.key, doc.cause));
            }
        }

        format!("{success}\n\n{failure}")
    }
}

/// Notification body when the run failed before any document was processed.
pub fn workflow_failure_message(error: &str) -> String {
    format!("The workflow could not be completed due to the following error: {error}")
}

/// The notification body for a finished batch run, whether it got as far as
/// the documents or not.
pub fn batch_message(result: &Result<Vec<DocumentOutcome>>) -> String {
    match result {
        Ok(outcomes) => BatchSummary::from_outcomes(outcomes).message(),
        Err(e) => workflow_failure_message(&e.to_string()),
    }
}

pub fn publish_summary(
    result: &Result<Vec<DocumentOutcome>>,
    notifier: &dyn Notifier,
) -> Result<()> {
    notifier.publish(SUMMARY_SUBJECT, &batch_message(result))
}
