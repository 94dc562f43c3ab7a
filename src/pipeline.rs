use std::time::Instant;

use rayon::prelude::*;

use crate::config::Config;
use crate::correct::{Corrector, TokenDrift, check_tokens};
use crate::docx::parse_bytes;
use crate::docx::writer::Target;
use crate::error::{Error, Result};
use crate::extract::extract;
use crate::markup::{inject, project};
use crate::placeholder::ReinsertReport;
use crate::reinsert::reinsert;
use crate::report::{DocumentOutcome, OutcomeStatus};
use crate::storage::ObjectStore;
use crate::translate::{Translator, fan_out_translations};
use crate::watchdog::Guard;

/// Where the corrected copy of `key` is stored: `a.docx` becomes
/// `a_corrected.docx`, `a_translated.docx` becomes `a_corrected.docx`.
pub fn output_key(key: &str) -> String {
    if let Some(stem) = key.strip_suffix("_translated.docx") {
        format!("{stem}_corrected.docx")
    } else if let Some(stem) = key.strip_suffix(".docx") {
        format!("{stem}_corrected.docx")
    } else {
        format!("{key}_corrected.docx")
    }
}

/// A corrected package and what happened to its images on the way.
#[derive(Debug)]
pub struct CorrectedDocument {
    pub bytes: Vec<u8>,
    pub report: ReinsertReport,
    pub drift: TokenDrift,
}

/// Run one document through extract, project, correct, inject and reinsert.
/// Without a template the output is built on a blank package.
pub fn correct_document(
    input: &[u8],
    template: Option<&[u8]>,
    corrector: &dyn Corrector,
) -> Result<CorrectedDocument> {
    let t0 = Instant::now();

    let parsed = parse_bytes(input)?;
    let extraction = extract(&parsed);
    let markup = project(&extraction.document);
    let t_extract = t0.elapsed();

    let corrected = corrector.correct(&markup)?;
    let t_correct = t0.elapsed();

    let drift = check_tokens(&markup, &corrected);
    if !drift.is_empty() {
        log::warn!(
            "Placeholder drift after correction: missing {:?}, duplicated {:?}, invented {:?}, reordered {}",
            drift.missing,
            drift.duplicated,
            drift.invented,
            drift.reordered
        );
    }

    let target = match template {
        Some(bytes) => Target::template(bytes)?,
        None => Target::blank(),
    };
    let draft = inject(&corrected, target);
    let reinsertion = reinsert(draft, extraction.associations);
    let t_inject = t0.elapsed();

    let bytes = reinsertion.draft.finish()?;
    let t_total = t0.elapsed();

    log::info!(
        "Timing: extract={:.1}ms, correct={:.1}ms, inject={:.1}ms, write={:.1}ms, total={:.1}ms (output {} bytes)",
        t_extract.as_secs_f64() * 1000.0,
        (t_correct - t_extract).as_secs_f64() * 1000.0,
        (t_inject - t_correct).as_secs_f64() * 1000.0,
        (t_total - t_inject).as_secs_f64() * 1000.0,
        t_total.as_secs_f64() * 1000.0,
        bytes.len(),
    );

    Ok(CorrectedDocument {
        bytes,
        report: reinsertion.report,
        drift,
    })
}

/// Everything one invocation needs. Nothing here outlives the run.
pub struct Pipeline<'a> {
    pub config: &'a Config,
    pub input: &'a dyn ObjectStore,
    pub output: &'a dyn ObjectStore,
    pub corrector: &'a dyn Corrector,
    /// When set, every source document is first fanned out into the other
    /// languages and each copy is corrected as well.
    pub translator: Option<&'a dyn Translator>,
    /// Counts failed documents. Once it has switched the ingestion rule off,
    /// the documents not yet started are skipped.
    pub guard: Option<&'a Guard<'a>>,
}

fn is_transient(e: &Error) -> bool {
    matches!(e, Error::Storage(_) | Error::Io(_))
}

impl Pipeline<'_> {
    fn record_failure(&self) {
        if let Some(guard) = self.guard
            && let Err(e) = guard.record()
        {
            log::error!("Watchdog: {e}");
        }
    }

    fn fetch(&self, store: &dyn ObjectStore, key: &str) -> Result<Vec<u8>> {
        self.config
            .client
            .retry(&format!("get {key}"), is_transient, || store.get(key))
    }

    fn store(&self, key: &str, data: &[u8]) -> Result<()> {
        self.config
            .client
            .retry(&format!("put {key}"), is_transient, || self.output.put(key, data))
    }

    /// The configured template. A configured key that is not in the input
    /// store fails the whole run.
    pub fn load_template(&self) -> Result<Option<Vec<u8>>> {
        match &self.config.template_key {
            Some(key) => self.fetch(self.input, key).map(Some),
            None => Ok(None),
        }
    }

    fn try_process(&self, key: &str, template: Option<&[u8]>) -> Result<(String, CorrectedDocument)> {
        let input = self.fetch(self.input, key)?;
        let corrected = correct_document(&input, template, self.corrector)?;
        let out_key = output_key(key);
        self.store(&out_key, &corrected.bytes)?;
        Ok((out_key, corrected))
    }

    /// Correct one stored document. Errors become a failed outcome.
    pub fn process_document(&self, key: &str, template: Option<&[u8]>) -> DocumentOutcome {
        match self.try_process(key, template) {
            Ok((output_key, corrected)) => {
                log::info!("{key} -> {output_key}");
                DocumentOutcome {
                    key: key.to_string(),
                    status: OutcomeStatus::Succeeded {
                        output_key,
                        report: corrected.report,
                        drift: corrected.drift,
                    },
                }
            }
            Err(e) => {
                log::error!("{key}: {e}");
                DocumentOutcome::failed(key, e)
            }
        }
    }

    /// Correct a batch in parallel. Only a missing or unusable template fails
    /// the whole batch; any other failure is confined to its document.
    pub fn process_batch(&self, keys: &[String]) -> Result<Vec<DocumentOutcome>> {
        let t0 = Instant::now();
        let template = self.load_template()?;
        if let Some(bytes) = &template {
            Target::template(bytes)?;
        }

        let mut outcomes = Vec::new();
        let mut work = Vec::new();
        match self.translator {
            Some(translator) => {
                for key in keys {
                    match fan_out_translations(self.input, key, translator) {
                        Ok(produced) => work.extend(produced),
                        Err(e) => {
                            log::error!("{key}: {e}");
                            outcomes.push(DocumentOutcome::failed(key.as_str(), e));
                            self.record_failure();
                        }
                    }
                }
            }
            None => work.extend(keys.iter().cloned()),
        }

        let template = template.as_deref();
        let processed: Vec<DocumentOutcome> = work
            .par_iter()
            .map(|key| {
                if let Some(guard) = self.guard
                    && guard.tripped()
                {
                    return DocumentOutcome::failed(
                        key.as_str(),
                        format!("skipped, event rule {} is disabled", guard.rule().name()),
                    );
                }
                let outcome = self.process_document(key, template);
                if !outcome.is_success() {
                    self.record_failure();
                }
                outcome
            })
            .collect();
        outcomes.extend(processed);

        let failed = outcomes.iter().filter(|o| !o.is_success()).count();
        log::info!(
            "Batch: {} documents, {} failed, {:.1}ms",
            outcomes.len(),
            failed,
            t0.elapsed().as_secs_f64() * 1000.0
        );
        Ok(outcomes)
    }
}
