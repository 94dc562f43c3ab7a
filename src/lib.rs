pub mod config;
pub mod correct;
mod docx;
mod error;
mod extract;
pub mod markup;
pub mod model;
mod package;
mod placeholder;
pub mod pipeline;
mod reinsert;
pub mod report;
pub mod storage;
pub mod translate;
pub mod watchdog;

pub use docx::writer::{Draft, HYPERLINK_COLOR, Target};
pub use docx::{ParsedDocx, parse_bytes, parse_package};
pub use error::{Error, Result};
pub use extract::{Extraction, extract};
pub use markup::{inject, project};
pub use package::{Package, Relationship, Relationships};
pub use pipeline::{CorrectedDocument, correct_document};
pub use placeholder::{
    PlaceholderAssociation, PlaceholderToken, ReinsertReport, TokenMatch, find_tokens,
};
pub use reinsert::{Reinsertion, reinsert};

use std::path::Path;

use correct::Corrector;

/// Correct a document on disk and write the result next to it under `output`.
pub fn correct_docx_file(
    input: &Path,
    output: &Path,
    template: Option<&Path>,
    corrector: &dyn Corrector,
) -> Result<CorrectedDocument> {
    let bytes = std::fs::read(input)?;
    let template = template.map(std::fs::read).transpose()?;
    let corrected = correct_document(&bytes, template.as_deref(), corrector)?;
    std::fs::write(output, &corrected.bytes)?;
    Ok(corrected)
}
