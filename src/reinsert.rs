use std::collections::BTreeMap;

use crate::docx::writer::Draft;
use crate::model::{Alignment, ImageAsset, Paragraph, Run, RunContent};
use crate::placeholder::{
    PlaceholderAssociation, PlaceholderToken, ReinsertReport, find_tokens,
};

pub struct Reinsertion {
    pub draft: Draft,
    pub report: ReinsertReport,
}

struct Pending {
    assets: BTreeMap<PlaceholderToken, ImageAsset>,
    report: ReinsertReport,
}

impl Pending {
    /// Split a text run around its tokens. The first occurrence of a token
    /// with a waiting asset becomes a picture run; any other occurrence stays
    /// literal text.
    fn split_run(&mut self, run: &Run, out: &mut Vec<Run>) -> bool {
        let RunContent::Text(text) = &run.content else {
            out.push(run.clone());
            return false;
        };
        let matches = find_tokens(text);
        if matches.is_empty() {
            out.push(run.clone());
            return false;
        }

        let mut inserted = false;
        let mut cursor = 0;
        let mut literal = String::new();
        let flush = |literal: &mut String, out: &mut Vec<Run>| {
            if !literal.is_empty() {
                out.push(Run {
                    content: RunContent::Text(std::mem::take(literal)),
                    ..run.clone()
                });
            }
        };

        for m in matches {
            literal.push_str(&text[cursor..m.start]);
            cursor = m.end;
            match self.assets.remove(&m.token) {
                Some(asset) => {
                    flush(&mut literal, out);
                    out.push(Run {
                        content: RunContent::Image(asset),
                        bold: false,
                        italic: false,
                        hyperlink_url: None,
                    });
                    self.report.inserted += 1;
                    inserted = true;
                }
                None => {
                    self.report.unmatched_tokens.push(m.token);
                    literal.push_str(&text[m.start..m.end]);
                }
            }
        }
        literal.push_str(&text[cursor..]);
        flush(&mut literal, out);
        inserted
    }

    fn paragraph(&mut self, paragraph: &Paragraph) -> Paragraph {
        let mut runs = Vec::with_capacity(paragraph.runs.len());
        let mut inserted = false;
        for run in &paragraph.runs {
            inserted |= self.split_run(run, &mut runs);
        }
        Paragraph {
            runs,
            alignment: if inserted {
                Some(Alignment::Center)
            } else {
                paragraph.alignment
            },
            ..paragraph.clone()
        }
    }
}

/// Put every extracted asset back at the first occurrence of its token and
/// center the paragraphs that received one. Tokens that come back
/// duplicated or invented stay as literal text and are listed in the report,
/// as are associations whose token never came back.
pub fn reinsert(draft: Draft, associations: Vec<PlaceholderAssociation>) -> Reinsertion {
    let mut pending = Pending {
        assets: associations
            .into_iter()
            .map(|a| (a.token, a.asset))
            .collect(),
        report: ReinsertReport::default(),
    };

    let paragraphs: Vec<Paragraph> = draft
        .paragraphs
        .iter()
        .map(|p| pending.paragraph(p))
        .collect();

    let Pending { assets, mut report } = pending;
    report.unconsumed = assets.into_keys().collect();

    if report.is_clean() {
        log::info!("Reinserted {} images", report.inserted);
    } else {
        log::warn!(
            "Reinserted {} images; tokens left as text: {:?}; never matched: {:?}",
            report.inserted,
            report.unmatched_tokens,
            report.unconsumed
        );
    }

    Reinsertion {
        draft: draft.with_paragraphs(paragraphs),
        report,
    }
}
