use std::collections::HashSet;

use crate::docx::ParsedDocx;
use crate::model::{Block, Document, ImageAsset, Paragraph, Run, RunContent};
use crate::placeholder::{PlaceholderAssociation, PlaceholderToken};

pub struct Extraction {
    /// The source document with every extracted graphic replaced by its token.
    pub document: Document,
    /// In extraction order, which is document order minus repeated rel-ids.
    pub associations: Vec<PlaceholderAssociation>,
}

struct Extractor<'a> {
    parsed: &'a ParsedDocx,
    seen_rels: HashSet<String>,
    associations: Vec<PlaceholderAssociation>,
}

impl Extractor<'_> {
    fn next_token(&self) -> PlaceholderToken {
        PlaceholderToken(self.associations.len() as u32 + 1)
    }

    fn run(&mut self, run: &Run, paragraph_index: usize) -> Run {
        let RunContent::Drawing(drawing) = &run.content else {
            return run.clone();
        };
        let Some(rel_id) = drawing.rel_id.as_deref() else {
            log::debug!("Paragraph {paragraph_index}: graphic without a relationship left in place");
            return run.clone();
        };
        if !self.seen_rels.insert(rel_id.to_string()) {
            log::debug!("Paragraph {paragraph_index}: {rel_id} already extracted, skipping");
            return run.clone();
        }
        let Some(part_name) = self.parsed.relationships.resolve_part(rel_id) else {
            log::warn!("Paragraph {paragraph_index}: {rel_id} has no internal target");
            return run.clone();
        };
        let Some(data) = self.parsed.package.part(&part_name) else {
            log::warn!("Paragraph {paragraph_index}: {rel_id} points at missing part {part_name}");
            return run.clone();
        };

        let token = self.next_token();
        self.associations.push(PlaceholderAssociation {
            token,
            asset: ImageAsset {
                number: token.number(),
                data: data.to_vec(),
                part_name,
            },
            paragraph_index,
            rel_id: rel_id.to_string(),
        });
        Run::text(token.to_string())
    }

    fn paragraph(&mut self, paragraph: &Paragraph, index: usize) -> Paragraph {
        Paragraph {
            runs: paragraph.runs.iter().map(|r| self.run(r, index)).collect(),
            ..paragraph.clone()
        }
    }
}

/// Pull every relationship-backed graphic out of the body paragraphs and put
/// a `[IMAGE_n]` token in its run. Tokens are numbered densely from 1; a
/// relationship referenced by several runs is extracted once, at its first run.
pub fn extract(parsed: &ParsedDocx) -> Extraction {
    let mut extractor = Extractor {
        parsed,
        seen_rels: HashSet::new(),
        associations: Vec::new(),
    };

    let mut paragraph_index = 0;
    let blocks = parsed
        .document
        .blocks
        .iter()
        .map(|block| match block {
            Block::Paragraph(p) => {
                let out = extractor.paragraph(p, paragraph_index);
                paragraph_index += 1;
                Block::Paragraph(out)
            }
            Block::Table(t) => Block::Table(t.clone()),
        })
        .collect();

    log::info!(
        "Extracted {} graphics from {} relationships seen",
        extractor.associations.len(),
        extractor.seen_rels.len()
    );

    Extraction {
        document: Document { blocks },
        associations: extractor.associations,
    }
}
