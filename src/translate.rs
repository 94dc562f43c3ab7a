use std::path::Path;
use std::time::Instant;

use crate::config::ClientOptions;
use crate::correct::run_piped;
use crate::docx::is_wml;
use crate::error::{Error, Result};
use crate::package::{DOCUMENT_PART, Package, escape_xml};
use crate::storage::ObjectStore;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Language {
    /// Top-level storage folder holding documents in this language.
    pub folder: &'static str,
    pub code: &'static str,
}

pub const LANGUAGES: [Language; 3] = [
    Language {
        folder: "english",
        code: "en",
    },
    Language {
        folder: "spanish",
        code: "es",
    },
    Language {
        folder: "french",
        code: "fr",
    },
];

const TRANSLATED_SUFFIX: &str = "_translated.docx";

/// The language whose folder `key` lives in.
pub fn language_of(key: &str) -> Option<&'static Language> {
    let (folder, _) = key.split_once('/')?;
    LANGUAGES.iter().find(|l| l.folder == folder)
}

/// Whether `key` names a document this stage produced.
pub fn is_translated_key(key: &str) -> bool {
    key.ends_with(TRANSLATED_SUFFIX)
}

/// `english/report.docx` translated to Spanish becomes
/// `spanish/report_english_to_spanish_translated.docx`.
pub fn translated_key(key: &str, source_folder: &str, target_folder: &str) -> String {
    let file_name = Path::new(key)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(key);
    let stem = file_name.strip_suffix(".docx").unwrap_or(file_name);
    format!("{target_folder}/{stem}_{source_folder}_to_{target_folder}{TRANSLATED_SUFFIX}")
}

pub trait Translator: Send + Sync {
    /// Translate `text` between two language codes.
    fn translate(&self, text: &str, source: &str, target: &str) -> Result<String>;
}

impl<F> Translator for F
where
    F: Fn(&str, &str, &str) -> Result<String> + Send + Sync,
{
    fn translate(&self, text: &str, source: &str, target: &str) -> Result<String> {
        self(text, source, target)
    }
}

/// Pipes each text through an external program. `{source}` and `{target}` in
/// the arguments are replaced by the language codes.
#[derive(Clone, Debug)]
pub struct CommandTranslator {
    program: String,
    args: Vec<String>,
    options: ClientOptions,
}

impl CommandTranslator {
    pub fn from_command_line(command: &[String], options: ClientOptions) -> Result<Self> {
        let (program, args) = command
            .split_first()
            .ok_or_else(|| Error::Config("empty translator command".into()))?;
        Ok(Self {
            program: program.clone(),
            args: args.to_vec(),
            options,
        })
    }
}

impl Translator for CommandTranslator {
    fn translate(&self, text: &str, source: &str, target: &str) -> Result<String> {
        let args: Vec<String> = self
            .args
            .iter()
            .map(|a| a.replace("{source}", source).replace("{target}", target))
            .collect();
        let output = self.options.retry(
            "translation call",
            |_| true,
            || {
                run_piped(&self.program, &args, text, self.options.call_timeout())
                    .map_err(|e| Error::Translation(format!("{}: {e}", self.program)))
            },
        )?;
        Ok(output.trim_end_matches(['\r', '\n']).to_string())
    }
}

/// Paragraphs that get translated: those directly in the body and those in
/// table cells, nested tables included, in document order.
fn collect_paragraphs<'a>(parent: roxmltree::Node<'a, 'a>, out: &mut Vec<roxmltree::Node<'a, 'a>>) {
    for child in parent.children() {
        if is_wml(child, "p") {
            out.push(child);
        } else if is_wml(child, "tbl") {
            for row in child.children().filter(|n| is_wml(*n, "tr")) {
                for cell in row.children().filter(|n| is_wml(*n, "tc")) {
                    collect_paragraphs(cell, out);
                }
            }
        }
    }
}

fn paragraph_text(paragraph: roxmltree::Node) -> String {
    let mut text = String::new();
    for node in paragraph.descendants() {
        let in_text_box = node
            .ancestors()
            .take_while(|a| *a != paragraph)
            .any(|a| is_wml(a, "txbxContent"));
        if in_text_box {
            continue;
        }
        if is_wml(node, "t") {
            text.push_str(node.text().unwrap_or(""));
        } else if is_wml(node, "tab") && node.parent().is_some_and(|p| is_wml(p, "r")) {
            text.push('\t');
        }
    }
    text
}

/// End of the start tag beginning at `start` (one past its `>`), skipping
/// `>` inside quoted attribute values.
fn start_tag_end(xml: &str, start: usize) -> usize {
    let mut quote = None;
    for (i, b) in xml.as_bytes()[start..].iter().enumerate() {
        match (quote, b) {
            (None, b'"' | b'\'') => quote = Some(*b),
            (Some(q), _) if q == *b => quote = None,
            (None, b'>') => return start + i + 1,
            _ => {}
        }
    }
    xml.len()
}

/// The paragraph rewritten as its own start tag, its `w:pPr` and one run
/// holding `text`.
fn replacement_xml(xml: &str, paragraph: roxmltree::Node, text: &str) -> String {
    let range = paragraph.range();
    let pfx = match paragraph.tag_name().namespace().and_then(|ns| paragraph.lookup_prefix(ns)) {
        Some(p) if !p.is_empty() => format!("{p}:"),
        _ => String::new(),
    };

    let mut out = String::new();
    out.push_str(&xml[range.start..start_tag_end(xml, range.start)]);
    if let Some(ppr) = paragraph.children().find(|n| is_wml(*n, "pPr")) {
        out.push_str(&xml[ppr.range()]);
    }
    out.push_str(&format!("<{pfx}r>"));
    for (n, line) in text.split('\n').enumerate() {
        if n > 0 {
            out.push_str(&format!("<{pfx}br/>"));
        }
        for (m, piece) in line.split('\t').enumerate() {
            if m > 0 {
                out.push_str(&format!("<{pfx}tab/>"));
            }
            if !piece.is_empty() {
                out.push_str(&format!(
                    "<{pfx}t xml:space=\"preserve\">{}</{pfx}t>",
                    escape_xml(piece)
                ));
            }
        }
    }
    out.push_str(&format!("</{pfx}r></{pfx}p>"));
    out
}

/// Translate every non-empty body and table-cell paragraph of a document.
pub fn translate_document(
    bytes: &[u8],
    source: &str,
    target: &str,
    translator: &dyn Translator,
) -> Result<Vec<u8>> {
    let t0 = Instant::now();
    let mut package = Package::from_bytes(bytes)?;
    let xml = package
        .part_text(DOCUMENT_PART)
        .ok_or_else(|| Error::InvalidDocx(format!("missing {DOCUMENT_PART}")))?;

    let rewritten = {
        let doc = roxmltree::Document::parse(&xml)?;
        let body = doc
            .root_element()
            .children()
            .find(|n| is_wml(*n, "body"))
            .ok_or_else(|| Error::InvalidDocx("document has no w:body".into()))?;
        let mut paragraphs = Vec::new();
        collect_paragraphs(body, &mut paragraphs);

        let mut out = String::with_capacity(xml.len());
        let mut cursor = 0;
        let mut translated = 0usize;
        for paragraph in paragraphs {
            let text = paragraph_text(paragraph);
            if text.trim().is_empty() {
                continue;
            }
            let result = translator.translate(&text, source, target)?;
            let range = paragraph.range();
            out.push_str(&xml[cursor..range.start]);
            out.push_str(&replacement_xml(&xml, paragraph, &result));
            cursor = range.end;
            translated += 1;
        }
        out.push_str(&xml[cursor..]);
        log::info!(
            "Translated {translated} paragraphs {source} -> {target} in {:.1}ms",
            t0.elapsed().as_secs_f64() * 1000.0
        );
        out
    };

    package.set_part(DOCUMENT_PART, rewritten.into_bytes());
    package.to_bytes()
}

/// Store one translated copy of `key` per other language. Returns every key
/// that should go on to correction, `key` itself first. Documents this stage
/// produced are passed through untouched.
pub fn fan_out_translations(
    store: &dyn ObjectStore,
    key: &str,
    translator: &dyn Translator,
) -> Result<Vec<String>> {
    if is_translated_key(key) {
        return Ok(vec![key.to_string()]);
    }
    let source = language_of(key).ok_or_else(|| {
        Error::Translation(format!("cannot determine the source language of {key}"))
    })?;
    let bytes = store.get(key)?;

    let mut keys = vec![key.to_string()];
    for target in LANGUAGES.iter().filter(|l| l.folder != source.folder) {
        let translated = translate_document(&bytes, source.code, target.code, translator)?;
        let out_key = translated_key(key, source.folder, target.folder);
        store.put(&out_key, &translated)?;
        log::info!("Stored translation {out_key}");
        keys.push(out_key);
    }
    Ok(keys)
}
