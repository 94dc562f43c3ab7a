use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Html, Node};

use crate::docx::writer::{Draft, Target};
use crate::model::{ListInfo, Paragraph, Run, RunContent};

use super::{Element, Inline, List, ListItem, normalize_inlines};

/// Stands in for `<br>` until layout newlines have been folded away.
const LINE_BREAK: char = '\u{2028}';

// A newline in a text node is markup layout, not content. Together with the
// indentation around it, it is dropped at the edges of a block and next to a
// `<br>`, and folded to one space anywhere else.
static LEADING_LAYOUT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[ \t]*\r?\n[ \t\r\n]*").expect("layout regex"));
static TRAILING_LAYOUT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[ \t\r\n]*\n[ \t]*$").expect("layout regex"));
static LAYOUT_AFTER_BREAK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new("\u{2028}[ \t]*\r?\n[ \t\r\n]*").expect("layout regex"));
static LAYOUT_BEFORE_BREAK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new("[ \t\r\n]*\n[ \t]*\u{2028}").expect("layout regex"));
static LAYOUT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[ \t]*\r?\n[ \t\r\n]*").expect("layout regex"));

#[derive(Clone, Copy, Default)]
struct Flags {
    bold: bool,
    italic: bool,
}

fn push_text(out: &mut Vec<Inline>, text: &str, flags: Flags, link: Option<&str>) {
    out.push(Inline {
        text: text.to_string(),
        bold: flags.bold,
        italic: flags.italic,
        link: link.map(String::from),
    });
}

fn collect_inlines(
    element: ElementRef,
    flags: Flags,
    link: Option<&str>,
    out: &mut Vec<Inline>,
) {
    for child in element.children() {
        match child.value() {
            Node::Text(text) => push_text(out, text, flags, link),
            Node::Element(el) => {
                let Some(child_ref) = ElementRef::wrap(child) else {
                    continue;
                };
                match el.name() {
                    "strong" | "b" => collect_inlines(
                        child_ref,
                        Flags {
                            bold: true,
                            ..flags
                        },
                        link,
                        out,
                    ),
                    "em" | "i" => collect_inlines(
                        child_ref,
                        Flags {
                            italic: true,
                            ..flags
                        },
                        link,
                        out,
                    ),
                    "a" => {
                        let href = el.attr("href").filter(|h| !h.trim().is_empty());
                        collect_inlines(child_ref, flags, href.or(link), out);
                    }
                    "br" => push_text(out, &LINE_BREAK.to_string(), flags, link),
                    // Nested lists are walked by the list parser.
                    "ul" | "ol" => {}
                    _ => collect_inlines(child_ref, flags, link, out),
                }
            }
            _ => {}
        }
    }
}

/// Strip an edge pattern from the first spans it reaches, passing over spans
/// that held nothing else.
fn strip_edge<'a>(spans: impl Iterator<Item = &'a mut Inline>, pattern: &Regex) {
    for inline in spans {
        inline.text = pattern.replace(&inline.text, "").into_owned();
        if !inline.text.is_empty() {
            break;
        }
    }
}

/// Fold markup layout out of collected spans. Spaces and tabs that are not
/// next to a newline are content and stay as written.
fn settle_layout(inlines: Vec<Inline>) -> Vec<Inline> {
    let mut inlines = normalize_inlines(inlines);
    strip_edge(inlines.iter_mut(), &LEADING_LAYOUT);
    strip_edge(inlines.iter_mut().rev(), &TRAILING_LAYOUT);
    for inline in &mut inlines {
        let text = LAYOUT_AFTER_BREAK.replace_all(&inline.text, LINE_BREAK.to_string());
        let text = LAYOUT_BEFORE_BREAK.replace_all(&text, LINE_BREAK.to_string());
        inline.text = LAYOUT
            .replace_all(&text, " ")
            .replace(LINE_BREAK, "\n");
    }
    normalize_inlines(inlines)
}

fn block_inlines(element: ElementRef) -> Vec<Inline> {
    let mut raw = Vec::new();
    collect_inlines(element, Flags::default(), None, &mut raw);
    settle_layout(raw)
}

fn parse_list(element: ElementRef, ordered: bool) -> List {
    let items = element
        .children()
        .filter_map(ElementRef::wrap)
        .filter(|li| li.value().name() == "li")
        .map(|li| ListItem {
            content: block_inlines(li),
            children: li
                .children()
                .filter_map(ElementRef::wrap)
                .filter_map(|child| match child.value().name() {
                    "ul" => Some(parse_list(child, false)),
                    "ol" => Some(parse_list(child, true)),
                    _ => None,
                })
                .collect(),
        })
        .collect();
    List { ordered, items }
}

fn heading_level(tag: &str) -> Option<u8> {
    let level = tag.strip_prefix('h')?.parse::<u8>().ok()?;
    (1..=9).contains(&level).then_some(level)
}

fn classify(element: ElementRef) -> Element {
    let tag = element.value().name();
    if let Some(level) = heading_level(tag) {
        return Element::Heading {
            level,
            content: block_inlines(element),
        };
    }
    match tag {
        "p" => Element::Paragraph(block_inlines(element)),
        "ul" => Element::List(parse_list(element, false)),
        "ol" => Element::List(parse_list(element, true)),
        "strong" | "b" => Element::Bold(block_inlines(element)),
        "em" | "i" => Element::Italic(block_inlines(element)),
        "a" => match element.value().attr("href") {
            Some(href) if !href.trim().is_empty() => Element::Hyperlink {
                href: href.to_string(),
                content: block_inlines(element),
            },
            _ => Element::Paragraph(block_inlines(element)),
        },
        other => Element::Unsupported {
            tag: other.to_string(),
        },
    }
}

/// Parse corrected markup into elements. Stray top-level text (a model that
/// dropped the tags around a sentence) becomes a paragraph.
pub fn parse(markup: &str) -> Vec<Element> {
    let fragment = Html::parse_fragment(markup);
    let root = fragment.root_element();
    let mut elements = Vec::new();
    for child in root.children() {
        match child.value() {
            Node::Element(_) => {
                if let Some(element) = ElementRef::wrap(child) {
                    elements.push(classify(element));
                }
            }
            Node::Text(text) if !text.trim().is_empty() => {
                log::debug!("Wrapping stray top-level text in a paragraph");
                elements.push(Element::Paragraph(settle_layout(vec![Inline::plain(
                    text.to_string(),
                )])));
            }
            _ => {}
        }
    }
    elements
}

fn inline_runs(inlines: &[Inline]) -> Vec<Run> {
    inlines
        .iter()
        .map(|inline| Run {
            content: RunContent::Text(inline.text.clone()),
            bold: inline.bold,
            italic: inline.italic,
            hyperlink_url: inline.link.clone(),
        })
        .collect()
}

/// Runs of a bare top-level inline element, with the element's own style
/// laid over whatever its content carries.
fn restyle(inlines: &[Inline], apply: impl Fn(&mut Run)) -> Vec<Run> {
    let mut runs = inline_runs(inlines);
    runs.iter_mut().for_each(apply);
    runs
}

fn styled_paragraph(style_id: String, runs: Vec<Run>) -> Paragraph {
    Paragraph {
        style_id: Some(style_id),
        runs,
        ..Paragraph::default()
    }
}

/// Depth-first, pre-order: an item, then everything nested under it, then its
/// next sibling.
fn push_list(list: &List, level: u8, target: &Target, out: &mut Vec<Paragraph>) {
    let style = target.list_style(list.ordered, level);
    for item in &list.items {
        out.push(Paragraph {
            list: Some(ListInfo {
                level,
                ordered: list.ordered,
            }),
            ..styled_paragraph(style.clone(), inline_runs(&item.content))
        });
        for child in &item.children {
            push_list(child, level.saturating_add(1), target, out);
        }
    }
}

/// Turn markup into paragraphs styled from `target`. Tags outside the
/// supported set are dropped.
pub fn inject(markup: &str, target: Target) -> Draft {
    let mut paragraphs = Vec::new();
    let mut dropped = 0usize;

    for element in parse(markup) {
        match element {
            Element::Paragraph(inlines) => paragraphs.push(Paragraph {
                runs: inline_runs(&inlines),
                ..Paragraph::default()
            }),
            Element::Heading { level, content } => paragraphs.push(Paragraph {
                heading_level: Some(level),
                ..styled_paragraph(target.heading_style(level), inline_runs(&content))
            }),
            Element::List(list) => push_list(&list, 0, &target, &mut paragraphs),
            Element::Bold(content) => paragraphs.push(Paragraph {
                runs: restyle(&content, |run| run.bold = true),
                ..Paragraph::default()
            }),
            Element::Italic(content) => paragraphs.push(Paragraph {
                runs: restyle(&content, |run| run.italic = true),
                ..Paragraph::default()
            }),
            Element::Hyperlink { href, content } => paragraphs.push(Paragraph {
                runs: restyle(&content, |run| {
                    run.hyperlink_url.get_or_insert_with(|| href.clone());
                }),
                ..Paragraph::default()
            }),
            Element::Unsupported { tag } => {
                log::debug!("Dropping unsupported <{tag}> element");
                dropped += 1;
            }
        }
    }

    log::info!(
        "Injected {} paragraphs ({} unsupported elements dropped)",
        paragraphs.len(),
        dropped
    );
    Draft::new(target, paragraphs)
}
