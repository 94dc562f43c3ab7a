use crate::model::{Block, Document, ListInfo, Paragraph, RunContent};

use super::{Element, Inline, List, ListItem, normalize_inlines};

fn paragraph_inlines(paragraph: &Paragraph) -> Vec<Inline> {
    let inlines = paragraph
        .runs
        .iter()
        .filter_map(|run| match &run.content {
            RunContent::Text(text) => Some(Inline {
                text: text.clone(),
                bold: run.bold,
                italic: run.italic,
                link: run.hyperlink_url.clone(),
            }),
            // Graphics that were not extracted have no text form.
            RunContent::Drawing(_) | RunContent::Image(_) => None,
        })
        .collect();
    normalize_inlines(inlines)
}

fn is_blank(inlines: &[Inline]) -> bool {
    inlines.iter().all(|i| i.text.trim().is_empty())
}

/// Nest a flat run of list paragraphs by level. Each call consumes at least
/// one item; a change of list kind at the same level starts a new list.
fn build_list(items: &[(ListInfo, Vec<Inline>)], pos: &mut usize, level: u8) -> List {
    let mut list = List::default();
    let mut kind: Option<bool> = None;
    while let Some((info, content)) = items.get(*pos) {
        if info.level < level {
            break;
        }
        if info.level == level {
            match kind {
                Some(k) if k != info.ordered => break,
                Some(_) => {}
                None => kind = Some(info.ordered),
            }
            list.items.push(ListItem {
                content: content.clone(),
                children: Vec::new(),
            });
            *pos += 1;
        } else {
            let nested = build_list(items, pos, level + 1);
            match list.items.last_mut() {
                Some(item) => item.children.push(nested),
                None => list.items.push(ListItem {
                    content: Vec::new(),
                    children: vec![nested],
                }),
            }
        }
    }
    list.ordered = kind.unwrap_or(false);
    list
}

fn flush_list(pending: &mut Vec<(ListInfo, Vec<Inline>)>, out: &mut Vec<Element>) {
    let mut pos = 0;
    while pos < pending.len() {
        out.push(Element::List(build_list(pending, &mut pos, 0)));
    }
    pending.clear();
}

/// The supported structure of a document as markup elements. Tables are left
/// out, and so are paragraphs with no text.
pub fn to_elements(document: &Document) -> Vec<Element> {
    let mut elements = Vec::new();
    let mut pending_list: Vec<(ListInfo, Vec<Inline>)> = Vec::new();
    let mut skipped_tables = 0;

    for block in &document.blocks {
        let paragraph = match block {
            Block::Paragraph(p) => p,
            Block::Table(_) => {
                skipped_tables += 1;
                continue;
            }
        };
        let inlines = paragraph_inlines(paragraph);
        if is_blank(&inlines) {
            continue;
        }
        if let Some(info) = paragraph.list {
            pending_list.push((info, inlines));
            continue;
        }
        flush_list(&mut pending_list, &mut elements);
        match paragraph.heading_level {
            Some(level) => elements.push(Element::Heading {
                level,
                content: inlines,
            }),
            None => elements.push(Element::Paragraph(inlines)),
        }
    }
    flush_list(&mut pending_list, &mut elements);

    if skipped_tables > 0 {
        log::warn!("{skipped_tables} tables left out of the markup projection");
    }
    elements
}

fn escape_html(text: &str, out: &mut String, in_attribute: bool) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' if in_attribute => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
}

fn open_link(href: &str, out: &mut String) {
    out.push_str("<a href=\"");
    escape_html(href, out, true);
    out.push_str("\">");
}

fn render_text(text: &str, out: &mut String) {
    for (n, line) in text.split('\n').enumerate() {
        if n > 0 {
            out.push_str("<br />");
        }
        escape_html(line, out, false);
    }
}

fn render_inlines(inlines: &[Inline], out: &mut String) {
    for inline in inlines {
        if let Some(href) = &inline.link {
            open_link(href, out);
        }
        if inline.bold {
            out.push_str("<strong>");
        }
        if inline.italic {
            out.push_str("<em>");
        }
        render_text(&inline.text, out);
        if inline.italic {
            out.push_str("</em>");
        }
        if inline.bold {
            out.push_str("</strong>");
        }
        if inline.link.is_some() {
            out.push_str("</a>");
        }
    }
}

fn render_list(list: &List, out: &mut String) {
    let tag = if list.ordered { "ol" } else { "ul" };
    out.push_str(&format!("<{tag}>"));
    for item in &list.items {
        out.push_str("<li>");
        render_inlines(&item.content, out);
        for child in &item.children {
            render_list(child, out);
        }
        out.push_str("</li>");
    }
    out.push_str(&format!("</{tag}>"));
}

/// Render elements one per line.
pub fn render(elements: &[Element]) -> String {
    let mut out = String::new();
    for element in elements {
        let start = out.len();
        match element {
            Element::Paragraph(inlines) => {
                out.push_str("<p>");
                render_inlines(inlines, &mut out);
                out.push_str("</p>");
            }
            Element::Heading { level, content } => {
                out.push_str(&format!("<h{level}>"));
                render_inlines(content, &mut out);
                out.push_str(&format!("</h{level}>"));
            }
            Element::List(list) => render_list(list, &mut out),
            Element::Bold(content) => {
                out.push_str("<strong>");
                render_inlines(content, &mut out);
                out.push_str("</strong>");
            }
            Element::Italic(content) => {
                out.push_str("<em>");
                render_inlines(content, &mut out);
                out.push_str("</em>");
            }
            Element::Hyperlink { href, content } => {
                open_link(href, &mut out);
                render_inlines(content, &mut out);
                out.push_str("</a>");
            }
            Element::Unsupported { .. } => {}
        }
        if out.len() > start {
            out.push('\n');
        }
    }
    out
}

/// Project a (placeholder-bearing) document to markup.
pub fn project(document: &Document) -> String {
    render(&to_elements(document))
}
