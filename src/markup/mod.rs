mod inject;
mod project;

pub use inject::{inject, parse};
pub use project::{project, render, to_elements};

/// A span of text carrying only its own flags.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Inline {
    pub text: String,
    pub bold: bool,
    pub italic: bool,
    pub link: Option<String>,
}

impl Inline {
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    fn same_style(&self, other: &Inline) -> bool {
        self.bold == other.bold && self.italic == other.italic && self.link == other.link
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ListItem {
    pub content: Vec<Inline>,
    /// Lists nested inside this item, in order.
    pub children: Vec<List>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct List {
    pub ordered: bool,
    pub items: Vec<ListItem>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Element {
    Paragraph(Vec<Inline>),
    Heading { level: u8, content: Vec<Inline> },
    List(List),
    /// A bare `<strong>`/`<b>` outside any paragraph. The content does not
    /// repeat the element's own flag.
    Bold(Vec<Inline>),
    /// A bare `<em>`/`<i>` outside any paragraph.
    Italic(Vec<Inline>),
    /// A bare `<a>` outside any paragraph.
    Hyperlink { href: String, content: Vec<Inline> },
    Unsupported { tag: String },
}

/// Drop empty spans and merge neighbours with identical flags.
pub(crate) fn normalize_inlines(inlines: Vec<Inline>) -> Vec<Inline> {
    let mut out: Vec<Inline> = Vec::with_capacity(inlines.len());
    for inline in inlines {
        if inline.text.is_empty() {
            continue;
        }
        match out.last_mut() {
            Some(last) if last.same_style(&inline) => last.text.push_str(&inline.text),
            _ => out.push(inline),
        }
    }
    out
}
