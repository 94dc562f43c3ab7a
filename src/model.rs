#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Alignment {
    Left,
    Center,
    Right,
    Justify,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ListInfo {
    pub level: u8, // 0-based nesting depth
    pub ordered: bool,
}

/// Raw bytes of one embedded graphic pulled out of a package.
#[derive(Clone, Debug, PartialEq)]
pub struct ImageAsset {
    pub number: u32,
    pub data: Vec<u8>,
    /// Package part the bytes came from, e.g. `word/media/image3.png`.
    pub part_name: String,
}

impl ImageAsset {
    /// File extension of the source part, lowercased. Falls back to sniffing
    /// the bytes when the part name has none.
    pub fn extension(&self) -> String {
        let from_name = self
            .part_name
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .filter(|ext| !ext.is_empty() && !ext.contains('/'));
        from_name
            .or_else(|| {
                image::guess_format(&self.data)
                    .ok()
                    .and_then(|f| f.extensions_str().first().map(|e| e.to_string()))
            })
            .unwrap_or_else(|| "bin".to_string())
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Drawing {
    /// Relationship id of the part behind the graphic, when it has one.
    pub rel_id: Option<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum RunContent {
    Text(String),
    /// A `w:drawing` carrying an `a:graphic`, as read from a source package.
    Drawing(Drawing),
    /// A picture to be written into an output package.
    Image(ImageAsset),
}

#[derive(Clone, Debug, PartialEq)]
pub struct Run {
    pub content: RunContent,
    pub bold: bool,
    pub italic: bool,
    pub hyperlink_url: Option<String>,
}

impl Run {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: RunContent::Text(text.into()),
            bold: false,
            italic: false,
            hyperlink_url: None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match &self.content {
            RunContent::Text(t) => Some(t),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Paragraph {
    pub style_id: Option<String>,
    pub heading_level: Option<u8>, // 1..=9
    pub list: Option<ListInfo>,
    pub alignment: Option<Alignment>,
    pub runs: Vec<Run>,
}

impl Paragraph {
    pub fn text(&self) -> String {
        self.runs.iter().filter_map(Run::as_text).collect()
    }

    pub fn has_image(&self) -> bool {
        self.runs
            .iter()
            .any(|r| matches!(r.content, RunContent::Image(_)))
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct TableCell {
    pub paragraphs: Vec<Paragraph>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct TableRow {
    pub cells: Vec<TableCell>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Table {
    pub rows: Vec<TableRow>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Block {
    Paragraph(Paragraph),
    Table(Table),
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Document {
    pub blocks: Vec<Block>,
}

impl Document {
    /// Body-level paragraphs in document order; table contents are not included.
    pub fn paragraphs(&self) -> impl Iterator<Item = &Paragraph> {
        self.blocks.iter().filter_map(|b| match b {
            Block::Paragraph(p) => Some(p),
            Block::Table(_) => None,
        })
    }

    pub fn table_count(&self) -> usize {
        self.blocks
            .iter()
            .filter(|b| matches!(b, Block::Table(_)))
            .count()
    }
}
