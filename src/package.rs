use std::io::{Cursor, Read, Write};

use crate::error::{Error, Result};

pub const REL_NS: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";
const PKG_REL_NS: &str = "http://schemas.openxmlformats.org/package/2006/relationships";
pub const IMAGE_REL_TYPE: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/image";
pub const HYPERLINK_REL_TYPE: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/hyperlink";

pub const CONTENT_TYPES_PART: &str = "[Content_Types].xml";
pub const DOCUMENT_PART: &str = "word/document.xml";

pub(crate) fn escape_xml(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}

/// An in-memory DOCX package. Part order is kept so a rewritten package
/// lists its entries the way the source did.
#[derive(Clone, Debug, Default)]
pub struct Package {
    parts: Vec<(String, Vec<u8>)>,
}

impl Package {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let mut zip = zip::ZipArchive::new(Cursor::new(bytes))
            .map_err(|_| Error::InvalidDocx("file is not a ZIP archive".into()))?;
        let mut parts = Vec::with_capacity(zip.len());
        for i in 0..zip.len() {
            let mut entry = zip.by_index(i)?;
            if entry.is_dir() {
                continue;
            }
            let name = entry.name().to_string();
            let mut data = Vec::new();
            entry.read_to_end(&mut data)?;
            parts.push((name, data));
        }
        Ok(Self { parts })
    }

    pub fn part(&self, name: &str) -> Option<&[u8]> {
        self.parts
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, data)| data.as_slice())
    }

    pub fn part_text(&self, name: &str) -> Option<String> {
        self.part(name)
            .and_then(|data| String::from_utf8(data.to_vec()).ok())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.parts.iter().any(|(n, _)| n == name)
    }

    pub fn part_names(&self) -> impl Iterator<Item = &str> {
        self.parts.iter().map(|(n, _)| n.as_str())
    }

    /// Replace the part if it exists, append it otherwise.
    pub fn set_part(&mut self, name: &str, data: Vec<u8>) {
        match self.parts.iter_mut().find(|(n, _)| n == name) {
            Some(slot) => slot.1 = data,
            None => self.parts.push((name.to_string(), data)),
        }
    }

    /// A part name under `dir` built from `stem` + a counter + `.ext` that
    /// no existing part uses.
    pub fn unused_part_name(&self, dir: &str, stem: &str, ext: &str) -> String {
        let mut n = 1u32;
        loop {
            let candidate = format!("{dir}/{stem}{n}.{ext}");
            if !self.contains(&candidate) {
                return candidate;
            }
            n += 1;
        }
    }

    /// Register a `<Default Extension=.. ContentType=..>` entry unless the
    /// extension is already mapped.
    pub fn ensure_default_content_type(&mut self, ext: &str, content_type: &str) -> Result<()> {
        let xml = self.part_text(CONTENT_TYPES_PART).ok_or_else(|| {
            Error::InvalidDocx(format!("missing {CONTENT_TYPES_PART}"))
        })?;
        {
            let doc = roxmltree::Document::parse(&xml)?;
            let known = doc.root_element().children().any(|n| {
                n.tag_name().name() == "Default"
                    && n
                        .attribute("Extension")
                        .is_some_and(|e| e.eq_ignore_ascii_case(ext))
            });
            if known {
                return Ok(());
            }
        }
        let entry = format!(
            "<Default Extension=\"{}\" ContentType=\"{}\"/>",
            escape_xml(ext),
            escape_xml(content_type)
        );
        let updated = match xml.rfind("</Types>") {
            Some(pos) => format!("{}{}{}", &xml[..pos], entry, &xml[pos..]),
            None => {
                return Err(Error::InvalidDocx(format!(
                    "{CONTENT_TYPES_PART} has no closing Types element"
                )));
            }
        };
        self.set_part(CONTENT_TYPES_PART, updated.into_bytes());
        Ok(())
    }

    /// Serialize to ZIP bytes. Media is STORED, everything else DEFLATED,
    /// which is how Word lays packages out.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
        let deflated = zip::write::SimpleFileOptions::default()
            .compression_method(zip::CompressionMethod::Deflated);
        let stored = zip::write::SimpleFileOptions::default()
            .compression_method(zip::CompressionMethod::Stored);
        for (name, data) in &self.parts {
            let opts = if name.starts_with("word/media/") {
                stored
            } else {
                deflated
            };
            zip.start_file(name.as_str(), opts)?;
            zip.write_all(data)?;
        }
        Ok(zip.finish()?.into_inner())
    }
}

/// `word/document.xml` → `word/_rels/document.xml.rels`
pub fn rels_path_for(part_path: &str) -> String {
    match part_path.rsplit_once('/') {
        Some((dir, file)) => format!("{dir}/_rels/{file}.rels"),
        None => format!("_rels/{part_path}.rels"),
    }
}

/// Resolve a relationship target relative to the directory of its source part.
fn resolve_target(source_part: &str, target: &str) -> String {
    if let Some(absolute) = target.strip_prefix('/') {
        return absolute.to_string();
    }
    let mut segments: Vec<&str> = match source_part.rsplit_once('/') {
        Some((dir, _)) => dir.split('/').collect(),
        None => Vec::new(),
    };
    for seg in target.split('/') {
        match seg {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            s => segments.push(s),
        }
    }
    segments.join("/")
}

#[derive(Clone, Debug, PartialEq)]
pub struct Relationship {
    pub id: String,
    pub rel_type: String,
    pub target: String,
    pub external: bool,
}

/// The relationships of one source part.
#[derive(Clone, Debug)]
pub struct Relationships {
    source_part: String,
    entries: Vec<Relationship>,
}

impl Relationships {
    pub fn empty(source_part: &str) -> Self {
        Self {
            source_part: source_part.to_string(),
            entries: Vec::new(),
        }
    }

    pub fn parse(source_part: &str, xml_content: &str) -> Self {
        let mut rels = Self::empty(source_part);
        let Ok(xml) = roxmltree::Document::parse(xml_content) else {
            return rels;
        };
        for node in xml.root_element().children() {
            if node.tag_name().name() == "Relationship"
                && let (Some(id), Some(target)) = (node.attribute("Id"), node.attribute("Target"))
            {
                rels.entries.push(Relationship {
                    id: id.to_string(),
                    rel_type: node.attribute("Type").unwrap_or_default().to_string(),
                    target: target.to_string(),
                    external: node.attribute("TargetMode") == Some("External"),
                });
            }
        }
        rels
    }

    /// Load relationships for a part like "word/header1.xml" → "word/_rels/header1.xml.rels"
    pub fn for_part(package: &Package, part_path: &str) -> Self {
        match package.part_text(&rels_path_for(part_path)) {
            Some(xml) => Self::parse(part_path, &xml),
            None => Self::empty(part_path),
        }
    }

    pub fn get(&self, id: &str) -> Option<&Relationship> {
        self.entries.iter().find(|r| r.id == id)
    }

    pub fn target(&self, id: &str) -> Option<&str> {
        self.get(id).map(|r| r.target.as_str())
    }

    /// Package part name an internal relationship points at.
    pub fn resolve_part(&self, id: &str) -> Option<String> {
        let rel = self.get(id).filter(|r| !r.external)?;
        Some(resolve_target(&self.source_part, &rel.target))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Add a relationship under a fresh `rIdN`, numbered past every id
    /// already present so nothing in the part is shadowed.
    pub fn add(&mut self, rel_type: &str, target: &str, external: bool) -> String {
        let mut next = self
            .entries
            .iter()
            .filter_map(|r| r.id.strip_prefix("rId"))
            .filter_map(|n| n.parse::<u32>().ok())
            .max()
            .unwrap_or(0)
            + 1;
        while self.get(&format!("rId{next}")).is_some() {
            next += 1;
        }
        let id = format!("rId{next}");
        self.entries.push(Relationship {
            id: id.clone(),
            rel_type: rel_type.to_string(),
            target: target.to_string(),
            external,
        });
        id
    }

    pub fn to_xml(&self) -> String {
        let mut xml = String::from(
            "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\n",
        );
        xml.push_str(&format!("<Relationships xmlns=\"{PKG_REL_NS}\">"));
        for rel in &self.entries {
            xml.push_str(&format!(
                "<Relationship Id=\"{}\" Type=\"{}\" Target=\"{}\"{}/>",
                escape_xml(&rel.id),
                escape_xml(&rel.rel_type),
                escape_xml(&rel.target),
                if rel.external {
                    " TargetMode=\"External\""
                } else {
                    ""
                }
            ));
        }
        xml.push_str("</Relationships>");
        xml
    }

    pub fn write_into(&self, package: &mut Package) {
        package.set_part(&rels_path_for(&self.source_part), self.to_xml().into_bytes());
    }
}
