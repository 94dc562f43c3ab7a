#![allow(dead_code)]

use std::io::{Cursor, Read, Write};

use zip::ZipArchive;
use zip::write::SimpleFileOptions;

pub const W_NS: &str = "http://schemas.openxmlformats.org/wordprocessingml/2006/main";
const R_NS: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";
const IMAGE_REL: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/image";
const HYPERLINK_REL: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/hyperlink";
const HEADER_REL: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/header";
const FOOTER_REL: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/footer";
const STYLES_REL: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles";

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// A small PNG of the given size.
pub fn png(width: u32, height: u32) -> Vec<u8> {
    let img = image::RgbImage::from_pixel(width, height, image::Rgb([200, 40, 40]));
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, image::ImageFormat::Png).unwrap();
    out.into_inner()
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

pub fn run(text: &str) -> String {
    format!(r#"<w:r><w:t xml:space="preserve">{}</w:t></w:r>"#, escape(text))
}

pub fn bold(text: &str) -> String {
    format!(
        r#"<w:r><w:rPr><w:b/></w:rPr><w:t xml:space="preserve">{}</w:t></w:r>"#,
        escape(text)
    )
}

pub fn italic(text: &str) -> String {
    format!(
        r#"<w:r><w:rPr><w:i/></w:rPr><w:t xml:space="preserve">{}</w:t></w:r>"#,
        escape(text)
    )
}

/// An inline picture run pointing at `rel_id`.
pub fn picture(rel_id: &str) -> String {
    format!(
        concat!(
            r#"<w:r><w:drawing><wp:inline><wp:extent cx="952500" cy="952500"/>"#,
            r#"<wp:docPr id="1" name="Picture"/>"#,
            r#"<a:graphic><a:graphicData uri="http://schemas.openxmlformats.org/drawingml/2006/picture">"#,
            r#"<pic:pic><pic:blipFill><a:blip r:embed="{}"/></pic:blipFill></pic:pic>"#,
            r#"</a:graphicData></a:graphic></wp:inline></w:drawing></w:r>"#,
        ),
        rel_id
    )
}

pub fn para(runs: &str) -> String {
    format!("<w:p>{runs}</w:p>")
}

pub fn styled(style_id: &str, runs: &str) -> String {
    format!(r#"<w:p><w:pPr><w:pStyle w:val="{style_id}"/></w:pPr>{runs}</w:p>"#)
}

pub fn list_item(num_id: u32, level: u8, runs: &str) -> String {
    format!(
        r#"<w:p><w:pPr><w:numPr><w:ilvl w:val="{level}"/><w:numId w:val="{num_id}"/></w:numPr></w:pPr>{runs}</w:p>"#
    )
}

pub fn table(cells: &[&str]) -> String {
    let cells: String = cells
        .iter()
        .map(|c| format!("<w:tc>{}</w:tc>", para(&run(c))))
        .collect();
    format!("<w:tbl><w:tr>{cells}</w:tr></w:tbl>")
}

/// Builds a DOCX package in memory, part by part.
#[derive(Default)]
pub struct DocxBuilder {
    body: String,
    rels: Vec<(String, String, String, bool)>,
    parts: Vec<(String, Vec<u8>)>,
    styles: Option<String>,
    sect_pr: Option<String>,
}

impl DocxBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn block(&mut self, xml: &str) -> &mut Self {
        self.body.push_str(xml);
        self
    }

    fn add_rel(&mut self, rel_type: &str, target: &str, external: bool) -> String {
        let id = format!("rId{}", self.rels.len() + 1);
        self.rels
            .push((id.clone(), rel_type.into(), target.into(), external));
        id
    }

    /// Store `data` under word/media and return its relationship id.
    pub fn image(&mut self, file_name: &str, data: Vec<u8>) -> String {
        self.parts.push((format!("word/media/{file_name}"), data));
        self.add_rel(IMAGE_REL, &format!("media/{file_name}"), false)
    }

    pub fn hyperlink(&mut self, url: &str) -> String {
        self.add_rel(HYPERLINK_REL, url, true)
    }

    pub fn styles(&mut self, xml: &str) -> &mut Self {
        self.styles = Some(xml.to_string());
        self
    }

    /// Add a header and a footer part and reference both from the final sectPr.
    pub fn header_footer(&mut self, header_text: &str, footer_text: &str) -> &mut Self {
        let header = format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><w:hdr xmlns:w="{W_NS}"><w:p><w:r><w:t>{header_text}</w:t></w:r></w:p></w:hdr>"#
        );
        let footer = format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><w:ftr xmlns:w="{W_NS}"><w:p><w:r><w:t>{footer_text}</w:t></w:r></w:p></w:ftr>"#
        );
        self.parts.push(("word/header1.xml".into(), header.into_bytes()));
        self.parts.push(("word/footer1.xml".into(), footer.into_bytes()));
        let h = self.add_rel(HEADER_REL, "header1.xml", false);
        let f = self.add_rel(FOOTER_REL, "footer1.xml", false);
        self.sect_pr = Some(format!(
            r#"<w:sectPr><w:headerReference w:type="default" r:id="{h}"/><w:footerReference w:type="default" r:id="{f}"/><w:pgSz w:w="12240" w:h="15840"/><w:pgMar w:top="1440" w:right="1440" w:bottom="1440" w:left="1440" w:header="720" w:footer="720" w:gutter="0"/></w:sectPr>"#
        ));
        self
    }

    pub fn build(&mut self) -> Vec<u8> {
        let mut content_types = String::from(concat!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
            r#"<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">"#,
            r#"<Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>"#,
            r#"<Default Extension="xml" ContentType="application/xml"/>"#,
            r#"<Default Extension="png" ContentType="image/png"/>"#,
            r#"<Override PartName="/word/document.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/>"#,
        ));
        if self.styles.is_some() {
            content_types.push_str(r#"<Override PartName="/word/styles.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.styles+xml"/>"#);
        }
        content_types.push_str("</Types>");

        if self.styles.is_some() && !self.rels.iter().any(|r| r.1 == STYLES_REL) {
            self.add_rel(STYLES_REL, "styles.xml", false);
        }

        let mut doc_rels = String::from(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">"#,
        );
        for (id, rel_type, target, external) in &self.rels {
            let mode = if *external {
                r#" TargetMode="External""#
            } else {
                ""
            };
            doc_rels.push_str(&format!(
                r#"<Relationship Id="{id}" Type="{rel_type}" Target="{}"{mode}/>"#,
                escape(target)
            ));
        }
        doc_rels.push_str("</Relationships>");

        let document = format!(
            concat!(
                r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
                r#"<w:document xmlns:w="{w}" xmlns:r="{r}" "#,
                r#"xmlns:wp="http://schemas.openxmlformats.org/drawingml/2006/wordprocessingDrawing" "#,
                r#"xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" "#,
                r#"xmlns:pic="http://schemas.openxmlformats.org/drawingml/2006/picture">"#,
                "<w:body>{body}{sect}</w:body></w:document>"
            ),
            w = W_NS,
            r = R_NS,
            body = self.body,
            sect = self
                .sect_pr
                .as_deref()
                .unwrap_or(r#"<w:sectPr><w:pgSz w:w="12240" w:h="15840"/></w:sectPr>"#),
        );

        let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default();
        let mut add = |name: &str, data: &[u8]| {
            zip.start_file(name, options).unwrap();
            zip.write_all(data).unwrap();
        };
        add("[Content_Types].xml", content_types.as_bytes());
        add(
            "_rels/.rels",
            br#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="word/document.xml"/></Relationships>"#,
        );
        add("word/document.xml", document.as_bytes());
        add("word/_rels/document.xml.rels", doc_rels.as_bytes());
        if let Some(styles) = &self.styles {
            add("word/styles.xml", styles.as_bytes());
        }
        for (name, data) in &self.parts {
            add(name, data);
        }
        zip.finish().unwrap().into_inner()
    }
}

/// Raw bytes of one part of a package.
pub fn read_part(docx: &[u8], name: &str) -> Option<Vec<u8>> {
    let mut archive = ZipArchive::new(Cursor::new(docx)).ok()?;
    let mut file = archive.by_name(name).ok()?;
    let mut out = Vec::new();
    file.read_to_end(&mut out).ok()?;
    Some(out)
}

pub fn read_text(docx: &[u8], name: &str) -> String {
    String::from_utf8(read_part(docx, name).unwrap_or_default()).unwrap()
}

pub fn part_names(docx: &[u8]) -> Vec<String> {
    let archive = ZipArchive::new(Cursor::new(docx)).unwrap();
    archive.file_names().map(String::from).collect()
}

/// Text of each body paragraph of a package, in order.
pub fn body_paragraph_texts(docx: &[u8]) -> Vec<String> {
    let xml = read_text(docx, "word/document.xml");
    let doc = roxmltree::Document::parse(&xml).unwrap();
    let body = doc
        .root_element()
        .children()
        .find(|n| n.tag_name().name() == "body")
        .unwrap();
    body.children()
        .filter(|n| n.tag_name().name() == "p" && n.tag_name().namespace() == Some(W_NS))
        .map(|p| {
            p.descendants()
                .filter(|n| n.tag_name().name() == "t" && n.tag_name().namespace() == Some(W_NS))
                .filter_map(|n| n.text())
                .collect()
        })
        .collect()
}

/// Number of `a:blip` pictures in each body paragraph.
pub fn pictures_per_paragraph(docx: &[u8]) -> Vec<usize> {
    let xml = read_text(docx, "word/document.xml");
    let doc = roxmltree::Document::parse(&xml).unwrap();
    let body = doc
        .root_element()
        .children()
        .find(|n| n.tag_name().name() == "body")
        .unwrap();
    body.children()
        .filter(|n| n.tag_name().name() == "p" && n.tag_name().namespace() == Some(W_NS))
        .map(|p| p.descendants().filter(|n| n.tag_name().name() == "blip").count())
        .collect()
}
