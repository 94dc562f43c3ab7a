use std::collections::HashMap;
use std::io::Cursor;

use crate::error::{Error, Result};
use crate::model::{Alignment, ImageAsset, Paragraph, Run, RunContent};
use crate::package::{
    CONTENT_TYPES_PART, DOCUMENT_PART, HYPERLINK_REL_TYPE, IMAGE_REL_TYPE, Package, REL_NS,
    Relationships, escape_xml,
};

use super::{StylesInfo, WML_NS, is_wml, parse_styles, wml};

const WPD_NS: &str = "http://schemas.openxmlformats.org/drawingml/2006/wordprocessingDrawing";
const PIC_NS: &str = "http://schemas.openxmlformats.org/drawingml/2006/picture";
const DML_NS: &str = super::DML_NS;

const EMU_PER_PIXEL: u64 = 9525; // at 96 dpi
const MAX_IMAGE_WIDTH_EMU: u64 = 5_486_400; // 6 inches of text width
const FALLBACK_IMAGE_EMU: u64 = 1_828_800; // 2 inches

pub const HYPERLINK_COLOR: &str = "0000FF";

/// A package whose body has been emptied and is ready to receive paragraphs.
///
/// Everything outside the body is carried over untouched, including the final
/// `w:sectPr` with its header and footer references.
pub struct Target {
    package: Package,
    prefix: String,
    suffix: String,
    styles: StylesInfo,
}

impl Target {
    /// Open a pre-styled template and clear its body.
    pub fn template(bytes: &[u8]) -> Result<Self> {
        Self::from_package(Package::from_bytes(bytes)?)
    }

    pub fn from_package(package: Package) -> Result<Self> {
        let xml = package.part_text(DOCUMENT_PART).ok_or_else(|| {
            Error::InvalidDocx("template is missing word/document.xml".into())
        })?;
        let (prefix, suffix) = split_body(&xml)?;
        let styles = parse_styles(&package);
        Ok(Self {
            package,
            prefix,
            suffix,
            styles,
        })
    }

    /// A fresh package carrying heading and list styles of its own.
    pub fn blank() -> Self {
        let package = blank_package();
        let styles = parse_styles(&package);
        Self {
            package,
            prefix: BLANK_DOCUMENT_PREFIX.to_string(),
            suffix: BLANK_DOCUMENT_SUFFIX.to_string(),
            styles,
        }
    }

    pub fn package(&self) -> &Package {
        &self.package
    }

    fn style_id(&self, name: &str, fallback: String) -> String {
        self.styles
            .paragraph_style_id_by_name(name)
            .map(String::from)
            .unwrap_or_else(|| {
                log::debug!("Target has no style named {name:?}, using id {fallback:?}");
                fallback
            })
    }

    /// Style id for a heading of `level` (1..=9).
    pub fn heading_style(&self, level: u8) -> String {
        self.style_id(&format!("heading {level}"), format!("Heading{level}"))
    }

    /// `List Bullet` / `List Number` at level 0, `List Bullet 2` at level 1, and so on.
    pub fn list_style(&self, ordered: bool, level: u8) -> String {
        let base = if ordered { "List Number" } else { "List Bullet" };
        let (name, id) = if level == 0 {
            (base.to_string(), base.replace(' ', ""))
        } else {
            (
                format!("{base} {}", level + 1),
                format!("{}{}", base.replace(' ', ""), level + 1),
            )
        };
        self.style_id(&name, id)
    }
}

/// Cut `word/document.xml` around the body content. The returned prefix ends
/// with the body start tag; the suffix starts with the body's final
/// `w:sectPr` (if any) and runs to the end of the part.
fn split_body(xml: &str) -> Result<(String, String)> {
    let doc = roxmltree::Document::parse(xml)?;
    let root = doc.root_element();
    if root.lookup_prefix(WML_NS) != Some("w") {
        return Err(Error::InvalidDocx(
            "document.xml does not bind the w: prefix to WordprocessingML".into(),
        ));
    }
    let body = wml(root, "body").ok_or_else(|| Error::InvalidDocx("missing w:body".into()))?;
    let range = body.range();
    let body_text = &xml[range.clone()];

    if body_text.ends_with("/>") {
        let open = format!("{}>", body_text.trim_end_matches("/>").trim_end());
        return Ok((
            format!("{}{}", &xml[..range.start], open),
            format!("</w:body>{}", &xml[range.end..]),
        ));
    }

    let open_end = body_text
        .find('>')
        .map(|i| range.start + i + 1)
        .ok_or_else(|| Error::InvalidDocx("unterminated w:body".into()))?;
    let close_start = body_text
        .rfind("</")
        .map(|i| range.start + i)
        .ok_or_else(|| Error::InvalidDocx("unterminated w:body".into()))?;
    let sect_pr = body
        .children()
        .filter(|n| is_wml(*n, "sectPr"))
        .last()
        .map(|n| &xml[n.range()])
        .unwrap_or("");

    Ok((
        xml[..open_end].to_string(),
        format!("{}{}", sect_pr, &xml[close_start..]),
    ))
}

/// Injected paragraphs waiting to be written into their target.
pub struct Draft {
    target: Target,
    pub paragraphs: Vec<Paragraph>,
}

impl Draft {
    pub fn new(target: Target, paragraphs: Vec<Paragraph>) -> Self {
        Self { target, paragraphs }
    }

    pub fn target(&self) -> &Target {
        &self.target
    }

    pub fn with_paragraphs(self, paragraphs: Vec<Paragraph>) -> Self {
        Self {
            target: self.target,
            paragraphs,
        }
    }

    pub fn into_package(self) -> Result<Package> {
        let Draft { target, paragraphs } = self;
        let Target {
            mut package,
            prefix,
            suffix,
            ..
        } = target;

        let mut rels = Relationships::for_part(&package, DOCUMENT_PART);
        let next_drawing_id = max_drawing_id(&package) + 1;
        let mut body = String::new();
        {
            let mut ctx = WriteContext {
                package: &mut package,
                rels: &mut rels,
                links: HashMap::new(),
                next_drawing_id,
            };
            for paragraph in &paragraphs {
                body.push_str(&paragraph_xml(paragraph, &mut ctx)?);
            }
        }
        rels.write_into(&mut package);
        package.set_part(
            DOCUMENT_PART,
            format!("{prefix}{body}{suffix}").into_bytes(),
        );
        Ok(package)
    }

    pub fn finish(self) -> Result<Vec<u8>> {
        self.into_package()?.to_bytes()
    }
}

/// Highest `wp:docPr/@id` in the package's WordprocessingML parts. Ids are
/// shared by the body, headers and footers, so new pictures number past them.
fn max_drawing_id(package: &Package) -> u32 {
    package
        .part_names()
        .filter(|name| name.starts_with("word/") && name.ends_with(".xml"))
        .filter_map(|name| package.part_text(name))
        .filter_map(|xml| {
            let doc = roxmltree::Document::parse(&xml).ok()?;
            doc.descendants()
                .filter(|n| n.tag_name().name() == "docPr" && n.tag_name().namespace() == Some(WPD_NS))
                .filter_map(|n| n.attribute("id")?.parse::<u32>().ok())
                .max()
        })
        .max()
        .unwrap_or(0)
}

struct WriteContext<'a> {
    package: &'a mut Package,
    rels: &'a mut Relationships,
    links: HashMap<String, String>,
    next_drawing_id: u32,
}

impl WriteContext<'_> {
    fn hyperlink_rel(&mut self, url: &str) -> String {
        if let Some(id) = self.links.get(url) {
            return id.clone();
        }
        let id = self.rels.add(HYPERLINK_REL_TYPE, url, true);
        self.links.insert(url.to_string(), id.clone());
        id
    }

    fn image_rel(&mut self, asset: &ImageAsset) -> Result<String> {
        let ext = asset.extension();
        let part_name = self
            .package
            .unused_part_name("word/media", "proof_image", &ext);
        self.package.set_part(&part_name, asset.data.clone());
        self.package
            .ensure_default_content_type(&ext, content_type_for(&ext))?;
        let target = part_name
            .strip_prefix("word/")
            .unwrap_or(&part_name)
            .to_string();
        Ok(self.rels.add(IMAGE_REL_TYPE, &target, false))
    }
}

fn content_type_for(ext: &str) -> &'static str {
    match ext {
        "png" => "image/png",
        "jpg" | "jpeg" | "jpe" => "image/jpeg",
        "gif" => "image/gif",
        "bmp" => "image/bmp",
        "tif" | "tiff" => "image/tiff",
        "emf" => "image/x-emf",
        "wmf" => "image/x-wmf",
        "svg" => "image/svg+xml",
        "xml" => "application/xml",
        _ => "application/octet-stream",
    }
}

/// Display extent in EMU: pixel size at 96 dpi, shrunk to the text width.
pub(crate) fn image_extent(data: &[u8]) -> (u64, u64) {
    let dims = image::ImageReader::new(Cursor::new(data))
        .with_guessed_format()
        .ok()
        .and_then(|reader| reader.into_dimensions().ok())
        .filter(|(w, h)| *w > 0 && *h > 0);
    let Some((w, h)) = dims else {
        return (FALLBACK_IMAGE_EMU, FALLBACK_IMAGE_EMU);
    };
    let cx = w as u64 * EMU_PER_PIXEL;
    let cy = h as u64 * EMU_PER_PIXEL;
    if cx <= MAX_IMAGE_WIDTH_EMU {
        (cx, cy)
    } else {
        (MAX_IMAGE_WIDTH_EMU, cy * MAX_IMAGE_WIDTH_EMU / cx)
    }
}

fn alignment_val(alignment: Alignment) -> &'static str {
    match alignment {
        Alignment::Left => "left",
        Alignment::Center => "center",
        Alignment::Right => "right",
        Alignment::Justify => "both",
    }
}

fn paragraph_xml(paragraph: &Paragraph, ctx: &mut WriteContext) -> Result<String> {
    let mut xml = String::from("<w:p>");
    if paragraph.style_id.is_some() || paragraph.alignment.is_some() {
        xml.push_str("<w:pPr>");
        if let Some(style) = &paragraph.style_id {
            xml.push_str(&format!("<w:pStyle w:val=\"{}\"/>", escape_xml(style)));
        }
        if let Some(alignment) = paragraph.alignment {
            xml.push_str(&format!("<w:jc w:val=\"{}\"/>", alignment_val(alignment)));
        }
        xml.push_str("</w:pPr>");
    }

    // Consecutive runs pointing at the same URL share one w:hyperlink.
    let mut i = 0;
    let runs = &paragraph.runs;
    while i < runs.len() {
        match &runs[i].hyperlink_url {
            Some(url) => {
                let mut j = i;
                while j < runs.len() && runs[j].hyperlink_url.as_deref() == Some(url.as_str()) {
                    j += 1;
                }
                match url.strip_prefix('#') {
                    Some(anchor) => xml.push_str(&format!(
                        "<w:hyperlink w:anchor=\"{}\" w:history=\"1\">",
                        escape_xml(anchor)
                    )),
                    None => {
                        let rel_id = ctx.hyperlink_rel(url);
                        xml.push_str(&format!(
                            "<w:hyperlink xmlns:r=\"{REL_NS}\" r:id=\"{rel_id}\" w:history=\"1\">"
                        ));
                    }
                }
                for run in &runs[i..j] {
                    xml.push_str(&run_xml(run, ctx)?);
                }
                xml.push_str("</w:hyperlink>");
                i = j;
            }
            None => {
                xml.push_str(&run_xml(&runs[i], ctx)?);
                i += 1;
            }
        }
    }
    xml.push_str("</w:p>");
    Ok(xml)
}

fn run_properties(run: &Run) -> String {
    let mut rpr = String::new();
    if run.bold {
        rpr.push_str("<w:b/>");
    }
    if run.italic {
        rpr.push_str("<w:i/>");
    }
    if run.hyperlink_url.is_some() {
        rpr.push_str(&format!(
            "<w:color w:val=\"{HYPERLINK_COLOR}\"/><w:u w:val=\"single\"/>"
        ));
    }
    if rpr.is_empty() {
        rpr
    } else {
        format!("<w:rPr>{rpr}</w:rPr>")
    }
}

fn run_xml(run: &Run, ctx: &mut WriteContext) -> Result<String> {
    let body = match &run.content {
        RunContent::Text(text) => text_xml(text),
        RunContent::Image(asset) => {
            let rel_id = ctx.image_rel(asset)?;
            let id = ctx.next_drawing_id;
            ctx.next_drawing_id += 1;
            drawing_xml(asset, &rel_id, id)
        }
        RunContent::Drawing(drawing) => {
            log::debug!(
                "Dropping unresolved source drawing {:?} from output",
                drawing.rel_id
            );
            return Ok(String::new());
        }
    };
    Ok(format!("<w:r>{}{}</w:r>", run_properties(run), body))
}

fn text_xml(text: &str) -> String {
    let mut xml = String::new();
    for (n, line) in text.split('\n').enumerate() {
        if n > 0 {
            xml.push_str("<w:br/>");
        }
        for (m, segment) in line.split('\t').enumerate() {
            if m > 0 {
                xml.push_str("<w:tab/>");
            }
            if !segment.is_empty() {
                xml.push_str(&format!(
                    "<w:t xml:space=\"preserve\">{}</w:t>",
                    escape_xml(segment)
                ));
            }
        }
    }
    xml
}

fn drawing_xml(asset: &ImageAsset, rel_id: &str, id: u32) -> String {
    let (cx, cy) = image_extent(&asset.data);
    let name = format!("Picture {id}");
    format!(
        concat!(
            "<w:drawing><wp:inline xmlns:wp=\"{wp}\" distT=\"0\" distB=\"0\" distL=\"0\" distR=\"0\">",
            "<wp:extent cx=\"{cx}\" cy=\"{cy}\"/>",
            "<wp:docPr id=\"{id}\" name=\"{name}\"/>",
            "<wp:cNvGraphicFramePr><a:graphicFrameLocks xmlns:a=\"{a}\" noChangeAspect=\"1\"/></wp:cNvGraphicFramePr>",
            "<a:graphic xmlns:a=\"{a}\"><a:graphicData uri=\"{pic}\">",
            "<pic:pic xmlns:pic=\"{pic}\">",
            "<pic:nvPicPr><pic:cNvPr id=\"{id}\" name=\"{name}\"/><pic:cNvPicPr/></pic:nvPicPr>",
            "<pic:blipFill><a:blip xmlns:r=\"{r}\" r:embed=\"{rel_id}\"/><a:stretch><a:fillRect/></a:stretch></pic:blipFill>",
            "<pic:spPr><a:xfrm><a:off x=\"0\" y=\"0\"/><a:ext cx=\"{cx}\" cy=\"{cy}\"/></a:xfrm>",
            "<a:prstGeom prst=\"rect\"><a:avLst/></a:prstGeom></pic:spPr>",
            "</pic:pic></a:graphicData></a:graphic></wp:inline></w:drawing>"
        ),
        wp = WPD_NS,
        a = DML_NS,
        pic = PIC_NS,
        r = REL_NS,
        cx = cx,
        cy = cy,
        id = id,
        name = name,
        rel_id = rel_id,
    )
}

const BLANK_DOCUMENT_PREFIX: &str = concat!(
    "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\n",
    "<w:document xmlns:w=\"http://schemas.openxmlformats.org/wordprocessingml/2006/main\" ",
    "xmlns:r=\"http://schemas.openxmlformats.org/officeDocument/2006/relationships\"><w:body>"
);

const BLANK_DOCUMENT_SUFFIX: &str = concat!(
    "<w:sectPr><w:pgSz w:w=\"12240\" w:h=\"15840\"/>",
    "<w:pgMar w:top=\"1440\" w:right=\"1440\" w:bottom=\"1440\" w:left=\"1440\" ",
    "w:header=\"720\" w:footer=\"720\" w:gutter=\"0\"/></w:sectPr></w:body></w:document>"
);

const BLANK_CONTENT_TYPES: &str = concat!(
    "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\n",
    "<Types xmlns=\"http://schemas.openxmlformats.org/package/2006/content-types\">",
    "<Default Extension=\"rels\" ContentType=\"application/vnd.openxmlformats-package.relationships+xml\"/>",
    "<Default Extension=\"xml\" ContentType=\"application/xml\"/>",
    "<Override PartName=\"/word/document.xml\" ContentType=\"application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml\"/>",
    "<Override PartName=\"/word/styles.xml\" ContentType=\"application/vnd.openxmlformats-officedocument.wordprocessingml.styles+xml\"/>",
    "<Override PartName=\"/word/numbering.xml\" ContentType=\"application/vnd.openxmlformats-officedocument.wordprocessingml.numbering+xml\"/>",
    "</Types>"
);

const BLANK_PACKAGE_RELS: &str = concat!(
    "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\n",
    "<Relationships xmlns=\"http://schemas.openxmlformats.org/package/2006/relationships\">",
    "<Relationship Id=\"rId1\" Type=\"http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument\" Target=\"word/document.xml\"/>",
    "</Relationships>"
);

const BLANK_DOCUMENT_RELS: &str = concat!(
    "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\n",
    "<Relationships xmlns=\"http://schemas.openxmlformats.org/package/2006/relationships\">",
    "<Relationship Id=\"rId1\" Type=\"http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles\" Target=\"styles.xml\"/>",
    "<Relationship Id=\"rId2\" Type=\"http://schemas.openxmlformats.org/officeDocument/2006/relationships/numbering\" Target=\"numbering.xml\"/>",
    "</Relationships>"
);

const BULLET_NUM_ID: u8 = 1;
const DECIMAL_NUM_ID: u8 = 2;

fn blank_styles_xml() -> String {
    let mut xml = format!(
        concat!(
            "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\n",
            "<w:styles xmlns:w=\"{}\">",
            "<w:docDefaults><w:rPrDefault><w:rPr><w:sz w:val=\"22\"/></w:rPr></w:rPrDefault></w:docDefaults>",
            "<w:style w:type=\"paragraph\" w:default=\"1\" w:styleId=\"Normal\"><w:name w:val=\"Normal\"/>",
            "<w:pPr><w:spacing w:after=\"160\"/></w:pPr></w:style>"
        ),
        WML_NS
    );
    for level in 1..=9u8 {
        let size = 32u8.saturating_sub(2 * (level - 1)).max(22);
        xml.push_str(&format!(
            concat!(
                "<w:style w:type=\"paragraph\" w:styleId=\"Heading{l}\"><w:name w:val=\"heading {l}\"/>",
                "<w:basedOn w:val=\"Normal\"/><w:next w:val=\"Normal\"/>",
                "<w:pPr><w:keepNext/><w:spacing w:before=\"240\" w:after=\"80\"/><w:outlineLvl w:val=\"{o}\"/></w:pPr>",
                "<w:rPr><w:b/><w:sz w:val=\"{s}\"/></w:rPr></w:style>"
            ),
            l = level,
            o = level - 1,
            s = size,
        ));
    }
    for (base, id_base, num_id) in [
        ("List Bullet", "ListBullet", BULLET_NUM_ID),
        ("List Number", "ListNumber", DECIMAL_NUM_ID),
    ] {
        for level in 0..9u8 {
            let (name, id) = if level == 0 {
                (base.to_string(), id_base.to_string())
            } else {
                (format!("{base} {}", level + 1), format!("{id_base}{}", level + 1))
            };
            xml.push_str(&format!(
                concat!(
                    "<w:style w:type=\"paragraph\" w:styleId=\"{id}\"><w:name w:val=\"{name}\"/>",
                    "<w:basedOn w:val=\"Normal\"/>",
                    "<w:pPr><w:numPr><w:ilvl w:val=\"{lvl}\"/><w:numId w:val=\"{num}\"/></w:numPr>",
                    "<w:contextualSpacing/></w:pPr></w:style>"
                ),
                id = id,
                name = name,
                lvl = level,
                num = num_id,
            ));
        }
    }
    xml.push_str("</w:styles>");
    xml
}

fn blank_numbering_xml() -> String {
    let mut xml = format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\n<w:numbering xmlns:w=\"{WML_NS}\">"
    );
    for (abstract_id, fmt) in [(0u8, "bullet"), (1u8, "decimal")] {
        xml.push_str(&format!("<w:abstractNum w:abstractNumId=\"{abstract_id}\">"));
        for level in 0..9u32 {
            let text = if fmt == "bullet" {
                "\u{2022}".to_string()
            } else {
                format!("%{}.", level + 1)
            };
            let indent = 720 * (level + 1);
            xml.push_str(&format!(
                concat!(
                    "<w:lvl w:ilvl=\"{lvl}\"><w:start w:val=\"1\"/><w:numFmt w:val=\"{fmt}\"/>",
                    "<w:lvlText w:val=\"{text}\"/><w:lvlJc w:val=\"left\"/>",
                    "<w:pPr><w:ind w:left=\"{ind}\" w:hanging=\"360\"/></w:pPr></w:lvl>"
                ),
                lvl = level,
                fmt = fmt,
                text = text,
                ind = indent,
            ));
        }
        xml.push_str("</w:abstractNum>");
    }
    xml.push_str(&format!(
        "<w:num w:numId=\"{BULLET_NUM_ID}\"><w:abstractNumId w:val=\"0\"/></w:num>\
         <w:num w:numId=\"{DECIMAL_NUM_ID}\"><w:abstractNumId w:val=\"1\"/></w:num>"
    ));
    xml.push_str("</w:numbering>");
    xml
}

fn blank_package() -> Package {
    let mut package = Package::default();
    package.set_part(CONTENT_TYPES_PART, BLANK_CONTENT_TYPES.as_bytes().to_vec());
    package.set_part("_rels/.rels", BLANK_PACKAGE_RELS.as_bytes().to_vec());
    package.set_part(
        DOCUMENT_PART,
        format!("{BLANK_DOCUMENT_PREFIX}{BLANK_DOCUMENT_SUFFIX}").into_bytes(),
    );
    package.set_part(
        "word/_rels/document.xml.rels",
        BLANK_DOCUMENT_RELS.as_bytes().to_vec(),
    );
    package.set_part("word/styles.xml", blank_styles_xml().into_bytes());
    package.set_part("word/numbering.xml", blank_numbering_xml().into_bytes());
    package
}
