mod styles;
pub mod writer;

use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::model::{
    Alignment, Block, Document, Drawing, ListInfo, Paragraph, Run, RunContent, Table, TableCell,
    TableRow,
};
use crate::package::{DOCUMENT_PART, Package, REL_NS, Relationships};

pub(crate) use styles::{StylesInfo, parse_styles};

pub(crate) const WML_NS: &str = "http://schemas.openxmlformats.org/wordprocessingml/2006/main";
pub(crate) const DML_NS: &str = "http://schemas.openxmlformats.org/drawingml/2006/main";
const MC_NS: &str = "http://schemas.openxmlformats.org/markup-compatibility/2006";

/// Parse a WML boolean toggle element (e.g., w:b, w:i).
/// Present with no val or val != "0"/"false" means true.
pub(crate) fn wml_bool(parent: roxmltree::Node, name: &str) -> Option<bool> {
    wml(parent, name).map(|n| {
        n.attribute((WML_NS, "val"))
            .is_none_or(|v| v != "0" && v != "false")
    })
}

pub(crate) fn wml<'a>(node: roxmltree::Node<'a, 'a>, name: &str) -> Option<roxmltree::Node<'a, 'a>> {
    node.children()
        .find(|n| n.tag_name().name() == name && n.tag_name().namespace() == Some(WML_NS))
}

pub(crate) fn wml_attr<'a>(node: roxmltree::Node<'a, 'a>, child: &str) -> Option<&'a str> {
    wml(node, child).and_then(|n| n.attribute((WML_NS, "val")))
}

pub(crate) fn is_wml(node: roxmltree::Node, name: &str) -> bool {
    node.tag_name().name() == name && node.tag_name().namespace() == Some(WML_NS)
}

pub(crate) fn parse_alignment(val: &str) -> Alignment {
    match val {
        "center" => Alignment::Center,
        "right" | "end" => Alignment::Right,
        "both" | "distribute" => Alignment::Justify,
        _ => Alignment::Left,
    }
}

/// numId → (ilvl → numFmt), flattened through the abstract numbering definitions.
pub(crate) struct NumberingInfo {
    abstract_nums: HashMap<String, HashMap<u8, String>>,
    num_to_abstract: HashMap<String, String>,
}

impl NumberingInfo {
    /// Bullet formats render as unordered lists, everything else as ordered.
    /// An unknown numId or level counts as unordered.
    pub(crate) fn is_ordered(&self, num_id: &str, ilvl: u8) -> bool {
        self.num_to_abstract
            .get(num_id)
            .and_then(|abs| self.abstract_nums.get(abs))
            .and_then(|levels| levels.get(&ilvl))
            .is_some_and(|fmt| fmt != "bullet" && fmt != "none")
    }
}

pub(crate) fn parse_numbering(package: &Package) -> NumberingInfo {
    let mut abstract_nums = HashMap::new();
    let mut num_to_abstract = HashMap::new();

    let Some(xml_content) = package.part_text("word/numbering.xml") else {
        return NumberingInfo {
            abstract_nums,
            num_to_abstract,
        };
    };
    let Ok(xml) = roxmltree::Document::parse(&xml_content) else {
        log::warn!("word/numbering.xml is not well-formed, lists will read as unordered");
        return NumberingInfo {
            abstract_nums,
            num_to_abstract,
        };
    };

    for node in xml.root_element().children() {
        if is_wml(node, "abstractNum") {
            let Some(abs_id) = node.attribute((WML_NS, "abstractNumId")) else {
                continue;
            };
            let levels: HashMap<u8, String> = node
                .children()
                .filter(|n| is_wml(*n, "lvl"))
                .filter_map(|lvl| {
                    let ilvl = lvl.attribute((WML_NS, "ilvl"))?.parse::<u8>().ok()?;
                    let fmt = wml_attr(lvl, "numFmt").unwrap_or("decimal");
                    Some((ilvl, fmt.to_string()))
                })
                .collect();
            abstract_nums.insert(abs_id.to_string(), levels);
        } else if is_wml(node, "num")
            && let (Some(num_id), Some(abs_id)) = (
                node.attribute((WML_NS, "numId")),
                wml_attr(node, "abstractNumId"),
            )
        {
            num_to_abstract.insert(num_id.to_string(), abs_id.to_string());
        }
    }

    NumberingInfo {
        abstract_nums,
        num_to_abstract,
    }
}

/// A parsed source package: the semantic body plus what is needed to
/// resolve its relationships later.
pub struct ParsedDocx {
    pub package: Package,
    pub document: Document,
    pub relationships: Relationships,
}

struct ReadContext<'a> {
    styles: &'a StylesInfo,
    numbering: &'a NumberingInfo,
    rels: &'a Relationships,
}

/// Flatten SDT wrappers: descend into w:sdtContent and collect effective children.
fn collect_block_nodes<'a>(parent: roxmltree::Node<'a, 'a>) -> Vec<roxmltree::Node<'a, 'a>> {
    let mut nodes = Vec::new();
    for child in parent.children() {
        if is_wml(child, "sdt") {
            if let Some(content) = wml(child, "sdtContent") {
                nodes.extend(collect_block_nodes(content));
            }
        } else {
            nodes.push(child);
        }
    }
    nodes
}

fn collect_run_nodes<'a>(
    parent: roxmltree::Node<'a, 'a>,
    rels: &Relationships,
    link: Option<&str>,
    out: &mut Vec<(roxmltree::Node<'a, 'a>, Option<String>)>,
) {
    for child in parent.children() {
        if child.tag_name().namespace() != Some(WML_NS) {
            continue;
        }
        match child.tag_name().name() {
            "r" => out.push((child, link.map(String::from))),
            "hyperlink" => {
                let url = child
                    .attribute((REL_NS, "id"))
                    .and_then(|rid| rels.target(rid))
                    .map(String::from)
                    .or_else(|| child.attribute((WML_NS, "anchor")).map(|a| format!("#{a}")));
                collect_run_nodes(child, rels, url.as_deref(), out);
            }
            "sdt" => {
                if let Some(content) = wml(child, "sdtContent") {
                    collect_run_nodes(content, rels, link, out);
                }
            }
            "ins" | "smartTag" | "customXml" | "fldSimple" => {
                collect_run_nodes(child, rels, link, out);
            }
            _ => {}
        }
    }
}

/// The `w:drawing` behind a run child, looking through `mc:AlternateContent`.
fn drawing_node<'a>(child: roxmltree::Node<'a, 'a>) -> Option<roxmltree::Node<'a, 'a>> {
    if is_wml(child, "drawing") {
        return Some(child);
    }
    if child.tag_name().name() == "AlternateContent" && child.tag_name().namespace() == Some(MC_NS)
    {
        return child.descendants().find(|n| is_wml(*n, "drawing"));
    }
    None
}

/// Relationship id of the part behind a graphic: the picture's `a:blip`
/// embed when there is one, else the first relationship-namespaced attribute
/// inside the graphic (charts, diagrams).
pub(crate) fn graphic_rel_id<'a>(graphic: roxmltree::Node<'a, 'a>) -> Option<&'a str> {
    let blip = graphic
        .descendants()
        .find(|n| n.tag_name().name() == "blip" && n.tag_name().namespace() == Some(DML_NS))
        .and_then(|n| n.attribute((REL_NS, "embed")));
    blip.or_else(|| {
        graphic.descendants().find_map(|n| {
            n.attributes()
                .find(|a| a.namespace() == Some(REL_NS))
                .map(|a| a.value())
        })
    })
}

fn find_graphic<'a>(drawing: roxmltree::Node<'a, 'a>) -> Option<roxmltree::Node<'a, 'a>> {
    drawing
        .descendants()
        .find(|n| n.tag_name().name() == "graphic" && n.tag_name().namespace() == Some(DML_NS))
}

fn parse_runs(para_node: roxmltree::Node, ctx: &ReadContext) -> Vec<Run> {
    let mut run_nodes = Vec::new();
    collect_run_nodes(para_node, ctx.rels, None, &mut run_nodes);

    let mut runs = Vec::new();
    for (run_node, hyperlink_url) in run_nodes {
        let rpr = wml(run_node, "rPr");
        let char_style = rpr
            .and_then(|n| wml_attr(n, "rStyle"))
            .and_then(|id| ctx.styles.character_styles.get(id));
        let bold = rpr
            .and_then(|n| wml_bool(n, "b"))
            .or_else(|| char_style.and_then(|cs| cs.bold))
            .unwrap_or(false);
        let italic = rpr
            .and_then(|n| wml_bool(n, "i"))
            .or_else(|| char_style.and_then(|cs| cs.italic))
            .unwrap_or(false);

        let make_run = |content: RunContent| Run {
            content,
            bold,
            italic,
            hyperlink_url: hyperlink_url.clone(),
        };

        let mut pending_text = String::new();
        for child in run_node.children() {
            if let Some(drawing) = drawing_node(child) {
                let Some(graphic) = find_graphic(drawing) else {
                    continue;
                };
                if !pending_text.is_empty() {
                    runs.push(make_run(RunContent::Text(std::mem::take(&mut pending_text))));
                }
                runs.push(make_run(RunContent::Drawing(Drawing {
                    rel_id: graphic_rel_id(graphic).map(String::from),
                })));
                continue;
            }
            if child.tag_name().namespace() != Some(WML_NS) {
                continue;
            }
            match child.tag_name().name() {
                "t" => pending_text.push_str(child.text().unwrap_or("")),
                "tab" | "ptab" => pending_text.push('\t'),
                "br" | "cr" => pending_text.push('\n'),
                "noBreakHyphen" => pending_text.push('\u{2011}'),
                "softHyphen" => pending_text.push('\u{00AD}'),
                "sym" => {
                    if let Some(c) = child
                        .attribute((WML_NS, "char"))
                        .and_then(|v| u32::from_str_radix(v, 16).ok())
                        .and_then(char::from_u32)
                    {
                        pending_text.push(c);
                    }
                }
                _ => {}
            }
        }
        if !pending_text.is_empty() {
            runs.push(make_run(RunContent::Text(pending_text)));
        }
    }
    runs
}

/// `ListBullet` → level 0, `ListNumber3` → level 2.
fn list_from_style_id(style_id: &str) -> Option<ListInfo> {
    let (rest, ordered) = if let Some(rest) = style_id.strip_prefix("ListBullet") {
        (rest, false)
    } else if let Some(rest) = style_id.strip_prefix("ListNumber") {
        (rest, true)
    } else {
        return None;
    };
    let level = if rest.is_empty() {
        0
    } else {
        rest.parse::<u8>().ok().filter(|n| *n >= 1)? - 1
    };
    Some(ListInfo { level, ordered })
}

fn parse_paragraph(node: roxmltree::Node, ctx: &ReadContext) -> Paragraph {
    let ppr = wml(node, "pPr");
    let style_id = ppr.and_then(|p| wml_attr(p, "pStyle")).map(String::from);
    let heading_level = style_id
        .as_deref()
        .and_then(|id| ctx.styles.heading_level(id));

    let num_pr = ppr.and_then(|p| wml(p, "numPr"));
    let list = num_pr
        .and_then(|np| {
            let num_id = wml_attr(np, "numId").filter(|id| *id != "0")?;
            let level = wml_attr(np, "ilvl")
                .and_then(|v| v.parse::<u8>().ok())
                .unwrap_or(0);
            Some(ListInfo {
                level,
                ordered: ctx.numbering.is_ordered(num_id, level),
            })
        })
        .or_else(|| style_id.as_deref().and_then(list_from_style_id))
        .filter(|_| heading_level.is_none());

    let alignment = ppr.and_then(|p| wml_attr(p, "jc")).map(parse_alignment);

    Paragraph {
        style_id,
        heading_level,
        list,
        alignment,
        runs: parse_runs(node, ctx),
    }
}

fn parse_table(node: roxmltree::Node, ctx: &ReadContext) -> Table {
    let rows = collect_block_nodes(node)
        .into_iter()
        .filter(|n| is_wml(*n, "tr"))
        .map(|tr| TableRow {
            cells: collect_block_nodes(tr)
                .into_iter()
                .filter(|n| is_wml(*n, "tc"))
                .map(|tc| TableCell {
                    paragraphs: collect_block_nodes(tc)
                        .into_iter()
                        .filter(|n| is_wml(*n, "p"))
                        .map(|p| parse_paragraph(p, ctx))
                        .collect(),
                })
                .collect(),
        })
        .collect();
    Table { rows }
}

pub fn parse_bytes(bytes: &[u8]) -> Result<ParsedDocx> {
    parse_package(Package::from_bytes(bytes)?)
}

pub fn parse_package(package: Package) -> Result<ParsedDocx> {
    let styles = parse_styles(&package);
    let numbering = parse_numbering(&package);
    let relationships = Relationships::for_part(&package, DOCUMENT_PART);

    let xml_content = package.part_text(DOCUMENT_PART).ok_or_else(|| {
        Error::InvalidDocx("missing word/document.xml (is this a DOCX file?)".into())
    })?;
    let xml = roxmltree::Document::parse(&xml_content)?;
    let root = xml.root_element();
    let body = wml(root, "body").ok_or_else(|| Error::InvalidDocx("missing w:body".into()))?;

    let ctx = ReadContext {
        styles: &styles,
        numbering: &numbering,
        rels: &relationships,
    };

    let mut blocks = Vec::new();
    for node in collect_block_nodes(body) {
        if node.tag_name().namespace() != Some(WML_NS) {
            continue;
        }
        match node.tag_name().name() {
            "p" => blocks.push(Block::Paragraph(parse_paragraph(node, &ctx))),
            "tbl" => blocks.push(Block::Table(parse_table(node, &ctx))),
            _ => {}
        }
    }

    let document = Document { blocks };
    log::debug!(
        "Parsed {} paragraphs, {} tables, {} relationships",
        document.paragraphs().count(),
        document.table_count(),
        relationships.len()
    );

    Ok(ParsedDocx {
        package,
        document,
        relationships,
    })
}
