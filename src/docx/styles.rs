use std::collections::HashMap;

use crate::package::Package;

use super::{WML_NS, wml, wml_attr, wml_bool};

pub(crate) struct ParagraphStyle {
    pub(crate) name: Option<String>,
    pub(crate) outline_level: Option<u8>,
    pub(crate) based_on: Option<String>,
}

pub(crate) struct CharacterStyle {
    pub(crate) bold: Option<bool>,
    pub(crate) italic: Option<bool>,
}

#[derive(Default)]
pub(crate) struct StylesInfo {
    pub(crate) paragraph_styles: HashMap<String, ParagraphStyle>,
    pub(crate) character_styles: HashMap<String, CharacterStyle>,
}

const MAX_BASED_ON_DEPTH: usize = 10;

fn heading_level_from_name(name: &str) -> Option<u8> {
    let rest = name
        .get(..7)
        .filter(|p| p.eq_ignore_ascii_case("heading"))
        .map(|_| name[7..].trim())?;
    rest.parse::<u8>().ok().filter(|l| (1..=9).contains(l))
}

impl StylesInfo {
    /// Heading level 1..=9 of a paragraph style: from its name ("heading 2"),
    /// its id ("Heading2") or an outline level inherited through `basedOn`.
    pub(crate) fn heading_level(&self, style_id: &str) -> Option<u8> {
        if let Some(level) = heading_level_from_name(style_id) {
            return Some(level);
        }
        let mut current = Some(style_id);
        for _ in 0..MAX_BASED_ON_DEPTH {
            let style = self.paragraph_styles.get(current?)?;
            if let Some(level) = style.name.as_deref().and_then(heading_level_from_name) {
                return Some(level);
            }
            if let Some(lvl) = style.outline_level.filter(|l| *l < 9) {
                return Some(lvl + 1);
            }
            current = style.based_on.as_deref();
        }
        None
    }

    /// Find a paragraph style id by display name, case-insensitively and
    /// ignoring spaces ("List Bullet 2" matches "ListBullet2").
    pub(crate) fn paragraph_style_id_by_name(&self, name: &str) -> Option<&str> {
        let squash = |s: &str| -> String {
            s.chars()
                .filter(|c| !c.is_whitespace())
                .flat_map(char::to_lowercase)
                .collect()
        };
        let wanted = squash(name);
        self.paragraph_styles
            .iter()
            .find(|(_, s)| s.name.as_deref().is_some_and(|n| squash(n) == wanted))
            .map(|(id, _)| id.as_str())
    }
}

pub(crate) fn parse_styles(package: &Package) -> StylesInfo {
    let mut info = StylesInfo::default();
    let Some(xml_content) = package.part_text("word/styles.xml") else {
        return info;
    };
    let Ok(xml) = roxmltree::Document::parse(&xml_content) else {
        log::warn!("word/styles.xml is not well-formed, ignoring styles");
        return info;
    };

    for node in xml.root_element().children() {
        if node.tag_name().name() != "style" || node.tag_name().namespace() != Some(WML_NS) {
            continue;
        }
        let Some(style_id) = node.attribute((WML_NS, "styleId")) else {
            continue;
        };
        match node.attribute((WML_NS, "type")) {
            Some("paragraph") => {
                let outline_level = wml(node, "pPr")
                    .and_then(|ppr| wml_attr(ppr, "outlineLvl"))
                    .and_then(|v| v.parse::<u8>().ok());
                info.paragraph_styles.insert(
                    style_id.to_string(),
                    ParagraphStyle {
                        name: wml_attr(node, "name").map(String::from),
                        outline_level,
                        based_on: wml_attr(node, "basedOn").map(String::from),
                    },
                );
            }
            Some("character") => {
                let rpr = wml(node, "rPr");
                info.character_styles.insert(
                    style_id.to_string(),
                    CharacterStyle {
                        bold: rpr.and_then(|n| wml_bool(n, "b")),
                        italic: rpr.and_then(|n| wml_bool(n, "i")),
                    },
                );
            }
            _ => {}
        }
    }
    info
}
