mod common;

use common::*;
use docxide_proof::model::{Alignment, ImageAsset, Paragraph, Run, RunContent};
use docxide_proof::{Draft, Error, Package, Target, parse_bytes};

fn image_run(data: Vec<u8>, part_name: &str) -> Run {
    Run {
        content: RunContent::Image(ImageAsset {
            number: 1,
            data,
            part_name: part_name.into(),
        }),
        ..Run::text("")
    }
}

fn linked(text: &str, url: &str) -> Run {
    Run {
        hyperlink_url: Some(url.into()),
        ..Run::text(text)
    }
}

fn single(runs: Vec<Run>) -> Vec<Paragraph> {
    vec![Paragraph {
        runs,
        ..Paragraph::default()
    }]
}

fn minimal_package(document: &str) -> Package {
    let mut package = Package::default();
    package.set_part(
        "[Content_Types].xml",
        br#"<?xml version="1.0"?><Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="xml" ContentType="application/xml"/></Types>"#.to_vec(),
    );
    package.set_part("word/document.xml", document.as_bytes().to_vec());
    package
}

#[test]
fn self_closing_body_is_opened() {
    let package = minimal_package(&format!(
        r#"<?xml version="1.0"?><w:document xmlns:w="{W_NS}"><w:body/></w:document>"#
    ));
    let draft = Draft::new(Target::from_package(package).unwrap(), single(vec![Run::text("hi")]));
    let out = draft.finish().unwrap();
    let document = read_text(&out, "word/document.xml");
    assert!(document.contains(
        r#"<w:body><w:p><w:r><w:t xml:space="preserve">hi</w:t></w:r></w:p></w:body></w:document>"#
    ));
    assert_eq!(body_paragraph_texts(&out), vec!["hi"]);
}

#[test]
fn foreign_prefix_is_rejected() {
    let package = minimal_package(&format!(
        r#"<?xml version="1.0"?><x:document xmlns:x="{W_NS}"><x:body/></x:document>"#
    ));
    assert!(matches!(
        Target::from_package(package),
        Err(Error::InvalidDocx(_))
    ));
}

#[test]
fn tabs_and_newlines_become_elements() {
    let out = Draft::new(Target::blank(), single(vec![Run::text("a\tb\nc & d")]))
        .finish()
        .unwrap();
    let document = read_text(&out, "word/document.xml");
    assert!(document.contains(concat!(
        r#"<w:r><w:t xml:space="preserve">a</w:t><w:tab/><w:t xml:space="preserve">b</w:t>"#,
        r#"<w:br/><w:t xml:space="preserve">c &amp; d</w:t></w:r>"#,
    )));
    let reparsed = parse_bytes(&out).unwrap();
    assert_eq!(
        reparsed.document.paragraphs().next().unwrap().text(),
        "a\tb\nc & d"
    );
}

#[test]
fn blank_target_has_its_own_styles() {
    let target = Target::blank();
    assert_eq!(target.heading_style(3), "Heading3");
    assert_eq!(target.list_style(false, 0), "ListBullet");
    assert_eq!(target.list_style(true, 2), "ListNumber3");
    assert!(target.package().contains("word/numbering.xml"));
}

#[test]
fn unreadable_image_gets_the_fallback_extent() {
    let mut paragraphs = single(vec![image_run(b"not an image".to_vec(), "word/embeddings/blob")]);
    paragraphs[0].alignment = Some(Alignment::Center);
    let out = Draft::new(Target::blank(), paragraphs).finish().unwrap();
    let document = read_text(&out, "word/document.xml");
    assert!(document.contains(r#"<w:jc w:val="center"/>"#));
    assert!(document.contains(r#"<wp:extent cx="1828800" cy="1828800"/>"#));
    assert_eq!(
        read_part(&out, "word/media/proof_image1.bin"),
        Some(b"not an image".to_vec())
    );
    let types = read_text(&out, "[Content_Types].xml");
    assert!(types.contains(r#"<Default Extension="bin" ContentType="application/octet-stream"/>"#));
}

#[test]
fn wide_images_are_scaled_to_the_text_width() {
    let out = Draft::new(Target::blank(), single(vec![image_run(png(1152, 100), "word/media/w.png")]))
        .finish()
        .unwrap();
    let document = read_text(&out, "word/document.xml");
    // 1152 px is 10972800 EMU, twice the 6 inch text width.
    assert!(document.contains(r#"<wp:extent cx="5486400" cy="476250"/>"#));
}

#[test]
fn anchors_link_inside_the_document() {
    let out = Draft::new(
        Target::blank(),
        single(vec![
            linked("jump", "#sec"),
            Run::text(" and "),
            linked("out", "https://x.test/"),
            Run::text(" "),
            linked("again", "https://x.test/"),
        ]),
    )
    .finish()
    .unwrap();
    let document = read_text(&out, "word/document.xml");
    assert!(document.contains(r#"<w:hyperlink w:anchor="sec" w:history="1"><w:r>"#));

    let rels = read_text(&out, "word/_rels/document.xml.rels");
    assert!(!rels.contains("#sec"));
    assert_eq!(rels.matches("https://x.test/").count(), 1);
    assert_eq!(document.matches(r#"r:id="rId3""#).count(), 2);

    let reparsed = parse_bytes(&out).unwrap();
    let runs = &reparsed.document.paragraphs().next().unwrap().runs;
    assert_eq!(runs[0].hyperlink_url.as_deref(), Some("#sec"));
    assert_eq!(runs[2].hyperlink_url.as_deref(), Some("https://x.test/"));
}

#[test]
fn drawing_ids_continue_past_the_template() {
    let mut b = DocxBuilder::new();
    b.header_footer("Header", "Footer").block(&para(&run("old body")));
    let mut package = Package::from_bytes(&b.build()).unwrap();
    package.set_part(
        "word/header1.xml",
        format!(
            concat!(
                r#"<w:hdr xmlns:w="{}" xmlns:wp="http://schemas.openxmlformats.org/drawingml/2006/wordprocessingDrawing">"#,
                r#"<w:p><w:r><w:drawing><wp:inline><wp:docPr id="7" name="Logo"/></wp:inline></w:drawing></w:r></w:p></w:hdr>"#,
            ),
            W_NS
        )
        .into_bytes(),
    );

    let target = Target::template(&package.to_bytes().unwrap()).unwrap();
    let out = Draft::new(
        target,
        single(vec![
            image_run(png(4, 4), "word/media/a.png"),
            image_run(png(4, 4), "word/media/b.png"),
        ]),
    )
    .finish()
    .unwrap();
    let document = read_text(&out, "word/document.xml");
    assert!(document.contains(r#"<wp:docPr id="8" name="Picture 8"/>"#));
    assert!(document.contains(r#"<wp:docPr id="9" name="Picture 9"/>"#));
    assert!(!document.contains(r#"<wp:docPr id="1""#));
}
