use docxide_proof::{Error, Package, Relationships};

const RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
  <Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/image" Target="media/image1.png"/>
  <Relationship Id="rId3" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/image" Target="../media/shared.png"/>
  <Relationship Id="rId8" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/hyperlink" Target="https://example.com/" TargetMode="External"/>
  <Relationship Id="rId4" Type="x" Target="/word/absolute.xml"/>
</Relationships>"#;

#[test]
fn targets_resolve_against_the_source_part() {
    let rels = Relationships::parse("word/document.xml", RELS);
    assert_eq!(rels.len(), 4);
    assert_eq!(rels.resolve_part("rId1").as_deref(), Some("word/media/image1.png"));
    assert_eq!(rels.resolve_part("rId3").as_deref(), Some("media/shared.png"));
    assert_eq!(rels.resolve_part("rId4").as_deref(), Some("word/absolute.xml"));
    // External targets are not package parts.
    assert_eq!(rels.resolve_part("rId8"), None);
    assert_eq!(rels.target("rId8"), Some("https://example.com/"));
    assert!(rels.get("rId8").unwrap().external);
    assert_eq!(rels.resolve_part("rId99"), None);
}

#[test]
fn added_ids_go_past_the_highest() {
    let mut rels = Relationships::parse("word/document.xml", RELS);
    assert_eq!(rels.add("t", "media/image2.png", false), "rId9");
    assert_eq!(rels.add("t", "https://a.test/?x=1&y=2", true), "rId10");

    let reparsed = Relationships::parse("word/document.xml", &rels.to_xml());
    assert_eq!(reparsed.len(), 6);
    assert_eq!(reparsed.target("rId10"), Some("https://a.test/?x=1&y=2"));
    assert!(reparsed.get("rId10").unwrap().external);
    assert_eq!(reparsed.resolve_part("rId9").as_deref(), Some("word/media/image2.png"));
}

#[test]
fn malformed_rels_read_as_empty() {
    assert!(Relationships::parse("word/document.xml", "<Relationships").is_empty());
}

#[test]
fn part_rels_are_found_next_to_the_part() {
    let mut package = Package::default();
    package.set_part("word/_rels/header1.xml.rels", RELS.as_bytes().to_vec());
    let rels = Relationships::for_part(&package, "word/header1.xml");
    assert_eq!(rels.len(), 4);
    assert!(Relationships::for_part(&package, "word/footer1.xml").is_empty());

    let mut written = Relationships::empty("word/footer1.xml");
    written.add("t", "media/x.png", false);
    written.write_into(&mut package);
    assert!(package.contains("word/_rels/footer1.xml.rels"));
    assert_eq!(
        Relationships::for_part(&package, "word/footer1.xml").resolve_part("rId1").as_deref(),
        Some("word/media/x.png")
    );
}

#[test]
fn non_zip_bytes_are_rejected() {
    assert!(matches!(
        Package::from_bytes(b"definitely not a zip"),
        Err(Error::InvalidDocx(_))
    ));
}

#[test]
fn default_content_types_are_added_once() {
    let mut package = Package::default();
    package.set_part(
        "[Content_Types].xml",
        br#"<?xml version="1.0"?><Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="PNG" ContentType="image/png"/></Types>"#.to_vec(),
    );
    package.ensure_default_content_type("png", "image/png").unwrap();
    package.ensure_default_content_type("jpeg", "image/jpeg").unwrap();
    package.ensure_default_content_type("jpeg", "image/jpeg").unwrap();

    let types = package.part_text("[Content_Types].xml").unwrap();
    assert_eq!(types.matches("Extension=\"jpeg\"").count(), 1);
    assert_eq!(types.matches("image/png").count(), 1);
    assert!(types.ends_with(r#"<Default Extension="jpeg" ContentType="image/jpeg"/></Types>"#));

    assert!(matches!(
        Package::default().ensure_default_content_type("png", "image/png"),
        Err(Error::InvalidDocx(_))
    ));
}

#[test]
fn unused_names_skip_existing_parts() {
    let mut package = Package::default();
    package.set_part("word/media/image1.png", vec![1]);
    package.set_part("word/media/image2.png", vec![2]);
    assert_eq!(
        package.unused_part_name("word/media", "image", "png"),
        "word/media/image3.png"
    );
    assert_eq!(
        package.unused_part_name("word/media", "image", "jpeg"),
        "word/media/image1.jpeg"
    );
}

#[test]
fn parts_survive_serialization_in_order() {
    let mut package = Package::default();
    package.set_part("b.xml", b"<b/>".to_vec());
    package.set_part("word/media/a.png", vec![0, 1, 2]);
    package.set_part("b.xml", b"<b2/>".to_vec());
    let reread = Package::from_bytes(&package.to_bytes().unwrap()).unwrap();
    assert_eq!(
        reread.part_names().collect::<Vec<_>>(),
        vec!["b.xml", "word/media/a.png"]
    );
    assert_eq!(reread.part("b.xml"), Some(&b"<b2/>"[..]));
    assert_eq!(reread.part("word/media/a.png"), Some(&[0u8, 1, 2][..]));
}
