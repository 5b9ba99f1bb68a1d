use std::path::Path;

use anyhow::Context;

use crate::docx::package::{DocxEntry, DocxPackage, DOCUMENT_PART};

pub const DOCX_MIME: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

const CONTENT_TYPES_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/word/document.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/></Types>"#;

const PACKAGE_RELS_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="word/document.xml"/></Relationships>"#;

// A4 portrait, 2.54 cm margins.
const SECT_PR_XML: &str = r#"<w:sectPr><w:pgSz w:w="11906" w:h="16838"/><w:pgMar w:top="1440" w:right="1440" w:bottom="1440" w:left="1440" w:header="708" w:footer="708" w:gutter="0"/></w:sectPr>"#;

const VOCABULARY_HEADERS: [(&str, u32); 4] = [
    ("Word", 2200),
    ("Pronunciation", 2400),
    ("Part of speech", 1800),
    ("Translation", 2626),
];

/// Wraps body XML in a `w:document` root. The body always ends with a section properties
/// element, as Word writes it.
pub fn document_xml(body: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><w:body>{body}{SECT_PR_XML}</w:body></w:document>"#
    )
}

/// The smallest package Word accepts: content types, package relationships, main document.
pub fn package_with_document(document_xml: &str) -> DocxPackage {
    DocxPackage::from_entries(vec![
        DocxEntry::file("[Content_Types].xml", CONTENT_TYPES_XML.as_bytes().to_vec()),
        DocxEntry::file("_rels/.rels", PACKAGE_RELS_XML.as_bytes().to_vec()),
        DocxEntry::file(DOCUMENT_PART, document_xml.as_bytes().to_vec()),
    ])
}

fn vocabulary_template_body() -> String {
    let grid: String = VOCABULARY_HEADERS
        .iter()
        .map(|(_, w)| format!(r#"<w:gridCol w:w="{w}"/>"#))
        .collect();
    let header_cells: String = VOCABULARY_HEADERS
        .iter()
        .map(|(label, w)| {
            format!(
                r#"<w:tc><w:tcPr><w:tcW w:w="{w}" w:type="dxa"/></w:tcPr><w:p><w:r><w:rPr><w:b/></w:rPr><w:t>{label}</w:t></w:r></w:p></w:tc>"#
            )
        })
        .collect();
    format!(
        concat!(
            r#"<w:p><w:pPr><w:jc w:val="center"/></w:pPr><w:r><w:rPr><w:b/><w:sz w:val="32"/></w:rPr><w:t>Vocabulary</w:t></w:r></w:p>"#,
            r#"<w:tbl><w:tblPr><w:tblW w:w="0" w:type="auto"/><w:tblBorders>"#,
            r#"<w:top w:val="single" w:sz="4" w:space="0" w:color="auto"/>"#,
            r#"<w:left w:val="single" w:sz="4" w:space="0" w:color="auto"/>"#,
            r#"<w:bottom w:val="single" w:sz="4" w:space="0" w:color="auto"/>"#,
            r#"<w:right w:val="single" w:sz="4" w:space="0" w:color="auto"/>"#,
            r#"<w:insideH w:val="single" w:sz="4" w:space="0" w:color="auto"/>"#,
            r#"<w:insideV w:val="single" w:sz="4" w:space="0" w:color="auto"/>"#,
            r#"</w:tblBorders></w:tblPr><w:tblGrid>{grid}</w:tblGrid><w:tr>{cells}</w:tr></w:tbl>"#,
            r#"<w:p/>"#
        ),
        grid = grid,
        cells = header_cells
    )
}

/// Built-in template: a title, then one 4-column table holding a header row.
pub fn default_template_package() -> DocxPackage {
    package_with_document(&document_xml(&vocabulary_template_body()))
}

pub fn default_template_bytes() -> anyhow::Result<Vec<u8>> {
    default_template_package()
        .to_bytes()
        .context("serialize default template")
}

pub fn write_default_template(path: &Path, force: bool) -> anyhow::Result<bool> {
    if path.exists() && !force {
        return Ok(false);
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create template dir: {}", parent.display()))?;
    }
    let bytes = default_template_bytes()?;
    std::fs::write(path, bytes).with_context(|| format!("write template: {}", path.display()))?;
    Ok(true)
}
