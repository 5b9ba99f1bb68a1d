use std::collections::HashMap;
use std::path::Path;

use anyhow::Context;

use crate::docx::package::{DocxPackage, DOCUMENT_PART};
use crate::docx::reader::SourceDocument;
use crate::docx::xml::{find_attr, parse_xml_part, write_xml_part, XmlEvent, XmlPart};
use crate::error::{DocumentError, TemplateShapeError};
use crate::vocabulary::VocabularyEntry;

const VOCABULARY_COLUMNS: usize = 4;

/// Character formatting applied to every run the writer generates.
#[derive(Clone, Debug, PartialEq)]
pub struct RunFormat {
    pub font_family: Option<String>,
    pub font_size_pt: f32,
}

impl RunFormat {
    fn half_points(&self) -> String {
        ((self.font_size_pt * 2.0).round().max(1.0) as u32).to_string()
    }

    fn push_rpr(&self, out: &mut Vec<XmlEvent>) {
        out.push(XmlEvent::start("w:rPr"));
        if let Some(family) = self.font_family.as_deref().filter(|f| !f.trim().is_empty()) {
            out.push(XmlEvent::empty_with(
                "w:rFonts",
                &[
                    ("w:ascii", family),
                    ("w:hAnsi", family),
                    ("w:eastAsia", family),
                    ("w:cs", family),
                ],
            ));
        }
        let sz = self.half_points();
        out.push(XmlEvent::empty_with("w:sz", &[("w:val", sz.as_str())]));
        out.push(XmlEvent::empty_with("w:szCs", &[("w:val", sz.as_str())]));
        out.push(XmlEvent::end("w:rPr"));
    }

    /// `<w:p><w:r><w:rPr/><w:t>text</w:t></w:r></w:p>`; an empty `text` gives an empty paragraph.
    fn push_paragraph(&self, out: &mut Vec<XmlEvent>, text: &str) {
        out.push(XmlEvent::start("w:p"));
        if !text.is_empty() {
            out.push(XmlEvent::start("w:r"));
            self.push_rpr(out);
            out.push(XmlEvent::start_with("w:t", &[("xml:space", "preserve")]));
            out.push(XmlEvent::text(text));
            out.push(XmlEvent::end("w:t"));
            out.push(XmlEvent::end("w:r"));
        }
        out.push(XmlEvent::end("w:p"));
    }
}

struct TableSpan {
    start: usize,
    end: usize,
    grid: Vec<Option<String>>,
}

fn body_tables(events: &[XmlEvent]) -> Vec<TableSpan> {
    let mut out = Vec::new();
    let mut stack: Vec<&str> = Vec::new();
    let mut current: Option<(TableSpan, usize)> = None;

    for (idx, ev) in events.iter().enumerate() {
        match ev {
            XmlEvent::Start { name, .. } => {
                if name == "w:tbl" && current.is_none() && stack.last() == Some(&"w:body") {
                    let span = TableSpan {
                        start: idx,
                        end: idx,
                        grid: Vec::new(),
                    };
                    current = Some((span, stack.len() + 1));
                }
                stack.push(name.as_str());
            }
            XmlEvent::Empty { name, attrs } => {
                if let Some((span, depth)) = current.as_mut() {
                    if name == "w:gridCol"
                        && stack.len() == *depth + 1
                        && stack.last() == Some(&"w:tblGrid")
                    {
                        span.grid.push(find_attr(attrs, "w:w").map(str::to_string));
                    }
                }
            }
            XmlEvent::End { name } => {
                if name == "w:tbl" && current.as_ref().is_some_and(|(_, d)| *d == stack.len()) {
                    if let Some((mut span, _)) = current.take() {
                        span.end = idx;
                        out.push(span);
                    }
                }
                stack.pop();
            }
            _ => {}
        }
    }
    out
}

/// Cell texts of each `w:tr` directly under the table; paragraphs in a cell are joined by `\n`.
fn read_rows(events: &[XmlEvent]) -> Vec<Vec<String>> {
    let mut rows: Vec<Vec<String>> = Vec::new();
    let mut stack: Vec<&str> = Vec::new();
    let mut paras_in_cell = 0usize;

    for ev in events {
        match ev {
            XmlEvent::Start { name, .. } | XmlEvent::Empty { name, .. } => {
                let parent = stack.last().copied().unwrap_or("");
                match (name.as_str(), stack.len()) {
                    ("w:tr", 1) if parent == "w:tbl" => rows.push(Vec::new()),
                    ("w:tc", 2) if parent == "w:tr" => {
                        if let Some(row) = rows.last_mut() {
                            row.push(String::new());
                        }
                        paras_in_cell = 0;
                    }
                    ("w:p", 3) if parent == "w:tc" => {
                        if paras_in_cell > 0 {
                            if let Some(cell) = rows.last_mut().and_then(|r| r.last_mut()) {
                                cell.push('\n');
                            }
                        }
                        paras_in_cell += 1;
                    }
                    _ => {}
                }
                if matches!(ev, XmlEvent::Start { .. }) {
                    stack.push(name.as_str());
                }
            }
            XmlEvent::Text { text } => {
                if stack.last() == Some(&"w:t") && stack.len() > 3 {
                    if let Some(cell) = rows.last_mut().and_then(|r| r.last_mut()) {
                        cell.push_str(text);
                    }
                }
            }
            XmlEvent::End { .. } => {
                stack.pop();
            }
            _ => {}
        }
    }
    rows
}

/// A document built from the template asset, mutated by appending rows and paragraphs.
pub struct OutputDocument {
    package: DocxPackage,
    part: XmlPart,
}

impl OutputDocument {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, DocumentError> {
        DocxPackage::from_bytes(bytes)
            .and_then(Self::from_package)
            .map_err(DocumentError::Load)
    }

    pub fn open(path: &Path) -> Result<Self, DocumentError> {
        DocxPackage::read(path)
            .and_then(Self::from_package)
            .map_err(DocumentError::Load)
    }

    fn from_package(package: DocxPackage) -> anyhow::Result<Self> {
        let xml = package
            .part(DOCUMENT_PART)
            .with_context(|| format!("missing part: {DOCUMENT_PART}"))?;
        let part = parse_xml_part(DOCUMENT_PART, xml)?;
        Ok(Self { package, part })
    }

    pub fn table_count(&self) -> usize {
        body_tables(&self.part.events).len()
    }

    /// Grid column count, falling back to the widest row when the table has no grid.
    pub fn table_columns(&self, index: usize) -> Option<usize> {
        let span = body_tables(&self.part.events).into_iter().nth(index)?;
        if !span.grid.is_empty() {
            return Some(span.grid.len());
        }
        let rows = read_rows(&self.part.events[span.start..=span.end]);
        Some(rows.iter().map(Vec::len).max().unwrap_or(0))
    }

    pub fn table_rows(&self, index: usize) -> Option<Vec<Vec<String>>> {
        let span = body_tables(&self.part.events).into_iter().nth(index)?;
        Some(read_rows(&self.part.events[span.start..=span.end]))
    }

    pub fn body_paragraph_texts(&self) -> Vec<String> {
        SourceDocument::from_part(&self.part)
            .paragraphs
            .iter()
            .map(|p| p.text())
            .collect()
    }

    /// Appends one row per entry to the first table, leaving existing rows untouched.
    pub fn append_vocabulary_table(
        &mut self,
        entries: &[VocabularyEntry],
        row_height_twips: u32,
        format: &RunFormat,
    ) -> Result<(), TemplateShapeError> {
        let span = body_tables(&self.part.events)
            .into_iter()
            .next()
            .ok_or(TemplateShapeError::NoTable)?;
        let columns = match self.table_columns(0) {
            Some(n) => n,
            None => return Err(TemplateShapeError::NoTable),
        };
        if columns < VOCABULARY_COLUMNS {
            return Err(TemplateShapeError::TooFewColumns { found: columns });
        }

        let height = row_height_twips.to_string();
        let mut rows: Vec<XmlEvent> = Vec::new();
        for entry in entries {
            rows.push(XmlEvent::start("w:tr"));
            rows.push(XmlEvent::start("w:trPr"));
            rows.push(XmlEvent::empty_with("w:trHeight", &[("w:val", height.as_str())]));
            rows.push(XmlEvent::end("w:trPr"));
            let values = entry.cells();
            for col in 0..columns {
                rows.push(XmlEvent::start("w:tc"));
                if let Some(Some(w)) = span.grid.get(col) {
                    rows.push(XmlEvent::start("w:tcPr"));
                    rows.push(XmlEvent::empty_with("w:tcW", &[("w:w", w.as_str()), ("w:type", "dxa")]));
                    rows.push(XmlEvent::end("w:tcPr"));
                }
                format.push_paragraph(&mut rows, values.get(col).copied().unwrap_or(""));
                rows.push(XmlEvent::end("w:tc"));
            }
            rows.push(XmlEvent::end("w:tr"));
        }
        self.part.events.splice(span.end..span.end, rows);
        Ok(())
    }

    /// One paragraph per line whose trimmed form is non-empty; the line itself is kept as is.
    /// Returns the number of paragraphs added.
    pub fn append_content(&mut self, text: &str, format: &RunFormat) -> usize {
        let mut paras: Vec<XmlEvent> = Vec::new();
        let mut added = 0usize;
        for line in text.lines() {
            if line.trim().is_empty() {
                continue;
            }
            format.push_paragraph(&mut paras, line);
            added += 1;
        }
        let at = self.body_insert_index();
        self.part.events.splice(at..at, paras);
        added
    }

    /// Before the body-level `w:sectPr`, or before `</w:body>` when there is none.
    fn body_insert_index(&self) -> usize {
        let mut stack: Vec<&str> = Vec::new();
        for (idx, ev) in self.part.events.iter().enumerate() {
            match ev {
                XmlEvent::Start { name, .. } | XmlEvent::Empty { name, .. } => {
                    if name == "w:sectPr" && stack.last() == Some(&"w:body") {
                        return idx;
                    }
                    if matches!(ev, XmlEvent::Start { .. }) {
                        stack.push(name.as_str());
                    }
                }
                XmlEvent::End { name } => {
                    if name == "w:body" {
                        return idx;
                    }
                    stack.pop();
                }
                _ => {}
            }
        }
        self.part.events.len()
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, DocumentError> {
        let write = || -> anyhow::Result<Vec<u8>> {
            let xml = write_xml_part(&self.part).context("serialize document.xml")?;
            let mut replacements = HashMap::new();
            replacements.insert(DOCUMENT_PART.to_string(), xml);
            self.package.to_bytes_with_replacements(&replacements)
        };
        write().map_err(DocumentError::Write)
    }
}
