use anyhow::Context;

use crate::docx::package::{DocxPackage, DOCUMENT_PART};
use crate::docx::xml::{find_attr, parse_xml_part, XmlEvent, XmlPart};
use crate::error::DocumentError;

/// A contiguous span of text sharing one set of run properties.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Run {
    pub text: String,
    /// Highlight colour name (`yellow`, `green`, ...). `w:val="none"` is stored as `None`.
    pub highlight: Option<String>,
}

impl Run {
    pub fn is_highlighted(&self) -> bool {
        self.highlight.is_some()
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Paragraph {
    pub runs: Vec<Run>,
}

impl Paragraph {
    pub fn text(&self) -> String {
        self.runs.iter().map(|r| r.text.as_str()).collect()
    }
}

/// Body-level paragraphs of an uploaded document, in document order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SourceDocument {
    pub paragraphs: Vec<Paragraph>,
}

impl SourceDocument {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, DocumentError> {
        let load = || -> anyhow::Result<Self> {
            let pkg = DocxPackage::from_bytes(bytes)?;
            let xml = pkg
                .part(DOCUMENT_PART)
                .with_context(|| format!("missing part: {DOCUMENT_PART}"))?;
            let part = parse_xml_part(DOCUMENT_PART, xml)?;
            Ok(Self::from_part(&part))
        };
        load().map_err(DocumentError::Load)
    }

    pub fn from_part(part: &XmlPart) -> Self {
        let mut paragraphs = Vec::new();
        let mut stack: Vec<&str> = Vec::new();
        // (paragraph, stack depth of its w:p)
        let mut para: Option<(Paragraph, usize)> = None;
        let mut run: Option<(Run, usize)> = None;

        for ev in &part.events {
            match ev {
                XmlEvent::Start { name, attrs } | XmlEvent::Empty { name, attrs } => {
                    let is_empty = matches!(ev, XmlEvent::Empty { .. });
                    let parent = stack.last().copied().unwrap_or("");
                    match name.as_str() {
                        "w:p" if parent == "w:body" => {
                            if is_empty {
                                paragraphs.push(Paragraph::default());
                            } else {
                                para = Some((Paragraph::default(), stack.len() + 1));
                            }
                        }
                        "w:r" => {
                            if let Some((p, p_depth)) = para.as_mut() {
                                let direct = stack.len() == *p_depth;
                                let in_link = parent == "w:hyperlink" && stack.len() == *p_depth + 1;
                                if direct || in_link {
                                    if is_empty {
                                        p.runs.push(Run::default());
                                    } else {
                                        run = Some((Run::default(), stack.len() + 1));
                                    }
                                }
                            }
                        }
                        "w:highlight" => {
                            if let Some((r, r_depth)) = run.as_mut() {
                                if parent == "w:rPr" && stack.len() == *r_depth + 1 {
                                    r.highlight = find_attr(attrs, "w:val")
                                        .map(str::trim)
                                        .filter(|v| !v.is_empty() && *v != "none")
                                        .map(str::to_string);
                                }
                            }
                        }
                        "w:tab" | "w:ptab" | "w:br" | "w:cr" | "w:noBreakHyphen" => {
                            if let Some((r, r_depth)) = run.as_mut() {
                                if stack.len() == *r_depth {
                                    push_control(&mut r.text, name, attrs);
                                }
                            }
                        }
                        _ => {}
                    }
                    if !is_empty {
                        stack.push(name.as_str());
                    }
                }
                XmlEvent::Text { text } => {
                    if let Some((r, r_depth)) = run.as_mut() {
                        if stack.last() == Some(&"w:t") && stack.len() == *r_depth + 1 {
                            r.text.push_str(text);
                        }
                    }
                }
                XmlEvent::End { name } => {
                    let depth = stack.len();
                    if name == "w:r" && run.as_ref().is_some_and(|(_, d)| *d == depth) {
                        if let (Some((r, _)), Some((p, _))) = (run.take(), para.as_mut()) {
                            p.runs.push(r);
                        }
                    } else if name == "w:p" && para.as_ref().is_some_and(|(_, d)| *d == depth) {
                        if let Some((p, _)) = para.take() {
                            paragraphs.push(p);
                        }
                    }
                    stack.pop();
                }
                _ => {}
            }
        }

        Self { paragraphs }
    }

    /// Every paragraph's text joined with `\n`; paragraphs are not trimmed.
    pub fn extract_content(&self) -> String {
        self.paragraphs
            .iter()
            .map(Paragraph::text)
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Text of each highlighted run in document order. Duplicates are kept.
    pub fn extract_highlighted(&self) -> Vec<String> {
        self.paragraphs
            .iter()
            .flat_map(|p| p.runs.iter())
            .filter(|r| r.is_highlighted())
            .map(|r| r.text.clone())
            .collect()
    }
}

fn push_control(buf: &mut String, name: &str, attrs: &[(String, String)]) {
    match name {
        "w:tab" | "w:ptab" => buf.push('\t'),
        "w:cr" => buf.push('\n'),
        "w:br" => {
            // page and column breaks carry no text
            if find_attr(attrs, "w:type").unwrap_or("textWrapping") == "textWrapping" {
                buf.push('\n');
            }
        }
        "w:noBreakHyphen" => buf.push('-'),
        _ => {}
    }
}
