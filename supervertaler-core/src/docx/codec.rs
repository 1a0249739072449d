//! DOCX import/export.
//!
//! Grounded on `original_source/Supervertaler_v2.5.0.py`'s
//! `parse_docx_pairs` for the zip/XML walk and error text, generalised to
//! also yield table cells and raw run formatting so the export side can
//! round-trip documents instead of only diffing tracked changes.

use std::io::{Read, Write};
use std::path::Path;

use zip::write::FileOptions;
use zip::{ZipArchive, ZipWriter};

use crate::docx::xml_tree::{local_name, parse_document, serialize_document, Element, Node};
use crate::error::{CoreError, Result};

/// One run's text plus the formatting flags carried by its `w:rPr`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunInfo {
    pub text: String,
    pub bold: bool,
    pub italic: bool,
    pub underline: bool,
}

/// `(table_index, row_index, cell_index)`, mirrors
/// `supervertaler_tm::TableInfo`.
pub type TableInfo = (usize, usize, usize);

/// One paragraph or table cell in document order.
#[derive(Debug, Clone)]
pub struct DocxParagraphInfo {
    pub paragraph_id: usize,
    pub document_position: u64,
    pub style: String,
    pub is_table_cell: bool,
    pub table_info: Option<TableInfo>,
    pub runs: Vec<RunInfo>,
    pub text: String,
}

const DOCUMENT_XML: &str = "word/document.xml";

pub struct DocxCodec;

impl DocxCodec {
    /// Parse a `.docx` into ordered paragraph/cell info, preserving the
    /// interleaved document order of paragraphs and table cells.
    pub fn import(path: impl AsRef<Path>) -> Result<Vec<DocxParagraphInfo>> {
        let root = read_document_xml(path.as_ref())?;
        let body = root
            .first_child_named("body")
            .ok_or_else(|| CoreError::CorruptXml("missing w:body".to_string()))?;

        let mut out = Vec::new();
        let mut paragraph_id = 0usize;
        let mut position = 0u64;
        let mut table_index = 0usize;
        walk_body(body, &mut paragraph_id, &mut position, &mut table_index, &mut out);
        Ok(out)
    }

    /// Rewrite `source_docx`'s `word/document.xml` paragraph-by-paragraph
    /// (matched by `paragraph_id`) with new text, byte-copying every other
    /// zip entry untouched, and write the result to `dest_path`.
    pub fn export(
        source_docx: impl AsRef<Path>,
        dest_path: impl AsRef<Path>,
        records: &[(usize, String)],
    ) -> Result<()> {
        let replacements: std::collections::HashMap<usize, &str> =
            records.iter().map(|(id, text)| (*id, text.as_str())).collect();

        let source_docx = source_docx.as_ref();
        let file = std::fs::File::open(source_docx)?;
        let mut archive = ZipArchive::new(file)?;

        let mut document_xml = String::new();
        {
            let mut entry = archive
                .by_name(DOCUMENT_XML)
                .map_err(|_| CoreError::InvalidDocx)?;
            entry.read_to_string(&mut document_xml)?;
        }

        let mut root = parse_document(document_xml.as_bytes())?;
        let mut paragraph_id = 0usize;
        rewrite_body(&mut root, &mut paragraph_id, &replacements);
        let rewritten = serialize_document(&root)?;

        let dest = std::fs::File::create(dest_path.as_ref())?;
        let mut writer = ZipWriter::new(dest);
        let options = FileOptions::default();

        for i in 0..archive.len() {
            let mut entry = archive.by_index(i)?;
            let name = entry.name().to_string();
            writer.start_file(name.clone(), options)?;
            if name == DOCUMENT_XML {
                writer.write_all(&rewritten)?;
            } else {
                let mut buf = Vec::new();
                entry.read_to_end(&mut buf)?;
                writer.write_all(&buf)?;
            }
        }
        writer.finish()?;
        Ok(())
    }
}

fn read_document_xml(path: &Path) -> Result<Element> {
    let file = std::fs::File::open(path)?;
    let mut archive = ZipArchive::new(file)?;
    let mut contents = String::new();
    {
        let mut entry = archive
            .by_name(DOCUMENT_XML)
            .map_err(|_| CoreError::InvalidDocx)?;
        entry.read_to_string(&mut contents)?;
    }
    parse_document(contents.as_bytes())
}

fn walk_body(
    body: &Element,
    paragraph_id: &mut usize,
    position: &mut u64,
    table_index: &mut usize,
    out: &mut Vec<DocxParagraphInfo>,
) {
    for child in body.child_elements() {
        match local_name(&child.tag) {
            "p" => {
                out.push(paragraph_info(child, *paragraph_id, *position, None));
                *paragraph_id += 1;
                *position += 1;
            }
            "tbl" => {
                let this_table = *table_index;
                *table_index += 1;
                for (row_idx, row) in child.child_elements().filter(|e| local_name(&e.tag) == "tr").enumerate() {
                    for (cell_idx, cell) in row.child_elements().filter(|e| local_name(&e.tag) == "tc").enumerate() {
                        for para in cell.child_elements().filter(|e| local_name(&e.tag) == "p") {
                            out.push(paragraph_info(
                                para,
                                *paragraph_id,
                                *position,
                                Some((this_table, row_idx, cell_idx)),
                            ));
                            *paragraph_id += 1;
                            *position += 1;
                        }
                    }
                }
            }
            _ => {}
        }
    }
}

fn paragraph_info(p: &Element, paragraph_id: usize, position: u64, table_info: Option<TableInfo>) -> DocxParagraphInfo {
    let style = p
        .first_child_named("pPr")
        .and_then(|pr| pr.first_child_named("pStyle"))
        .and_then(|s| s.attr("val"))
        .unwrap_or("Normal")
        .to_string();

    let runs = collect_runs(p);
    let text = runs.iter().map(|r| r.text.as_str()).collect::<Vec<_>>().join("");

    DocxParagraphInfo {
        paragraph_id,
        document_position: position,
        style,
        is_table_cell: table_info.is_some(),
        table_info,
        runs,
        text,
    }
}

/// Flatten a paragraph's final (tracked-changes-accepted) runs, keeping
/// bold/italic/underline flags read off each run's `w:rPr`.
fn collect_runs(p: &Element) -> Vec<RunInfo> {
    let mut out = Vec::new();
    collect_runs_into(p, &mut out);
    out
}

fn collect_runs_into(elem: &Element, out: &mut Vec<RunInfo>) {
    for child in elem.child_elements() {
        match local_name(&child.tag) {
            "del" => {} // excluded from the final/reconstruction view
            "ins" => collect_runs_into(child, out),
            "r" => {
                if let Some(run) = run_info(child) {
                    out.push(run);
                }
            }
            _ => collect_runs_into(child, out),
        }
    }
}

fn run_info(r: &Element) -> Option<RunInfo> {
    let mut text = String::new();
    for child in r.child_elements() {
        match local_name(&child.tag) {
            "t" => text.push_str(&child.text_content()),
            "tab" => text.push('\t'),
            "br" => text.push('\n'),
            _ => {}
        }
    }
    if text.is_empty() && r.first_child_named("t").is_none() {
        return None;
    }
    let rpr = r.first_child_named("rPr");
    let has_flag = |name: &str| rpr.and_then(|p| p.first_child_named(name)).is_some();
    Some(RunInfo {
        text,
        bold: has_flag("b"),
        italic: has_flag("i"),
        underline: has_flag("u"),
    })
}

fn rewrite_body(
    root: &mut Element,
    paragraph_id: &mut usize,
    replacements: &std::collections::HashMap<usize, &str>,
) {
    let Some(body) = root.children.iter_mut().find_map(|n| match n {
        Node::Element(e) if local_name(&e.tag) == "body" => Some(e),
        _ => None,
    }) else {
        return;
    };
    rewrite_body_children(body, paragraph_id, replacements);
}

fn rewrite_body_children(
    body: &mut Element,
    paragraph_id: &mut usize,
    replacements: &std::collections::HashMap<usize, &str>,
) {
    for child in body.children.iter_mut() {
        let Node::Element(child) = child else { continue };
        match local_name(&child.tag) {
            "p" => {
                if let Some(text) = replacements.get(paragraph_id) {
                    replace_paragraph_text(child, text);
                }
                *paragraph_id += 1;
            }
            "tbl" => {
                for row in child.children.iter_mut() {
                    let Node::Element(row) = row else { continue };
                    if local_name(&row.tag) != "tr" {
                        continue;
                    }
                    for cell in row.children.iter_mut() {
                        let Node::Element(cell) = cell else { continue };
                        if local_name(&cell.tag) != "tc" {
                            continue;
                        }
                        for para in cell.children.iter_mut() {
                            let Node::Element(para) = para else { continue };
                            if local_name(&para.tag) != "p" {
                                continue;
                            }
                            if let Some(text) = replacements.get(paragraph_id) {
                                replace_paragraph_text(para, text);
                            }
                            *paragraph_id += 1;
                        }
                    }
                }
            }
            _ => {}
        }
    }
}

/// Replace a paragraph's runs with a single run carrying `text`, copying
/// the first original run's `w:rPr` (if any) so formatting survives.
fn replace_paragraph_text(p: &mut Element, text: &str) {
    let rpr = p
        .child_elements()
        .find(|e| local_name(&e.tag) == "r")
        .and_then(|r| r.first_child_named("rPr"))
        .cloned();

    p.children.retain(|n| !matches!(n, Node::Element(e) if matches!(local_name(&e.tag), "r" | "ins" | "del")));

    let mut new_run = Element::new("w:r");
    if let Some(rpr) = rpr {
        new_run.children.push(Node::Element(rpr));
    }
    let mut t = Element::new("w:t");
    t.set_attr("xml:space", "preserve");
    t.children.push(Node::Text(text.to_string()));
    new_run.children.push(Node::Element(t));
    p.children.push(Node::Element(new_run));
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn build_minimal_docx(document_xml: &str) -> Vec<u8> {
        let mut buf = Vec::new();
        {
            let cursor = Cursor::new(&mut buf);
            let mut writer = ZipWriter::new(cursor);
            let options = FileOptions::default();
            writer.start_file(DOCUMENT_XML, options).unwrap();
            writer.write_all(document_xml.as_bytes()).unwrap();
            writer.finish().unwrap();
        }
        buf
    }

    const SAMPLE_BODY: &str = r#"<w:document xmlns:w="ns"><w:body>
        <w:p><w:pPr><w:pStyle w:val="Heading1"/></w:pPr><w:r><w:t>Title</w:t></w:r></w:p>
        <w:tbl>
            <w:tr><w:tc><w:p><w:r><w:t>Cell A</w:t></w:r></w:p></w:tc>
                  <w:tc><w:p><w:r><w:t>Cell B</w:t></w:r></w:p></w:tc></w:tr>
        </w:tbl>
        <w:p><w:r><w:t>Paragraph two</w:t></w:r></w:p>
    </w:body></w:document>"#;

    #[test]
    fn import_missing_document_xml_fails_with_invalid_docx() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.docx");
        let mut buf = Vec::new();
        {
            let cursor = Cursor::new(&mut buf);
            let mut writer = ZipWriter::new(cursor);
            let options = FileOptions::default();
            writer.start_file("word/other.xml", options).unwrap();
            writer.write_all(b"<x/>").unwrap();
            writer.finish().unwrap();
        }
        std::fs::write(&path, buf).unwrap();

        let err = DocxCodec::import(&path).unwrap_err();
        assert!(matches!(err, CoreError::InvalidDocx));
    }

    #[test]
    fn import_interleaves_paragraphs_and_table_cells_in_document_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.docx");
        std::fs::write(&path, build_minimal_docx(SAMPLE_BODY)).unwrap();

        let infos = DocxCodec::import(&path).unwrap();
        assert_eq!(infos.len(), 4);
        assert_eq!(infos[0].text, "Title");
        assert_eq!(infos[0].style, "Heading1");
        assert!(!infos[0].is_table_cell);

        assert_eq!(infos[1].text, "Cell A");
        assert!(infos[1].is_table_cell);
        assert_eq!(infos[1].table_info, Some((0, 0, 0)));

        assert_eq!(infos[2].text, "Cell B");
        assert_eq!(infos[2].table_info, Some((0, 0, 1)));

        assert_eq!(infos[3].text, "Paragraph two");
        assert!(!infos[3].is_table_cell);

        for (i, info) in infos.iter().enumerate() {
            assert_eq!(info.paragraph_id, i);
            assert_eq!(info.document_position, i as u64);
        }
    }

    #[test]
    fn export_replaces_matched_paragraphs_and_passes_others_through() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("source.docx");
        let dest = dir.path().join("dest.docx");
        std::fs::write(&source, build_minimal_docx(SAMPLE_BODY)).unwrap();

        DocxCodec::export(&source, &dest, &[(0, "Titel".to_string()), (3, "Tweede alinea".to_string())]).unwrap();

        let reimported = DocxCodec::import(&dest).unwrap();
        assert_eq!(reimported[0].text, "Titel");
        assert_eq!(reimported[1].text, "Cell A");
        assert_eq!(reimported[3].text, "Tweede alinea");
    }

    #[test]
    fn run_info_captures_bold_italic_underline_flags() {
        let xml = r#"<w:document xmlns:w="ns"><w:body><w:p>
            <w:r><w:rPr><w:b/><w:i/></w:rPr><w:t>Strong</w:t></w:r>
        </w:p></w:body></w:document>"#;
        let root = parse_document(xml.as_bytes()).unwrap();
        let body = root.first_child_named("body").unwrap();
        let p = body.first_child_named("p").unwrap();
        let runs = collect_runs(p);
        assert_eq!(runs.len(), 1);
        assert!(runs[0].bold);
        assert!(runs[0].italic);
        assert!(!runs[0].underline);
    }
}
