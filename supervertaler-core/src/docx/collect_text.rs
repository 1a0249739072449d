//! Tracked-change-aware text extraction, ported from
//! `original_source/Supervertaler_v2.5.0.py`'s `collect_text`/`tidy_text`.

use regex::Regex;

use super::xml_tree::{local_name, Element, Node};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractMode {
    /// Include `w:del`/`w:delText` content, exclude `w:ins`.
    Original,
    /// Include `w:ins` content, exclude `w:del`/`w:delText`.
    Final,
}

/// Recursively collect visible text from a node under `mode`, exactly
/// mirroring the Python source's dispatch on `w:ins`/`w:del`/`w:r`/`w:t`/
/// `w:delText`/`w:tab`/`w:br`.
pub fn collect_text(elem: &Element, mode: ExtractMode) -> String {
    let mut out = String::new();
    collect_text_into(elem, mode, &mut out);
    out
}

fn collect_text_into(elem: &Element, mode: ExtractMode, out: &mut String) {
    match local_name(&elem.tag) {
        "ins" => {
            if mode == ExtractMode::Final {
                for child in elem.child_elements() {
                    collect_text_into(child, mode, out);
                }
            }
        }
        "del" => {
            if mode == ExtractMode::Original {
                for child in elem.child_elements() {
                    collect_text_into(child, mode, out);
                }
            }
        }
        "r" => {
            for child in elem.child_elements() {
                match local_name(&child.tag) {
                    "t" => out.push_str(&child.text_content()),
                    "delText" => {
                        if mode == ExtractMode::Original {
                            out.push_str(&child.text_content());
                        }
                    }
                    "tab" => out.push('\t'),
                    "br" => out.push('\n'),
                    _ => collect_text_into(child, mode, out),
                }
            }
        }
        "t" => out.push_str(&elem.text_content()),
        "delText" => {
            if mode == ExtractMode::Original {
                out.push_str(&elem.text_content());
            }
        }
        "tab" => out.push('\t'),
        "br" => out.push('\n'),
        _ => {
            for child in elem.child_elements() {
                collect_text_into(child, mode, out);
            }
        }
    }
}

/// Also walk bare text nodes a caller holds directly (used when iterating
/// `Node` children rather than `Element` children).
#[allow(dead_code)]
fn collect_node(node: &Node, mode: ExtractMode, out: &mut String) {
    if let Node::Element(e) = node {
        collect_text_into(e, mode, out);
    }
}

/// Collapse trailing spaces before newlines and duplicate line breaks,
/// then trim. Ported verbatim from `tidy_text`.
pub fn tidy_text(s: &str) -> String {
    let collapse_trailing_ws = Regex::new(r"[ \t]+\n").expect("valid regex");
    let collapse_newlines = Regex::new(r"\n+").expect("valid regex");
    let s = collapse_trailing_ws.replace_all(s, "\n");
    let s = collapse_newlines.replace_all(&s, "\n");
    s.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::docx::xml_tree::parse_document;

    fn paragraph_from(xml: &str) -> Element {
        let wrapped = format!(
            r#"<w:document xmlns:w="ns"><w:body>{xml}</w:body></w:document>"#
        );
        let root = parse_document(wrapped.as_bytes()).unwrap();
        let mut paras = Vec::new();
        root.find_all("p", &mut paras);
        paras[0].clone()
    }

    #[test]
    fn tracked_change_paragraph_yields_original_and_final() {
        // "Hello " + del("old ") + ins("new ") + "world."
        let xml = r#"<w:p>
            <w:r><w:t>Hello </w:t></w:r>
            <w:del><w:r><w:delText>old </w:delText></w:r></w:del>
            <w:ins><w:r><w:t>new </w:t></w:r></w:ins>
            <w:r><w:t>world.</w:t></w:r>
        </w:p>"#;
        let p = paragraph_from(xml);
        let original = tidy_text(&collect_text(&p, ExtractMode::Original));
        let final_text = tidy_text(&collect_text(&p, ExtractMode::Final));
        assert_eq!(original, "Hello old world.");
        assert_eq!(final_text, "Hello new world.");
    }

    #[test]
    fn tidy_collapses_trailing_whitespace_and_blank_lines() {
        let s = "line one   \n\n\nline two  \n";
        assert_eq!(tidy_text(s), "line one\nline two");
    }

    #[test]
    fn tab_and_break_elements_translate_to_whitespace() {
        let xml = r#"<w:p><w:r><w:t>A</w:t><w:tab/><w:t>B</w:t><w:br/><w:t>C</w:t></w:r></w:p>"#;
        let p = paragraph_from(xml);
        let text = collect_text(&p, ExtractMode::Final);
        assert_eq!(text, "A\tB\nC");
    }
}
