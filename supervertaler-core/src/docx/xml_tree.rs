//! A minimal generic XML tree, parsed and re-serialised with `quick-xml`.
//!
//! `DocxCodec` and `TrackedChangeExtractor` both need to walk
//! `word/document.xml` the way `original_source/Supervertaler_v2.5.0.py`'s
//! `collect_text` does: a small recursive-descent dispatch over
//! `w:ins`/`w:del`/`w:r`/`w:t`/`w:delText`/`w:tab`/`w:br`. `quick-xml`'s
//! pull-parser events are turned into this tree once per document so the
//! rest of the codec can be written as ordinary recursive functions over
//! nodes, the way the Python source's `xml.etree.ElementTree` nodes are
//! walked.

use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};

use crate::error::{CoreError, Result};

#[derive(Debug, Clone)]
pub struct Element {
    pub tag: String,
    pub attrs: Vec<(String, String)>,
    pub children: Vec<Node>,
}

#[derive(Debug, Clone)]
pub enum Node {
    Element(Element),
    Text(String),
}

impl Element {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            attrs: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == name || local_name(k) == local_name(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn set_attr(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.attrs.push((name.into(), value.into()));
    }

    pub fn child_elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|n| match n {
            Node::Element(e) => Some(e),
            Node::Text(_) => None,
        })
    }

    pub fn first_child_named(&self, tag: &str) -> Option<&Element> {
        self.child_elements().find(|e| local_name(&e.tag) == tag)
    }

    /// Depth-first search for all descendant elements with local name
    /// `tag`, mirroring `root.findall(".//w:p")`.
    pub fn find_all<'a>(&'a self, tag: &str, out: &mut Vec<&'a Element>) {
        for child in self.child_elements() {
            if local_name(&child.tag) == tag {
                out.push(child);
            }
            child.find_all(tag, out);
        }
    }

    pub fn text_content(&self) -> String {
        let mut buf = String::new();
        collect_plain_text(self, &mut buf);
        buf
    }
}

fn collect_plain_text(elem: &Element, buf: &mut String) {
    for child in &elem.children {
        match child {
            Node::Text(t) => buf.push_str(t),
            Node::Element(e) => collect_plain_text(e, buf),
        }
    }
}

/// Strip a namespace prefix (`w:p` → `p`); OOXML parts declare `w:` via
/// `xmlns:w`, which `quick-xml`'s non-namespace-aware reader passes
/// through verbatim in the tag name.
pub fn local_name(tag: &str) -> &str {
    tag.rsplit(':').next().unwrap_or(tag)
}

pub fn parse_document(xml: &[u8]) -> Result<Element> {
    let mut reader = Reader::from_reader(xml);
    reader.trim_text(false);

    let mut stack: Vec<Element> = Vec::new();
    let mut root: Option<Element> = None;
    let mut buf = Vec::new();

    loop {
        match reader
            .read_event_into(&mut buf)
            .map_err(|e| CoreError::CorruptXml(e.to_string()))?
        {
            Event::Start(e) => {
                let elem = start_to_element(&e)?;
                stack.push(elem);
            }
            Event::Empty(e) => {
                let elem = start_to_element(&e)?;
                push_child(&mut stack, Node::Element(elem));
            }
            Event::End(_) => {
                let elem = stack
                    .pop()
                    .ok_or_else(|| CoreError::CorruptXml("unbalanced end tag".to_string()))?;
                if stack.is_empty() {
                    root = Some(elem);
                } else {
                    push_child(&mut stack, Node::Element(elem));
                }
            }
            Event::Text(e) => {
                let text = e.unescape().map_err(|e| CoreError::CorruptXml(e.to_string()))?.into_owned();
                if !stack.is_empty() {
                    push_child(&mut stack, Node::Text(text));
                }
            }
            Event::CData(e) => {
                let text = String::from_utf8_lossy(e.as_ref()).into_owned();
                if !stack.is_empty() {
                    push_child(&mut stack, Node::Text(text));
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    root.ok_or_else(|| CoreError::CorruptXml("no root element found".to_string()))
}

fn push_child(stack: &mut [Element], node: Node) {
    if let Some(parent) = stack.last_mut() {
        parent.children.push(node);
    }
}

fn start_to_element(e: &BytesStart) -> Result<Element> {
    let tag = String::from_utf8_lossy(e.name().as_ref()).into_owned();
    let mut attrs = Vec::new();
    for attr in e.attributes() {
        let attr = attr.map_err(|e| CoreError::CorruptXml(e.to_string()))?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr.unescape_value().map_err(|e| CoreError::CorruptXml(e.to_string()))?.into_owned();
        attrs.push((key, value));
    }
    Ok(Element { tag, attrs, children: Vec::new() })
}

pub fn serialize_document(root: &Element) -> Result<Vec<u8>> {
    let mut writer = Writer::new(Vec::new());
    write_element(&mut writer, root)?;
    Ok(writer.into_inner())
}

fn write_element<W: std::io::Write>(writer: &mut Writer<W>, elem: &Element) -> Result<()> {
    let mut start = BytesStart::new(elem.tag.as_str());
    for (k, v) in &elem.attrs {
        start.push_attribute((k.as_str(), v.as_str()));
    }

    if elem.children.is_empty() {
        writer.write_event(Event::Empty(start)).map_err(|e| CoreError::CorruptXml(e.to_string()))?;
        return Ok(());
    }

    writer.write_event(Event::Start(start)).map_err(|e| CoreError::CorruptXml(e.to_string()))?;
    for child in &elem.children {
        match child {
            Node::Text(t) => {
                writer
                    .write_event(Event::Text(BytesText::new(t)))
                    .map_err(|e| CoreError::CorruptXml(e.to_string()))?;
            }
            Node::Element(e) => write_element(writer, e)?,
        }
    }
    writer
        .write_event(Event::End(BytesEnd::new(elem.tag.as_str())))
        .map_err(|e| CoreError::CorruptXml(e.to_string()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_a_simple_paragraph() {
        let xml = br#"<w:document xmlns:w="ns"><w:body><w:p><w:r><w:t>Hello</w:t></w:r></w:p></w:body></w:document>"#;
        let root = parse_document(xml).unwrap();
        assert_eq!(local_name(&root.tag), "document");
        let mut paras = Vec::new();
        root.find_all("p", &mut paras);
        assert_eq!(paras.len(), 1);
        assert_eq!(paras[0].text_content(), "Hello");

        let out = serialize_document(&root).unwrap();
        let reparsed = parse_document(&out).unwrap();
        let mut paras2 = Vec::new();
        reparsed.find_all("p", &mut paras2);
        assert_eq!(paras2[0].text_content(), "Hello");
    }
}
