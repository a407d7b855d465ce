//! Decoding of the XML files served by the WES into a nested [`Document`].
//!
//! The device answers with small hand-templated XML files (`DATA.cgx` and
//! friends) whose layout depends on the firmware and on the template that was
//! uploaded. Instead of binding them to fixed structs, the body is turned into
//! a tree of string keys:
//!
//! * an element without children becomes [`Node::Text`] holding its exact text,
//! * an element with children becomes [`Node::Element`],
//! * repeated sibling elements are collected into [`Node::List`],
//! * attributes are stored as `@name` keys and the text of an element that
//!   also has children or attributes as `#text`.

use std::collections::btree_map::{self, BTreeMap};
use std::io::Read;

use xml::reader::{EventReader, XmlEvent};

use crate::error::Result;

/// Key of the wrapper element the WES puts around every status file.
pub const DATA_KEY: &str = "data";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Text(String),
    Element(Document),
    List(Vec<Node>),
}

impl Node {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Node::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_document(&self) -> Option<&Document> {
        match self {
            Node::Element(doc) => Some(doc),
            _ => None,
        }
    }
}

/// Mapping from element names to [`Node`]s. One poll of the device produces
/// one document which is never mutated afterwards.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Document(BTreeMap<String, Node>);

impl Document {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn get(&self, key: &str) -> Option<&Node> {
        self.0.get(key)
    }

    /// Follows `path` through nested elements. Any missing segment (or a
    /// segment that is not an element) yields `None`.
    pub fn lookup(&self, path: &[&str]) -> Option<&Node> {
        let (first, rest) = path.split_first()?;
        rest.iter()
            .try_fold(self.get(first)?, |node, key| node.as_document()?.get(key))
    }

    /// Text of the leaf at `path`.
    pub fn text(&self, path: &[&str]) -> Option<&str> {
        self.lookup(path).and_then(Node::as_text)
    }

    pub fn section(&self, key: &str) -> Option<&Document> {
        self.get(key).and_then(Node::as_document)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> btree_map::Iter<'_, String, Node> {
        self.0.iter()
    }

    /// Unwraps the `<data>` element the device wraps its files in. Documents
    /// without the wrapper are returned as they are.
    pub fn into_data(mut self) -> Document {
        match self.0.remove(DATA_KEY) {
            Some(Node::Element(data)) => data,
            Some(Node::Text(text)) if text.is_empty() => Document::new(),
            Some(other) => {
                self.0.insert(DATA_KEY.to_string(), other);
                self
            }
            None => self,
        }
    }

    fn insert(&mut self, key: String, node: Node) {
        match self.0.entry(key) {
            btree_map::Entry::Vacant(entry) => {
                entry.insert(node);
            }
            btree_map::Entry::Occupied(mut entry) => match entry.get_mut() {
                Node::List(items) => items.push(node),
                existing => {
                    let first = std::mem::replace(existing, Node::List(Vec::new()));
                    *existing = Node::List(vec![first, node]);
                }
            },
        }
    }
}

impl<'a> IntoIterator for &'a Document {
    type Item = (&'a String, &'a Node);
    type IntoIter = btree_map::Iter<'a, String, Node>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

// -=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-

struct Frame {
    name: String,
    children: Document,
    text: String,
}

impl Frame {
    fn new(name: String) -> Self {
        Frame {
            name,
            children: Document::new(),
            text: String::new(),
        }
    }

    fn into_node(self) -> (String, Node) {
        let Frame {
            name,
            mut children,
            text,
        } = self;
        if children.is_empty() {
            return (name, Node::Text(text));
        }
        if !text.trim().is_empty() {
            children.insert("#text".to_string(), Node::Text(text));
        }
        (name, Node::Element(children))
    }
}

/// Parses a complete XML body. The encoding declaration of the body is
/// honored, so pass the raw bytes rather than a decoded string.
pub fn parse_document(body: impl Read) -> Result<Document> {
    let mut stack = vec![Frame::new(String::new())];

    for event in EventReader::new(body) {
        match event? {
            XmlEvent::StartElement {
                name, attributes, ..
            } => {
                let mut frame = Frame::new(name.local_name);
                for attr in attributes {
                    frame
                        .children
                        .insert(format!("@{}", attr.name.local_name), Node::Text(attr.value));
                }
                stack.push(frame);
            }
            XmlEvent::EndElement { .. } => {
                // the reader rejects unbalanced end tags, the root frame is never popped
                if stack.len() > 1 {
                    if let Some(frame) = stack.pop() {
                        let (name, node) = frame.into_node();
                        if let Some(parent) = stack.last_mut() {
                            parent.children.insert(name, node);
                        }
                    }
                }
            }
            XmlEvent::Characters(text) | XmlEvent::CData(text) | XmlEvent::Whitespace(text) => {
                if let Some(frame) = stack.last_mut() {
                    frame.text.push_str(&text);
                }
            }
            _ => {}
        }
    }

    Ok(stack
        .into_iter()
        .next()
        .map(|root| root.children)
        .unwrap_or_default())
}

/// Parses a status file and unwraps its `<data>` element.
pub fn parse_status_document(body: impl Read) -> Result<Document> {
    parse_document(body).map(Document::into_data)
}

#[cfg(test)]
mod tests {
    use super::*;

    const STATUS: &str = r##"<?xml version="1.0" encoding="UTF-8"?>
<data>
  <info>
    <serial>0123456789AB</serial>
    <hardware>3</hardware>
    <firmware>V0.84A</firmware>
  </info>
  <clamps>
    <V>230</V>
    <clamp1>
      <I>2.5</I>
      <power>500 W cos phi 0.98</power>
      <index>12345</index>
      <idxinject>0</idxinject>
      <enabled>1</enabled>
    </clamp1>
  </clamps>
  <relays>
    <relay1><enabled></enabled></relay1>
  </relays>
</data>
"##;

    #[test]
    fn parse_status() {
        let doc = parse_status_document(STATUS.as_bytes()).unwrap();
        assert_eq!(doc.text(&["info", "serial"]), Some("0123456789AB"));
        assert_eq!(doc.text(&["clamps", "V"]), Some("230"));
        assert_eq!(
            doc.text(&["clamps", "clamp1", "power"]),
            Some("500 W cos phi 0.98")
        );
        assert_eq!(doc.text(&["relays", "relay1", "enabled"]), Some(""));
        assert!(doc.get(DATA_KEY).is_none());
    }

    #[test]
    fn leaf_text_is_kept_verbatim() {
        let doc = parse_document(&b"<data><a> spaced  </a><b>MiXeD</b></data>"[..]).unwrap();
        let data = doc.section("data").unwrap();
        assert_eq!(data.text(&["a"]), Some(" spaced  "));
        assert_eq!(data.text(&["b"]), Some("MiXeD"));
    }

    #[test]
    fn missing_path_segments() {
        let doc = parse_status_document(STATUS.as_bytes()).unwrap();
        assert_eq!(doc.text(&["clamps", "clamp9", "I"]), None);
        assert_eq!(doc.text(&["clamps", "V", "deeper"]), None);
        assert_eq!(doc.text(&["clamps", "clamp1"]), None);
        assert_eq!(doc.lookup(&[]), None);
    }

    #[test]
    fn without_data_wrapper() {
        let doc = parse_status_document(&b"<probes><probe1>21.5</probe1></probes>"[..]).unwrap();
        assert_eq!(doc.text(&["probes", "probe1"]), Some("21.5"));
    }

    #[test]
    fn attributes_and_repeated_elements() {
        let xml = r#"<data><tic id="1">on<x>1</x></tic><p>a</p><p>b</p></data>"#;
        let doc = parse_status_document(xml.as_bytes()).unwrap();
        assert_eq!(doc.text(&["tic", "@id"]), Some("1"));
        assert_eq!(doc.text(&["tic", "#text"]), Some("on"));
        assert_eq!(
            doc.get("p"),
            Some(&Node::List(vec![
                Node::Text("a".to_string()),
                Node::Text("b".to_string())
            ]))
        );
    }

    #[test]
    fn decoding_is_idempotent() {
        let a = parse_status_document(STATUS.as_bytes()).unwrap();
        let b = parse_status_document(STATUS.as_bytes()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn malformed_xml() {
        assert!(parse_document(&b"<data><clamps></data>"[..]).is_err());
        assert!(parse_document(&b""[..]).is_err());
    }
}
