//! Minimal owned XML tree for wire payloads.
//!
//! The archive protocol exchanges small, shallow documents; this module
//! keeps them as plain owned values that are cheap to build in request
//! code and to walk in response decoding.  Namespaces are carried as
//! literal `xmlns` attributes, the way the protocol uses them.

use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};

use crate::error::{ProtoError, Result};

/// A child of an [`Element`]: either a nested element or a text node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Element(Element),
    Text(String),
}

/// One XML element: name, ordered attributes, ordered children.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    name: String,
    attributes: Vec<(String, String)>,
    children: Vec<Node>,
}

impl Element {
    /// Create an element with no attributes or children.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Builder-style attribute setter.
    pub fn with_attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_attr(name, value);
        self
    }

    /// Set an attribute, replacing any previous value.
    pub fn set_attr(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        if let Some(slot) = self.attributes.iter_mut().find(|(n, _)| *n == name) {
            slot.1 = value;
        } else {
            self.attributes.push((name, value));
        }
    }

    /// Builder-style child appender.
    pub fn with_child(mut self, child: Element) -> Self {
        self.append_child(child);
        self
    }

    /// Builder-style text appender.
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.children.push(Node::Text(text.into()));
        self
    }

    /// Append a child element.
    pub fn append_child(&mut self, child: Element) {
        self.children.push(Node::Element(child));
    }

    /// Element name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Attribute value, if present.
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    /// Number of attributes.
    pub fn attr_count(&self) -> usize {
        self.attributes.len()
    }

    /// All child nodes, in document order.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.children.iter()
    }

    /// Child elements only, in document order.
    pub fn children(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|node| match node {
            Node::Element(el) => Some(el),
            Node::Text(_) => None,
        })
    }

    /// First child element with the given name.
    pub fn first_child(&self, name: &str) -> Option<&Element> {
        self.children().find(|el| el.name == name)
    }

    /// Depth-first search for a descendant element with the given name,
    /// including `self`.
    pub fn find(&self, name: &str) -> Option<&Element> {
        if self.name == name {
            return Some(self);
        }
        self.children().find_map(|child| child.find(name))
    }

    /// Concatenated direct text content.
    pub fn text(&self) -> String {
        let mut out = String::new();
        for node in &self.children {
            if let Node::Text(text) = node {
                out.push_str(text);
            }
        }
        out
    }

    /// Serialize to an XML string.
    pub fn to_xml(&self) -> Result<String> {
        let mut writer = Writer::new(Vec::new());
        self.write_into(&mut writer)?;
        let bytes = writer.into_inner();
        String::from_utf8(bytes)
            .map_err(|e| ProtoError::MalformedPayload(format!("non-UTF8 output: {e}")))
    }

    fn write_into(&self, writer: &mut Writer<Vec<u8>>) -> std::result::Result<(), quick_xml::Error> {
        let mut start = BytesStart::new(self.name.as_str());
        for (name, value) in &self.attributes {
            start.push_attribute((name.as_str(), value.as_str()));
        }

        if self.children.is_empty() {
            writer.write_event(Event::Empty(start))?;
            return Ok(());
        }

        writer.write_event(Event::Start(start))?;
        for node in &self.children {
            match node {
                Node::Element(el) => el.write_into(writer)?,
                Node::Text(text) => writer.write_event(Event::Text(BytesText::new(text)))?,
            }
        }
        writer.write_event(Event::End(BytesEnd::new(self.name.as_str())))?;
        Ok(())
    }

    /// Parse a single XML document into an element tree.
    pub fn parse(xml: &str) -> Result<Self> {
        let mut reader = Reader::from_str(xml);
        reader.trim_text(true);

        let mut stack: Vec<Element> = Vec::new();
        let mut root: Option<Element> = None;
        let mut buf = Vec::new();

        loop {
            match reader.read_event_into(&mut buf)? {
                Event::Start(start) => {
                    stack.push(element_from_start(&start)?);
                }
                Event::Empty(start) => {
                    let element = element_from_start(&start)?;
                    attach(&mut stack, &mut root, element)?;
                }
                Event::Text(text) => {
                    let text = text.unescape()?.into_owned();
                    match stack.last_mut() {
                        Some(parent) => parent.children.push(Node::Text(text)),
                        None => {
                            return Err(ProtoError::MalformedPayload(
                                "text outside the document element".to_string(),
                            ))
                        }
                    }
                }
                Event::End(_) => {
                    let element = stack.pop().ok_or_else(|| {
                        ProtoError::MalformedPayload("unbalanced end tag".to_string())
                    })?;
                    attach(&mut stack, &mut root, element)?;
                }
                Event::Eof => break,
                // Declarations, comments, processing instructions carry no
                // payload information.
                _ => {}
            }
            buf.clear();
        }

        if !stack.is_empty() {
            return Err(ProtoError::MalformedPayload(
                "unclosed element at end of input".to_string(),
            ));
        }
        root.ok_or_else(|| ProtoError::MalformedPayload("empty document".to_string()))
    }
}

fn element_from_start(start: &BytesStart<'_>) -> Result<Element> {
    let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
    let mut element = Element::new(name);
    for attr in start.attributes() {
        let attr = attr.map_err(|e| ProtoError::MalformedPayload(e.to_string()))?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr
            .unescape_value()
            .map_err(ProtoError::Xml)?
            .into_owned();
        element.attributes.push((key, value));
    }
    Ok(element)
}

fn attach(stack: &mut [Element], root: &mut Option<Element>, element: Element) -> Result<()> {
    match stack.last_mut() {
        Some(parent) => {
            parent.children.push(Node::Element(element));
            Ok(())
        }
        None if root.is_none() => {
            *root = Some(element);
            Ok(())
        }
        None => Err(ProtoError::MalformedPayload(
            "multiple document elements".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_and_serializes() {
        let set = Element::new("set")
            .with_attr("xmlns", "http://jabber.org/protocol/rsm")
            .with_child(Element::new("max").with_text("30"));

        assert_eq!(
            set.to_xml().unwrap(),
            r#"<set xmlns="http://jabber.org/protocol/rsm"><max>30</max></set>"#
        );
    }

    #[test]
    fn parses_nested_documents() {
        let parsed = Element::parse(
            r#"<iq type="result"><list xmlns="urn:xmpp:archive">
                 <chat with="peer@example.org" start="2008-08-02T09:03:05Z"/>
               </list></iq>"#,
        )
        .unwrap();

        assert_eq!(parsed.name(), "iq");
        assert_eq!(parsed.attr("type"), Some("result"));

        let list = parsed.first_child("list").expect("list child");
        let chat = list.first_child("chat").expect("chat child");
        assert_eq!(chat.attr("with"), Some("peer@example.org"));
        assert_eq!(chat.attr_count(), 2);
    }

    #[test]
    fn round_trips_through_text() {
        let original = Element::new("chat")
            .with_attr("with", "peer@example.org")
            .with_child(Element::new("body").with_text("a < b & c"))
            .with_child(Element::new("set").with_attr("xmlns", "ns"));

        let xml = original.to_xml().unwrap();
        assert_eq!(Element::parse(&xml).unwrap(), original);
    }

    #[test]
    fn finds_descendants_depth_first() {
        let doc = Element::parse(
            r#"<iq><chat><body>hi</body><set xmlns="ns"><count>5</count></set></chat></iq>"#,
        )
        .unwrap();

        let set = doc.find("set").expect("descendant set");
        assert_eq!(set.first_child("count").unwrap().text(), "5");
        assert!(doc.find("missing").is_none());
    }

    #[test]
    fn rejects_broken_documents() {
        for bad in ["", "<a><b></a>", "<a></a><b/>", "just text"] {
            assert!(Element::parse(bad).is_err(), "{bad:?} should not parse");
        }
    }
}
