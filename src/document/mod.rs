//! In-memory model of an XMLTV listings document
//!
//! The document is a rooted tree: a `<tv>` element whose children are an
//! ordered mix of `<programme>` entries (broadcast schedule order) and
//! sibling metadata such as `<channel>` elements. Stages mutate the tree in
//! place; serialization regenerates all indentation, so whitespace-only text
//! is dropped at parse time.

use chrono_tz::Tz;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use tracing::debug;

use crate::errors::DocumentError;
use crate::utils::time::parse_xmltv_datetime;

/// Tag name of a schedule entry
pub const ENTRY_TAG: &str = "programme";

/// A node in the document tree
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Element(Element),
    Text(String),
}

/// An element: tag name, ordered attributes, ordered children
#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<Node>,
}

impl Element {
    pub fn new<S: Into<String>>(name: S) -> Self {
        Self {
            name: name.into(),
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Attribute value by exact name
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Set an attribute, replacing an existing value
    pub fn set_attr<S: Into<String>>(&mut self, name: &str, value: S) {
        let value = value.into();
        if let Some(slot) = self.attributes.iter_mut().find(|(key, _)| key == name) {
            slot.1 = value;
        } else {
            self.attributes.push((name.to_string(), value));
        }
    }

    /// First text node directly under this element
    pub fn text(&self) -> Option<&str> {
        self.children.iter().find_map(|node| match node {
            Node::Text(text) => Some(text.as_str()),
            _ => None,
        })
    }

    /// Replace this element's text content (first text node, appended if none)
    pub fn set_text<S: Into<String>>(&mut self, text: S) {
        let text = text.into();
        if let Some(slot) = self.children.iter_mut().find_map(|node| match node {
            Node::Text(existing) => Some(existing),
            _ => None,
        }) {
            *slot = text;
        } else {
            self.children.push(Node::Text(text));
        }
    }

    /// First child element with the given tag name (linear scan)
    pub fn child(&self, name: &str) -> Option<&Element> {
        self.element_children().find(|el| el.name == name)
    }

    /// Mutable first child element with the given tag name
    pub fn child_mut(&mut self, name: &str) -> Option<&mut Element> {
        self.children.iter_mut().find_map(|node| match node {
            Node::Element(el) if el.name == name => Some(el),
            _ => None,
        })
    }

    /// All child elements with the given tag name, in document order
    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Element> + 'a {
        self.element_children().filter(move |el| el.name == name)
    }

    /// Mutable variant of [`children_named`](Self::children_named)
    pub fn children_named_mut<'a>(
        &'a mut self,
        name: &'a str,
    ) -> impl Iterator<Item = &'a mut Element> + 'a {
        self.children.iter_mut().filter_map(move |node| match node {
            Node::Element(el) if el.name == name => Some(el),
            _ => None,
        })
    }

    /// Text of the first child with the given tag name
    pub fn child_text(&self, name: &str) -> Option<&str> {
        self.child(name).and_then(Element::text)
    }

    /// All child elements in document order
    pub fn element_children(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|node| match node {
            Node::Element(el) => Some(el),
            _ => None,
        })
    }

    pub fn has_child(&self, name: &str) -> bool {
        self.child(name).is_some()
    }

    /// Append a child element at the end of the child list
    pub fn append_child(&mut self, child: Element) {
        self.children.push(Node::Element(child));
    }

    /// Ensure a child with the given tag exists and return it mutably
    pub fn ensure_child(&mut self, name: &str) -> &mut Element {
        let position = self
            .children
            .iter()
            .position(|node| matches!(node, Node::Element(el) if el.name == name));
        let index = match position {
            Some(index) => index,
            None => {
                self.children.push(Node::Element(Element::new(name)));
                self.children.len() - 1
            }
        };
        match &mut self.children[index] {
            Node::Element(el) => el,
            _ => unreachable!(),
        }
    }

    /// Set the text of a named child, creating the child if absent
    pub fn set_child_text<S: Into<String>>(&mut self, name: &str, text: S) {
        self.ensure_child(name).set_text(text);
    }

    /// Remove every child element with the given tag name
    pub fn remove_children(&mut self, name: &str) -> usize {
        let before = self.children.len();
        self.children
            .retain(|node| !matches!(node, Node::Element(el) if el.name == name));
        before - self.children.len()
    }
}

/// A parsed listings document
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub root: Element,
}

impl Document {
    /// Parse a whole listings document held in memory.
    ///
    /// Whitespace-only text nodes, comments and the XML prolog are dropped;
    /// they are regenerated deterministically at serialization time.
    pub fn parse(input: &str) -> Result<Self, DocumentError> {
        let mut reader = Reader::from_str(input);
        let mut stack: Vec<Element> = Vec::new();
        let mut root: Option<Element> = None;

        loop {
            match reader.read_event()? {
                Event::Start(start) => {
                    stack.push(element_from_start(&start)?);
                }
                Event::Empty(start) => {
                    let element = element_from_start(&start)?;
                    attach(&mut stack, &mut root, element)?;
                }
                Event::End(_) => {
                    let element = stack.pop().ok_or_else(|| {
                        DocumentError::structure("close tag without matching open tag")
                    })?;
                    attach(&mut stack, &mut root, element)?;
                }
                Event::Text(text) => {
                    let text = text.unescape()?;
                    let trimmed = text.trim();
                    if !trimmed.is_empty() {
                        if let Some(parent) = stack.last_mut() {
                            parent.children.push(Node::Text(trimmed.to_string()));
                        }
                    }
                }
                Event::CData(cdata) => {
                    let text = String::from_utf8_lossy(&cdata.into_inner()).into_owned();
                    let trimmed = text.trim();
                    if !trimmed.is_empty() {
                        if let Some(parent) = stack.last_mut() {
                            parent.children.push(Node::Text(trimmed.to_string()));
                        }
                    }
                }
                Event::Eof => break,
                // Prolog, comments and processing instructions are regenerated
                Event::Decl(_) | Event::DocType(_) | Event::Comment(_) | Event::PI(_) => {}
            }
        }

        if !stack.is_empty() {
            return Err(DocumentError::structure("unexpected end of document"));
        }

        let root = root.ok_or_else(|| DocumentError::structure("document has no root element"))?;
        if root.name != "tv" {
            return Err(DocumentError::structure(format!(
                "document root is <{}>, expected <tv>",
                root.name
            )));
        }

        Ok(Self { root })
    }

    /// Serialize with the fixed two-line preamble and regenerated indentation.
    ///
    /// Childless elements collapse to a single self-closed line; elements
    /// with text keep the text inline between their tags.
    pub fn to_xml(&self) -> Result<String, DocumentError> {
        let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
        writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
        writer.write_event(Event::DocType(BytesText::from_escaped(
            "tv SYSTEM \"xmltv.dtd\"",
        )))?;
        write_element(&mut writer, &self.root)?;

        let mut output = String::from_utf8(writer.into_inner())
            .map_err(|e| DocumentError::structure(format!("serialized non-UTF-8 output: {}", e)))?;
        output.push('\n');
        Ok(output)
    }

    /// Entries in document (schedule) order
    pub fn entries(&self) -> impl Iterator<Item = &Element> {
        self.root.children.iter().filter_map(|node| match node {
            Node::Element(el) if el.name == ENTRY_TAG => Some(el),
            _ => None,
        })
    }

    /// Mutable entries in document order
    pub fn entries_mut(&mut self) -> impl Iterator<Item = &mut Element> {
        self.root.children.iter_mut().filter_map(|node| match node {
            Node::Element(el) if el.name == ENTRY_TAG => Some(el),
            _ => None,
        })
    }

    pub fn entry_count(&self) -> usize {
        self.entries().count()
    }

    /// Insert a new entry at its schedule position: before the first entry on
    /// the same channel that starts later, after the last entry on that
    /// channel otherwise, or at the end of the document when the channel has
    /// no entries.
    pub fn insert_entry(&mut self, entry: Element, tz: &Tz) {
        let channel = entry.attr("channel").unwrap_or_default().to_string();
        let start = entry
            .attr("start")
            .and_then(|value| parse_xmltv_datetime(value, tz).ok());

        let mut insert_at = None;
        let mut last_same_channel = None;
        for (index, node) in self.root.children.iter().enumerate() {
            let Node::Element(el) = node else { continue };
            if el.name != ENTRY_TAG || el.attr("channel") != Some(channel.as_str()) {
                continue;
            }
            last_same_channel = Some(index);
            if insert_at.is_none() {
                if let (Some(start), Some(existing)) = (
                    start,
                    el.attr("start")
                        .and_then(|value| parse_xmltv_datetime(value, tz).ok()),
                ) {
                    if existing > start {
                        insert_at = Some(index);
                        break;
                    }
                }
            }
        }

        let index = insert_at
            .or(last_same_channel.map(|i| i + 1))
            .unwrap_or(self.root.children.len());
        debug!(
            "inserting entry for channel '{}' at child position {}",
            channel, index
        );
        self.root.children.insert(index, Node::Element(entry));
    }

    /// Remove entries matching a predicate, returning how many were removed
    pub fn remove_entries_where<F>(&mut self, mut predicate: F) -> usize
    where
        F: FnMut(&Element) -> bool,
    {
        let before = self.root.children.len();
        self.root.children.retain(|node| match node {
            Node::Element(el) if el.name == ENTRY_TAG => !predicate(el),
            _ => true,
        });
        before - self.root.children.len()
    }
}

fn element_from_start(start: &BytesStart<'_>) -> Result<Element, DocumentError> {
    let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
    let mut element = Element::new(name);
    for attribute in start.attributes() {
        let attribute = attribute
            .map_err(|e| DocumentError::structure(format!("malformed attribute: {}", e)))?;
        let key = String::from_utf8_lossy(attribute.key.as_ref()).into_owned();
        let value = attribute.unescape_value()?.into_owned();
        element.attributes.push((key, value));
    }
    Ok(element)
}

fn attach(
    stack: &mut Vec<Element>,
    root: &mut Option<Element>,
    element: Element,
) -> Result<(), DocumentError> {
    match stack.last_mut() {
        Some(parent) => {
            parent.children.push(Node::Element(element));
            Ok(())
        }
        None if root.is_none() => {
            *root = Some(element);
            Ok(())
        }
        None => Err(DocumentError::structure(
            "multiple root elements in document",
        )),
    }
}

fn write_element<W: std::io::Write>(
    writer: &mut Writer<W>,
    element: &Element,
) -> Result<(), DocumentError> {
    let mut start = BytesStart::new(element.name.as_str());
    for (key, value) in &element.attributes {
        start.push_attribute((key.as_str(), value.as_str()));
    }

    if element.children.is_empty() {
        writer.write_event(Event::Empty(start))?;
        return Ok(());
    }

    writer.write_event(Event::Start(start))?;
    for child in &element.children {
        match child {
            Node::Element(el) => write_element(writer, el)?,
            Node::Text(text) => writer.write_event(Event::Text(BytesText::new(text)))?,
        }
    }
    writer.write_event(Event::End(BytesEnd::new(element.name.as_str())))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE tv SYSTEM "xmltv.dtd">
<tv generator-info-name="test-feed">
  <channel id="tv1">
    <display-name>TV One</display-name>
  </channel>
  <programme start="20231215203000 +1300" stop="20231215213000 +1300" channel="tv1">
    <title lang="en">News at Eight</title>
    <category>news</category>
    <category>local</category>
  </programme>
  <programme start="20231215213000 +1300" stop="20231215223000 +1300" channel="tv1">
    <title>Late Film &amp; Chat</title>
  </programme>
</tv>"#;

    #[test]
    fn test_parse_preserves_entries_and_metadata() {
        let document = Document::parse(SAMPLE).unwrap();
        assert_eq!(document.entry_count(), 2);
        assert_eq!(document.root.attr("generator-info-name"), Some("test-feed"));
        assert!(document.root.child("channel").is_some());

        let first = document.entries().next().unwrap();
        assert_eq!(first.attr("channel"), Some("tv1"));
        assert_eq!(first.child_text("title"), Some("News at Eight"));
        assert_eq!(first.child("title").unwrap().attr("lang"), Some("en"));
        assert_eq!(first.children_named("category").count(), 2);
    }

    #[test]
    fn test_parse_unescapes_entities() {
        let document = Document::parse(SAMPLE).unwrap();
        let second = document.entries().nth(1).unwrap();
        assert_eq!(second.child_text("title"), Some("Late Film & Chat"));
    }

    #[test]
    fn test_parse_rejects_non_listings_root() {
        let err = Document::parse("<playlist/>").unwrap_err();
        assert!(matches!(err, DocumentError::Structure { .. }));
    }

    #[test]
    fn test_serialize_emits_preamble_and_reindents() {
        let document = Document::parse(SAMPLE).unwrap();
        let output = document.to_xml().unwrap();
        let mut lines = output.lines();
        assert_eq!(lines.next(), Some(r#"<?xml version="1.0" encoding="UTF-8"?>"#));
        assert_eq!(lines.next(), Some(r#"<!DOCTYPE tv SYSTEM "xmltv.dtd">"#));
        assert_eq!(lines.next(), Some(r#"<tv generator-info-name="test-feed">"#));
        assert!(output.contains("    <title lang=\"en\">News at Eight</title>"));
        assert!(output.contains("Late Film &amp; Chat"));
        assert!(output.ends_with("</tv>\n"));
    }

    #[test]
    fn test_serialize_collapses_childless_elements() {
        let input = r#"<tv><programme start="1" channel="tv1">
        </programme></tv>"#;
        let document = Document::parse(input).unwrap();
        let output = document.to_xml().unwrap();
        assert!(output.contains(r#"  <programme start="1" channel="tv1"/>"#));
    }

    #[test]
    fn test_serialization_is_whitespace_insensitive() {
        let compact = SAMPLE.replace("\n  ", "").replace("\n", "");
        let from_pretty = Document::parse(SAMPLE).unwrap().to_xml().unwrap();
        let from_compact = Document::parse(&compact).unwrap().to_xml().unwrap();
        assert_eq!(from_pretty, from_compact);
    }

    #[test]
    fn test_child_mutation_helpers() {
        let mut entry = Element::new("programme");
        entry.set_child_text("title", "Original");
        entry.set_child_text("title", "Replaced");
        assert_eq!(entry.child_text("title"), Some("Replaced"));
        assert_eq!(entry.children_named("title").count(), 1);

        entry.set_child_text("desc", "Something");
        assert_eq!(entry.remove_children("desc"), 1);
        assert!(!entry.has_child("desc"));
    }

    #[test]
    fn test_insert_entry_at_schedule_position() {
        let mut document = Document::parse(SAMPLE).unwrap();
        let mut entry = Element::new("programme");
        entry.set_attr("start", "20231215210000 +1300");
        entry.set_attr("stop", "20231215213000 +1300");
        entry.set_attr("channel", "tv1");
        entry.set_child_text("title", "Weather Update");

        document.insert_entry(entry, &chrono_tz::Pacific::Auckland);

        let titles: Vec<_> = document
            .entries()
            .filter_map(|entry| entry.child_text("title"))
            .collect();
        assert_eq!(
            titles,
            vec!["News at Eight", "Weather Update", "Late Film & Chat"]
        );
    }

    #[test]
    fn test_remove_entries_where() {
        let mut document = Document::parse(SAMPLE).unwrap();
        let removed =
            document.remove_entries_where(|entry| entry.child_text("title") == Some("News at Eight"));
        assert_eq!(removed, 1);
        assert_eq!(document.entry_count(), 1);
        // Sibling metadata is untouched
        assert!(document.root.child("channel").is_some());
    }
}
