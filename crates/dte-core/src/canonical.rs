//! # Canonical XML — Deterministic Byte Production
//!
//! This module defines `CanonicalXml`, the sole construction path for XML
//! bytes that are digested, signed, or transmitted.
//!
//! ## Security Invariant
//!
//! `CanonicalXml` has a private inner field. It is produced only by
//! [`CanonicalXml::render()`] from an [`XmlElement`] tree, or by
//! [`CanonicalXml::parse_strict()`], which accepts input only if it is
//! byte-identical to the rendering of its own parse tree.
//!
//! ## Canonical Form
//!
//! 1. **Child order is construction order.** Builders fix field order; the
//!    renderer never reorders elements.
//! 2. **Attributes sorted by name.** Duplicate names are replaced, not
//!    repeated.
//! 3. **No incidental whitespace.** No indentation, no newlines, no XML
//!    declaration, no comments.
//! 4. **Empty elements self-close** (`<Name/>`).
//! 5. **Minimal escaping.** Text escapes `&`, `<`, `>`; attribute values
//!    additionally escape `"`.
//!
//! Identical logical input therefore always yields byte-identical output.

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::error::XmlError;

/// A node inside an [`XmlElement`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum XmlNode {
    /// Nested element.
    Element(XmlElement),
    /// Character data (unescaped).
    Text(String),
}

/// An in-memory XML element tree.
///
/// Used both to build outbound documents and to inspect parsed Authority
/// responses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlElement {
    name: String,
    attributes: Vec<(String, String)>,
    children: Vec<XmlNode>,
}

impl XmlElement {
    /// Start a new element with no attributes or children.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Set an attribute, replacing any existing value with the same name.
    pub fn attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let name = name.into();
        let value = value.into();
        match self.attributes.iter_mut().find(|(k, _)| *k == name) {
            Some(slot) => slot.1 = value,
            None => self.attributes.push((name, value)),
        }
        self
    }

    /// Append a child element.
    pub fn child(mut self, child: XmlElement) -> Self {
        self.children.push(XmlNode::Element(child));
        self
    }

    /// Append a child element in place.
    pub fn push(&mut self, child: XmlElement) {
        self.children.push(XmlNode::Element(child));
    }

    /// Append character data. Empty strings are ignored.
    pub fn text(mut self, text: impl Into<String>) -> Self {
        let text = text.into();
        if !text.is_empty() {
            self.children.push(XmlNode::Text(text));
        }
        self
    }

    /// Append `<name>text</name>`.
    pub fn text_child(self, name: impl Into<String>, text: impl Into<String>) -> Self {
        self.child(XmlElement::new(name).text(text))
    }

    /// Append `<name>text</name>` only when `text` is present.
    pub fn optional_text_child(self, name: &str, text: Option<&str>) -> Self {
        match text {
            Some(t) => self.text_child(name, t),
            None => self,
        }
    }

    /// Element name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Attribute value by name.
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// All attributes in insertion order.
    pub fn attributes(&self) -> &[(String, String)] {
        &self.attributes
    }

    /// All child nodes.
    pub fn nodes(&self) -> &[XmlNode] {
        &self.children
    }

    /// Child elements, skipping text.
    pub fn elements(&self) -> impl Iterator<Item = &XmlElement> {
        self.children.iter().filter_map(|n| match n {
            XmlNode::Element(e) => Some(e),
            XmlNode::Text(_) => None,
        })
    }

    /// First child element with the given name.
    pub fn find(&self, name: &str) -> Option<&XmlElement> {
        self.elements().find(|e| e.name == name)
    }

    /// All child elements with the given name.
    pub fn find_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a XmlElement> + 'a {
        self.elements().filter(move |e| e.name == name)
    }

    /// First descendant (depth-first, self excluded) with the given name.
    pub fn descendant(&self, name: &str) -> Option<&XmlElement> {
        for child in self.elements() {
            if child.name == name {
                return Some(child);
            }
            if let Some(found) = child.descendant(name) {
                return Some(found);
            }
        }
        None
    }

    /// Concatenated direct text content.
    pub fn text_content(&self) -> String {
        self.children
            .iter()
            .filter_map(|n| match n {
                XmlNode::Text(t) => Some(t.as_str()),
                XmlNode::Element(_) => None,
            })
            .collect()
    }

    /// Trimmed text of the first child element with the given name.
    pub fn child_text(&self, name: &str) -> Option<String> {
        self.find(name).map(|e| e.text_content().trim().to_string())
    }

    /// Parse an XML document into a tree.
    ///
    /// The declaration, comments and processing instructions are skipped.
    /// Whitespace-only text outside the root element is ignored; inside
    /// elements it is preserved.
    pub fn parse(input: &str) -> Result<XmlElement, XmlError> {
        let mut reader = Reader::from_str(input);
        let mut stack: Vec<XmlElement> = Vec::new();
        let mut root: Option<XmlElement> = None;

        loop {
            match reader.read_event()? {
                Event::Start(start) => stack.push(element_from_start(&start)?),
                Event::Empty(start) => {
                    let element = element_from_start(&start)?;
                    attach(&mut stack, &mut root, element)?;
                }
                Event::End(_) => {
                    let element = stack
                        .pop()
                        .ok_or_else(|| XmlError::Structure("unbalanced end tag".to_string()))?;
                    attach(&mut stack, &mut root, element)?;
                }
                Event::Text(text) => {
                    let text = text.unescape()?.into_owned();
                    match stack.last_mut() {
                        Some(parent) => parent.children.push(XmlNode::Text(text)),
                        None if text.trim().is_empty() => {}
                        None => {
                            return Err(XmlError::Structure(
                                "character data outside the root element".to_string(),
                            ))
                        }
                    }
                }
                Event::CData(data) => {
                    let text = String::from_utf8(data.into_inner().into_owned()).map_err(|e| {
                        XmlError::Structure(format!("CDATA is not UTF-8: {e}"))
                    })?;
                    match stack.last_mut() {
                        Some(parent) => parent.children.push(XmlNode::Text(text)),
                        None => {
                            return Err(XmlError::Structure(
                                "CDATA outside the root element".to_string(),
                            ))
                        }
                    }
                }
                Event::Decl(_) | Event::Comment(_) | Event::PI(_) => {}
                Event::DocType(_) => {
                    return Err(XmlError::Structure("DOCTYPE is not accepted".to_string()))
                }
                Event::Eof => break,
            }
        }

        if !stack.is_empty() {
            return Err(XmlError::Structure("unclosed element".to_string()));
        }
        root.ok_or_else(|| XmlError::MissingElement("root".to_string()))
    }
}

fn element_from_start(start: &BytesStart<'_>) -> Result<XmlElement, XmlError> {
    let name = std::str::from_utf8(start.name().as_ref())
        .map_err(|e| XmlError::Structure(format!("element name is not UTF-8: {e}")))?
        .to_string();
    let mut element = XmlElement::new(name);
    for attr in start.attributes() {
        let attr = attr?;
        let key = std::str::from_utf8(attr.key.as_ref())
            .map_err(|e| XmlError::Structure(format!("attribute name is not UTF-8: {e}")))?
            .to_string();
        let value = attr.unescape_value()?.into_owned();
        element.attributes.push((key, value));
    }
    Ok(element)
}

fn attach(
    stack: &mut [XmlElement],
    root: &mut Option<XmlElement>,
    element: XmlElement,
) -> Result<(), XmlError> {
    match stack.last_mut() {
        Some(parent) => {
            parent.children.push(XmlNode::Element(element));
            Ok(())
        }
        None if root.is_none() => {
            *root = Some(element);
            Ok(())
        }
        None => Err(XmlError::Structure("multiple root elements".to_string())),
    }
}

/// XML produced exclusively by the canonical renderer.
///
/// # Invariants
///
/// - Constructed only via [`render()`](Self::render) or
///   [`parse_strict()`](Self::parse_strict).
/// - Rendering the same tree twice yields identical bytes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CanonicalXml(String);

impl CanonicalXml {
    /// Render an element tree in canonical form.
    ///
    /// # Errors
    ///
    /// Returns `XmlError::InvalidName` if any element or attribute name is
    /// not a valid XML name.
    pub fn render(element: &XmlElement) -> Result<Self, XmlError> {
        let mut out = String::new();
        write_element(&mut out, element)?;
        Ok(Self(out))
    }

    /// Parse `input` and accept it only if it is already canonical.
    ///
    /// Returns the canonical bytes together with the parse tree. Any
    /// deviation in whitespace, attribute order, escaping, or declarations
    /// yields `XmlError::NotCanonical`.
    pub fn parse_strict(input: &str) -> Result<(Self, XmlElement), XmlError> {
        let tree = XmlElement::parse(input)?;
        let rendered = Self::render(&tree)?;
        if rendered.0 != input {
            return Err(XmlError::NotCanonical);
        }
        Ok((rendered, tree))
    }

    /// The canonical text.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The canonical bytes.
    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }

    /// Byte length.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the rendering is empty (never true for a rendered element).
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The wire form: canonical text preceded by an XML declaration.
    pub fn with_declaration(&self) -> String {
        format!("<?xml version=\"1.0\" encoding=\"UTF-8\"?>{}", self.0)
    }

    /// Consume into the canonical text.
    pub fn into_string(self) -> String {
        self.0
    }
}

impl AsRef<[u8]> for CanonicalXml {
    fn as_ref(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl std::fmt::Display for CanonicalXml {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

fn write_element(out: &mut String, element: &XmlElement) -> Result<(), XmlError> {
    validate_name(&element.name)?;
    out.push('<');
    out.push_str(&element.name);

    let mut attributes: Vec<&(String, String)> = element.attributes.iter().collect();
    attributes.sort_by(|a, b| a.0.cmp(&b.0));
    for (key, value) in attributes {
        validate_name(key)?;
        out.push(' ');
        out.push_str(key);
        out.push_str("=\"");
        escape_into(out, value, true);
        out.push('"');
    }

    if element.children.is_empty() {
        out.push_str("/>");
        return Ok(());
    }

    out.push('>');
    for child in &element.children {
        match child {
            XmlNode::Element(e) => write_element(out, e)?,
            XmlNode::Text(t) => escape_into(out, t, false),
        }
    }
    out.push_str("</");
    out.push_str(&element.name);
    out.push('>');
    Ok(())
}

fn escape_into(out: &mut String, raw: &str, attribute: bool) {
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' if attribute => out.push_str("&quot;"),
            other => out.push(other),
        }
    }
}

fn validate_name(name: &str) -> Result<(), XmlError> {
    let mut chars = name.chars();
    let valid = match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
        }
        _ => false,
    };
    if valid {
        Ok(())
    } else {
        Err(XmlError::InvalidName(name.to_string()))
    }
}
