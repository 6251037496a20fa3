//! Minimal XML element tree
//!
//! Built on `quick_xml`'s pull reader. Attribute and element names keep
//! their prefixes (`xml:lang`, `xlink:href`), which is how JATS documents
//! are addressed.

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::errors::PackagingError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Element(Element),
    Text(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    pub name: String,
    pub attrs: Vec<(String, String)>,
    pub children: Vec<Node>,
}

impl Element {
    fn from_start(e: &BytesStart<'_>) -> Result<Self, PackagingError> {
        let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
        let mut attrs = Vec::new();
        for attr in e.attributes() {
            let attr = attr.map_err(|err| PackagingError::MalformedXml(err.to_string()))?;
            let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
            let value = attr
                .unescape_value()
                .map_err(|err| PackagingError::MalformedXml(err.to_string()))?
                .into_owned();
            attrs.push((key, value));
        }
        Ok(Self {
            name,
            attrs,
            children: Vec::new(),
        })
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|n| match n {
            Node::Element(e) => Some(e),
            Node::Text(_) => None,
        })
    }

    /// First direct child named `name`
    pub fn child(&self, name: &str) -> Option<&Element> {
        self.elements().find(|e| e.name == name)
    }

    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Element> + 'a {
        self.elements().filter(move |e| e.name == name)
    }

    /// Depth-first walk of every descendant element, excluding `self`.
    pub fn descendants(&self) -> Vec<&Element> {
        let mut out = Vec::new();
        let mut stack: Vec<&Element> = self.elements().collect::<Vec<_>>();
        stack.reverse();
        while let Some(e) = stack.pop() {
            out.push(e);
            let mut kids: Vec<&Element> = e.elements().collect();
            kids.reverse();
            stack.extend(kids);
        }
        out
    }

    pub fn find_all<'a>(&'a self, name: &str) -> Vec<&'a Element> {
        self.descendants()
            .into_iter()
            .filter(|e| e.name == name)
            .collect()
    }

    pub fn find(&self, name: &str) -> Option<&Element> {
        self.descendants().into_iter().find(|e| e.name == name)
    }

    /// Element text with whitespace collapsed
    pub fn text(&self) -> String {
        self.text_excluding(&[])
    }

    /// Element text, skipping child elements with the given names.
    pub fn text_excluding(&self, skip: &[&str]) -> String {
        let mut raw = String::new();
        collect_text(self, skip, &mut raw);
        raw.split_whitespace().collect::<Vec<_>>().join(" ")
    }
}

// Words in adjacent block elements are kept apart; inline markup is not.
const BLOCK_ELEMENTS: &[&str] = &["p", "sec", "title", "list-item", "def", "term"];

fn collect_text(element: &Element, skip: &[&str], out: &mut String) {
    for node in &element.children {
        match node {
            Node::Text(t) => out.push_str(t),
            Node::Element(e) if skip.contains(&e.name.as_str()) => {}
            Node::Element(e) if BLOCK_ELEMENTS.contains(&e.name.as_str()) => {
                out.push(' ');
                collect_text(e, skip, out);
                out.push(' ');
            }
            Node::Element(e) => collect_text(e, skip, out),
        }
    }
}

/// Parse a document and return its root element.
pub fn parse(xml: &str) -> Result<Element, PackagingError> {
    let mut reader = Reader::from_str(xml);
    let mut stack: Vec<Element> = Vec::new();
    let mut root: Option<Element> = None;

    loop {
        let event = reader
            .read_event()
            .map_err(|e| PackagingError::MalformedXml(e.to_string()))?;

        match event {
            Event::Start(ref e) => stack.push(Element::from_start(e)?),
            Event::Empty(ref e) => {
                let element = Element::from_start(e)?;
                attach(&mut stack, &mut root, element)?;
            }
            Event::End(_) => {
                let element = stack
                    .pop()
                    .ok_or_else(|| PackagingError::MalformedXml("unbalanced end tag".to_string()))?;
                attach(&mut stack, &mut root, element)?;
            }
            Event::Text(ref e) => {
                if let Some(parent) = stack.last_mut() {
                    // Entities outside the predefined set are kept verbatim.
                    let text = e
                        .unescape()
                        .map(|t| t.into_owned())
                        .unwrap_or_else(|_| String::from_utf8_lossy(e).into_owned());
                    parent.children.push(Node::Text(text));
                }
            }
            Event::CData(e) => {
                if let Some(parent) = stack.last_mut() {
                    let text = String::from_utf8_lossy(&e.into_inner()).into_owned();
                    parent.children.push(Node::Text(text));
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !stack.is_empty() {
        return Err(PackagingError::MalformedXml(format!(
            "unclosed element <{}>",
            stack.last().map(|e| e.name.as_str()).unwrap_or_default()
        )));
    }
    root.ok_or_else(|| PackagingError::MalformedXml("document has no root element".to_string()))
}

fn attach(
    stack: &mut [Element],
    root: &mut Option<Element>,
    element: Element,
) -> Result<(), PackagingError> {
    match stack.last_mut() {
        Some(parent) => parent.children.push(Node::Element(element)),
        None if root.is_none() => *root = Some(element),
        None => {
            return Err(PackagingError::MalformedXml(
                "more than one root element".to_string(),
            ))
        }
    }
    Ok(())
}
