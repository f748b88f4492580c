use std::str;

use anyhow::{Context, Result, bail};
use quick_xml::Reader;
use quick_xml::Writer;
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};

/// A mutable element tree with dual text slots: `text` is the character
/// data before the first child, `tail` is the character data following
/// this element, before its next sibling. Character data in a document is
/// split across these two slots rather than owned by one node, and the
/// reference splice relies on both being writable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    pub tag: String,
    pub attrs: Vec<(String, String)>,
    pub text: String,
    pub children: Vec<Element>,
    pub tail: String,
}

impl Element {
    pub fn new(tag: &str) -> Self {
        Element {
            tag: tag.to_string(),
            attrs: Vec::new(),
            text: String::new(),
            children: Vec::new(),
            tail: String::new(),
        }
    }

    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(name, _)| name == key)
            .map(|(_, value)| value.as_str())
    }

    pub fn set_attr(&mut self, key: &str, value: &str) {
        if let Some(entry) = self.attrs.iter_mut().find(|(name, _)| name == key) {
            entry.1 = value.to_string();
            return;
        }
        self.attrs.push((key.to_string(), value.to_string()));
    }
}

pub fn parse(input: &str) -> Result<Element> {
    let mut reader = Reader::from_str(input);
    let mut stack: Vec<Element> = Vec::new();
    let mut root: Option<Element> = None;

    loop {
        match reader.read_event().context("failed to parse XML")? {
            Event::Start(start) => {
                stack.push(element_from_start(&start)?);
            }
            Event::Empty(start) => {
                let element = element_from_start(&start)?;
                attach(&mut stack, &mut root, element)?;
            }
            Event::End(_) => {
                let element = stack
                    .pop()
                    .context("end tag without a matching start tag")?;
                attach(&mut stack, &mut root, element)?;
            }
            Event::Text(text) => {
                let value = text.unescape().context("failed to unescape character data")?;
                append_text(&mut stack, &value)?;
            }
            Event::CData(data) => {
                let value = str::from_utf8(&data)
                    .context("CDATA section is not valid UTF-8")?
                    .to_string();
                append_text(&mut stack, &value)?;
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !stack.is_empty() {
        bail!("document ended with unclosed elements");
    }

    root.context("document has no root element")
}

fn element_from_start(start: &BytesStart<'_>) -> Result<Element> {
    let tag = str::from_utf8(start.name().as_ref())
        .context("element name is not valid UTF-8")?
        .to_string();

    let mut attrs = Vec::new();
    for attribute in start.attributes() {
        let attribute = attribute.context("failed to parse attribute")?;
        let key = str::from_utf8(attribute.key.as_ref())
            .context("attribute name is not valid UTF-8")?
            .to_string();
        let value = attribute
            .unescape_value()
            .context("failed to unescape attribute value")?
            .into_owned();
        attrs.push((key, value));
    }

    Ok(Element {
        tag,
        attrs,
        text: String::new(),
        children: Vec::new(),
        tail: String::new(),
    })
}

fn attach(stack: &mut Vec<Element>, root: &mut Option<Element>, element: Element) -> Result<()> {
    match stack.last_mut() {
        Some(parent) => parent.children.push(element),
        None => {
            if root.is_some() {
                bail!("document has more than one root element");
            }
            *root = Some(element);
        }
    }
    Ok(())
}

fn append_text(stack: &mut [Element], value: &str) -> Result<()> {
    match stack.last_mut() {
        Some(parent) => {
            match parent.children.last_mut() {
                Some(last) => last.tail.push_str(value),
                None => parent.text.push_str(value),
            }
            Ok(())
        }
        None => {
            // whitespace between the declaration and the root is fine
            if value.trim().is_empty() {
                return Ok(());
            }
            bail!("character data outside the root element");
        }
    }
}

pub fn serialize(root: &Element) -> Result<String> {
    let mut writer = Writer::new(Vec::new());
    write_element(&mut writer, root)?;
    String::from_utf8(writer.into_inner()).context("serialized document is not valid UTF-8")
}

fn write_element(writer: &mut Writer<Vec<u8>>, element: &Element) -> Result<()> {
    let mut start = BytesStart::new(element.tag.as_str());
    for (key, value) in &element.attrs {
        start.push_attribute((key.as_str(), value.as_str()));
    }

    if element.text.is_empty() && element.children.is_empty() {
        writer
            .write_event(Event::Empty(start))
            .with_context(|| format!("failed to write element: {}", element.tag))?;
        return Ok(());
    }

    writer
        .write_event(Event::Start(start))
        .with_context(|| format!("failed to write element: {}", element.tag))?;

    if !element.text.is_empty() {
        writer
            .write_event(Event::Text(BytesText::new(&element.text)))
            .with_context(|| format!("failed to write text of element: {}", element.tag))?;
    }

    for child in &element.children {
        write_element(writer, child)?;
        if !child.tail.is_empty() {
            writer
                .write_event(Event::Text(BytesText::new(&child.tail)))
                .with_context(|| format!("failed to write tail after element: {}", child.tag))?;
        }
    }

    writer
        .write_event(Event::End(BytesEnd::new(element.tag.as_str())))
        .with_context(|| format!("failed to close element: {}", element.tag))?;

    Ok(())
}
