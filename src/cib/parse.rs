use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use super::element::{ConfigElement, ElementKind};
use super::CibError;

fn malformed(err: impl std::fmt::Display) -> CibError {
    CibError::Parse(err.to_string())
}

fn start_element(start: &BytesStart<'_>) -> Result<ConfigElement, CibError> {
    let name = start.name();
    let tag = std::str::from_utf8(name.as_ref()).map_err(malformed)?;
    let mut element = ConfigElement::new(ElementKind::from_tag(tag));
    for attr in start.attributes() {
        let attr = attr.map_err(malformed)?;
        let key = std::str::from_utf8(attr.key.as_ref()).map_err(malformed)?;
        let value = attr.unescape_value().map_err(malformed)?;
        element.attributes.push((key.to_string(), value.into_owned()));
    }
    Ok(element)
}

/// Text goes to the innermost open element, or to the tail of its last
/// closed child. Text outside the root element is dropped.
fn append_text(stack: &mut [ConfigElement], text: &str) {
    let Some(parent) = stack.last_mut() else {
        return;
    };
    let slot = match parent.children.last_mut() {
        Some(last) => &mut last.tail,
        None => &mut parent.text,
    };
    slot.get_or_insert_with(String::new).push_str(text);
}

fn close_element(
    stack: &mut Vec<ConfigElement>,
    root: &mut Option<ConfigElement>,
    element: ConfigElement,
) -> Result<(), CibError> {
    match stack.last_mut() {
        Some(parent) => parent.children.push(element),
        None if root.is_none() => *root = Some(element),
        None => return Err(malformed("more than one root element")),
    }
    Ok(())
}

pub(super) fn parse_document(text: &str) -> Result<ConfigElement, CibError> {
    let mut reader = Reader::from_str(text);
    let mut stack: Vec<ConfigElement> = Vec::new();
    let mut root: Option<ConfigElement> = None;

    loop {
        match reader.read_event().map_err(malformed)? {
            Event::Start(start) => {
                if root.is_some() && stack.is_empty() {
                    return Err(malformed("more than one root element"));
                }
                stack.push(start_element(&start)?);
            }
            Event::Empty(start) => {
                let element = start_element(&start)?;
                close_element(&mut stack, &mut root, element)?;
            }
            Event::End(_) => {
                let element = stack
                    .pop()
                    .ok_or_else(|| malformed("unexpected closing tag"))?;
                close_element(&mut stack, &mut root, element)?;
            }
            Event::Text(content) => {
                let content = content.unescape().map_err(malformed)?;
                append_text(&mut stack, &content);
            }
            Event::CData(content) => {
                let content = std::str::from_utf8(&content).map_err(malformed)?;
                append_text(&mut stack, content);
            }
            Event::Eof => break,
            // declarations, comments and processing instructions are not kept
            _ => {}
        }
    }

    if let Some(open) = stack.last() {
        return Err(malformed(format!("unclosed element <{}>", open.kind)));
    }
    root.ok_or_else(|| malformed("document has no root element"))
}
