use quick_xml::escape::escape;

use super::element::ConfigElement;

/// Attribute values also need their whitespace characters as references,
/// otherwise a reader normalizes them to spaces.
fn escape_attribute(value: &str) -> String {
    escape(value)
        .replace('\n', "&#10;")
        .replace('\r', "&#13;")
        .replace('\t', "&#9;")
}

fn write_start_tag<'a>(
    element: &ConfigElement,
    attributes: impl Iterator<Item = &'a (String, String)>,
    out: &mut String,
) {
    out.push('<');
    out.push_str(element.kind.as_str());
    for (name, value) in attributes {
        out.push(' ');
        out.push_str(name);
        out.push_str("=\"");
        out.push_str(&escape_attribute(value));
        out.push('"');
    }
}

/// Faithful form: attributes in document order, text and tails as read.
pub(super) fn write_element(element: &ConfigElement, out: &mut String) {
    write_start_tag(element, element.attributes.iter(), out);

    let text = element.text.as_deref().unwrap_or("");
    if element.children.is_empty() && text.is_empty() {
        out.push_str("/>");
    } else {
        out.push('>');
        out.push_str(&escape(text));
        for child in &element.children {
            write_element(child, out);
        }
        out.push_str("</");
        out.push_str(element.kind.as_str());
        out.push('>');
    }

    if let Some(tail) = &element.tail {
        out.push_str(&escape(tail.as_str()));
    }
}

/// Canonical form used for comparisons. Whitespace-only text is dropped and
/// other text is trimmed; tails are ignored.
pub(super) fn write_canonical(element: &ConfigElement, depth: usize, out: &mut String) {
    let indent = "  ".repeat(depth);
    out.push_str(&indent);

    let mut attributes: Vec<_> = element.attributes.iter().collect();
    attributes.sort_by(|a, b| a.0.cmp(&b.0));
    write_start_tag(element, attributes.into_iter(), out);

    let text = element.text.as_deref().map(str::trim).unwrap_or("");
    if element.children.is_empty() {
        if text.is_empty() {
            out.push_str("/>\n");
        } else {
            out.push('>');
            out.push_str(&escape(text));
            out.push_str("</");
            out.push_str(element.kind.as_str());
            out.push_str(">\n");
        }
        return;
    }

    out.push_str(">\n");
    if !text.is_empty() {
        out.push_str(&"  ".repeat(depth + 1));
        out.push_str(&escape(text));
        out.push('\n');
    }
    for child in &element.children {
        write_canonical(child, depth + 1, out);
    }
    out.push_str(&indent);
    out.push_str("</");
    out.push_str(element.kind.as_str());
    out.push_str(">\n");
}
