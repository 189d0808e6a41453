//! In-memory model of the Pacemaker cluster information base (CIB)
//!
//! The CIB is an XML document. Only the parts that resource convergence needs
//! are given meaning here: the `configuration/resources` section and the
//! container tags found inside it. Everything else is carried along untouched
//! so that a document can be read, edited in one place and written back.

pub mod element;
pub mod locate;
mod parse;
mod write;

pub use element::{ConfigElement, ElementKind, ElementPath};
pub use locate::{locate, locate_mut, locate_path};

use thiserror::Error;

/// Errors produced while reading or navigating a CIB document
#[derive(Error, Debug)]
pub enum CibError {
    #[error("Malformed CIB document: {0}")]
    Parse(String),

    #[error("CIB document has no '{0}' section")]
    MissingSection(&'static str),
}

/// A whole CIB document
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigDocument {
    pub root: ConfigElement,
}

impl ConfigDocument {
    pub fn new(root: ConfigElement) -> Self {
        Self { root }
    }

    /// Parse a document from its XML text form.
    pub fn parse(text: &str) -> Result<Self, CibError> {
        parse::parse_document(text).map(Self::new)
    }

    /// Serialize the document, preserving attribute order and whitespace.
    pub fn to_xml_string(&self) -> String {
        let mut out = String::new();
        write::write_element(&self.root, &mut out);
        if !out.ends_with('\n') {
            out.push('\n');
        }
        out
    }

    /// The `configuration/resources` section.
    pub fn resources(&self) -> Result<&ConfigElement, CibError> {
        self.root
            .find_path(&["configuration", "resources"])
            .ok_or(CibError::MissingSection("configuration/resources"))
    }

    pub fn resources_mut(&mut self) -> Result<&mut ConfigElement, CibError> {
        self.root
            .find_path_mut(&["configuration", "resources"])
            .ok_or(CibError::MissingSection("configuration/resources"))
    }
}

/// Render an element in canonical form: two-space indentation, attributes
/// sorted by name and insignificant whitespace dropped. Two elements that
/// differ only in formatting render to identical text.
pub fn canonical_text(element: &ConfigElement) -> String {
    let mut out = String::new();
    write::write_canonical(element, 0, &mut out);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const CIB: &str = r#"<cib epoch="5" num_updates="0" admin_epoch="0">
  <configuration>
    <crm_config/>
    <nodes/>
    <resources>
      <primitive class="ocf" id="test" provider="pacemaker" type="Dummy">
        <operations>
          <op id="test-monitor-interval-10s" interval="10s" name="monitor"/>
        </operations>
      </primitive>
    </resources>
    <constraints/>
  </configuration>
  <status/>
</cib>
"#;

    #[test]
    fn test_parse_and_serialize_preserves_layout() {
        let doc = ConfigDocument::parse(CIB).unwrap();
        assert_eq!(doc.to_xml_string(), CIB);
    }

    #[test]
    fn test_multiline_attribute_survives_serialization() {
        let text = r#"<cib><configuration><resources><primitive id="p"><instance_attributes id="p-ia"><nvpair id="p-ia-motd" name="motd" value="line1&#10;line2&#9;x"/></instance_attributes></primitive></resources></configuration></cib>"#;
        let doc = ConfigDocument::parse(text).unwrap();
        let nvpair = doc
            .root
            .deep_find(|e| e.id() == Some("p-ia-motd"))
            .unwrap();
        assert_eq!(nvpair.attr("value"), Some("line1\nline2\tx"));

        let written = doc.to_xml_string();
        assert!(written.contains(r#"value="line1&#10;line2&#9;x""#));
        let reparsed = ConfigDocument::parse(&written).unwrap();
        assert_eq!(canonical_text(&reparsed.root), canonical_text(&doc.root));
    }

    #[test]
    fn test_resources_section() {
        let doc = ConfigDocument::parse(CIB).unwrap();
        let resources = doc.resources().unwrap();
        assert_eq!(resources.children.len(), 1);
        assert_eq!(resources.children[0].id(), Some("test"));
    }

    #[test]
    fn test_missing_resources_section() {
        let doc = ConfigDocument::parse("<cib><configuration/></cib>").unwrap();
        assert!(matches!(
            doc.resources(),
            Err(CibError::MissingSection("configuration/resources"))
        ));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(matches!(
            ConfigDocument::parse("<cib><configuration></cib>"),
            Err(CibError::Parse(_))
        ));
        assert!(matches!(ConfigDocument::parse(""), Err(CibError::Parse(_))));
    }

    #[test]
    fn test_canonical_text_ignores_formatting() {
        let a = ConfigDocument::parse(
            r#"<primitive type="Dummy" id="a" class="ocf"><operations><op name="monitor" id="o"/></operations></primitive>"#,
        )
        .unwrap();
        let b = ConfigDocument::parse(
            "<primitive class=\"ocf\" id=\"a\" type=\"Dummy\">\n    <operations>\n\t<op id=\"o\" name=\"monitor\"></op>\n    </operations>\n</primitive>",
        )
        .unwrap();
        assert_eq!(canonical_text(&a.root), canonical_text(&b.root));
        assert_eq!(
            canonical_text(&a.root),
            "<primitive class=\"ocf\" id=\"a\" type=\"Dummy\">\n  <operations>\n    <op id=\"o\" name=\"monitor\"/>\n  </operations>\n</primitive>\n"
        );
    }
}
