//! Typed CIB element tree

use std::fmt;

/// Tag of a CIB element. Tags the convergence logic reasons about get their
/// own variant; all others are kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ElementKind {
    Primitive,
    Group,
    Clone,
    /// Legacy multistate wrapper (`<master>`), used by pcs 0.9
    Master,
    MetaAttributes,
    Nvpair,
    Other(String),
}

impl ElementKind {
    pub fn from_tag(tag: &str) -> Self {
        match tag {
            "primitive" => Self::Primitive,
            "group" => Self::Group,
            "clone" => Self::Clone,
            "master" => Self::Master,
            "meta_attributes" => Self::MetaAttributes,
            "nvpair" => Self::Nvpair,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Primitive => "primitive",
            Self::Group => "group",
            Self::Clone => "clone",
            Self::Master => "master",
            Self::MetaAttributes => "meta_attributes",
            Self::Nvpair => "nvpair",
            Self::Other(tag) => tag,
        }
    }

    /// Tags the resource locator is allowed to descend into
    pub fn is_resource_container(&self) -> bool {
        matches!(
            self,
            Self::Primitive | Self::Group | Self::Clone | Self::Master
        )
    }
}

impl fmt::Display for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Position of an element below some ancestor, as child indices.
///
/// An `ElementPath` stays valid while the elements along it are replaced in
/// place, which is what [`ConfigElement::replace_subtree`] does.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ElementPath(pub Vec<usize>);

impl ElementPath {
    pub fn child(&self, index: usize) -> Self {
        let mut indices = self.0.clone();
        indices.push(index);
        Self(indices)
    }
}

/// One node of the CIB tree
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigElement {
    pub kind: ElementKind,
    /// Attributes in document order. Names are unique.
    pub attributes: Vec<(String, String)>,
    pub children: Vec<ConfigElement>,
    /// Text between the start tag and the first child
    pub text: Option<String>,
    /// Text between the end tag and the next sibling
    pub tail: Option<String>,
}

impl ConfigElement {
    pub fn new(kind: ElementKind) -> Self {
        Self {
            kind,
            attributes: Vec::new(),
            children: Vec::new(),
            text: None,
            tail: None,
        }
    }

    pub fn with_attr(mut self, name: &str, value: &str) -> Self {
        self.set_attr(name, value);
        self
    }

    pub fn with_child(mut self, child: ConfigElement) -> Self {
        self.children.push(child);
        self
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn id(&self) -> Option<&str> {
        self.attr("id")
    }

    /// Set an attribute, keeping its position if it already exists.
    pub fn set_attr(&mut self, name: &str, value: &str) {
        match self.attributes.iter_mut().find(|(key, _)| key == name) {
            Some((_, existing)) => *existing = value.to_string(),
            None => self
                .attributes
                .push((name.to_string(), value.to_string())),
        }
    }

    pub fn is(&self, kind: &ElementKind) -> bool {
        &self.kind == kind
    }

    /// First direct child with the given tag
    pub fn child(&self, tag: &str) -> Option<&ConfigElement> {
        self.children.iter().find(|c| c.kind.as_str() == tag)
    }

    pub fn child_mut(&mut self, tag: &str) -> Option<&mut ConfigElement> {
        self.children.iter_mut().find(|c| c.kind.as_str() == tag)
    }

    /// Follow a chain of child tags, e.g. `["configuration", "resources"]`.
    pub fn find_path(&self, tags: &[&str]) -> Option<&ConfigElement> {
        tags.iter().try_fold(self, |elem, tag| elem.child(tag))
    }

    pub fn find_path_mut(&mut self, tags: &[&str]) -> Option<&mut ConfigElement> {
        let mut current = self;
        for tag in tags {
            current = current.child_mut(tag)?;
        }
        Some(current)
    }

    pub fn element_at(&self, path: &ElementPath) -> Option<&ConfigElement> {
        path.0
            .iter()
            .try_fold(self, |elem, &index| elem.children.get(index))
    }

    pub fn element_at_mut(&mut self, path: &ElementPath) -> Option<&mut ConfigElement> {
        let mut current = self;
        for &index in &path.0 {
            current = current.children.get_mut(index)?;
        }
        Some(current)
    }

    /// Pre-order iterator over every element below this one (not including
    /// this one).
    pub fn descendants(&self) -> Descendants<'_> {
        Descendants {
            stack: self.children.iter().rev().collect(),
        }
    }

    /// First descendant, in document order, matching `predicate`
    pub fn deep_find<P>(&self, mut predicate: P) -> Option<&ConfigElement>
    where
        P: FnMut(&ConfigElement) -> bool,
    {
        self.descendants().find(|elem| predicate(elem))
    }

    /// Take over the tag, attributes, text, tail and children of
    /// `replacement`. The element itself stays where it is in its parent.
    pub fn replace_subtree(&mut self, replacement: ConfigElement) {
        let ConfigElement {
            kind,
            attributes,
            children,
            text,
            tail,
        } = replacement;
        self.kind = kind;
        self.attributes = attributes;
        self.children = children;
        self.text = text;
        self.tail = tail;
    }
}

/// Iterator returned by [`ConfigElement::descendants`]
pub struct Descendants<'a> {
    stack: Vec<&'a ConfigElement>,
}

impl<'a> Iterator for Descendants<'a> {
    type Item = &'a ConfigElement;

    fn next(&mut self) -> Option<Self::Item> {
        let next = self.stack.pop()?;
        self.stack.extend(next.children.iter().rev());
        Some(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nvpair(id: &str, name: &str, value: &str) -> ConfigElement {
        ConfigElement::new(ElementKind::Nvpair)
            .with_attr("id", id)
            .with_attr("name", name)
            .with_attr("value", value)
    }

    fn sample() -> ConfigElement {
        ConfigElement::new(ElementKind::Other("resources".into()))
            .with_child(
                ConfigElement::new(ElementKind::Group)
                    .with_attr("id", "grp")
                    .with_child(ConfigElement::new(ElementKind::Primitive).with_attr("id", "a"))
                    .with_child(
                        ConfigElement::new(ElementKind::Primitive)
                            .with_attr("id", "b")
                            .with_child(
                                ConfigElement::new(ElementKind::MetaAttributes)
                                    .with_attr("id", "b-meta")
                                    .with_child(nvpair("b-meta-tr", "target-role", "Stopped")),
                            ),
                    ),
            )
            .with_child(ConfigElement::new(ElementKind::Primitive).with_attr("id", "c"))
    }

    #[test]
    fn test_kind_round_trips_tags() {
        for tag in ["primitive", "group", "clone", "master", "meta_attributes", "nvpair", "op"] {
            assert_eq!(ElementKind::from_tag(tag).as_str(), tag);
        }
        assert!(ElementKind::Master.is_resource_container());
        assert!(!ElementKind::MetaAttributes.is_resource_container());
    }

    #[test]
    fn test_set_attr_keeps_position() {
        let mut elem = ConfigElement::new(ElementKind::Primitive)
            .with_attr("id", "x")
            .with_attr("class", "ocf");
        elem.set_attr("id", "y");
        elem.set_attr("type", "Dummy");
        let names: Vec<_> = elem.attributes.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(names, vec!["id", "class", "type"]);
        assert_eq!(elem.id(), Some("y"));
    }

    #[test]
    fn test_descendants_are_preorder() {
        let root = sample();
        let ids: Vec<_> = root.descendants().filter_map(|e| e.id()).collect();
        assert_eq!(ids, vec!["grp", "a", "b", "b-meta", "b-meta-tr", "c"]);
    }

    #[test]
    fn test_deep_find() {
        let root = sample();
        let found = root.deep_find(|e| e.attr("name") == Some("target-role"));
        assert_eq!(found.and_then(|e| e.id()), Some("b-meta-tr"));
        assert!(root.deep_find(|e| e.id() == Some("missing")).is_none());
    }

    #[test]
    fn test_replace_subtree_keeps_position() {
        let mut root = sample();
        let path = ElementPath(vec![0, 1]);
        let replacement = ConfigElement::new(ElementKind::Clone)
            .with_attr("id", "b-clone")
            .with_child(ConfigElement::new(ElementKind::Primitive).with_attr("id", "b"));

        root.element_at_mut(&path)
            .unwrap()
            .replace_subtree(replacement.clone());

        let group = &root.children[0];
        assert_eq!(group.children.len(), 2);
        assert_eq!(group.children[0].id(), Some("a"));
        assert_eq!(root.element_at(&path), Some(&replacement));
    }

    #[test]
    fn test_element_at_out_of_range() {
        let root = sample();
        assert!(root.element_at(&ElementPath(vec![5])).is_none());
        assert_eq!(
            root.element_at(&ElementPath::default().child(1)).and_then(|e| e.id()),
            Some("c")
        );
    }
}
