//! Resource lookup by id inside the `resources` section

use super::element::{ConfigElement, ElementPath};

/// Find the path to the resource with the given id below `container`.
///
/// Children are checked in order; the search only descends into resource
/// containers (`group`, `clone`, `master`, `primitive`), so ids inside
/// meta attribute sets or operation lists of other subtrees are never
/// mistaken for resources.
pub fn locate_path(container: &ConfigElement, resource_id: &str) -> Option<ElementPath> {
    locate_below(container, resource_id, &ElementPath::default())
}

fn locate_below(container: &ConfigElement, resource_id: &str, at: &ElementPath) -> Option<ElementPath> {
    for (index, child) in container.children.iter().enumerate() {
        let path = at.child(index);
        if child.id() == Some(resource_id) {
            return Some(path);
        }
        if child.kind.is_resource_container() {
            if let Some(found) = locate_below(child, resource_id, &path) {
                return Some(found);
            }
        }
    }
    None
}

pub fn locate<'a>(container: &'a ConfigElement, resource_id: &str) -> Option<&'a ConfigElement> {
    locate_path(container, resource_id).and_then(|path| container.element_at(&path))
}

pub fn locate_mut<'a>(
    container: &'a mut ConfigElement,
    resource_id: &str,
) -> Option<&'a mut ConfigElement> {
    let path = locate_path(container, resource_id)?;
    container.element_at_mut(&path)
}
