//! Normalization and comparison of resource definitions
//!
//! Both sides of a comparison go through [`normalize`] first. The comparison
//! itself is textual on the canonical rendering, so attribute order and
//! indentation produced by different pcs versions never count as changes.

use std::collections::BTreeSet;

use serde::Serialize;

use crate::cib::{canonical_text, ConfigElement, ElementKind};

/// Drop ignored meta attributes and meta attribute sets left empty.
///
/// Only meta attribute sets directly under `resource` are considered. Some
/// pcs versions leave an empty `meta_attributes` behind after
/// `pcs resource enable`, which is why empty sets go even when nothing was
/// ignored.
pub fn normalize(resource: &mut ConfigElement, ignored_meta_attributes: &BTreeSet<String>) {
    for meta in resource
        .children
        .iter_mut()
        .filter(|c| c.is(&ElementKind::MetaAttributes))
    {
        meta.children.retain(|nvpair| {
            !(nvpair.is(&ElementKind::Nvpair)
                && nvpair
                    .attr("name")
                    .is_some_and(|name| ignored_meta_attributes.contains(name)))
        });
    }

    resource
        .children
        .retain(|c| !(c.is(&ElementKind::MetaAttributes) && c.children.is_empty()));
}

/// Before/after view of a resource that needs changing
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResourceDiff {
    pub before: String,
    pub after: String,
}

/// Outcome of [`compare`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Comparison {
    pub equal: bool,
    /// Present only when the two sides differ
    pub diff: Option<ResourceDiff>,
}

/// Compare two (normalized) resources on their canonical text.
pub fn compare(live: &ConfigElement, target: &ConfigElement) -> Comparison {
    let before = canonical_text(live);
    let after = canonical_text(target);
    if before == after {
        Comparison {
            equal: true,
            diff: None,
        }
    } else {
        Comparison {
            equal: false,
            diff: Some(ResourceDiff { before, after }),
        }
    }
}
