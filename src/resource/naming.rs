//! Multistate wrapper naming
//!
//! pcs wraps a freshly created multistate resource in a container whose id is
//! the child id plus a suffix, and that suffix changed between pcs 0.9
//! (`<master id="X-master">`) and 0.10 (`<clone id="X-clone">`). The rest of
//! the crate only talks to [`MultistateNaming`]; the installed pcs version
//! picks the implementation.

use regex::Regex;

use crate::cib::{ConfigElement, ElementKind};

/// `MAJOR.MINOR` as printed by `pcs --version`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct PcsVersion {
    pub major: u32,
    pub minor: u32,
}

impl PcsVersion {
    pub fn parse(raw: &str) -> Option<Self> {
        let re = Regex::new(r"^\s*(\d+)\.(\d+)").ok()?;
        let caps = re.captures(raw)?;
        Some(Self {
            major: caps[1].parse().ok()?,
            minor: caps[2].parse().ok()?,
        })
    }
}

/// Replace `prefix` at the start of `id` with `replacement`. Returns `None`
/// when `id` does not start with `prefix`.
pub fn replace_id_prefix(id: &str, prefix: &str, replacement: &str) -> Option<String> {
    id.strip_prefix(prefix)
        .map(|rest| format!("{}{}", replacement, rest))
}

/// Naming convention pcs uses for multistate wrappers
pub trait MultistateNaming {
    /// Suffix pcs appends to the child id
    fn wrapper_suffix(&self) -> &'static str;

    fn wrapper_id(&self, child_name: &str) -> String {
        format!("{}{}", child_name, self.wrapper_suffix())
    }

    /// Give the wrapper the resource's real name.
    ///
    /// The wrapper id becomes `resource_name`, and ids of its meta attribute
    /// sets and their nvpairs get the generated prefix swapped for
    /// `resource_name`. Ids that merely contain the prefix elsewhere are left
    /// alone.
    fn rename(&self, wrapper: &mut ConfigElement, resource_name: &str, child_name: &str) {
        let prefix = self.wrapper_id(child_name);
        wrapper.set_attr("id", resource_name);

        for meta in wrapper
            .children
            .iter_mut()
            .filter(|c| c.is(&ElementKind::MetaAttributes))
        {
            rename_id(meta, &prefix, resource_name);
            for nvpair in meta.children.iter_mut() {
                rename_id(nvpair, &prefix, resource_name);
            }
        }
    }
}

fn rename_id(element: &mut ConfigElement, prefix: &str, replacement: &str) {
    if let Some(new_id) = element
        .id()
        .and_then(|id| replace_id_prefix(id, prefix, replacement))
    {
        element.set_attr("id", &new_id);
    }
}

/// pcs 0.9: `<master id="<child>-master">`
#[derive(Debug, Clone, Copy)]
pub struct MasterSuffixNaming;

impl MultistateNaming for MasterSuffixNaming {
    fn wrapper_suffix(&self) -> &'static str {
        "-master"
    }
}

/// pcs 0.10+: `<clone id="<child>-clone">` with `promotable=true`
#[derive(Debug, Clone, Copy)]
pub struct CloneSuffixNaming;

impl MultistateNaming for CloneSuffixNaming {
    fn wrapper_suffix(&self) -> &'static str {
        "-clone"
    }
}

pub fn naming_for(version: PcsVersion) -> &'static dyn MultistateNaming {
    if version <= (PcsVersion { major: 0, minor: 9 }) {
        &MasterSuffixNaming
    } else {
        &CloneSuffixNaming
    }
}
