//! Declared resource intent and its validation

use std::collections::BTreeSet;
use std::fmt;
use std::path::PathBuf;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::gateway::{CibTarget, PushScope};

/// Problems with a resource declaration, found before anything runs
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Resource name must not be empty")]
    EmptyName,

    #[error("When creating cluster resource you must specify the resource_type")]
    MissingResourceType,

    #[error("When creating {class} resource you must specify keyword \"{keyword}\" in options")]
    MissingKeyword {
        class: ResourceClass,
        keyword: &'static str,
    },

    #[error("Cannot split options into arguments: {0}")]
    InvalidOptions(String),
}

/// Resource class as understood by `pcs`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ResourceClass {
    #[default]
    Ocf,
    Systemd,
    Stonith,
    /// Master/Slave resource (pcs 0.9)
    Master,
    /// Promotable clone (pcs 0.10 and later)
    Promotable,
}

impl ResourceClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ocf => "ocf",
            Self::Systemd => "systemd",
            Self::Stonith => "stonith",
            Self::Master => "master",
            Self::Promotable => "promotable",
        }
    }

    /// Created under a child name and wrapped by pcs
    pub fn is_multistate(&self) -> bool {
        matches!(self, Self::Master | Self::Promotable)
    }
}

impl fmt::Display for ResourceClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum DesiredState {
    #[default]
    Present,
    Absent,
}

/// What the caller wants the cluster to look like for one resource
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceSpec {
    pub name: String,
    pub state: DesiredState,
    pub class: ResourceClass,
    /// e.g. `ocf:pacemaker:Dummy`; required when `state` is present
    pub resource_type: Option<String>,
    /// Passed through to `pcs ... create` after shell-style splitting
    pub options: String,
    /// Temporary name of a multistate resource's primitive while pcs wraps it
    pub child_name: String,
    /// Meta attribute names left out of the comparison
    pub ignored_meta_attributes: BTreeSet<String>,
    /// `Some(true)` pushes with `scope=resources`; `None` picks per class
    pub force_resource_update: Option<bool>,
    pub target: CibTarget,
}

impl ResourceSpec {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            child_name: format!("{}-child", name),
            name,
            state: DesiredState::Present,
            class: ResourceClass::Ocf,
            resource_type: None,
            options: String::new(),
            ignored_meta_attributes: BTreeSet::new(),
            force_resource_update: None,
            target: CibTarget::Live,
        }
    }

    pub fn with_class(mut self, class: ResourceClass) -> Self {
        self.class = class;
        self
    }

    pub fn with_type(mut self, resource_type: impl Into<String>) -> Self {
        self.resource_type = Some(resource_type.into());
        self
    }

    pub fn with_options(mut self, options: impl Into<String>) -> Self {
        self.options = options.into();
        self
    }

    pub fn with_state(mut self, state: DesiredState) -> Self {
        self.state = state;
        self
    }

    pub fn with_child_name(mut self, child_name: impl Into<String>) -> Self {
        self.child_name = child_name.into();
        self
    }

    pub fn ignoring<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ignored_meta_attributes
            .extend(names.into_iter().map(Into::into));
        self
    }

    pub fn with_force_update(mut self, force: Option<bool>) -> Self {
        self.force_resource_update = force;
        self
    }

    pub fn with_cib_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.target = CibTarget::File(path.into());
        self
    }

    /// Push scope for this resource. Multistate resources quickly create
    /// node attributes after creation, so they narrow the push by default;
    /// other classes follow the operator's setting.
    pub fn push_scope(&self, primitive_default: PushScope) -> PushScope {
        match self.force_resource_update {
            Some(true) => PushScope::Resources,
            Some(false) => PushScope::All,
            None if self.class.is_multistate() => PushScope::Resources,
            None => primitive_default,
        }
    }

    /// `options` split into separate arguments
    pub fn option_args(&self) -> Result<Vec<String>, ValidationError> {
        shell_words::split(&self.options).map_err(|e| ValidationError::InvalidOptions(e.to_string()))
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::EmptyName);
        }
        self.option_args()?;

        if self.state == DesiredState::Absent {
            return Ok(());
        }
        if self.resource_type.as_deref().map_or(true, str::is_empty) {
            return Err(ValidationError::MissingResourceType);
        }
        // `--master` contains `master`
        match self.class {
            ResourceClass::Master if !self.options.contains("master") => {
                Err(ValidationError::MissingKeyword {
                    class: self.class,
                    keyword: "master",
                })
            }
            ResourceClass::Promotable if !self.options.contains("promotable") => {
                Err(ValidationError::MissingKeyword {
                    class: self.class,
                    keyword: "promotable",
                })
            }
            _ => Ok(()),
        }
    }
}
