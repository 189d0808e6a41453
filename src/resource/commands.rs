//! `pcs` argument builders for resource operations
//!
//! Pure functions: they only describe the command. The gateway runs it.

use std::path::Path;

use super::spec::{ResourceClass, ResourceSpec, ValidationError};

/// `-f <file>` when working against a CIB file instead of the live cluster
pub fn file_args(file: Option<&Path>) -> Vec<String> {
    match file {
        Some(path) => vec!["-f".to_string(), path.display().to_string()],
        None => Vec::new(),
    }
}

/// `pcs [-f file] (stonith|resource) create <id> <type> <options...>`
///
/// Multistate resources are created under their child name; pcs derives the
/// wrapper id from it and the caller renames the wrapper afterwards.
pub fn create_args(spec: &ResourceSpec, file: Option<&Path>) -> Result<Vec<String>, ValidationError> {
    let resource_type = spec
        .resource_type
        .as_deref()
        .filter(|t| !t.is_empty())
        .ok_or(ValidationError::MissingResourceType)?;

    let (group, id) = match spec.class {
        ResourceClass::Stonith => ("stonith", spec.name.as_str()),
        ResourceClass::Master | ResourceClass::Promotable => ("resource", spec.child_name.as_str()),
        ResourceClass::Ocf | ResourceClass::Systemd => ("resource", spec.name.as_str()),
    };

    let mut args = file_args(file);
    args.extend([
        group.to_string(),
        "create".to_string(),
        id.to_string(),
        resource_type.to_string(),
    ]);
    args.extend(spec.option_args()?);
    Ok(args)
}

/// `pcs [-f file] (stonith|resource) delete <name>`
pub fn delete_args(spec: &ResourceSpec, file: Option<&Path>) -> Vec<String> {
    let group = match spec.class {
        ResourceClass::Stonith => "stonith",
        _ => "resource",
    };
    let mut args = file_args(file);
    args.extend([group.to_string(), "delete".to_string(), spec.name.clone()]);
    args
}

/// Undo a multistate create: deleting the child also drops its wrapper.
pub fn rollback_args(spec: &ResourceSpec, file: Option<&Path>) -> Vec<String> {
    let mut args = file_args(file);
    args.extend([
        "resource".to_string(),
        "delete".to_string(),
        spec.child_name.clone(),
    ]);
    args
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_primitive() {
        let spec = ResourceSpec::new("test2")
            .with_type("ocf:heartbeat:IPaddr2")
            .with_options("ip=192.168.1.2 op monitor interval=5");
        assert_eq!(
            create_args(&spec, None).unwrap(),
            vec![
                "resource", "create", "test2", "ocf:heartbeat:IPaddr2",
                "ip=192.168.1.2", "op", "monitor", "interval=5"
            ]
        );
    }

    #[test]
    fn test_create_stonith_against_file() {
        let spec = ResourceSpec::new("kdump")
            .with_class(ResourceClass::Stonith)
            .with_type("fence_kdump");
        assert_eq!(
            create_args(&spec, Some(Path::new("/tmp/cib.xml"))).unwrap(),
            vec!["-f", "/tmp/cib.xml", "stonith", "create", "kdump", "fence_kdump"]
        );
    }

    #[test]
    fn test_create_multistate_uses_child_name() {
        let spec = ResourceSpec::new("db")
            .with_class(ResourceClass::Promotable)
            .with_type("ocf:pacemaker:Stateful")
            .with_options("promotable");
        assert_eq!(
            create_args(&spec, None).unwrap(),
            vec!["resource", "create", "db-child", "ocf:pacemaker:Stateful", "promotable"]
        );
    }

    #[test]
    fn test_create_without_type() {
        let spec = ResourceSpec::new("x");
        assert_eq!(create_args(&spec, None), Err(ValidationError::MissingResourceType));
    }

    #[test]
    fn test_delete_and_rollback() {
        let stonith = ResourceSpec::new("kdump").with_class(ResourceClass::Stonith);
        assert_eq!(delete_args(&stonith, None), vec!["stonith", "delete", "kdump"]);

        let db = ResourceSpec::new("db")
            .with_class(ResourceClass::Master)
            .with_child_name("db-primitive");
        assert_eq!(delete_args(&db, None), vec!["resource", "delete", "db"]);
        assert_eq!(
            rollback_args(&db, Some(Path::new("/c.xml"))),
            vec!["-f", "/c.xml", "resource", "delete", "db-primitive"]
        );
    }
}
