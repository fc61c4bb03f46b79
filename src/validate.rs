//! Input Validation
//!
//! Checks applied to every caller-supplied path, jail name and address
//! before the builder or runner touches the filesystem or spawns a host
//! tool. These are blocklist checks against argument injection and path
//! traversal, not a general sanitiser.

use std::path::{Component, Path, PathBuf};

/// Characters that are never allowed in a jail name
pub const JAIL_NAME_FORBIDDEN: [char; 7] = [';', '&', '|', '`', '$', '(', ')'];

/// Number of dot-separated components in an IPv4 address
const IPV4_PARTS: usize = 4;

/// Error types for input validation
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("path is empty")]
    EmptyPath,

    #[error("path contains a NUL byte: {0:?}")]
    NulByte(PathBuf),

    #[error("path contains directory traversal: {0}")]
    DirectoryTraversal(PathBuf),

    #[error("absolute path outside of allowed roots: {0}")]
    UnsafeAbsolutePath(PathBuf),

    #[error("jail name is empty")]
    EmptyJailName,

    #[error("jail name '{name}' contains forbidden character '{found}'")]
    JailNameMetacharacter { name: String, found: char },

    #[error("jail name '{0}' is not a single path component")]
    JailNameNotComponent(String),

    #[error("invalid IP address: '{0}'")]
    InvalidIp(String),
}

/// Policy applied to filesystem paths handed to the builder and runner
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathPolicy {
    /// When set, absolute paths must live under one of these roots
    safe_roots: Option<Vec<PathBuf>>,
}

impl PathPolicy {
    /// Only reject traversal, any absolute path is accepted
    pub fn relaxed() -> Self {
        Self { safe_roots: None }
    }

    /// Reject traversal and absolute paths outside `roots`
    pub fn with_safe_roots<I, P>(roots: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self {
            safe_roots: Some(roots.into_iter().map(Into::into).collect()),
        }
    }

    /// Roots that absolute paths are confined to, if any
    pub fn safe_roots(&self) -> Option<&[PathBuf]> {
        self.safe_roots.as_deref()
    }

    /// Validate a path against this policy
    pub fn check(&self, path: &Path) -> Result<(), ValidationError> {
        if path.as_os_str().is_empty() {
            return Err(ValidationError::EmptyPath);
        }

        if path.as_os_str().as_encoded_bytes().contains(&0) {
            return Err(ValidationError::NulByte(path.to_path_buf()));
        }

        if path.components().any(|c| matches!(c, Component::ParentDir)) {
            return Err(ValidationError::DirectoryTraversal(path.to_path_buf()));
        }

        if let Some(roots) = &self.safe_roots {
            if path.is_absolute() && !roots.iter().any(|root| path.starts_with(root)) {
                return Err(ValidationError::UnsafeAbsolutePath(path.to_path_buf()));
            }
        }

        Ok(())
    }
}

/// Validate a jail name
///
/// The name ends up as a `name=` parameter of the jail tool, so shell
/// metacharacters are rejected outright. It also names the jail root under
/// the jails directory and must be exactly one normal path component.
pub fn validate_jail_name(name: &str) -> Result<(), ValidationError> {
    if name.is_empty() {
        return Err(ValidationError::EmptyJailName);
    }

    if let Some(found) = name.chars().find(|c| JAIL_NAME_FORBIDDEN.contains(c)) {
        return Err(ValidationError::JailNameMetacharacter {
            name: name.to_string(),
            found,
        });
    }

    let mut components = Path::new(name).components();
    let single_normal = matches!(components.next(), Some(Component::Normal(_)))
        && components.next().is_none();
    if !single_normal || name.contains(['/', '\0']) {
        return Err(ValidationError::JailNameNotComponent(name.to_string()));
    }

    Ok(())
}

/// Validate the shape of an IPv4 address: four non-empty dot-separated parts
///
/// Octet ranges are left to the jail tool.
pub fn validate_ipv4_shape(ip: &str) -> Result<(), ValidationError> {
    let parts: Vec<&str> = ip.split('.').collect();
    if ip.is_empty() || parts.len() != IPV4_PARTS || parts.iter().any(|p| p.is_empty()) {
        return Err(ValidationError::InvalidIp(ip.to_string()));
    }
    Ok(())
}


// Property-based tests with Proptest
#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn prop_jail_name_without_metacharacters_accepted(name in "[^;&|`$()/\\x00]{1,64}") {
            prop_assume!(name != "." && name != "..");
            prop_assert!(validate_jail_name(&name).is_ok());
        }

        #[test]
        fn prop_jail_name_with_separator_rejected(
            head in "[a-z0-9-]{0,16}",
            tail in "[a-z0-9-]{0,16}",
        ) {
            let name = format!("{head}/{tail}");
            prop_assert!(validate_jail_name(&name).is_err());
        }

        #[test]
        fn prop_jail_name_with_metacharacter_rejected(
            prefix in "[a-z0-9-]{0,16}",
            bad in prop::sample::select(JAIL_NAME_FORBIDDEN.to_vec()),
            suffix in "[a-z0-9-]{0,16}",
        ) {
            let name = format!("{prefix}{bad}{suffix}");
            prop_assert!(validate_jail_name(&name).is_err());
        }

        #[test]
        fn prop_four_non_empty_parts_accepted(parts in prop::collection::vec("[^.]{1,4}", 4)) {
            prop_assert!(validate_ipv4_shape(&parts.join(".")).is_ok());
        }

        #[test]
        fn prop_wrong_part_count_rejected(parts in prop::collection::vec("[0-9]{1,3}", 1..8usize)) {
            prop_assume!(parts.len() != 4);
            prop_assert!(validate_ipv4_shape(&parts.join(".")).is_err());
        }

        #[test]
        fn prop_traversal_component_rejected(
            head in prop::collection::vec("[a-z]{1,8}", 0..4usize),
            tail in prop::collection::vec("[a-z]{1,8}", 0..4usize),
        ) {
            let mut segments = head;
            segments.push("..".to_string());
            segments.extend(tail);
            let path = PathBuf::from(segments.join("/"));
            prop_assert!(PathPolicy::relaxed().check(&path).is_err());
            prop_assert!(PathPolicy::with_safe_roots(["/tmp"]).check(&path).is_err());
        }
    }
}
