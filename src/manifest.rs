// src/manifest.rs

//! Patch declarations in package metadata
//!
//! A package declares patches under the `medic` key of its `extra` block:
//!
//! ```json
//! { "extra": { "medic": { "bar/baz": { "fixes/issue1.patch": "fix issue 1" } } } }
//! ```
//!
//! The block is validated here and turned into [`PatchRequest`]s before any
//! file is touched.

use crate::error::{Error, Result};
use serde_json::Value;

/// Key of the declaration block inside a package's `extra` metadata
pub const EXTRA_KEY: &str = "medic";

/// One declared patch, not yet resolved against the filesystem
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchRequest {
    pub target_package: String,
    pub source: String,
    pub description: String,
}

/// Parse the declarations of `package` from its `extra` metadata
///
/// Missing `extra` or a missing `medic` key means no patches. Entries come
/// back in declaration order.
pub fn parse_declarations(package: &str, extra: Option<&Value>) -> Result<Vec<PatchRequest>> {
    let Some(block) = extra.and_then(|extra| extra.get(EXTRA_KEY)) else {
        return Ok(Vec::new());
    };

    let invalid = |reason: String| Error::InvalidDeclaration {
        package: package.to_string(),
        reason,
    };

    let targets = block
        .as_object()
        .ok_or_else(|| invalid(format!("'{}' must be an object of target packages", EXTRA_KEY)))?;

    let mut requests = Vec::new();
    for (target, patches) in targets {
        if target.trim().is_empty() {
            return Err(invalid("target package name is empty".to_string()));
        }

        let patches = patches.as_object().ok_or_else(|| {
            invalid(format!("patches for '{}' must be an object of path to description", target))
        })?;

        for (source, description) in patches {
            if source.trim().is_empty() {
                return Err(invalid(format!("empty patch path for '{}'", target)));
            }
            let description = description.as_str().ok_or_else(|| {
                invalid(format!("description of '{}' for '{}' must be a string", source, target))
            })?;
            if description.trim().is_empty() {
                return Err(invalid(format!("empty description for '{}' in '{}'", source, target)));
            }

            requests.push(PatchRequest {
                target_package: target.clone(),
                source: source.clone(),
                description: description.to_string(),
            });
        }
    }

    Ok(requests)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_declarations() {
        let extra = json!({
            "medic": {
                "bar/baz": {
                    "fixes/issue1.patch": "fix issue 1",
                    "fixes/issue2.patch": "fix issue 2"
                },
                "qux/quux": { "qux.patch": "qux tweak" }
            }
        });

        let requests = parse_declarations("lib/foo", Some(&extra)).unwrap();

        assert_eq!(requests.len(), 3);
        assert_eq!(
            requests[0],
            PatchRequest {
                target_package: "bar/baz".to_string(),
                source: "fixes/issue1.patch".to_string(),
                description: "fix issue 1".to_string(),
            }
        );
        assert_eq!(requests[2].target_package, "qux/quux");
    }

    #[test]
    fn test_no_declarations() {
        assert!(parse_declarations("lib/foo", None).unwrap().is_empty());

        let extra = json!({ "branch-alias": { "dev-main": "1.x-dev" } });
        assert!(parse_declarations("lib/foo", Some(&extra)).unwrap().is_empty());
    }

    #[test]
    fn test_block_must_be_object() {
        let extra = json!({ "medic": ["fixes/issue1.patch"] });
        let result = parse_declarations("lib/foo", Some(&extra));

        match result {
            Err(Error::InvalidDeclaration { package, .. }) => assert_eq!(package, "lib/foo"),
            other => panic!("expected InvalidDeclaration, got {:?}", other),
        }
    }

    #[test]
    fn test_target_patches_must_be_object() {
        let extra = json!({ "medic": { "bar/baz": "fixes/issue1.patch" } });
        assert!(matches!(
            parse_declarations("lib/foo", Some(&extra)),
            Err(Error::InvalidDeclaration { .. })
        ));
    }

    #[test]
    fn test_description_must_be_string() {
        let extra = json!({ "medic": { "bar/baz": { "fixes/issue1.patch": 1 } } });
        assert!(matches!(
            parse_declarations("lib/foo", Some(&extra)),
            Err(Error::InvalidDeclaration { .. })
        ));
    }

    #[test]
    fn test_empty_names_rejected() {
        let empty_target = json!({ "medic": { "": { "a.patch": "a" } } });
        let empty_path = json!({ "medic": { "bar/baz": { " ": "a" } } });
        let empty_description = json!({ "medic": { "bar/baz": { "a.patch": "" } } });

        for extra in [empty_target, empty_path, empty_description] {
            assert!(matches!(
                parse_declarations("lib/foo", Some(&extra)),
                Err(Error::InvalidDeclaration { .. })
            ));
        }
    }
}
