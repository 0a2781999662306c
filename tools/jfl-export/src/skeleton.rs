//! Skeleton resolution (pose bones -> exported deform bones)
//!
//! Only deform bones are written. Their parents are found by walking up the
//! hierarchy past every non-deform bone, jumping from an organizational bone
//! straight to its deform counterpart when one exists.

use hashbrown::{HashMap, HashSet};
use serde::Deserialize;

use crate::error::ExportError;
use crate::model::{Matrix4, Skeleton};

/// Default prefix marking bones that drive skinning
pub const DEFORM_PREFIX: &str = "DEF-";

/// Default prefix marking control-rig bones
pub const ORGANIZATIONAL_PREFIX: &str = "ORG-";

/// Bone name prefixes used to classify pose bones
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct BonePrefixes {
    #[serde(rename = "deform_prefix")]
    pub deform: String,
    #[serde(rename = "organizational_prefix")]
    pub organizational: String,
}

impl Default for BonePrefixes {
    fn default() -> Self {
        Self {
            deform: DEFORM_PREFIX.to_string(),
            organizational: ORGANIZATIONAL_PREFIX.to_string(),
        }
    }
}

impl BonePrefixes {
    pub fn is_deform(&self, name: &str) -> bool {
        name.starts_with(&self.deform)
    }

    /// `ORG-arm` -> `DEF-arm`; `None` for names without the organizational prefix
    pub fn deform_counterpart(&self, name: &str) -> Option<String> {
        name.strip_prefix(self.organizational.as_str())
            .map(|rest| format!("{}{}", self.deform, rest))
    }
}

/// A deform bone ready to be written
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolvedBone<'a> {
    pub name: &'a str,
    pub matrix: &'a Matrix4,
    /// Nearest deform ancestor, `None` for roots
    pub parent: Option<&'a str>,
}

/// Immutable name -> parent view of a skeleton
pub struct BoneHierarchy<'a> {
    parents: HashMap<&'a str, Option<&'a str>>,
}

impl<'a> BoneHierarchy<'a> {
    /// Build the lookup, rejecting duplicate names and dangling parents
    pub fn new(skeleton: &'a Skeleton) -> Result<Self, ExportError> {
        let mut parents = HashMap::with_capacity(skeleton.bones.len());
        for bone in &skeleton.bones {
            if parents
                .insert(bone.name.as_str(), bone.parent.as_deref())
                .is_some()
            {
                return Err(ExportError::DuplicateBone(bone.name.clone()));
            }
        }

        for bone in &skeleton.bones {
            if let Some(parent) = bone.parent.as_deref() {
                if !parents.contains_key(parent) {
                    return Err(ExportError::UnknownParent {
                        bone: bone.name.clone(),
                        parent: parent.to_string(),
                    });
                }
            }
        }

        Ok(Self { parents })
    }

    fn parent_of(&self, name: &str) -> Option<&'a str> {
        self.parents.get(name).copied().flatten()
    }

    fn existing(&self, name: &str) -> Option<&'a str> {
        self.parents.get_key_value(name).map(|(k, _)| *k)
    }

    /// Nearest deform ancestor of `bone`
    ///
    /// An organizational ancestor is replaced by its deform counterpart when
    /// that bone exists and isn't `bone` itself; otherwise the walk continues
    /// with the literal parent.
    ///
    /// Format difference: for the common `DEF-x` under `ORG-x` layout, older
    /// JFL files name `DEF-x` as its own parent. Files written here name the
    /// next deform ancestor instead (or `""` for a root), so readers never see
    /// a bone parented to itself.
    pub fn resolve_parent(
        &self,
        bone: &str,
        prefixes: &BonePrefixes,
    ) -> Result<Option<&'a str>, ExportError> {
        let mut visited: HashSet<&str> = HashSet::new();
        let mut current = self.parent_of(bone);

        while let Some(name) = current {
            if prefixes.is_deform(name) {
                return Ok(Some(name));
            }
            if !visited.insert(name) {
                return Err(ExportError::ParentCycle(bone.to_string()));
            }

            let substitute = prefixes
                .deform_counterpart(name)
                .and_then(|counterpart| self.existing(&counterpart))
                .filter(|counterpart| *counterpart != bone);

            current = match substitute {
                Some(counterpart) => Some(counterpart),
                None => self.parent_of(name),
            };
        }

        Ok(None)
    }
}

/// Deform bones of `skeleton` in pose-bone order, with resolved parents
pub fn resolve_skeleton<'a>(
    skeleton: &'a Skeleton,
    prefixes: &BonePrefixes,
) -> Result<Vec<ResolvedBone<'a>>, ExportError> {
    let hierarchy = BoneHierarchy::new(skeleton)?;

    let mut resolved = Vec::new();
    for bone in &skeleton.bones {
        if !prefixes.is_deform(&bone.name) {
            continue;
        }
        resolved.push(ResolvedBone {
            name: &bone.name,
            matrix: &bone.matrix,
            parent: hierarchy.resolve_parent(&bone.name, prefixes)?,
        });
    }

    if resolved.is_empty() && !skeleton.bones.is_empty() {
        tracing::warn!(
            "Skeleton has {} bones but none start with '{}'",
            skeleton.bones.len(),
            prefixes.deform
        );
    }

    Ok(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Bone, IDENTITY};

    fn bone(name: &str, parent: Option<&str>) -> Bone {
        Bone {
            name: name.to_string(),
            matrix: IDENTITY,
            parent: parent.map(str::to_string),
        }
    }

    fn parents_of(skeleton: &Skeleton) -> Vec<(&str, Option<&str>)> {
        resolve_skeleton(skeleton, &BonePrefixes::default())
            .unwrap()
            .into_iter()
            .map(|b| (b.name, b.parent))
            .collect()
    }

    #[test]
    fn test_only_deform_bones_exported_in_order() {
        let skeleton = Skeleton {
            bones: vec![
                bone("root", None),
                bone("DEF-spine", Some("root")),
                bone("MCH-ik", Some("root")),
                bone("DEF-neck", Some("DEF-spine")),
            ],
        };
        assert_eq!(
            parents_of(&skeleton),
            vec![("DEF-spine", None), ("DEF-neck", Some("DEF-spine"))]
        );
    }

    #[test]
    fn test_org_parent_resolves_to_deform_counterpart() {
        let skeleton = Skeleton {
            bones: vec![
                bone("root", None),
                bone("ORG-arm", Some("root")),
                bone("DEF-arm", Some("ORG-arm")),
                bone("DEF-hand", Some("ORG-arm")),
            ],
        };
        let resolved = parents_of(&skeleton);
        assert_eq!(resolved[1], ("DEF-hand", Some("DEF-arm")));
    }

    #[test]
    fn test_org_counterpart_of_self_follows_literal_parent() {
        let skeleton = Skeleton {
            bones: vec![
                bone("DEF-spine", None),
                bone("ORG-arm", Some("DEF-spine")),
                bone("DEF-arm", Some("ORG-arm")),
            ],
        };
        let resolved = parents_of(&skeleton);
        assert_eq!(resolved[1], ("DEF-arm", Some("DEF-spine")));
    }

    #[test]
    fn test_walks_past_intermediate_control_bones() {
        let skeleton = Skeleton {
            bones: vec![
                bone("DEF-hips", None),
                bone("MCH-a", Some("DEF-hips")),
                bone("MCH-b", Some("MCH-a")),
                bone("ORG-leg", Some("MCH-b")),
                bone("DEF-foot", Some("ORG-leg")),
            ],
        };
        // No DEF-leg exists, so ORG-leg is walked through normally
        let resolved = parents_of(&skeleton);
        assert_eq!(resolved[1], ("DEF-foot", Some("DEF-hips")));
    }

    #[test]
    fn test_root_without_deform_ancestor_has_no_parent() {
        let skeleton = Skeleton {
            bones: vec![bone("ORG-root", None), bone("DEF-hips", Some("ORG-root"))],
        };
        assert_eq!(parents_of(&skeleton), vec![("DEF-hips", None)]);
    }

    #[test]
    fn test_custom_prefixes() {
        let prefixes = BonePrefixes {
            deform: "D_".into(),
            organizational: "O_".into(),
        };
        let skeleton = Skeleton {
            bones: vec![
                bone("D_arm", None),
                bone("O_arm", None),
                bone("D_hand", Some("O_arm")),
            ],
        };
        let resolved = resolve_skeleton(&skeleton, &prefixes).unwrap();
        assert_eq!(resolved.len(), 2);
        assert_eq!(resolved[1].parent, Some("D_arm"));
    }

    #[test]
    fn test_unknown_parent_is_rejected() {
        let skeleton = Skeleton {
            bones: vec![bone("DEF-hand", Some("ORG-missing"))],
        };
        let err = resolve_skeleton(&skeleton, &BonePrefixes::default()).unwrap_err();
        assert!(matches!(err, ExportError::UnknownParent { .. }));
    }

    #[test]
    fn test_duplicate_bone_is_rejected() {
        let skeleton = Skeleton {
            bones: vec![bone("DEF-a", None), bone("DEF-a", None)],
        };
        let err = resolve_skeleton(&skeleton, &BonePrefixes::default()).unwrap_err();
        assert!(matches!(err, ExportError::DuplicateBone(name) if name == "DEF-a"));
    }

    #[test]
    fn test_cycle_is_detected() {
        let skeleton = Skeleton {
            bones: vec![
                bone("MCH-a", Some("MCH-b")),
                bone("MCH-b", Some("MCH-a")),
                bone("DEF-x", Some("MCH-a")),
            ],
        };
        let err = resolve_skeleton(&skeleton, &BonePrefixes::default()).unwrap_err();
        assert!(matches!(err, ExportError::ParentCycle(name) if name == "DEF-x"));
    }

    #[test]
    fn test_deform_counterpart() {
        let prefixes = BonePrefixes::default();
        assert_eq!(
            prefixes.deform_counterpart("ORG-forearm.L").as_deref(),
            Some("DEF-forearm.L")
        );
        assert_eq!(prefixes.deform_counterpart("MCH-forearm.L"), None);
    }
}
