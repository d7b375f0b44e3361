//! Skeleton conversion
//!
//! Host models are usually rendered with several skeletons layered together
//! (body, then hair, face, equipment partials). They are flattened into one
//! joint hierarchy: bones are visited skeleton by skeleton, and the first
//! bone to claim a name wins.
//!
//! Parents are looked up by name through the skeleton a bone came from, so a
//! partial skeleton can attach to a bone first defined by an earlier one.
//! Each skeleton must list parents before children; a bone whose parent has
//! not been converted yet fails the conversion.

use std::collections::HashMap;

use glam::{Mat4, Quat, Vec3};

use crate::error::ExportError;
use crate::xiv::{Transform, XivSkeleton};

/// One node of the converted hierarchy
#[derive(Debug, Clone, PartialEq)]
pub struct Joint {
    pub name: String,
    pub local: Transform,
    pub parent: Option<usize>,
    pub children: Vec<usize>,
}

/// A joint hierarchy with a single root
///
/// Joints are stored parents-first, so iterating in order always visits a
/// parent before any of its children.
#[derive(Debug, Clone, PartialEq)]
pub struct GltfSkeleton {
    root: usize,
    joints: Vec<Joint>,
    names: HashMap<String, usize>,
}

impl GltfSkeleton {
    /// Index of the root joint
    pub fn root(&self) -> usize {
        self.root
    }

    pub fn root_joint(&self) -> &Joint {
        &self.joints[self.root]
    }

    pub fn joints(&self) -> &[Joint] {
        &self.joints
    }

    pub fn joint(&self, index: usize) -> Option<&Joint> {
        self.joints.get(index)
    }

    pub fn names(&self) -> &HashMap<String, usize> {
        &self.names
    }

    pub fn joint_index(&self, name: &str) -> Option<usize> {
        self.names.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.joints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.joints.is_empty()
    }

    /// World matrix of every joint
    ///
    /// Translation and rotation inherit from the parent; scale applies to the
    /// joint itself only.
    pub fn world_matrices(&self) -> Vec<Mat4> {
        let mut unscaled: Vec<(Quat, Vec3)> = Vec::with_capacity(self.joints.len());
        let mut world = Vec::with_capacity(self.joints.len());

        for joint in &self.joints {
            let (rotation, translation) = match joint.parent {
                Some(parent) => {
                    let (parent_rotation, parent_translation) = unscaled[parent];
                    (
                        parent_rotation * joint.local.rotation,
                        parent_translation + parent_rotation * joint.local.translation,
                    )
                }
                None => (joint.local.rotation, joint.local.translation),
            };
            unscaled.push((rotation, translation));
            world.push(Mat4::from_scale_rotation_translation(joint.local.scale, rotation, translation));
        }

        world
    }

    /// Inverse of every joint's world matrix, for skin binding
    pub fn inverse_bind_matrices(&self) -> Vec<Mat4> {
        self.world_matrices().iter().map(Mat4::inverse).collect()
    }
}

/// Flatten layered skeletons into one hierarchy
///
/// Returns `Ok(None)` when no bone is a root: the model is then exported
/// unskinned.
pub fn convert_skeleton(skeletons: &[XivSkeleton]) -> Result<Option<GltfSkeleton>, ExportError> {
    let has_root = skeletons.iter().flat_map(|s| s.bones.iter()).any(|bone| bone.is_root());
    if !has_root {
        tracing::debug!("No root bone in {} skeleton(s), exporting unskinned", skeletons.len());
        return Ok(None);
    }

    let mut root: Option<usize> = None;
    let mut names: HashMap<String, usize> = HashMap::new();
    let mut joints: Vec<Joint> = Vec::new();

    let bones = skeletons
        .iter()
        .flat_map(|skeleton| skeleton.bones.iter().map(move |bone| (skeleton, bone)));

    for (skeleton, bone) in bones {
        if names.contains_key(&bone.name) {
            continue;
        }

        let parent = if bone.is_root() {
            None
        } else {
            let parent_bone = usize::try_from(bone.parent_index)
                .ok()
                .and_then(|i| skeleton.bones.get(i))
                .ok_or_else(|| ExportError::ParentOutOfRange {
                    bone: bone.name.clone(),
                    parent: bone.parent_index,
                })?;
            let parent = names
                .get(&parent_bone.name)
                .copied()
                .ok_or_else(|| ExportError::ParentNotConverted {
                    bone: bone.name.clone(),
                    parent: parent_bone.name.clone(),
                })?;
            Some(parent)
        };

        let index = joints.len();
        names.insert(bone.name.clone(), index);
        joints.push(Joint {
            name: bone.name.clone(),
            local: bone.transform,
            parent,
            children: Vec::new(),
        });

        match parent {
            Some(parent) => joints[parent].children.push(index),
            None => {
                if let Some(existing) = root {
                    return Err(ExportError::MultipleRoots {
                        first: joints[existing].name.clone(),
                        second: bone.name.clone(),
                    });
                }
                root = Some(index);
            }
        }
    }

    let Some(root) = root else {
        return Ok(None);
    };

    Ok(Some(GltfSkeleton { root, joints, names }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xiv::XivBone;

    fn bone(name: &str, parent: i32) -> XivBone {
        XivBone::new(name, parent, Transform::IDENTITY)
    }

    fn chain() -> XivSkeleton {
        XivSkeleton::new(vec![bone("root", -1), bone("hip", 0), bone("spine", 1)])
    }

    #[test]
    fn test_converts_chain() {
        let skeleton = convert_skeleton(&[chain()]).unwrap().unwrap();
        assert_eq!(skeleton.len(), 3);
        assert_eq!(skeleton.names().len(), 3);
        assert_eq!(skeleton.root_joint().name, "root");

        let hip = skeleton.joint_index("hip").unwrap();
        let spine = skeleton.joint_index("spine").unwrap();
        assert_eq!(skeleton.root_joint().children, vec![hip]);
        assert_eq!(skeleton.joints()[hip].parent, Some(skeleton.root()));
        assert_eq!(skeleton.joints()[hip].children, vec![spine]);
        assert_eq!(skeleton.joints()[spine].parent, Some(hip));
    }

    #[test]
    fn test_no_root_is_no_skeleton() {
        assert_eq!(convert_skeleton(&[]).unwrap(), None);
        assert_eq!(convert_skeleton(&[XivSkeleton::default(), XivSkeleton::default()]).unwrap(), None);

        let orphans = XivSkeleton::new(vec![bone("a", 1), bone("b", 0)]);
        assert_eq!(convert_skeleton(&[orphans]).unwrap(), None);

        let self_parented = XivSkeleton::new(vec![bone("a", 0)]);
        assert_eq!(convert_skeleton(&[self_parented]).unwrap(), None);
    }

    #[test]
    fn test_first_duplicate_wins() {
        let first = XivSkeleton::new(vec![
            bone("root", -1),
            XivBone::new("hip", 0, Transform::from_translation(Vec3::X)),
        ]);
        let second = XivSkeleton::new(vec![
            bone("root", -1),
            bone("spine", 0),
            XivBone::new("hip", 1, Transform::from_translation(Vec3::Y)),
        ]);

        let skeleton = convert_skeleton(&[first, second]).unwrap().unwrap();
        assert_eq!(skeleton.len(), 3);

        let hip = &skeleton.joints()[skeleton.joint_index("hip").unwrap()];
        assert_eq!(hip.local.translation, Vec3::X);
        assert_eq!(hip.parent, Some(skeleton.root()));
        // The second skeleton's spine attaches to the first skeleton's root
        let spine = &skeleton.joints()[skeleton.joint_index("spine").unwrap()];
        assert_eq!(spine.parent, Some(skeleton.root()));
    }

    #[test]
    fn test_partial_skeleton_attaches_by_name() {
        let body = chain();
        let hair = XivSkeleton::new(vec![bone("spine", -1), bone("hair_a", 0), bone("hair_b", 1)]);

        let skeleton = convert_skeleton(&[body, hair]).unwrap().unwrap();
        let spine = skeleton.joint_index("spine").unwrap();
        let hair_a = skeleton.joint_index("hair_a").unwrap();
        assert_eq!(skeleton.joints()[hair_a].parent, Some(spine));
        assert_eq!(skeleton.joint_index("hair_b").map(|i| skeleton.joints()[i].parent), Some(Some(hair_a)));
    }

    #[test]
    fn test_child_before_parent_fails() {
        let skeleton = XivSkeleton::new(vec![bone("root", -1), bone("spine", 2), bone("hip", 0)]);
        assert_eq!(
            convert_skeleton(&[skeleton]),
            Err(ExportError::ParentNotConverted {
                bone: "spine".to_string(),
                parent: "hip".to_string(),
            })
        );
    }

    #[test]
    fn test_parent_index_out_of_range() {
        let skeleton = XivSkeleton::new(vec![bone("root", -1), bone("hip", 7)]);
        assert!(matches!(
            convert_skeleton(&[skeleton]),
            Err(ExportError::ParentOutOfRange { parent: 7, .. })
        ));
    }

    #[test]
    fn test_multiple_roots_fail() {
        let skeleton = XivSkeleton::new(vec![bone("root", -1), bone("other", -1)]);
        assert!(matches!(
            convert_skeleton(&[skeleton]),
            Err(ExportError::MultipleRoots { .. })
        ));
    }

    #[test]
    fn test_scale_is_not_inherited() {
        let skeleton = XivSkeleton::new(vec![
            XivBone::new(
                "root",
                -1,
                Transform::new(Vec3::splat(2.0), Quat::IDENTITY, Vec3::ZERO),
            ),
            XivBone::new(
                "hip",
                0,
                Transform::new(Vec3::ONE, Quat::from_rotation_z(std::f32::consts::FRAC_PI_2), Vec3::X),
            ),
            XivBone::new("spine", 1, Transform::from_translation(Vec3::X)),
        ]);
        let skeleton = convert_skeleton(&[skeleton]).unwrap().unwrap();
        let world = skeleton.world_matrices();

        // Root scale does not stretch the hip offset
        let hip = world[1].transform_point3(Vec3::ZERO);
        assert!(hip.abs_diff_eq(Vec3::X, 1e-5));

        // Hip rotation carries into spine's translation
        let spine = world[2].transform_point3(Vec3::ZERO);
        assert!(spine.abs_diff_eq(Vec3::new(1.0, 1.0, 0.0), 1e-5));

        let inverse = skeleton.inverse_bind_matrices();
        assert!((inverse[2] * world[2]).abs_diff_eq(Mat4::IDENTITY, 1e-5));
    }
}
