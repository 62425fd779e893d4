use {
    crate::{
        armature::Host,
        math::{self, MathError},
    },
    hecs::Entity,
    nalgebra as na,
};

/// A named coordinate frame, resolvable to a world matrix at query time.
///
/// Spaces are never cached across frames; the skeleton may be posed or
/// animated between queries, so every use re-resolves.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Space {
    World,
    /// Frame of a scene object.
    Object(Entity),
    /// Frame of another bone's current pose.
    Bone(Entity),
    /// Frame of a bone's parent, world for root bones.
    Parent(Entity),
}

#[derive(Debug, thiserror::Error)]
pub enum SpaceError {
    #[error("space refers to {entity:?} which no longer exists")]
    Unresolvable { entity: Entity },

    #[error("{source}")]
    Math {
        #[from]
        source: MathError,
    },
}

impl Space {
    pub fn resolve<H>(&self, host: &H) -> Result<na::Matrix4<f32>, SpaceError>
    where
        H: Host + ?Sized,
    {
        match *self {
            Space::World => Ok(na::Matrix4::identity()),
            Space::Object(object) => host
                .object_world(object)
                .ok_or(SpaceError::Unresolvable { entity: object }),
            Space::Bone(bone) => {
                if !host.contains_bone(bone) {
                    return Err(SpaceError::Unresolvable { entity: bone });
                }
                Ok(math::world_transform(host, bone)?)
            }
            Space::Parent(bone) => {
                if !host.contains_bone(bone) {
                    return Err(SpaceError::Unresolvable { entity: bone });
                }
                Ok(math::parent_world(host, bone)?)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::{
            armature::{Armature, Local3},
            math::{compose, world_transform},
        },
        approx::assert_relative_eq,
    };

    #[test]
    fn world_space_is_identity() {
        let armature = Armature::new();
        let m = Space::World.resolve(&armature).unwrap();
        assert_eq!(m, na::Matrix4::identity());
    }

    #[test]
    fn object_space_returns_object_world() {
        let mut armature = Armature::new();
        let world = na::Matrix4::new_translation(&na::Vector3::new(4.0, 0.0, -1.0));
        let prop = armature.spawn_object("Prop", world);

        assert_eq!(Space::Object(prop).resolve(&armature).unwrap(), world);

        // Objects may animate; resolution always reads the live matrix.
        let moved = na::Matrix4::new_translation(&na::Vector3::new(0.0, 6.0, 0.0));
        armature.set_object_world(prop, moved);
        assert_eq!(Space::Object(prop).resolve(&armature).unwrap(), moved);
    }

    #[test]
    fn bone_space_tracks_current_pose() {
        let mut armature = Armature::new();
        let local = Local3::from_translation(na::Translation3::new(0.0, 2.0, 0.0));
        let root = armature.spawn_bone("Root", None, local);
        let tip = armature.spawn_bone("Tip", Some(root), local);

        let resolved = Space::Bone(tip).resolve(&armature).unwrap();
        assert_relative_eq!(
            resolved,
            world_transform(&armature, tip).unwrap(),
            epsilon = 1e-6
        );

        let parent = Space::Parent(tip).resolve(&armature).unwrap();
        assert_relative_eq!(parent, compose(&local), epsilon = 1e-6);
    }

    #[test]
    fn parent_space_of_root_is_world() {
        let mut armature = Armature::new();
        let root = armature.spawn_bone("Root", None, Local3::identity());

        let resolved = Space::Parent(root).resolve(&armature).unwrap();
        assert_eq!(resolved, na::Matrix4::identity());
    }

    #[test]
    fn deleted_reference_is_unresolvable() {
        use crate::armature::Host as _;

        let mut armature = Armature::new();
        let root = armature.spawn_bone("Root", None, Local3::identity());
        armature.delete_bone(root);

        assert!(matches!(
            Space::Bone(root).resolve(&armature),
            Err(SpaceError::Unresolvable { .. })
        ));
        assert!(matches!(
            Space::Object(root).resolve(&armature),
            Err(SpaceError::Unresolvable { .. })
        ));
    }
}
