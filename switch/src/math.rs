//! Pure coordinate-frame conversions. Nothing here mutates a bone; all
//! writes happen inside the transaction operations.

use {
    crate::armature::{Host, Local3},
    hecs::Entity,
    nalgebra as na,
};

/// Determinants at or below this magnitude count as non-invertible.
pub const DET_EPSILON: f32 = 1e-8;

/// Chains deeper than this are assumed cyclic.
const MAX_CHAIN_DEPTH: usize = 256;

#[derive(Debug, thiserror::Error)]
pub enum MathError {
    #[error("parent chain of bone {bone:?} is broken")]
    BrokenHierarchy { bone: Entity },

    #[error("parent matrix is degenerate and cannot be inverted")]
    DegenerateTransform,
}

/// Homogeneous matrix of a parent-relative transform.
pub fn compose(local: &Local3) -> na::Matrix4<f32> {
    local.iso.to_homogeneous() * na::Matrix4::new_nonuniform_scaling(&local.scale)
}

/// Splits a matrix back into isometry and nonuniform scale.
///
/// Shear is not representable in [`Local3`] and is dropped. A negative
/// determinant (mirroring) is pushed into the scale sign.
pub fn decompose(m: &na::Matrix4<f32>) -> Local3 {
    let translation: na::Vector3<f32> = m.column(3).xyz().into_owned();

    let mut linear = m.remove_column(3).remove_row(3);
    let mut scale = na::Vector3::new(
        linear.column(0).norm(),
        linear.column(1).norm(),
        linear.column(2).norm(),
    );
    let sign = linear.determinant().signum();
    scale *= sign;
    linear *= sign;

    let inv_scale = na::Vector3::new(1.0 / scale.x, 1.0 / scale.y, 1.0 / scale.z);
    let rotation = na::Rotation3::from_matrix(&(linear * na::Matrix3::from_diagonal(&inv_scale)));
    let rotation = match rotation.axis_angle() {
        Some((axis, angle)) => na::UnitQuaternion::from_axis_angle(&axis, angle),
        None => na::UnitQuaternion::identity(),
    };

    Local3 {
        iso: na::Isometry3::from_parts(na::Translation3::from(translation), rotation),
        scale,
    }
}

/// World transform of a bone, composed along its parent chain.
pub fn world_transform<H>(host: &H, bone: Entity) -> Result<na::Matrix4<f32>, MathError>
where
    H: Host + ?Sized,
{
    let mut chain = Vec::new();
    let mut current = bone;

    loop {
        let local = current_local(host, current)?;
        chain.push(local);
        if chain.len() > MAX_CHAIN_DEPTH {
            return Err(MathError::BrokenHierarchy { bone });
        }
        match host.parent(current) {
            Some(parent) => current = parent,
            None => break,
        }
    }

    let mut world = na::Matrix4::identity();
    for local in chain.iter().rev() {
        world *= compose(local);
    }
    Ok(world)
}

/// World transform of a bone's parent, identity for root bones.
pub fn parent_world<H>(host: &H, bone: Entity) -> Result<na::Matrix4<f32>, MathError>
where
    H: Host + ?Sized,
{
    match host.parent(bone) {
        Some(parent) => world_transform(host, parent),
        None => Ok(na::Matrix4::identity()),
    }
}

/// Re-bases a world transform under a new parent frame.
pub fn to_local(
    world: &na::Matrix4<f32>,
    parent_world: &na::Matrix4<f32>,
) -> Result<na::Matrix4<f32>, MathError> {
    if parent_world.determinant().abs() <= DET_EPSILON {
        return Err(MathError::DegenerateTransform);
    }
    let inverse = parent_world
        .try_inverse()
        .ok_or(MathError::DegenerateTransform)?;
    Ok(inverse * world)
}

fn current_local<H>(host: &H, bone: Entity) -> Result<Local3, MathError>
where
    H: Host + ?Sized,
{
    if !host.contains_bone(bone) {
        return Err(MathError::BrokenHierarchy { bone });
    }
    host.local(bone)
        .ok_or(MathError::BrokenHierarchy { bone })
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::armature::Armature,
        approx::assert_relative_eq,
    };

    fn sample_local() -> Local3 {
        Local3 {
            iso: na::Isometry3::from_parts(
                na::Translation3::new(1.5, -2.0, 0.25),
                na::UnitQuaternion::from_euler_angles(0.3, -0.7, 1.1),
            ),
            scale: na::Vector3::new(2.0, 2.0, 2.0),
        }
    }

    #[test]
    fn compose_decompose_round_trip() {
        let local = sample_local();
        let back = decompose(&compose(&local));

        assert_relative_eq!(
            back.iso.translation.vector,
            local.iso.translation.vector,
            epsilon = 1e-5
        );
        assert_relative_eq!(
            back.iso.rotation.into_inner(),
            local.iso.rotation.into_inner(),
            epsilon = 1e-5
        );
        assert_relative_eq!(back.scale, local.scale, epsilon = 1e-5);
    }

    #[test]
    fn world_follows_parent_chain() {
        let mut armature = Armature::new();
        let root = armature.spawn_bone("Root", None, sample_local());
        let child = armature.spawn_bone(
            "Child",
            Some(root),
            Local3::from_translation(na::Translation3::new(0.0, 3.0, 0.0)),
        );

        let expected = compose(&sample_local())
            * compose(&Local3::from_translation(na::Translation3::new(
                0.0, 3.0, 0.0,
            )));
        let world = world_transform(&armature, child).unwrap();
        assert_relative_eq!(world, expected, epsilon = 1e-5);
    }

    #[test]
    fn dangling_parent_is_broken_hierarchy() {
        let mut armature = Armature::new();
        let root = armature.spawn_bone("Root", None, Local3::identity());
        let child = armature.spawn_bone("Child", Some(root), Local3::identity());

        use crate::armature::Host as _;
        armature.delete_bone(root);

        assert!(matches!(
            world_transform(&armature, child),
            Err(MathError::BrokenHierarchy { .. })
        ));
    }

    #[test]
    fn to_local_rejects_degenerate_parent() {
        let world = na::Matrix4::identity();
        let degenerate = na::Matrix4::new_nonuniform_scaling(&na::Vector3::new(0.0, 1.0, 1.0));

        assert!(matches!(
            to_local(&world, &degenerate),
            Err(MathError::DegenerateTransform)
        ));
    }

    #[test]
    fn to_local_inverts_world_transform() {
        let mut armature = Armature::new();
        let root = armature.spawn_bone("Root", None, sample_local());
        let child_local = Local3::from_rotation(na::UnitQuaternion::from_euler_angles(
            0.1, 0.2, -0.4,
        ));
        let child = armature.spawn_bone("Child", Some(root), child_local);

        let world = world_transform(&armature, child).unwrap();
        let parent = world_transform(&armature, root).unwrap();
        let local = to_local(&world, &parent).unwrap();

        assert_relative_eq!(local, compose(&child_local), epsilon = 1e-5);
    }
}
