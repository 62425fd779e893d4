use {
    crate::{
        armature::{Host, SwitchTag},
        config::Names,
        math::{self, MathError},
    },
    hecs::Entity,
    nalgebra as na,
};

/// Lifecycle of temporary control bones.
pub struct ProxyBones {
    names: Names,
}

impl ProxyBones {
    pub fn new(names: Names) -> Self {
        ProxyBones { names }
    }

    /// Spawns an unparented copy of the source bone at its current world
    /// transform. The copy is visually and numerically indistinguishable
    /// from the source pose at the instant of creation.
    pub fn create<H>(&self, host: &mut H, source: Entity) -> Result<Entity, MathError>
    where
        H: Host + ?Sized,
    {
        let world = math::world_transform(host, source)?;
        let name = self
            .names
            .format_copy(host.bone_name(source).as_deref().unwrap_or("Bone"));

        let proxy = host.create_bone(name, math::decompose(&world), SwitchTag::Copy);
        tracing::debug!("Created proxy {:?} for bone {:?}", proxy, source);
        Ok(proxy)
    }

    /// Removes the proxy from the armature. Idempotent: cleanup may run
    /// twice on failure paths, and a second call must not be an error.
    pub fn destroy<H>(&self, host: &mut H, proxy: Entity)
    where
        H: Host + ?Sized,
    {
        if host.delete_bone(proxy) {
            tracing::debug!("Destroyed proxy {:?}", proxy);
        } else {
            tracing::trace!("Proxy {:?} was already removed", proxy);
        }
    }

    /// Live transform of the proxy. It has no parent, so local == world.
    pub fn current_world<H>(&self, host: &H, proxy: Entity) -> Option<na::Matrix4<f32>>
    where
        H: Host + ?Sized,
    {
        host.local(proxy).map(|local| math::compose(&local))
    }

    /// Spawns a free-floating helper bone at the given world transform.
    /// Not owned by any transaction; the animator removes it explicitly.
    pub fn spawn_empty<H>(&self, host: &mut H, world: &na::Matrix4<f32>) -> Entity
    where
        H: Host + ?Sized,
    {
        host.create_bone(
            self.names.empty_name.clone(),
            math::decompose(world),
            SwitchTag::Empty,
        )
    }
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::armature::{Armature, Host as _, Local3},
        approx::assert_relative_eq,
    };

    #[test]
    fn proxy_matches_source_world_transform() {
        let mut armature = Armature::new();
        let root = armature.spawn_bone(
            "Root",
            None,
            Local3::from_rotation(na::UnitQuaternion::from_euler_angles(0.2, 0.0, 0.5)),
        );
        let hand = armature.spawn_bone(
            "Hand",
            Some(root),
            Local3::from_translation(na::Translation3::new(0.0, 1.0, 0.0)),
        );

        let proxies = ProxyBones::new(Names::default());
        let proxy = proxies.create(&mut armature, hand).unwrap();

        let source_world = math::world_transform(&armature, hand).unwrap();
        let proxy_world = proxies.current_world(&armature, proxy).unwrap();
        assert_relative_eq!(proxy_world, source_world, epsilon = 1e-5);

        assert_eq!(armature.tag(proxy), Some(SwitchTag::Copy));
        assert_eq!(armature.bone_name(proxy).unwrap(), "Hand_Copy");
    }

    #[test]
    fn destroy_is_idempotent() {
        let mut armature = Armature::new();
        let bone = armature.spawn_bone("Root", None, Local3::identity());

        let proxies = ProxyBones::new(Names::default());
        let proxy = proxies.create(&mut armature, bone).unwrap();

        proxies.destroy(&mut armature, proxy);
        proxies.destroy(&mut armature, proxy);
        assert!(!armature.contains_bone(proxy));
    }
}
