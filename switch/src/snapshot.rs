use {
    crate::{
        armature::{Host, Local3},
        space::Space,
    },
    hecs::Entity,
};

/// Minimal mutable state needed to make cancel a true no-op: the source
/// bone's visibility, its parent-local pose, and the frame the animator
/// asked to work in. Captured at transaction start, consumed on cancel.
#[derive(Clone, Copy, Debug)]
pub struct Snapshot {
    pub bone: Entity,
    pub hidden: bool,
    pub local: Local3,
    pub space: Space,
}

#[derive(Debug, thiserror::Error)]
pub enum RestoreError {
    #[error("bone {bone:?} no longer exists, its pose cannot be restored")]
    StaleBone { bone: Entity },
}

impl Snapshot {
    /// Records the bone's rollback state. `None` when the bone is gone.
    pub fn capture<H>(host: &H, bone: Entity, space: Space) -> Option<Snapshot>
    where
        H: Host + ?Sized,
    {
        Some(Snapshot {
            bone,
            hidden: host.hidden(bone)?,
            local: host.local(bone)?,
            space,
        })
    }

    /// Writes the recorded visibility and local pose back onto the bone.
    ///
    /// A stale bone is reported, not swallowed; the animator must learn
    /// that their pose could not be brought back.
    pub fn restore<H>(&self, host: &mut H) -> Result<(), RestoreError>
    where
        H: Host + ?Sized,
    {
        if !host.contains_bone(self.bone) {
            return Err(RestoreError::StaleBone { bone: self.bone });
        }
        host.set_local(self.bone, self.local);
        host.set_hidden(self.bone, self.hidden);
        Ok(())
    }
}
