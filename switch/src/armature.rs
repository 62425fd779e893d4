use {
    hecs::{Entity, World},
    nalgebra as na,
};

bitflags::bitflags! {
    /// Transform channels addressable by keyframe insertion.
    pub struct Channels: u8 {
        const LOCATION = 0b001;
        const ROTATION = 0b010;
        const SCALE = 0b100;
    }
}

/// Marks how a bone came to exist.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SwitchTag {
    /// Ordinary rig bone, not created by this system.
    None,
    /// Transaction-owned copy of a source bone.
    Copy,
    /// Free-floating helper bone, pose-mode equivalent of an empty object.
    Empty,
}

/// Parent-relative pose transform of a bone.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Local3 {
    pub iso: na::Isometry3<f32>,
    pub scale: na::Vector3<f32>,
}

impl Local3 {
    pub fn identity() -> Self {
        Local3 {
            iso: na::Isometry3::identity(),
            scale: na::Vector3::new(1.0, 1.0, 1.0),
        }
    }

    pub fn from_iso(iso: na::Isometry3<f32>) -> Self {
        Local3 {
            iso,
            scale: na::Vector3::new(1.0, 1.0, 1.0),
        }
    }

    pub fn from_translation(tr: na::Translation3<f32>) -> Self {
        Local3 {
            iso: na::Isometry3::from_parts(tr, na::UnitQuaternion::identity()),
            scale: na::Vector3::new(1.0, 1.0, 1.0),
        }
    }

    pub fn from_rotation(rot: na::UnitQuaternion<f32>) -> Self {
        Local3 {
            iso: na::Isometry3::from_parts(na::Translation3::new(0., 0., 0.), rot),
            scale: na::Vector3::new(1.0, 1.0, 1.0),
        }
    }
}

/// Bone display and keying state.
#[derive(Clone, Debug)]
pub struct Bone {
    pub name: String,
    pub hidden: bool,
    /// Head is pinned to the parent's tail; location cannot be keyed.
    pub connected: bool,
    /// Channels that reject keyframe insertion.
    pub locked: Channels,
    pub tag: SwitchTag,
}

impl Bone {
    pub fn new(name: impl Into<String>) -> Self {
        Bone {
            name: name.into(),
            hidden: false,
            connected: false,
            locked: Channels::empty(),
            tag: SwitchTag::None,
        }
    }
}

/// Optional link to a parent bone. Absent on root bones.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Parent(pub Entity);

/// Non-bone scene object usable as a target coordinate frame.
#[derive(Clone, Debug)]
pub struct Object {
    pub name: String,
    pub world: na::Matrix4<f32>,
}

/// Keyframe recorded by the in-memory host.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Key {
    pub bone: Entity,
    pub channels: Channels,
    pub frame: i32,
}

#[derive(Debug, thiserror::Error)]
pub enum KeyframeError {
    #[error("bone no longer exists")]
    NoSuchBone,

    #[error("channels are locked on bone '{bone}'")]
    ChannelsLocked { bone: String },
}

/// Armature read/write primitives the switch core requires from its host.
///
/// Everything here maps to one host-application call. The trait never
/// exposes hierarchy mutation beyond bone creation and deletion; the core
/// does not re-parent existing rig bones.
pub trait Host {
    fn contains_bone(&self, bone: Entity) -> bool;

    fn bone_name(&self, bone: Entity) -> Option<String>;

    fn local(&self, bone: Entity) -> Option<Local3>;

    fn set_local(&mut self, bone: Entity, local: Local3);

    fn parent(&self, bone: Entity) -> Option<Entity>;

    fn hidden(&self, bone: Entity) -> Option<bool>;

    fn set_hidden(&mut self, bone: Entity, hidden: bool);

    fn connected(&self, bone: Entity) -> bool;

    /// Inserts an unparented bone. Local transform equals world transform.
    fn create_bone(&mut self, name: String, local: Local3, tag: SwitchTag) -> Entity;

    /// Returns `false` when the bone was already gone.
    fn delete_bone(&mut self, bone: Entity) -> bool;

    fn object_world(&self, object: Entity) -> Option<na::Matrix4<f32>>;

    fn insert_keyframe(
        &mut self,
        bone: Entity,
        channels: Channels,
        frame: i32,
    ) -> Result<(), KeyframeError>;
}

/// In-memory armature host backed by a `hecs::World`.
///
/// Bones are entities carrying [`Bone`] and [`Local3`] components and
/// optionally a [`Parent`] link. Inserted keyframes land in a log that
/// tests and tools can inspect.
pub struct Armature {
    world: World,
    keys: Vec<Key>,
}

impl Armature {
    pub fn new() -> Self {
        Armature {
            world: World::new(),
            keys: Vec::new(),
        }
    }

    pub fn spawn_bone(&mut self, name: &str, parent: Option<Entity>, local: Local3) -> Entity {
        let entity = self.world.spawn((Bone::new(name), local));
        if let Some(parent) = parent {
            let _ = self.world.insert(entity, (Parent(parent),));
        }
        entity
    }

    pub fn spawn_object(&mut self, name: &str, world: na::Matrix4<f32>) -> Entity {
        self.world.spawn((Object {
            name: name.to_owned(),
            world,
        },))
    }

    pub fn set_connected(&mut self, bone: Entity, connected: bool) {
        if let Ok(mut b) = self.world.get_mut::<Bone>(bone) {
            b.connected = connected;
        }
    }

    pub fn lock_channels(&mut self, bone: Entity, locked: Channels) {
        if let Ok(mut b) = self.world.get_mut::<Bone>(bone) {
            b.locked = locked;
        }
    }

    pub fn set_object_world(&mut self, object: Entity, world: na::Matrix4<f32>) {
        if let Ok(mut o) = self.world.get_mut::<Object>(object) {
            o.world = world;
        }
    }

    pub fn tag(&self, bone: Entity) -> Option<SwitchTag> {
        self.world.get::<Bone>(bone).ok().map(|b| b.tag)
    }

    pub fn bones_tagged(&self, tag: SwitchTag) -> Vec<Entity> {
        self.world
            .query::<&Bone>()
            .iter()
            .filter(|(_, bone)| bone.tag == tag)
            .map(|(entity, _)| entity)
            .collect()
    }

    pub fn bone_count(&self) -> usize {
        self.world.query::<&Bone>().iter().count()
    }

    /// Keyframes inserted so far, in insertion order.
    pub fn keys(&self) -> &[Key] {
        &self.keys
    }
}

impl Default for Armature {
    fn default() -> Self {
        Armature::new()
    }
}

impl Host for Armature {
    fn contains_bone(&self, bone: Entity) -> bool {
        self.world.get::<Bone>(bone).is_ok()
    }

    fn bone_name(&self, bone: Entity) -> Option<String> {
        self.world.get::<Bone>(bone).ok().map(|b| b.name.clone())
    }

    fn local(&self, bone: Entity) -> Option<Local3> {
        self.world.get::<Local3>(bone).ok().map(|local| *local)
    }

    fn set_local(&mut self, bone: Entity, local: Local3) {
        if let Ok(mut slot) = self.world.get_mut::<Local3>(bone) {
            *slot = local;
        }
    }

    fn parent(&self, bone: Entity) -> Option<Entity> {
        self.world.get::<Parent>(bone).ok().map(|parent| parent.0)
    }

    fn hidden(&self, bone: Entity) -> Option<bool> {
        self.world.get::<Bone>(bone).ok().map(|b| b.hidden)
    }

    fn set_hidden(&mut self, bone: Entity, hidden: bool) {
        if let Ok(mut b) = self.world.get_mut::<Bone>(bone) {
            b.hidden = hidden;
        }
    }

    fn connected(&self, bone: Entity) -> bool {
        self.world
            .get::<Bone>(bone)
            .ok()
            .map_or(false, |b| b.connected)
    }

    fn create_bone(&mut self, name: String, local: Local3, tag: SwitchTag) -> Entity {
        let bone = Bone {
            tag,
            ..Bone::new(name)
        };
        self.world.spawn((bone, local))
    }

    fn delete_bone(&mut self, bone: Entity) -> bool {
        self.world.despawn(bone).is_ok()
    }

    fn object_world(&self, object: Entity) -> Option<na::Matrix4<f32>> {
        self.world.get::<Object>(object).ok().map(|o| o.world)
    }

    fn insert_keyframe(
        &mut self,
        bone: Entity,
        channels: Channels,
        frame: i32,
    ) -> Result<(), KeyframeError> {
        match self.world.get::<Bone>(bone) {
            Ok(b) => {
                if b.locked.intersects(channels) {
                    return Err(KeyframeError::ChannelsLocked {
                        bone: b.name.clone(),
                    });
                }
            }
            Err(_) => return Err(KeyframeError::NoSuchBone),
        }
        self.keys.push(Key {
            bone,
            channels,
            frame,
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keyframes_are_logged() {
        let mut armature = Armature::new();
        let bone = armature.spawn_bone("Root", None, Local3::identity());

        armature
            .insert_keyframe(bone, Channels::all(), 12)
            .unwrap();

        assert_eq!(
            armature.keys(),
            &[Key {
                bone,
                channels: Channels::all(),
                frame: 12
            }]
        );
    }

    #[test]
    fn locked_channels_reject_keyframes() {
        let mut armature = Armature::new();
        let bone = armature.spawn_bone("Root", None, Local3::identity());
        armature.lock_channels(bone, Channels::ROTATION);

        let result = armature.insert_keyframe(bone, Channels::ROTATION | Channels::SCALE, 1);
        assert!(matches!(
            result,
            Err(KeyframeError::ChannelsLocked { .. })
        ));
        assert!(armature.keys().is_empty());

        // Disjoint channels still go through.
        armature
            .insert_keyframe(bone, Channels::LOCATION, 1)
            .unwrap();
        assert_eq!(armature.keys().len(), 1);
    }

    #[test]
    fn deleting_twice_reports_missing() {
        let mut armature = Armature::new();
        let bone = armature.spawn_bone("Root", None, Local3::identity());

        assert!(armature.delete_bone(bone));
        assert!(!armature.delete_bone(bone));
        assert!(!armature.contains_bone(bone));
    }
}
