//! Temporarily re-parent a skeletal bone's pose into another coordinate
//! frame, pose it there through a proxy bone, then bake the result back
//! into the bone's native parent-local transform.

pub mod armature;
pub mod config;
pub mod math;
pub mod proxy;
pub mod snapshot;
pub mod space;
pub mod transaction;

pub use self::{
    armature::{Armature, Bone, Channels, Host, Key, KeyframeError, Local3, Object, Parent, SwitchTag},
    config::{Config, Names},
    math::MathError,
    proxy::ProxyBones,
    snapshot::{RestoreError, Snapshot},
    space::{Space, SpaceError},
    transaction::{Keying, SwitchError, Switcher, Transaction},
};
