//! The space-switch state machine.
//!
//! A transaction walks `Idle -> Active -> Resolved`. `Idle` is the absence
//! of an entry in the [`Switcher`] registry, `begin` inserts one and the
//! transaction is `Active` exactly while it is stored there, `commit` and
//! `cancel` remove it again which resolves it for good. A resolved
//! transaction cannot be revived; further switching goes through a fresh
//! `begin`.

use {
    crate::{
        armature::{Channels, Host},
        config::Config,
        math::{self, MathError},
        proxy::ProxyBones,
        snapshot::{RestoreError, Snapshot},
        space::{Space, SpaceError},
    },
    hecs::Entity,
    nalgebra as na,
    std::collections::HashMap,
};

#[derive(Debug, thiserror::Error)]
pub enum SwitchError {
    #[error("bone {bone:?} is already space-switched")]
    AlreadySwitching { bone: Entity },

    #[error("bone {bone:?} has no active space switch")]
    NotSwitching { bone: Entity },

    #[error("proxy bone of {bone:?} no longer exists")]
    LostProxy { bone: Entity },

    #[error("{source}")]
    Math {
        #[from]
        source: MathError,
    },

    #[error("{source}")]
    Space {
        #[from]
        source: SpaceError,
    },

    #[error("{source}")]
    Restore {
        #[from]
        source: RestoreError,
    },
}

/// Request to key the baked transform on commit.
#[derive(Clone, Copy, Debug)]
pub struct Keying {
    pub channels: Channels,
    pub frame: i32,
}

/// One active space switch. Owns its proxy and snapshot exclusively;
/// no other component reads or writes them.
#[derive(Clone, Copy, Debug)]
pub struct Transaction {
    source: Entity,
    proxy: Entity,
    snapshot: Snapshot,
    space: Space,
}

impl Transaction {
    pub fn source(&self) -> Entity {
        self.source
    }

    pub fn proxy(&self) -> Entity {
        self.proxy
    }

    pub fn space(&self) -> Space {
        self.space
    }
}

/// Registry of active transactions, at most one per source bone.
///
/// Transactions on different bones are fully independent; an error in one
/// never touches the proxies or snapshots of its siblings.
pub struct Switcher {
    proxies: ProxyBones,
    active: HashMap<Entity, Transaction>,
}

impl Switcher {
    pub fn new(config: &Config) -> Self {
        Switcher {
            proxies: ProxyBones::new(config.names.clone()),
            active: HashMap::new(),
        }
    }

    /// Starts a switch: snapshot the source, spawn a proxy at its world
    /// transform, hide the source. The target space is validated and
    /// recorded but not applied; the proxy starts at the source's exact
    /// pose regardless, so nothing moves visually at the instant of
    /// switching. Returns the proxy bone.
    ///
    /// Fails without touching the armature.
    pub fn begin<H>(
        &mut self,
        host: &mut H,
        source: Entity,
        space: Space,
    ) -> Result<Entity, SwitchError>
    where
        H: Host + ?Sized,
    {
        if self.active.contains_key(&source) {
            return Err(SwitchError::AlreadySwitching { bone: source });
        }

        // Catch a vanished target before any mutation.
        space.resolve(host)?;

        let snapshot = Snapshot::capture(host, source, space)
            .ok_or(MathError::BrokenHierarchy { bone: source })?;
        let proxy = self.proxies.create(host, source)?;
        host.set_hidden(source, true);

        tracing::debug!(
            "Began space switch of {:?} into {:?} via proxy {:?}",
            source,
            space,
            proxy
        );
        self.active.insert(
            source,
            Transaction {
                source,
                proxy,
                snapshot,
                space,
            },
        );
        Ok(proxy)
    }

    /// Bakes the proxy's world transform into the source bone's
    /// parent-local pose, restores visibility, optionally keys the result,
    /// and destroys the proxy.
    ///
    /// A degenerate parent rejects the bake and keeps the transaction
    /// active with the bone untouched. A broken hierarchy or vanished
    /// bone forces cancel-equivalent cleanup before the error surfaces.
    /// A failed keyframe is logged and does not roll back the transform.
    pub fn commit<H>(
        &mut self,
        host: &mut H,
        source: Entity,
        keying: Option<Keying>,
    ) -> Result<(), SwitchError>
    where
        H: Host + ?Sized,
    {
        let txn = match self.active.get(&source) {
            Some(txn) => *txn,
            None => return Err(SwitchError::NotSwitching { bone: source }),
        };

        if !host.contains_bone(source) {
            self.abandon(host, txn);
            return Err(RestoreError::StaleBone { bone: source }.into());
        }

        let world = match self.proxies.current_world(host, txn.proxy) {
            Some(world) => world,
            None => {
                self.abandon(host, txn);
                return Err(SwitchError::LostProxy { bone: source });
            }
        };

        let parent_world = match math::parent_world(host, source) {
            Ok(parent_world) => parent_world,
            Err(err) => {
                self.abandon(host, txn);
                return Err(err.into());
            }
        };

        // Rejecting here leaves the bone untouched and the switch active.
        let new_local = math::to_local(&world, &parent_world)?;

        self.active.remove(&source);
        host.set_local(source, math::decompose(&new_local));
        host.set_hidden(source, txn.snapshot.hidden);

        if let Some(keying) = keying {
            let mut channels = keying.channels;
            if host.connected(source) {
                // Head follows the parent's tail; location keys would lie.
                channels.remove(Channels::LOCATION);
            }
            if !channels.is_empty() {
                if let Err(err) = host.insert_keyframe(source, channels, keying.frame) {
                    // The transform is already applied and must stay.
                    tracing::warn!("Failed to key {:?} after commit: {}", source, err);
                }
            }
        }

        self.proxies.destroy(host, txn.proxy);
        tracing::debug!("Committed space switch of {:?}", source);
        Ok(())
    }

    /// Restores the snapshot and destroys the proxy.
    ///
    /// The proxy is destroyed even when the restore fails because the
    /// source bone vanished; that failure surfaces as a hard error so the
    /// animator knows the pose could not be brought back.
    pub fn cancel<H>(&mut self, host: &mut H, source: Entity) -> Result<(), SwitchError>
    where
        H: Host + ?Sized,
    {
        let txn = self
            .active
            .remove(&source)
            .ok_or(SwitchError::NotSwitching { bone: source })?;

        let restored = txn.snapshot.restore(host);
        self.proxies.destroy(host, txn.proxy);

        restored?;
        tracing::debug!("Cancelled space switch of {:?}", source);
        Ok(())
    }

    /// Re-runs cancel's visibility restore in isolation. Idempotent and
    /// safe to invoke at any time: the host's own undo stack may not track
    /// the hidden flag on linked bones, and this is the recovery path when
    /// it desynchronizes.
    pub fn force_unhide<H>(&self, host: &mut H, source: Entity)
    where
        H: Host + ?Sized,
    {
        let hidden = self
            .active
            .get(&source)
            .map_or(false, |txn| txn.snapshot.hidden);
        host.set_hidden(source, hidden);
    }

    /// Spawns a helper bone at the given world transform, outside any
    /// transaction.
    pub fn add_empty<H>(&self, host: &mut H, world: &na::Matrix4<f32>) -> Entity
    where
        H: Host + ?Sized,
    {
        self.proxies.spawn_empty(host, world)
    }

    pub fn is_active(&self, source: Entity) -> bool {
        self.active.contains_key(&source)
    }

    /// The active transaction for a source bone, if any.
    pub fn transaction(&self, source: Entity) -> Option<&Transaction> {
        self.active.get(&source)
    }

    pub fn proxy_of(&self, source: Entity) -> Option<Entity> {
        self.transaction(source).map(|txn| txn.proxy)
    }

    pub fn target_space(&self, source: Entity) -> Option<Space> {
        self.transaction(source).map(|txn| txn.space)
    }

    /// Current world matrix of the recorded target space, re-resolved at
    /// call time so a front end can draw the frame the animator works in.
    pub fn target_matrix<H>(
        &self,
        host: &H,
        source: Entity,
    ) -> Result<na::Matrix4<f32>, SwitchError>
    where
        H: Host + ?Sized,
    {
        let txn = self
            .active
            .get(&source)
            .ok_or(SwitchError::NotSwitching { bone: source })?;
        Ok(txn.space.resolve(host)?)
    }

    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    /// Cancel-equivalent cleanup for commit paths where the bake cannot
    /// proceed: best-effort restore, proxy destroyed, transaction resolved.
    fn abandon<H>(&mut self, host: &mut H, txn: Transaction)
    where
        H: Host + ?Sized,
    {
        self.active.remove(&txn.source);
        if let Err(err) = txn.snapshot.restore(host) {
            tracing::warn!("Abandoning switch of {:?}: {}", txn.source, err);
        }
        self.proxies.destroy(host, txn.proxy);
    }
}

impl Default for Switcher {
    fn default() -> Self {
        Switcher::new(&Config::default())
    }
}
