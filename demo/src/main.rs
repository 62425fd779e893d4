//! Scripted walk through one space-switch transaction on a small sample
//! rig, standing in for the host UI that would normally drive the core.

use {
    color_eyre::Report,
    nalgebra as na,
    spaceswitch::{
        math, Armature, Channels, Config, Host as _, Keying, Local3, Space, Switcher,
    },
    tracing_error::ErrorLayer,
    tracing_subscriber::{layer::SubscriberExt as _, EnvFilter, Registry},
};

fn main() -> Result<(), Report> {
    color_eyre::install()?;

    let subscriber = Registry::default()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .with(ErrorLayer::default());
    tracing::subscriber::set_global_default(subscriber)?;

    let config = Config::load_default()?;
    let mut switcher = Switcher::new(&config);
    let mut armature = Armature::new();

    let shoulder = armature.spawn_bone(
        "Shoulder.L",
        None,
        Local3::from_translation(na::Translation3::new(0.2, 1.4, 0.0)),
    );
    let forearm = armature.spawn_bone(
        "Forearm.L",
        Some(shoulder),
        Local3::from_rotation(na::UnitQuaternion::from_euler_angles(0.0, 0.0, -0.6)),
    );
    let hand = armature.spawn_bone(
        "Hand.L",
        Some(forearm),
        Local3::from_translation(na::Translation3::new(0.0, 0.3, 0.0)),
    );
    let prop = armature.spawn_object(
        "Prop",
        na::Matrix4::new_translation(&na::Vector3::new(1.0, 0.9, -0.2)),
    );

    tracing::info!(
        "Hand.L world before switch: {}",
        math::world_transform(&armature, hand)?
    );

    // Begin: hand gets a world-posed proxy, informally framed by the prop.
    let proxy = switcher.begin(&mut armature, hand, Space::Object(prop))?;
    tracing::info!(
        "Editing via proxy {:?} in frame {}",
        proxy,
        switcher.target_matrix(&armature, hand)?
    );

    // The "animator" drags the proxy onto the prop.
    let goal = na::Isometry3::from_parts(
        na::Translation3::new(1.0, 0.9, -0.2),
        na::UnitQuaternion::from_euler_angles(0.0, 1.2, 0.0),
    )
    .to_homogeneous();
    armature.set_local(proxy, math::decompose(&goal));

    // Commit with a key on every channel at frame 1.
    switcher.commit(
        &mut armature,
        hand,
        Some(Keying {
            channels: Channels::all(),
            frame: 1,
        }),
    )?;

    tracing::info!(
        "Hand.L world after commit: {}",
        math::world_transform(&armature, hand)?
    );
    tracing::info!("Recorded keys: {:?}", armature.keys());

    Ok(())
}
