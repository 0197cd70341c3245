//! End-to-end controller behavior with the headless mixer and ground physics.

use std::f32::consts::FRAC_PI_4;

use avatar_client::{
    anim::{LocomotionState, Transition},
    input::{Key, KeyState},
    profile::CharacterProfile,
    ControllerError,
};
use avatar_shared::{
    math::Vec3,
    physics::{GroundPhysics, PhysicsBackend, RigidBody},
};
use avatar_tests::{init_tracing, Rig};

fn no_physics(_: &mut RigidBody, _: f32) {}

#[test]
fn running_forward_moves_away_from_camera() -> anyhow::Result<()> {
    init_tracing();
    let mut rig = Rig::spawn(&CharacterProfile::fox())?;
    let keys = KeyState::from_keys(&[Key::W]);

    let report = rig
        .controller
        .tick(0.1, keys, &rig.camera, &mut rig.avatar, no_physics)?;

    assert_eq!(report.state, LocomotionState::Run);
    assert_eq!(
        report.transition,
        Transition::CrossFaded {
            from: LocomotionState::Survey,
            to: LocomotionState::Run
        }
    );
    assert!(report.integration.offset.abs() < 1e-6);
    assert!(rig.avatar.body.position.x.abs() < 1e-5);
    assert!((rig.avatar.body.position.z - 0.5).abs() < 1e-5);
    Ok(())
}

#[test]
fn walking_forward_left_heads_diagonally() -> anyhow::Result<()> {
    let mut rig = Rig::spawn(&CharacterProfile::fox())?;
    rig.controller.switch_run_toggle();
    let keys = KeyState::from_keys(&[Key::W, Key::A]);

    let report = rig
        .controller
        .tick(0.1, keys, &rig.camera, &mut rig.avatar, no_physics)?;

    assert_eq!(report.state, LocomotionState::Walk);
    assert!((report.integration.offset - FRAC_PI_4).abs() < 1e-6);
    let step = 2.0 * 0.1 * FRAC_PI_4.sin();
    assert!((rig.avatar.body.position.x - step).abs() < 1e-5);
    assert!((rig.avatar.body.position.z - step).abs() < 1e-5);
    Ok(())
}

#[test]
fn repeated_keys_do_not_restart_the_clip() -> anyhow::Result<()> {
    let mut rig = Rig::spawn(&CharacterProfile::fox())?;
    let keys = KeyState::from_keys(&[Key::D]);

    rig.controller
        .tick(0.016, keys, &rig.camera, &mut rig.avatar, no_physics)?;
    let second = rig
        .controller
        .tick(0.016, keys, &rig.camera, &mut rig.avatar, no_physics)?;
    assert_eq!(second.transition, Transition::Unchanged);

    let run = rig.clip("Run").and_then(|id| rig.controller.mixer().action(id));
    let run = run.ok_or_else(|| anyhow::anyhow!("Run clip not registered"))?;
    assert!(run.playing);
    assert!((run.time - 0.032).abs() < 1e-6);
    Ok(())
}

#[test]
fn survey_turns_but_does_not_move() -> anyhow::Result<()> {
    let mut rig = Rig::spawn(&CharacterProfile::fox())?;
    let before = rig.avatar.body.position;

    let report = rig
        .controller
        .tick(0.1, KeyState::NONE, &rig.camera, &mut rig.avatar, no_physics)?;

    assert_eq!(report.state, LocomotionState::Survey);
    assert_eq!(report.integration.displacement, Vec3::ZERO);
    assert_eq!(rig.avatar.body.position, before);
    Ok(())
}

#[test]
fn missing_clip_keeps_prior_clip_and_halts_animation() -> anyhow::Result<()> {
    let mut profile = CharacterProfile::fox();
    profile.clips = vec!["Survey".into(), "Run".into()];
    profile.start_running = false;
    let mut rig = Rig::spawn(&profile)?;
    let keys = KeyState::from_keys(&[Key::W]);

    let err = rig
        .controller
        .tick(0.1, keys, &rig.camera, &mut rig.avatar, no_physics)
        .unwrap_err();
    assert_eq!(
        err,
        ControllerError::ClipNotFound {
            state: LocomotionState::Walk,
            key: "Walk".to_string()
        }
    );

    let survey = rig
        .clip("Survey")
        .and_then(|id| rig.controller.mixer().action(id))
        .ok_or_else(|| anyhow::anyhow!("Survey clip not registered"))?;
    assert!(survey.playing);
    assert!(!survey.is_fading());
    assert_eq!(rig.controller.state(), LocomotionState::Survey);

    // Pose reconciliation still ran on the failed tick.
    let expected = rig.avatar.body.position - Vec3::new(0.0, profile.pivot_offset, 0.0);
    assert_eq!(rig.avatar.model.position, expected);

    // Later ticks succeed but animation stays stopped.
    let next = rig
        .controller
        .tick(0.1, keys, &rig.camera, &mut rig.avatar, no_physics)?;
    assert_eq!(next.transition, Transition::Halted);
    assert!(rig.controller.is_animation_halted());
    Ok(())
}

#[test]
fn named_rig_cross_fades_exporter_clips() -> anyhow::Result<()> {
    let mut rig = Rig::spawn(&CharacterProfile::velociraptor())?;
    let keys = KeyState::from_keys(&[Key::S]);

    rig.controller
        .tick(0.1, keys, &rig.camera, &mut rig.avatar, no_physics)?;

    let mixer = rig.controller.mixer();
    let run = rig
        .clip("Armature|Velociraptor_Run")
        .and_then(|id| mixer.action(id))
        .ok_or_else(|| anyhow::anyhow!("run clip not registered"))?;
    let idle = rig
        .clip("Armature|Velociraptor_Idle")
        .and_then(|id| mixer.action(id))
        .ok_or_else(|| anyhow::anyhow!("idle clip not registered"))?;
    assert!(run.playing && run.is_fading());
    assert!(idle.playing && idle.is_fading());
    assert!((run.weight - 0.5).abs() < 1e-5);
    assert!((idle.weight - 0.5).abs() < 1e-5);

    // Backward: heading PI from the camera line, body moves toward -Z.
    assert!((rig.avatar.body.position.z + 0.5).abs() < 1e-5);
    Ok(())
}

#[test]
fn jump_requires_being_low_and_not_rising() -> anyhow::Result<()> {
    let mut rig = Rig::spawn(&CharacterProfile::fox())?;
    let jump = KeyState::from_keys(&[Key::Space]);

    rig.avatar.body.position.y = 3.0;
    let report = rig
        .controller
        .tick(0.016, jump, &rig.camera, &mut rig.avatar, no_physics)?;
    assert!(!report.integration.jumped);
    assert_eq!(rig.avatar.body.velocity.y, 0.0);

    rig.avatar.body.position.y = 0.1;
    let report = rig
        .controller
        .tick(0.016, jump, &rig.camera, &mut rig.avatar, no_physics)?;
    assert!(report.integration.jumped);
    assert!((rig.avatar.body.velocity.y - 4.0).abs() < 1e-6);
    Ok(())
}

#[test]
fn holding_jump_fires_again_before_landing() -> anyhow::Result<()> {
    let mut rig = Rig::spawn(&CharacterProfile::fox())?;
    let mut physics = GroundPhysics::default();
    let jump = KeyState::from_keys(&[Key::Space]);
    let ground = physics.resting_height(&rig.avatar.body);

    let mut jumps = Vec::new();
    for _ in 0..120 {
        let height = rig.avatar.body.position.y;
        let report = rig
            .controller
            .tick(1.0 / 60.0, jump, &rig.camera, &mut rig.avatar, |body, dt| {
                physics.step(body, dt)
            })?;
        if report.integration.jumped {
            jumps.push(height);
        }
    }

    assert!(jumps.len() >= 2, "jumps at {jumps:?}");
    assert!((jumps[0] - ground).abs() < 1e-6);
    assert!(jumps[1] > ground + 1e-3, "second jump at {}", jumps[1]);
    Ok(())
}

#[test]
fn halted_animation_still_stops_when_keys_are_released() -> anyhow::Result<()> {
    let mut profile = CharacterProfile::fox();
    profile.clips = vec!["Survey".into(), "Run".into()];
    let mut rig = Rig::spawn(&profile)?;
    let forward = KeyState::from_keys(&[Key::W]);

    rig.controller
        .tick(0.1, forward, &rig.camera, &mut rig.avatar, no_physics)?;
    assert_eq!(rig.controller.state(), LocomotionState::Run);

    rig.controller.switch_run_toggle();
    let err = rig
        .controller
        .tick(0.1, forward, &rig.camera, &mut rig.avatar, no_physics)
        .unwrap_err();
    assert!(matches!(err, ControllerError::ClipNotFound { state: LocomotionState::Walk, .. }));
    assert!(rig.controller.is_animation_halted());

    let stopped_at = rig.avatar.body.position;
    for _ in 0..10 {
        let report = rig.controller.tick(
            0.1,
            KeyState::NONE,
            &rig.camera,
            &mut rig.avatar,
            no_physics,
        )?;
        assert_eq!(report.transition, Transition::Halted);
        assert_eq!(report.integration.displacement, Vec3::ZERO);
    }
    assert_eq!(rig.avatar.body.position, stopped_at);

    // Pressing a key again walks, at the speed the run toggle selects.
    let report = rig
        .controller
        .tick(0.1, forward, &rig.camera, &mut rig.avatar, no_physics)?;
    assert!((report.integration.displacement.length() - 0.2).abs() < 1e-5);
    Ok(())
}
