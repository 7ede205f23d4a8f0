use std::io::Write;
use std::thread::sleep;
use std::time::Duration;

use approx::assert_relative_eq;
use nalgebra::Vector3;

use anabox::io::CsvFrameSink;
use anabox::render::FrameRecorder;
use anabox::sim::{
    generate_path, inject_faults, position_errors, run_simulation, FaultConfig, PathConfig,
    PathShape,
};
use anabox::source::{DirectionKey, KeyboardConfig, KeyboardSource, ScriptedSource};
use anabox::{AppSettings, Pipeline, Pose, PoseSource, PoseStabilizer, Regime, StabilizerParams};

fn home() -> Pose {
    Pose::at(0, Vector3::new(0.0, 0.0, 0.7))
}

#[test]
fn first_sample_passes_through_then_rate_limit_and_ema_apply() {
    let mut stab = PoseStabilizer::new(StabilizerParams::default()).unwrap();

    let first = stab.update(Pose::at(0, Vector3::new(0.0, 0.0, 0.7)), home());
    assert_eq!(first.position_m, Vector3::new(0.0, 0.0, 0.7));

    // 1 m jump in 100 ms is clamped to 0.15 m, then smoothed with alpha 0.35.
    let second = stab.update(Pose::at(100, Vector3::new(1.0, 0.0, 0.7)), home());
    assert_relative_eq!(second.position_m.x, 0.35 * 0.15, epsilon = 1e-12);
    assert_eq!(stab.regime(), Some(Regime::Tracking));
}

#[test]
fn loss_holds_then_recenters_to_fallback() {
    let mut stab = PoseStabilizer::new(StabilizerParams::default()).unwrap();
    stab.update(Pose::at(900, Vector3::new(0.2, 0.0, 0.7)), home());

    let held = stab.update(Pose::lost(1000), home());
    assert_eq!(stab.regime(), Some(Regime::Holding));
    assert_eq!(held.timestamp_ms, 1000);
    assert_relative_eq!(held.position_m.x, 0.2);

    stab.update(Pose::lost(1300), home());
    assert_eq!(stab.regime(), Some(Regime::Holding));

    let halfway = stab.update(Pose::lost(1600), home());
    assert_eq!(stab.regime(), Some(Regime::Recentering));
    assert_relative_eq!(halfway.position_m.x, 0.1, epsilon = 1e-12);
    assert_relative_eq!(halfway.confidence, 0.5, epsilon = 1e-12);

    let done = stab.update(Pose::lost(2000), home());
    assert_relative_eq!(done.position_m.x, 0.0, epsilon = 1e-12);
    assert_relative_eq!(done.confidence, 0.0);
}

#[test]
fn low_confidence_counts_as_loss() {
    let mut stab = PoseStabilizer::new(StabilizerParams::default()).unwrap();
    stab.update(Pose::at(0, Vector3::new(0.1, 0.0, 0.7)), home());
    let weak = Pose::new(
        33,
        Vector3::new(0.3, 0.0, 0.7),
        Vector3::zeros(),
        0.1,
        true,
    );
    let out = stab.update(weak, home());
    assert_eq!(stab.regime(), Some(Regime::Holding));
    assert_relative_eq!(out.position_m.x, 0.1);
}

#[test]
fn simulated_run_through_pipeline_visits_every_regime() {
    let truth = generate_path(PathShape::Orbit, &PathConfig::default()).unwrap();
    let raw = inject_faults(&truth, &FaultConfig::default()).unwrap();
    let ticks = raw.len();

    let mut pipeline =
        Pipeline::new(Box::new(ScriptedSource::new(raw)), &AppSettings::default()).unwrap();
    pipeline.start();
    let mut recorder = FrameRecorder::default();
    assert_eq!(pipeline.run_into(&mut recorder, ticks).unwrap(), ticks);

    let stats = pipeline.stats();
    assert_eq!(stats.frames as usize, ticks);
    assert!(stats.tracking > 0 && stats.holding > 0 && stats.recentering > 0);
    assert!(recorder
        .frames
        .iter()
        .all(|f| (0.0..=1.0).contains(&f.pose.confidence)));
    assert!(recorder
        .frames
        .iter()
        .all(|f| f.state.view_matrix.iter().all(|v| v.is_finite())));
}

#[test]
fn yaml_settings_drive_pipeline_into_csv() {
    let dir = tempfile::tempdir().unwrap();
    let settings_path = dir.path().join("settings.yaml");
    let mut file = std::fs::File::create(&settings_path).unwrap();
    writeln!(file, "render:\n  fov_deg: 75.0\n  box_depth_m: 0.8").unwrap();

    let settings = AppSettings::from_yaml_file(&settings_path).unwrap();
    let poses: Vec<Pose> = (0..10)
        .map(|i| Pose::at(i * 33, Vector3::new(0.0, 0.0, 0.7)))
        .collect();
    let mut pipeline = Pipeline::new(Box::new(ScriptedSource::new(poses)), &settings).unwrap();
    assert_eq!(pipeline.projection().fov_deg, 75.0);
    pipeline.start();

    let csv_path = dir.path().join("frames.csv");
    let mut sink = CsvFrameSink::create(&csv_path).unwrap();
    pipeline.run_into(&mut sink, 10).unwrap();
    assert_eq!(sink.finish().unwrap(), 10);

    let text = std::fs::read_to_string(&csv_path).unwrap();
    assert_eq!(text.lines().count(), 11);
}

#[test]
fn keyboard_source_moves_head_through_pipeline() {
    let source = KeyboardSource::new(KeyboardConfig::default()).unwrap();
    let controller = source.controller();
    let mut pipeline = Pipeline::new(Box::new(source), &AppSettings::default()).unwrap();
    assert_eq!(pipeline.source_name(), "keyboard");

    pipeline.start();
    controller.set_key(DirectionKey::Right, true);
    sleep(Duration::from_millis(60));
    let frame = pipeline.tick().unwrap().unwrap();
    assert!(frame.raw.position_m.x > 0.0);
    assert_relative_eq!(frame.raw.position_m.z, 0.7);
    assert_eq!(frame.regime, Regime::Tracking);

    controller.recenter();
    pipeline.stop();
}

#[test]
fn stopped_keyboard_source_holds_position() {
    let mut source = KeyboardSource::new(KeyboardConfig::default()).unwrap();
    let controller = source.controller();
    source.start();
    controller.set_key(DirectionKey::Up, true);
    sleep(Duration::from_millis(30));
    let moved = source.get_latest_pose();
    source.stop();
    sleep(Duration::from_millis(30));
    let after = source.get_latest_pose();
    assert_eq!(moved.position_m, after.position_m);
    assert!(after.timestamp_ms >= moved.timestamp_ms);
}

#[test]
fn rendered_frame_errors_match_offline_stabilizer() {
    let truth = generate_path(PathShape::Lissajous, &PathConfig::default()).unwrap();
    let raw = inject_faults(&truth, &FaultConfig::default()).unwrap();
    let settings = AppSettings::default();

    let mut pipeline =
        Pipeline::new(Box::new(ScriptedSource::new(raw.clone())), &settings).unwrap();
    pipeline.start();
    let mut recorder = FrameRecorder::default();
    pipeline.run_into(&mut recorder, truth.len()).unwrap();

    let rendered: Vec<Pose> = recorder.frames.iter().map(|f| f.pose).collect();
    let errors = position_errors(&truth, &rendered);
    assert_eq!(errors.len(), truth.len());

    let steps = run_simulation(
        &truth,
        &raw,
        settings.tracking.params().unwrap(),
        *pipeline.fallback(),
    )
    .unwrap();
    for (err, step) in errors.iter().zip(&steps) {
        assert_relative_eq!(*err, step.err_stabilized, epsilon = 1e-12);
    }
}

#[test]
fn recalibrate_recenters_keyboard_head() {
    let source = KeyboardSource::new(KeyboardConfig::default()).unwrap();
    let controller = source.controller();
    let mut pipeline = Pipeline::new(Box::new(source), &AppSettings::default()).unwrap();

    pipeline.start();
    controller.set_key(DirectionKey::Left, true);
    sleep(Duration::from_millis(60));
    let moved = pipeline.tick().unwrap().unwrap();
    assert!(moved.raw.position_m.x < 0.0);

    pipeline.recalibrate();
    let frame = pipeline.tick().unwrap().unwrap();
    assert_eq!(frame.raw.position_m.x, 0.0);
    assert_eq!(frame.raw.position_m.y, 0.0);
    pipeline.stop();
}
