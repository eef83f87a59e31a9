//! End-to-end sessions over real WAT modules.

use std::path::PathBuf;

use pixelport_core::hash::hash_frame;
use pixelport_core::{PointerKind, PortConfig, PortError, ScriptedInput};
use pixelport_module::WasmModule;
use pixelport_render::{create_backend, BackendKind};
use pixelport_runtime::{SchedulerState, Session, SteppedFrameSource};

/// 2x2 grid at 64. `tick` writes the frame count into pixel 0 and the
/// timestamp into pixel 1; `onmousedown` packs `y*256 + x` into pixel 2.
const COUNTER_WAT: &str = r#"
(module
  (memory (export "memory") 1)
  (global (export "grid_ptr") i32 (i32.const 0))
  (global (export "width") i32 (i32.const 4))
  (global (export "height") i32 (i32.const 8))
  (global $frame (mut i32) (i32.const 0))
  (data (i32.const 0) "\40\00\00\00\02\00\00\00\02\00\00\00")
  (func (export "init")
    (i32.store (i32.const 76) (i32.const 0x04030201)))
  (func (export "tick") (param $now f64)
    (global.set $frame (i32.add (global.get $frame) (i32.const 1)))
    (i32.store (i32.const 64) (global.get $frame))
    (i32.store (i32.const 68) (i32.trunc_f64_u (local.get $now))))
  (func (export "onmousemove") (param i32 i32))
  (func (export "onmousedown") (param $x i32) (param $y i32)
    (i32.store (i32.const 72)
      (i32.add (i32.mul (local.get $y) (i32.const 256)) (local.get $x))))
  (func (export "onmouseup") (param i32 i32))
)
"#;

/// The grid straddles the end of the first page until the second tick grows memory.
const GROWING_WAT: &str = r#"
(module
  (memory (export "memory") 1)
  (global (export "grid_ptr") i32 (i32.const 0))
  (global (export "width") i32 (i32.const 4))
  (global (export "height") i32 (i32.const 8))
  (global $frame (mut i32) (i32.const 0))
  (data (i32.const 0) "\f8\ff\00\00\02\00\00\00\02\00\00\00")
  (func (export "init"))
  (func (export "tick") (param f64)
    (global.set $frame (i32.add (global.get $frame) (i32.const 1)))
    (if (i32.eq (global.get $frame) (i32.const 2))
      (then (drop (memory.grow (i32.const 1)))))
    (if (i32.ge_u (global.get $frame) (i32.const 2))
      (then (i32.store (i32.const 65528) (global.get $frame)))))
  (func (export "onmousemove") (param i32 i32))
  (func (export "onmousedown") (param i32 i32))
  (func (export "onmouseup") (param i32 i32))
)
"#;

/// Fills the 1x1 grid with bits drawn from `Math.random`.
const RANDOM_WAT: &str = r#"
(module
  (import "env" "Math.random" (func $random (result f64)))
  (memory (export "memory") 1)
  (global (export "grid_ptr") i32 (i32.const 0))
  (global (export "width") i32 (i32.const 4))
  (global (export "height") i32 (i32.const 8))
  (data (i32.const 0) "\10\00\00\00\01\00\00\00\01\00\00\00")
  (func (export "init"))
  (func (export "tick") (param f64)
    (i32.store (i32.const 16)
      (i32.trunc_f64_u (f64.mul (call $random) (f64.const 4294967295)))))
  (func (export "onmousemove") (param i32 i32))
  (func (export "onmousedown") (param i32 i32))
  (func (export "onmouseup") (param i32 i32))
)
"#;

fn init_logging() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

fn blit_session(wat: &str, config: &PortConfig) -> Session<WasmModule> {
    init_logging();
    let module = WasmModule::from_bytes(wat.as_bytes(), config.module.seed, &config.exports).unwrap();
    Session::with_module(module, config, |w, h| {
        create_backend(BackendKind::DirectBlit, w, h)
    })
    .unwrap()
}

fn config_with_frames(frames: u64) -> PortConfig {
    let mut config = PortConfig::for_module("inline.wat");
    config.render.backend = "direct-blit".into();
    config.session.max_frames = Some(frames);
    config
}

fn temp_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("pixelport-{}-{}", name, std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

#[test]
fn test_direct_blit_matches_module_memory() {
    let mut config = config_with_frames(3);
    config.input.push(ScriptedInput {
        frame: 1,
        kind: PointerKind::Down,
        x: 7.5,
        y: 2.0,
    });
    let mut session = blit_session(COUNTER_WAT, &config);

    let report = session.run(&mut SteppedFrameSource::new(16.0)).unwrap();
    assert_eq!(report.stats.presented, 3);
    assert_eq!(report.inputs_dispatched, 1);

    let frame = session.snapshot().unwrap();
    assert_eq!((frame.width, frame.height), (2, 2));
    assert_eq!(
        frame.data,
        vec![
            3, 0, 0, 0, // frame count
            48, 0, 0, 0, // 3 * 16ms
            7, 2, 0, 0, // y*256 + x from the press
            1, 2, 3, 4, // written by init
        ]
    );
}

#[test]
fn test_texture_quad_matches_module_memory() {
    init_logging();
    let config = config_with_frames(2);
    let module = WasmModule::from_bytes(COUNTER_WAT.as_bytes(), None, &config.exports).unwrap();
    let built = Session::with_module(module, &config, |w, h| {
        create_backend(BackendKind::TextureQuad, w, h)
    });
    let mut session = match built {
        Ok(session) => session,
        Err(PortError::Render(e)) => {
            eprintln!("skipping GPU test: {}", e);
            return;
        }
        Err(e) => panic!("unexpected error: {e}"),
    };

    let report = session.run(&mut SteppedFrameSource::new(20.0)).unwrap();
    assert_eq!(report.stats.presented, 2);

    let frame = session.snapshot().unwrap();
    assert_eq!(frame.width, 2);
    assert_eq!(
        frame.data,
        vec![
            2, 0, 0, 0, // frame count
            40, 0, 0, 0, // 2 * 20ms
            0, 0, 0, 0, // no press
            1, 2, 3, 4, // written by init
        ]
    );
}

#[test]
fn test_module_without_height_never_runs_init() {
    // init would trap; the missing export must be reported instead.
    let wat = COUNTER_WAT
        .replace("(global (export \"height\") i32 (i32.const 8))", "")
        .replace("(i32.store (i32.const 76) (i32.const 0x04030201))", "unreachable");
    let config = config_with_frames(1);

    let err = WasmModule::from_bytes(wat.as_bytes(), None, &config.exports)
        .err()
        .unwrap();
    assert!(matches!(err, PortError::MissingExport { ref name } if name == "height"));
}

#[test]
fn test_trap_in_init_leaves_session_unbuilt() {
    let wat = COUNTER_WAT.replace("(i32.store (i32.const 76) (i32.const 0x04030201))", "unreachable");
    let config = config_with_frames(1);
    let module = WasmModule::from_bytes(wat.as_bytes(), None, &config.exports).unwrap();

    let mut backends = 0;
    let err = Session::with_module(module, &config, |w, h| {
        backends += 1;
        create_backend(BackendKind::DirectBlit, w, h)
    })
    .err()
    .unwrap();

    assert!(matches!(err, PortError::ModuleTrap { ref entry, .. } if entry == "init"));
    // The backend exists before init runs.
    assert_eq!(backends, 1);
}

#[test]
fn test_out_of_bounds_grid_skips_until_memory_grows() {
    let mut session = blit_session(GROWING_WAT, &config_with_frames(4));

    let report = session.run(&mut SteppedFrameSource::new(16.0)).unwrap();

    assert_eq!(report.stats.ticks, 4);
    assert_eq!(report.stats.skipped, 1);
    assert_eq!(report.stats.presented, 3);
    assert_eq!(session.snapshot().unwrap().get_pixel(0, 0), Some([4, 0, 0, 0]));
}

#[test]
fn test_trap_in_tick_stops_session() {
    let wat = COUNTER_WAT.replace(
        "(global.set $frame",
        "(if (i32.eq (global.get $frame) (i32.const 1)) (then unreachable))\n    (global.set $frame",
    );
    let mut session = blit_session(&wat, &config_with_frames(10));

    let err = session.run(&mut SteppedFrameSource::new(16.0)).unwrap_err();
    assert!(matches!(err, PortError::ModuleTrap { ref entry, .. } if entry == "tick"));

    let report = session.report();
    assert_eq!(report.state, SchedulerState::Stopped);
    assert_eq!(report.stats.presented, 1);
}

#[test]
fn test_seeded_sessions_render_identically() {
    let mut config = config_with_frames(5);
    config.module.seed = Some(7);

    let mut first = blit_session(RANDOM_WAT, &config);
    first.run(&mut SteppedFrameSource::new(16.0)).unwrap();
    let mut second = blit_session(RANDOM_WAT, &config);
    second.run(&mut SteppedFrameSource::new(16.0)).unwrap();

    assert_eq!(
        hash_frame(&first.snapshot().unwrap()),
        hash_frame(&second.snapshot().unwrap())
    );
}

#[test]
fn test_session_from_config_file() {
    let dir = temp_dir("config");
    std::fs::write(dir.join("counter.wat"), COUNTER_WAT).unwrap();
    let config_path = dir.join("pixelport.toml");
    std::fs::write(
        &config_path,
        r#"
[module]
path = "counter.wat"

[render]
backend = "2d"

[session]
max_frames = 2
"#,
    )
    .unwrap();

    let config = PortConfig::load_from_file(&config_path).unwrap();
    let mut session = Session::from_config(&config).unwrap();
    let report = session.run(&mut SteppedFrameSource::new(10.0)).unwrap();

    assert_eq!(report.stats.presented, 2);
    assert_eq!(session.snapshot().unwrap().get_pixel(1, 0), Some([20, 0, 0, 0]));
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn test_unsupported_backend_presents_nothing() {
    let dir = temp_dir("unsupported");
    let module_path = dir.join("counter.wat");
    std::fs::write(&module_path, COUNTER_WAT).unwrap();

    let mut config = PortConfig::for_module(&module_path);
    config.render.backend = "canvas".into();
    let err = Session::from_config(&config).err().unwrap();

    assert!(matches!(err, PortError::UnsupportedBackend(ref name) if name == "canvas"));
    let _ = std::fs::remove_dir_all(&dir);
}
