use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use pixelport_core::hash::hash_frame;
use pixelport_core::PortConfig;
use pixelport_module::{ComputeModule, GridDescriptor, WasmModule};
use pixelport_render::snapshot::{diff_frames, load_frame, save_frame};
use pixelport_render::BackendKind;
use pixelport_runtime::{FrameSource, IntervalFrameSource, Session, SteppedFrameSource};

#[derive(Parser)]
#[command(
    name = "pixelport",
    version,
    about = "Pixelport: host for pixel-grid compute modules",
    long_about = "Pixelport loads a sandboxed .wasm compute module, drives it frame by frame\nand presents the pixel grid it keeps in linear memory."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a module and present its grid every frame
    Run(RunArgs),

    /// Load a module and print its grid geometry without rendering
    Inspect {
        /// Path to the .wasm (or .wat) module
        #[arg()]
        module: PathBuf,

        /// Config file supplying export names and seed
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Print machine-readable JSON
        #[arg(long)]
        json: bool,
    },

    /// Display version and available backends
    Info,
}

#[derive(Args)]
struct RunArgs {
    /// Path to the .wasm (or .wat) module; overrides the config file's module path
    #[arg()]
    module: Option<PathBuf>,

    /// Path to a pixelport.toml session config
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Rendering backend: direct-blit, texture-quad (aliases: 2d, webgl)
    #[arg(short, long)]
    backend: Option<String>,

    /// Frame rate of the frame source
    #[arg(long)]
    fps: Option<f64>,

    /// Stop after this many frames
    #[arg(long)]
    frames: Option<u64>,

    /// Seed for the module's random import
    #[arg(long)]
    seed: Option<u64>,

    /// Write the final surface to this image file
    #[arg(long)]
    snapshot: Option<PathBuf>,

    /// Print the SHA-256 content hash of the final surface
    #[arg(long)]
    hash: bool,

    /// Fail unless the final surface matches this reference image exactly
    #[arg(long)]
    expect: Option<PathBuf>,

    /// Fire frames back to back on a virtual clock instead of waiting for the wall clock
    #[arg(long, conflicts_with = "window")]
    virtual_clock: bool,

    /// Show the surface in a desktop window and forward its pointer input
    #[arg(short, long)]
    window: bool,

    /// Window pixels per grid cell
    #[arg(long)]
    scale: Option<u32>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Logs go to stderr so stdout carries only command output.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let result = match cli.command {
        Commands::Run(args) => cmd_run(args),
        Commands::Inspect {
            module,
            config,
            json,
        } => cmd_inspect(module, config, json),
        Commands::Info => cmd_info(),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn load_config(module: Option<PathBuf>, config: Option<PathBuf>) -> Result<PortConfig> {
    let mut port_config = match &config {
        Some(path) => PortConfig::load_from_file(path)
            .with_context(|| format!("failed to load config: {}", path.display()))?,
        None => PortConfig::default(),
    };
    match module {
        Some(path) => port_config.module.path = path,
        None if config.is_none() => anyhow::bail!("no module given; pass a module path or --config"),
        None => {}
    }
    Ok(port_config)
}

fn cmd_run(args: RunArgs) -> Result<()> {
    let mut config = load_config(args.module, args.config)?;
    if let Some(backend) = args.backend {
        config.render.backend = backend;
    }
    if let Some(fps) = args.fps {
        config.render.fps = fps;
    }
    if args.window {
        config.render.window = true;
    }
    if let Some(scale) = args.scale {
        config.render.scale = scale;
    }
    if args.frames.is_some() {
        config.session.max_frames = args.frames;
    }
    if args.seed.is_some() {
        config.module.seed = args.seed;
    }
    if args.snapshot.is_some() {
        config.session.snapshot = args.snapshot;
    }

    config.validate().context("invalid render settings")?;
    if config.render.window && args.virtual_clock {
        anyhow::bail!("--virtual-clock cannot drive a window");
    }

    let start = Instant::now();
    let started = || format!("failed to start {}", config.module.path.display());
    let (session, report) = if config.render.window {
        let (mut session, mut source) = Session::windowed(&config).with_context(started)?;
        let report = session.run(&mut source).context("session stopped")?;
        println!("Pointer events: {}", source.dispatched());
        (session, report)
    } else {
        let mut session = Session::from_config(&config).with_context(started)?;
        let mut source: Box<dyn FrameSource> = if args.virtual_clock {
            Box::new(SteppedFrameSource::at_fps(config.render.fps))
        } else {
            Box::new(IntervalFrameSource::new(config.render.fps)?)
        };
        let report = session.run(source.as_mut()).context("session stopped")?;
        (session, report)
    };

    println!(
        "Ran {} frames in {:.2}s ({} presented, {} skipped)",
        report.stats.ticks,
        start.elapsed().as_secs_f64(),
        report.stats.presented,
        report.stats.skipped
    );

    if config.session.snapshot.is_some() || args.hash || args.expect.is_some() {
        let frame = session.snapshot().context("failed to read back surface")?;
        if let Some(path) = &config.session.snapshot {
            save_frame(&frame, path)?;
            println!("Snapshot: {}", path.display());
        }
        if args.hash {
            println!("Hash: {}", hash_frame(&frame));
        }
        if let Some(path) = &args.expect {
            let reference = load_frame(path)
                .with_context(|| format!("failed to load reference {}", path.display()))?;
            let differing = diff_frames(&frame, &reference)?;
            if differing > 0 {
                anyhow::bail!(
                    "surface differs from {} in {} of {} pixels",
                    path.display(),
                    differing,
                    frame.pixel_count()
                );
            }
            println!("Matches: {}", path.display());
        }
    }
    Ok(())
}

fn cmd_inspect(module_path: PathBuf, config: Option<PathBuf>, json: bool) -> Result<()> {
    let config = load_config(Some(module_path), config)?;
    let mut module = WasmModule::from_file(&config.module.path, config.module.seed, &config.exports)
        .with_context(|| format!("failed to load {}", config.module.path.display()))?;
    let grid = GridDescriptor::resolve(&mut module, &config.exports)?;
    module.init()?;
    let memory_size = module.memory_size();
    let in_bounds = grid.pixels(&module.memory()).is_ok();

    if json {
        let value = serde_json::json!({
            "module": config.module.path.display().to_string(),
            "width": grid.width,
            "height": grid.height,
            "pixel_buffer_offset": grid.pixel_buffer_offset,
            "byte_len": grid.byte_len(),
            "memory_size": memory_size,
            "in_bounds": in_bounds,
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
    } else {
        println!("Module:  {}", config.module.path.display());
        println!("Grid:    {}x{}", grid.width, grid.height);
        println!(
            "Pixels:  {} bytes at {:#x}{}",
            grid.byte_len(),
            grid.pixel_buffer_offset,
            if in_bounds { "" } else { " (out of bounds)" }
        );
        println!("Memory:  {} bytes", memory_size);
    }
    Ok(())
}

fn cmd_info() -> Result<()> {
    println!("Pixelport module host");
    println!("   Version:   {}", env!("CARGO_PKG_VERSION"));
    println!("   Runtime:   wasmtime");
    let backends: Vec<&str> = BackendKind::ALL.iter().map(|k| k.as_str()).collect();
    println!(
        "   Backends:  {} (default {})",
        backends.join(", "),
        BackendKind::default()
    );
    Ok(())
}
