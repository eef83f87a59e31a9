use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{PortError, PortResult};
use crate::input::PointerKind;

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct ModuleConfig {
    pub path: PathBuf,
    /// Seed for the `Math.random` import. Entropy-seeded when absent.
    pub seed: Option<u64>,
}

/// Names of the three value exports that describe the pixel grid.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct ExportNames {
    pub grid_ptr: String,
    pub width: String,
    pub height: String,
}

impl Default for ExportNames {
    fn default() -> Self {
        Self {
            grid_ptr: "grid_ptr".to_string(),
            width: "width".to_string(),
            height: "height".to_string(),
        }
    }
}

/// Slowest accepted frame rate: one frame every 1000 seconds.
pub const MIN_FPS: f64 = 1e-3;

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RenderConfig {
    pub backend: String, // "direct-blit" | "texture-quad"
    pub fps: f64,
    /// Open a desktop window showing the surface and forwarding the pointer.
    pub window: bool,
    /// Window pixels per grid cell.
    pub scale: u32,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            backend: "texture-quad".to_string(),
            fps: 60.0,
            window: false,
            scale: 1,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct SessionConfig {
    pub max_frames: Option<u64>,
    pub snapshot: Option<PathBuf>,
}

/// A pointer event replayed before the frame with index `frame` runs.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct ScriptedInput {
    pub frame: u64,
    pub kind: PointerKind,
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct PortConfig {
    pub module: ModuleConfig,
    #[serde(default)]
    pub exports: ExportNames,
    #[serde(default)]
    pub render: RenderConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub input: Vec<ScriptedInput>,
}

impl PortConfig {
    /// Config for a module path with every other setting at its default.
    pub fn for_module(path: impl Into<PathBuf>) -> Self {
        Self {
            module: ModuleConfig {
                path: path.into(),
                seed: None,
            },
            ..Default::default()
        }
    }

    pub fn load_from_file(path: &Path) -> PortResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        let mut config = Self::from_toml(&contents).map_err(|e| match e {
            PortError::Config { message, .. } => PortError::config(message, path),
            other => other,
        })?;
        // Relative module paths are resolved against the config file's directory.
        if config.module.path.is_relative() {
            if let Some(dir) = path.parent() {
                config.module.path = dir.join(&config.module.path);
            }
        }
        Ok(config)
    }

    pub fn from_toml(contents: &str) -> PortResult<Self> {
        let config: PortConfig =
            toml::from_str(contents).map_err(|e| PortError::config(e.to_string(), "<inline>"))?;
        config.validate()?;
        Ok(config)
    }

    /// Check values that parse but cannot drive a session.
    pub fn validate(&self) -> PortResult<()> {
        let fps = self.render.fps;
        if !(fps.is_finite() && fps >= MIN_FPS) {
            return Err(PortError::config(
                format!("render.fps must be a number of at least {MIN_FPS}, got {fps}"),
                "<inline>",
            ));
        }
        if self.render.scale == 0 {
            return Err(PortError::config("render.scale must be at least 1", "<inline>"));
        }
        Ok(())
    }
}
