//! Configuration – reads/writes `~/.wayfind/config.toml`.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use wayfind_types::Tunables;

/// Simulated walk used when no real sensor is attached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimConfig {
    /// Scene preset: `open`, `pillar` or `corridor`.
    #[serde(default = "default_scene")]
    pub scene: String,

    #[serde(default = "default_width")]
    pub width: u32,

    #[serde(default = "default_height")]
    pub height: u32,

    /// Metres walked per frame.
    #[serde(default = "default_walk_speed")]
    pub walk_speed: f32,

    /// Depth beyond this range is reported with zero confidence.
    #[serde(default = "default_max_range")]
    pub max_range: f32,

    /// Lose the pose fix every N frames; 0 never does.
    #[serde(default)]
    pub degenerate_every: u64,
}

/// Persisted user configuration stored in `~/.wayfind/config.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Frames processed per second.
    #[serde(default = "default_frame_rate")]
    pub frame_rate_hz: f32,

    /// Soft per-frame time budget in milliseconds.
    #[serde(default = "default_frame_budget_ms")]
    pub frame_budget_ms: u64,

    #[serde(default)]
    pub engine: Tunables,

    #[serde(default)]
    pub sim: SimConfig,
}

fn default_scene() -> String {
    "pillar".to_string()
}
fn default_width() -> u32 {
    64
}
fn default_height() -> u32 {
    48
}
fn default_walk_speed() -> f32 {
    0.08
}
fn default_max_range() -> f32 {
    5.0
}
fn default_frame_rate() -> f32 {
    15.0
}
fn default_frame_budget_ms() -> u64 {
    33
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            scene: default_scene(),
            width: default_width(),
            height: default_height(),
            walk_speed: default_walk_speed(),
            max_range: default_max_range(),
            degenerate_every: 0,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            frame_rate_hz: default_frame_rate(),
            frame_budget_ms: default_frame_budget_ms(),
            engine: Tunables::default(),
            sim: SimConfig::default(),
        }
    }
}

impl Config {
    /// Interval between ticks.  Rates that are not positive, or so small
    /// that the period does not fit a `Duration`, fall back to the default.
    pub fn frame_period(&self) -> std::time::Duration {
        let fallback = 1.0 / f64::from(default_frame_rate());
        let hz = f64::from(self.frame_rate_hz);
        let secs = if hz.is_finite() && hz > 0.0 { 1.0 / hz } else { fallback };
        std::time::Duration::try_from_secs_f64(secs)
            .unwrap_or_else(|_| std::time::Duration::from_secs_f64(fallback))
    }
}

/// Return the path to `~/.wayfind/config.toml`.
pub fn config_path() -> PathBuf {
    config_path_for_home(
        &std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string()),
    )
}

/// Build the config path relative to the given home directory.
pub(crate) fn config_path_for_home(home: &str) -> PathBuf {
    PathBuf::from(home).join(".wayfind").join("config.toml")
}

/// Load the config from disk, falling back to defaults when the file does
/// not exist.  Environment overrides are applied either way.
pub fn load() -> Result<Config, String> {
    let mut cfg = load_from(&config_path())?.unwrap_or_default();
    apply_env_overrides(&mut cfg);
    Ok(cfg)
}

/// Load the config from a specific path.  Returns `None` if it does not exist.
pub(crate) fn load_from(path: &Path) -> Result<Option<Config>, String> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read config at {}: {}", path.display(), e))?;
    let cfg: Config = toml::from_str(&raw).map_err(|e| format!("Failed to parse config: {}", e))?;
    Ok(Some(cfg))
}

/// Apply `WAYFIND_*` environment variable overrides to `cfg`.
///
/// Unparseable values are ignored.
///
/// | Variable | Config field |
/// |---|---|
/// | `WAYFIND_SCENE` | `sim.scene` |
/// | `WAYFIND_FRAME_RATE` | `frame_rate_hz` |
/// | `WAYFIND_FRAME_BUDGET_MS` | `frame_budget_ms` |
/// | `WAYFIND_PERSON_RADIUS` | `engine.person_radius` |
pub fn apply_env_overrides(cfg: &mut Config) {
    if let Ok(v) = std::env::var("WAYFIND_SCENE") {
        cfg.sim.scene = v;
    }
    if let Ok(v) = std::env::var("WAYFIND_FRAME_RATE")
        && let Ok(hz) = v.parse::<f32>()
    {
        cfg.frame_rate_hz = hz;
    }
    if let Ok(v) = std::env::var("WAYFIND_FRAME_BUDGET_MS")
        && let Ok(ms) = v.parse::<u64>()
    {
        cfg.frame_budget_ms = ms;
    }
    if let Ok(v) = std::env::var("WAYFIND_PERSON_RADIUS")
        && let Ok(radius) = v.parse::<f32>()
    {
        cfg.engine.person_radius = radius;
    }
}

/// Save the config to disk, creating `~/.wayfind/` if necessary.
pub fn save(cfg: &Config) -> Result<(), String> {
    save_to(cfg, &config_path())
}

/// Save the config to a specific path.
pub(crate) fn save_to(cfg: &Config, path: &Path) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| format!("Failed to create config directory: {}", e))?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(parent, fs::Permissions::from_mode(0o700))
                .map_err(|e| format!("Failed to set config directory permissions: {}", e))?;
        }
    }
    let raw = toml::to_string_pretty(cfg).map_err(|e| format!("Failed to serialize config: {}", e))?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(0o600)
            .open(path)
            .and_then(|mut f| {
                use std::io::Write;
                f.write_all(raw.as_bytes())
            })
            .map_err(|e| format!("Failed to write config at {}: {}", path.display(), e))?;
    }
    #[cfg(not(unix))]
    fs::write(path, raw).map_err(|e| format!("Failed to write config at {}: {}", path.display(), e))?;
    Ok(())
}
