/// External configuration loader.
///
/// Reads `config.toml` from the executable's directory (or CWD).
/// Falls back to sensible defaults if the file is missing or incomplete.
/// Problems found while loading are kept in `warnings` and logged once
/// the logger is up (the logger itself is configured from this file).

use serde::Deserialize;
use std::path::PathBuf;

use log::LevelFilter;

// ── Public Config Struct ──

#[derive(Clone, Debug)]
pub struct GameConfig {
    pub speed: SpeedConfig,
    pub gamepad: GamepadConfig,
    pub log: LogConfig,
    pub levels_dir: PathBuf,
    pub warnings: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SpeedConfig {
    pub frame_ms: u64,
    pub move_interval_ms: u64,     // ~20 Hz input drain
    pub gravity_interval_ms: u64,  // ~5 Hz gravity sweep
    pub ghost_interval_ms: u64,
}

#[derive(Clone, Debug)]
pub struct GamepadConfig {
    pub confirm: Vec<String>,
    pub cancel: Vec<String>,
    pub restart: Vec<String>,
    pub pause: Vec<String>,
}

#[derive(Clone, Debug)]
pub struct LogConfig {
    pub enabled: bool,
    pub file: PathBuf,
    pub level: LevelFilter,
}

// ── TOML Schema (with serde defaults) ──

#[derive(Deserialize, Debug, Default)]
struct TomlConfig {
    #[serde(default)]
    speed: TomlSpeed,
    #[serde(default)]
    gamepad: TomlGamepad,
    #[serde(default)]
    general: TomlGeneral,
    #[serde(default)]
    log: TomlLog,
}

#[derive(Deserialize, Debug)]
struct TomlSpeed {
    #[serde(default = "default_frame")]
    frame_ms: u64,
    #[serde(default = "default_move_interval")]
    move_interval_ms: u64,
    #[serde(default = "default_gravity_interval")]
    gravity_interval_ms: u64,
    #[serde(default = "default_ghost_interval")]
    ghost_interval_ms: u64,
}

#[derive(Deserialize, Debug)]
struct TomlGamepad {
    #[serde(default = "default_confirm")]
    confirm: Vec<String>,
    #[serde(default = "default_cancel")]
    cancel: Vec<String>,
    #[serde(default = "default_restart")]
    restart: Vec<String>,
    #[serde(default = "default_pause")]
    pause: Vec<String>,
}

#[derive(Deserialize, Debug)]
struct TomlGeneral {
    #[serde(default = "default_levels_dir")]
    levels_dir: String,
}

#[derive(Deserialize, Debug)]
struct TomlLog {
    #[serde(default)]
    enabled: bool,
    #[serde(default = "default_log_file")]
    file: String,
    #[serde(default = "default_log_level")]
    level: String,
}

// ── Defaults ──

fn default_frame() -> u64 { 5 }
fn default_move_interval() -> u64 { 50 }
fn default_gravity_interval() -> u64 { 200 }
fn default_ghost_interval() -> u64 { 250 }

fn default_confirm() -> Vec<String> { vec!["A".into()] }
fn default_cancel() -> Vec<String> { vec!["Select".into()] }
fn default_restart() -> Vec<String> { vec!["Y".into()] }
fn default_pause() -> Vec<String> { vec!["Start".into()] }
fn default_levels_dir() -> String { "levels".into() }
fn default_log_file() -> String { "boulders.log".into() }
fn default_log_level() -> String { "debug".into() }

impl Default for TomlSpeed {
    fn default() -> Self {
        TomlSpeed {
            frame_ms: default_frame(),
            move_interval_ms: default_move_interval(),
            gravity_interval_ms: default_gravity_interval(),
            ghost_interval_ms: default_ghost_interval(),
        }
    }
}

impl Default for TomlGamepad {
    fn default() -> Self {
        TomlGamepad {
            confirm: default_confirm(),
            cancel: default_cancel(),
            restart: default_restart(),
            pause: default_pause(),
        }
    }
}

impl Default for TomlGeneral {
    fn default() -> Self {
        TomlGeneral {
            levels_dir: default_levels_dir(),
        }
    }
}

impl Default for TomlLog {
    fn default() -> Self {
        TomlLog {
            enabled: false,
            file: default_log_file(),
            level: default_log_level(),
        }
    }
}

// ── Loading ──

impl GameConfig {
    /// Load config from `config.toml`.
    /// Search order: (1) exe directory, (2) current working directory.
    /// Missing file or missing keys gracefully fall back to defaults.
    pub fn load() -> Self {
        let search_dirs = candidate_dirs();
        let mut warnings = vec![];

        let toml_cfg = load_toml(&search_dirs, &mut warnings);
        let mut cfg = Self::from_toml(toml_cfg, &mut warnings);

        // Search candidate dirs for the levels folder
        if !cfg.levels_dir.is_absolute() {
            if let Some(found) = search_dirs
                .iter()
                .map(|d| d.join(&cfg.levels_dir))
                .find(|p| p.is_dir())
            {
                cfg.levels_dir = found;
            }
        }

        cfg.warnings = warnings;
        cfg
    }

    fn from_toml(toml_cfg: TomlConfig, warnings: &mut Vec<String>) -> Self {
        let level = match toml_cfg.log.level.parse::<LevelFilter>() {
            Ok(l) => l,
            Err(_) => {
                warnings.push(format!(
                    "unknown log level {:?}, using debug", toml_cfg.log.level
                ));
                LevelFilter::Debug
            }
        };

        GameConfig {
            speed: SpeedConfig {
                frame_ms: toml_cfg.speed.frame_ms.max(1),
                move_interval_ms: toml_cfg.speed.move_interval_ms,
                gravity_interval_ms: toml_cfg.speed.gravity_interval_ms,
                ghost_interval_ms: toml_cfg.speed.ghost_interval_ms,
            },
            gamepad: GamepadConfig {
                confirm: toml_cfg.gamepad.confirm,
                cancel: toml_cfg.gamepad.cancel,
                restart: toml_cfg.gamepad.restart,
                pause: toml_cfg.gamepad.pause,
            },
            log: LogConfig {
                enabled: toml_cfg.log.enabled,
                file: PathBuf::from(toml_cfg.log.file),
                level,
            },
            levels_dir: PathBuf::from(toml_cfg.general.levels_dir),
            warnings: vec![],
        }
    }
}

impl Default for GameConfig {
    fn default() -> Self {
        Self::from_toml(TomlConfig::default(), &mut vec![])
    }
}

/// Candidate directories to search: exe dir + CWD + XDG data home (deduplicated).
fn candidate_dirs() -> Vec<PathBuf> {
    let exe_dir = std::env::current_exe()
        .ok()
        .map(|exe| exe.canonicalize().unwrap_or(exe))
        .and_then(|exe| exe.parent().map(PathBuf::from));
    let cwd = std::env::current_dir().ok();
    let data_home = std::env::var_os("HOME")
        .map(|home| PathBuf::from(home).join(".local/share/boulders"))
        .filter(|p| p.is_dir());

    let mut dirs: Vec<PathBuf> = Vec::with_capacity(3);
    for dir in [exe_dir, cwd, data_home].into_iter().flatten() {
        if !dirs.contains(&dir) {
            dirs.push(dir);
        }
    }
    if dirs.is_empty() {
        dirs.push(PathBuf::from("."));
    }
    dirs
}

/// Search for config.toml in candidate directories.
fn load_toml(search_dirs: &[PathBuf], warnings: &mut Vec<String>) -> TomlConfig {
    for dir in search_dirs {
        let path = dir.join("config.toml");
        if !path.exists() {
            continue;
        }
        match std::fs::read_to_string(&path) {
            Ok(text) => match toml::from_str::<TomlConfig>(&text) {
                Ok(cfg) => return cfg,
                Err(e) => {
                    warnings.push(format!("config.toml parse error: {e}; using default settings"));
                    return TomlConfig::default();
                }
            },
            Err(e) => {
                warnings.push(format!("could not read {}: {e}", path.display()));
            }
        }
    }
    TomlConfig::default()
}
