/// External configuration loader.
///
/// Reads `config.toml` from the executable's directory (or CWD).
/// Falls back to sensible defaults if the file is missing or incomplete.
/// Problems are collected in `warnings` and logged once the logger runs.

use serde::Deserialize;
use std::path::{Path, PathBuf};

// ── Public Config Struct ──

#[derive(Clone, Debug)]
pub struct GameConfig {
    pub timing: TimingConfig,
    pub tuning: TuningConfig,
    pub gamepad: GamepadConfig,
    pub assets_dir: PathBuf,
    pub log_file: PathBuf,
    /// Fixed RNG seed; entropy when absent.
    pub seed: Option<u64>,
    pub warnings: Vec<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct TimingConfig {
    pub tick_rate_ms: u64,
    pub decay_interval_ms: u64,
    pub decay_duration_secs: f64,
    pub grid_update_ms: u64,
    pub end_countdown_secs: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Game2Mode {
    Mash,
    Bounce,
    /// Mash first, then bounce, then mash again...
    Alternate,
}

#[derive(Clone, Debug, PartialEq)]
pub struct TuningConfig {
    pub grid_click_bonus: f64,
    pub bounce_catch_bonus: f64,
    pub bounce_miss_penalty: f64,
    pub mash_rapid_bonus: f64,
    pub mash_single_bonus: f64,
    /// Added on a correct Simon answer, subtracted on a wrong one.
    pub simon_reward: f64,
    pub game2: Game2Mode,
}

#[derive(Clone, Debug)]
pub struct GamepadConfig {
    pub press: Vec<String>,
    pub confirm: Vec<String>,
    pub cancel: Vec<String>,
    pub pause: Vec<String>,
}

// ── TOML Schema (with serde defaults) ──

#[derive(Deserialize, Debug, Default)]
struct TomlConfig {
    #[serde(default)]
    timing: TomlTiming,
    #[serde(default)]
    tuning: TomlTuning,
    #[serde(default)]
    gamepad: TomlGamepad,
    #[serde(default)]
    general: TomlGeneral,
}

#[derive(Deserialize, Debug)]
struct TomlTiming {
    #[serde(default = "default_tick_rate")]
    tick_rate_ms: u64,
    #[serde(default = "default_decay_interval")]
    decay_interval_ms: u64,
    #[serde(default = "default_decay_duration")]
    decay_duration_secs: f64,
    #[serde(default = "default_grid_update")]
    grid_update_ms: u64,
    #[serde(default = "default_end_countdown")]
    end_countdown_secs: u32,
}

#[derive(Deserialize, Debug)]
struct TomlTuning {
    #[serde(default = "default_grid_click")]
    grid_click_bonus: f64,
    #[serde(default = "default_bounce_catch")]
    bounce_catch_bonus: f64,
    #[serde(default = "default_bounce_miss")]
    bounce_miss_penalty: f64,
    #[serde(default = "default_mash_rapid")]
    mash_rapid_bonus: f64,
    #[serde(default = "default_mash_single")]
    mash_single_bonus: f64,
    #[serde(default = "default_simon_reward")]
    simon_reward: f64,
    #[serde(default = "default_game2")]
    game2: Game2Mode,
}

#[derive(Deserialize, Debug)]
struct TomlGamepad {
    #[serde(default = "default_press")]
    press: Vec<String>,
    #[serde(default = "default_confirm")]
    confirm: Vec<String>,
    #[serde(default = "default_cancel")]
    cancel: Vec<String>,
    #[serde(default = "default_pause")]
    pause: Vec<String>,
}

#[derive(Deserialize, Debug)]
struct TomlGeneral {
    #[serde(default = "default_assets_dir")]
    assets_dir: String,
    #[serde(default = "default_log_file")]
    log_file: String,
    #[serde(default)]
    seed: Option<u64>,
}

// ── Defaults ──

fn default_tick_rate() -> u64 { 16 }
fn default_decay_interval() -> u64 { 100 }
fn default_decay_duration() -> f64 { 105.0 }  // 1050 ticks of 100 ms
fn default_grid_update() -> u64 { 100 }
fn default_end_countdown() -> u32 { 30 }

fn default_grid_click() -> f64 { 2.0 }
fn default_bounce_catch() -> f64 { 0.5 }
fn default_bounce_miss() -> f64 { 1.5 }
fn default_mash_rapid() -> f64 { 0.2 }
fn default_mash_single() -> f64 { 0.05 }
fn default_simon_reward() -> f64 { 5.0 }
fn default_game2() -> Game2Mode { Game2Mode::Alternate }

fn default_press() -> Vec<String> { vec!["A".into(), "X".into(), "R1".into()] }
fn default_confirm() -> Vec<String> { vec!["Start".into()] }
fn default_cancel() -> Vec<String> { vec!["B".into(), "Select".into()] }
fn default_pause() -> Vec<String> { vec!["Y".into()] }

fn default_assets_dir() -> String { "assets".into() }
fn default_log_file() -> String { "decay.log".into() }

impl Default for TomlTiming {
    fn default() -> Self {
        TomlTiming {
            tick_rate_ms: default_tick_rate(),
            decay_interval_ms: default_decay_interval(),
            decay_duration_secs: default_decay_duration(),
            grid_update_ms: default_grid_update(),
            end_countdown_secs: default_end_countdown(),
        }
    }
}

impl Default for TomlTuning {
    fn default() -> Self {
        TomlTuning {
            grid_click_bonus: default_grid_click(),
            bounce_catch_bonus: default_bounce_catch(),
            bounce_miss_penalty: default_bounce_miss(),
            mash_rapid_bonus: default_mash_rapid(),
            mash_single_bonus: default_mash_single(),
            simon_reward: default_simon_reward(),
            game2: default_game2(),
        }
    }
}

impl Default for TomlGamepad {
    fn default() -> Self {
        TomlGamepad {
            press: default_press(),
            confirm: default_confirm(),
            cancel: default_cancel(),
            pause: default_pause(),
        }
    }
}

impl Default for TomlGeneral {
    fn default() -> Self {
        TomlGeneral {
            assets_dir: default_assets_dir(),
            log_file: default_log_file(),
            seed: None,
        }
    }
}

impl Default for GameConfig {
    fn default() -> Self {
        GameConfig::from_toml(TomlConfig::default(), &[], Vec::new())
    }
}

// ── Loading ──

impl GameConfig {
    /// Load config from `config.toml`.
    /// Search order: exe directory, current working directory, then the
    /// XDG and system data directories. Missing file or missing keys
    /// gracefully fall back to defaults.
    pub fn load() -> Self {
        let search_dirs = candidate_dirs();
        let mut warnings = Vec::new();
        let toml_cfg = load_toml(&search_dirs, &mut warnings);
        GameConfig::from_toml(toml_cfg, &search_dirs, warnings)
    }

    /// Parse a config document directly. Parse errors become warnings and
    /// the defaults are used.
    #[cfg(test)]
    pub fn from_toml_str(text: &str) -> Self {
        let mut warnings = Vec::new();
        let toml_cfg = match toml::from_str::<TomlConfig>(text) {
            Ok(cfg) => cfg,
            Err(e) => {
                warnings.push(format!("config.toml parse error: {e}; using default settings"));
                TomlConfig::default()
            }
        };
        GameConfig::from_toml(toml_cfg, &[], warnings)
    }

    fn from_toml(toml_cfg: TomlConfig, search_dirs: &[PathBuf], mut warnings: Vec<String>) -> Self {
        let t = toml_cfg.timing;
        let mut timing = TimingConfig {
            tick_rate_ms: t.tick_rate_ms,
            decay_interval_ms: t.decay_interval_ms,
            decay_duration_secs: t.decay_duration_secs,
            grid_update_ms: t.grid_update_ms,
            end_countdown_secs: t.end_countdown_secs,
        };
        if timing.tick_rate_ms == 0 {
            warnings.push("timing.tick_rate_ms must be positive; using 1".into());
            timing.tick_rate_ms = 1;
        }
        if timing.decay_interval_ms == 0 {
            warnings.push(format!("timing.decay_interval_ms must be positive; using {}", default_decay_interval()));
            timing.decay_interval_ms = default_decay_interval();
        }
        if !(timing.decay_duration_secs > 0.0) {
            warnings.push(format!("timing.decay_duration_secs must be positive; using {}", default_decay_duration()));
            timing.decay_duration_secs = default_decay_duration();
        }
        if timing.grid_update_ms == 0 {
            warnings.push(format!("timing.grid_update_ms must be positive; using {}", default_grid_update()));
            timing.grid_update_ms = default_grid_update();
        }

        let u = toml_cfg.tuning;
        let tuning = TuningConfig {
            grid_click_bonus: u.grid_click_bonus,
            bounce_catch_bonus: u.bounce_catch_bonus,
            bounce_miss_penalty: u.bounce_miss_penalty,
            mash_rapid_bonus: u.mash_rapid_bonus,
            mash_single_bonus: u.mash_single_bonus,
            simon_reward: u.simon_reward,
            game2: u.game2,
        };

        GameConfig {
            timing,
            tuning,
            gamepad: GamepadConfig {
                press: toml_cfg.gamepad.press,
                confirm: toml_cfg.gamepad.confirm,
                cancel: toml_cfg.gamepad.cancel,
                pause: toml_cfg.gamepad.pause,
            },
            assets_dir: resolve_dir(&toml_cfg.general.assets_dir, search_dirs),
            log_file: PathBuf::from(toml_cfg.general.log_file),
            seed: toml_cfg.general.seed,
            warnings,
        }
    }
}

/// Absolute paths are used as-is; relative ones are looked up in the
/// candidate directories, defaulting to CWD-relative.
fn resolve_dir(name: &str, search_dirs: &[PathBuf]) -> PathBuf {
    let path = Path::new(name);
    if path.is_absolute() {
        return path.to_path_buf();
    }
    search_dirs.iter()
        .map(|d| d.join(name))
        .find(|p| p.is_dir())
        .unwrap_or_else(|| path.to_path_buf())
}

/// Candidate directories to search: exe dir + CWD + system paths (deduplicated).
fn candidate_dirs() -> Vec<PathBuf> {
    let mut dirs = vec![];

    // 1. Directory of the running executable
    if let Ok(exe) = std::env::current_exe() {
        // Resolve symlinks so a linked binary still finds its data
        let resolved = exe.canonicalize().unwrap_or(exe);
        if let Some(parent) = resolved.parent() {
            dirs.push(parent.to_path_buf());
        }
    }

    // 2. Current working directory
    if let Ok(cwd) = std::env::current_dir() {
        if !dirs.iter().any(|d| d == &cwd) {
            dirs.push(cwd);
        }
    }

    // 3. XDG data home (~/.local/share/decay)
    if let Ok(home) = std::env::var("HOME") {
        let xdg = PathBuf::from(&home).join(".local/share/decay");
        if xdg.is_dir() && !dirs.iter().any(|d| d == &xdg) {
            dirs.push(xdg);
        }
    }

    // 4. System data directory (/usr/share/decay)
    let sys = PathBuf::from("/usr/share/decay");
    if sys.is_dir() && !dirs.iter().any(|d| d == &sys) {
        dirs.push(sys);
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
        if path.exists() {
            match std::fs::read_to_string(&path) {
                Ok(text) => match toml::from_str::<TomlConfig>(&text) {
                    Ok(cfg) => return cfg,
                    Err(e) => {
                        warnings.push(format!("{} parse error: {e}; using default settings", path.display()));
                        return TomlConfig::default();
                    }
                },
                Err(e) => {
                    warnings.push(format!("could not read {}: {e}", path.display()));
                }
            }
        }
    }
    TomlConfig::default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_gives_defaults() {
        let cfg = GameConfig::from_toml_str("");
        assert!(cfg.warnings.is_empty());
        assert_eq!(cfg.timing.decay_interval_ms, 100);
        assert_eq!(cfg.timing.decay_duration_secs, 105.0);
        assert_eq!(cfg.timing.end_countdown_secs, 30);
        assert_eq!(cfg.tuning.grid_click_bonus, 2.0);
        assert_eq!(cfg.tuning.game2, Game2Mode::Alternate);
        assert_eq!(cfg.log_file, PathBuf::from("decay.log"));
        assert_eq!(cfg.seed, None);
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let cfg = GameConfig::from_toml_str(
            "[timing]\ndecay_duration_secs = 60.0\n\n[tuning]\ngame2 = \"bounce\"\n\n[general]\nseed = 42\n",
        );
        assert_eq!(cfg.timing.decay_duration_secs, 60.0);
        assert_eq!(cfg.timing.tick_rate_ms, 16);
        assert_eq!(cfg.tuning.game2, Game2Mode::Bounce);
        assert_eq!(cfg.tuning.simon_reward, 5.0);
        assert_eq!(cfg.seed, Some(42));
    }

    #[test]
    fn broken_document_warns_and_defaults() {
        let cfg = GameConfig::from_toml_str("[tuning]\ngame2 = \"pinball\"\n");
        assert_eq!(cfg.warnings.len(), 1);
        assert_eq!(cfg.tuning.game2, Game2Mode::Alternate);
    }

    #[test]
    fn zero_intervals_are_repaired() {
        let cfg = GameConfig::from_toml_str("[timing]\ntick_rate_ms = 0\ndecay_interval_ms = 0\n");
        assert_eq!(cfg.timing.tick_rate_ms, 1);
        assert_eq!(cfg.timing.decay_interval_ms, 100);
        assert_eq!(cfg.warnings.len(), 2);
    }

    #[test]
    fn absolute_assets_dir_is_kept() {
        let cfg = GameConfig::from_toml_str("[general]\nassets_dir = \"/opt/decay/assets\"\n");
        assert_eq!(cfg.assets_dir, PathBuf::from("/opt/decay/assets"));
    }
}
