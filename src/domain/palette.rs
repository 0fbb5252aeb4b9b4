/// Colour table and decay → stage mapping.
///
/// The table holds 6 stages × 7 rows × 13 columns of colours. It is parsed
/// once at startup from the embedded `data/decay_grid.toml`; a
/// `decay_grid.toml` in the asset directory overrides it when it parses and
/// has the right shape. If both fail, a procedural gradient is used.

use std::fmt;
use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

pub const STAGES: usize = 6;
pub const ROWS: usize = 7;
pub const COLS: usize = 13;
/// Colours per stage (one full grid).
pub const CELLS_PER_STAGE: usize = ROWS * COLS;
/// Length of the flattened colour walk across all stages.
pub const TOTAL_POSITIONS: usize = STAGES * CELLS_PER_STAGE;

const EMBEDDED_GRID: &str = include_str!("../../data/decay_grid.toml");

// ── Errors ──

#[derive(Debug, Error)]
pub enum PaletteError {
    #[error("invalid colour {0:?} (expected #rrggbb)")]
    BadHex(String),
    #[error("{what}: expected {expected}, found {found}")]
    Shape { what: String, expected: usize, found: usize },
    #[error("colour table parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("could not read colour table: {0}")]
    Io(#[from] std::io::Error),
}

// ── Rgb ──

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Rgb { r, g, b }
    }

    pub fn parse_hex(s: &str) -> Result<Rgb, PaletteError> {
        let hex = s.trim().strip_prefix('#').unwrap_or(s.trim());
        if hex.len() != 6 || !hex.is_ascii() {
            return Err(PaletteError::BadHex(s.to_string()));
        }
        let channel = |i: usize| {
            u8::from_str_radix(&hex[i..i + 2], 16).map_err(|_| PaletteError::BadHex(s.to_string()))
        };
        Ok(Rgb { r: channel(0)?, g: channel(2)?, b: channel(4)? })
    }

    /// Scale brightness; used for shadows and fades.
    pub fn scaled(self, factor: f32) -> Rgb {
        let f = factor.clamp(0.0, 1.0);
        Rgb {
            r: (self.r as f32 * f) as u8,
            g: (self.g as f32 * f) as u8,
            b: (self.b as f32 * f) as u8,
        }
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

// ── Stage ──

/// Discretized decay level, 1 (fresh) ..= 6 (fully decayed).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Stage(u8);

impl Stage {
    pub const FIRST: Stage = Stage(1);
    pub const LAST: Stage = Stage(STAGES as u8);

    /// `floor((1 - d/100) * 5)` clamped to 0..=5, plus one.
    pub fn from_decay(decay: f64) -> Stage {
        let idx = ((1.0 - decay / 100.0) * 5.0).floor();
        if idx.is_nan() {
            return Stage::FIRST;
        }
        Stage(idx.clamp(0.0, (STAGES - 1) as f64) as u8 + 1)
    }

    /// Grid cells carry a continuous stage in [1, 6].
    pub fn from_continuous(stage: f64) -> Stage {
        if stage.is_nan() {
            return Stage::FIRST;
        }
        Stage(stage.floor().clamp(1.0, STAGES as f64) as u8)
    }

    /// Build from a 1-based stage number, clamped.
    pub fn from_number(n: u8) -> Stage {
        Stage(n.clamp(1, STAGES as u8))
    }

    #[inline]
    pub fn number(self) -> u8 {
        self.0
    }

    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize - 1
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.number())
    }
}

/// Decay bar colour: three bands picked from the table's fresh, middle and
/// late greens.
pub fn bar_color(decay: f64) -> Rgb {
    if decay > 66.67 {
        Rgb::new(0xb8, 0xd3, 0xa7)
    } else if decay > 33.33 {
        Rgb::new(0x8f, 0xb8, 0x89)
    } else {
        Rgb::new(0x5a, 0x8c, 0x7b)
    }
}

/// A point on the flattened 546-colour walk.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ColorPosition {
    pub index: usize,
    pub stage: Stage,
    pub row: usize,
    pub col: usize,
}

impl ColorPosition {
    /// 100 % decay sits on the first colour, 0 % on the last.
    pub fn from_decay(decay: f64) -> ColorPosition {
        let inverse = 100.0 - decay;
        let mapped = (inverse / 100.0 * TOTAL_POSITIONS as f64).floor();
        let index = if mapped.is_nan() {
            0
        } else {
            mapped.clamp(0.0, (TOTAL_POSITIONS - 1) as f64) as usize
        };
        let in_stage = index % CELLS_PER_STAGE;
        ColorPosition {
            index,
            stage: Stage::from_number((index / CELLS_PER_STAGE) as u8 + 1),
            row: in_stage / COLS,
            col: in_stage % COLS,
        }
    }
}

// ── ColorGrid ──

#[derive(Deserialize)]
struct GridFile {
    stage: Vec<StageEntry>,
}

#[derive(Deserialize)]
struct StageEntry {
    #[serde(default)]
    description: String,
    grid: Vec<Vec<String>>,
}

#[derive(Clone, Debug)]
pub struct ColorGrid {
    cells: Vec<Rgb>,
    descriptions: Vec<String>,
}

impl ColorGrid {
    /// Parse a colour table document; all 546 colours must be present.
    pub fn from_toml(text: &str) -> Result<ColorGrid, PaletteError> {
        let file: GridFile = toml::from_str(text)?;
        if file.stage.len() != STAGES {
            return Err(PaletteError::Shape {
                what: "stages".into(),
                expected: STAGES,
                found: file.stage.len(),
            });
        }

        let mut cells = Vec::with_capacity(TOTAL_POSITIONS);
        let mut descriptions = Vec::with_capacity(STAGES);
        for (s, entry) in file.stage.iter().enumerate() {
            if entry.grid.len() != ROWS {
                return Err(PaletteError::Shape {
                    what: format!("rows in stage {}", s + 1),
                    expected: ROWS,
                    found: entry.grid.len(),
                });
            }
            for (r, row) in entry.grid.iter().enumerate() {
                if row.len() != COLS {
                    return Err(PaletteError::Shape {
                        what: format!("columns in stage {} row {}", s + 1, r + 1),
                        expected: COLS,
                        found: row.len(),
                    });
                }
                for hex in row {
                    cells.push(Rgb::parse_hex(hex)?);
                }
            }
            descriptions.push(entry.description.clone());
        }
        Ok(ColorGrid { cells, descriptions })
    }

    pub fn embedded() -> Result<ColorGrid, PaletteError> {
        ColorGrid::from_toml(EMBEDDED_GRID)
    }

    pub fn from_file(path: &Path) -> Result<ColorGrid, PaletteError> {
        let text = std::fs::read_to_string(path)?;
        ColorGrid::from_toml(&text)
    }

    /// Override file → embedded table → procedural gradient.
    pub fn load(assets_dir: &Path) -> ColorGrid {
        let path = assets_dir.join("decay_grid.toml");
        if path.exists() {
            match ColorGrid::from_file(&path) {
                Ok(grid) => {
                    log::info!("colour table loaded from {}", path.display());
                    return grid;
                }
                Err(e) => log::warn!("ignoring {}: {e}", path.display()),
            }
        }
        match ColorGrid::embedded() {
            Ok(grid) => grid,
            Err(e) => {
                log::error!("embedded colour table unusable ({e}); using gradient");
                ColorGrid::procedural()
            }
        }
    }

    /// Straight blend from pale straw to blue-green, slightly shaded by row.
    pub fn procedural() -> ColorGrid {
        let fresh = Rgb::new(0xcb, 0xc6, 0xa1);
        let decayed = Rgb::new(0x5a, 0x8c, 0x7b);
        let mut cells = Vec::with_capacity(TOTAL_POSITIONS);
        for s in 0..STAGES {
            let t = s as f32 / (STAGES - 1) as f32;
            for r in 0..ROWS {
                let shade = 0.88 + 0.02 * r as f32;
                for c in 0..COLS {
                    let wobble = ((c * 7 + r * 3) % 5) as f32 * 0.01;
                    let mix = |a: u8, b: u8| {
                        ((a as f32 * (1.0 - t) + b as f32 * t) * (shade + wobble)).min(255.0) as u8
                    };
                    cells.push(Rgb::new(
                        mix(fresh.r, decayed.r),
                        mix(fresh.g, decayed.g),
                        mix(fresh.b, decayed.b),
                    ));
                }
            }
        }
        ColorGrid { cells, descriptions: vec![String::new(); STAGES] }
    }

    /// Colour at (stage, row, col). Row and column wrap.
    #[inline]
    pub fn color(&self, stage: Stage, row: usize, col: usize) -> Rgb {
        let idx = stage.index() * CELLS_PER_STAGE + (row % ROWS) * COLS + (col % COLS);
        self.cells[idx]
    }

    pub fn color_for_decay(&self, row: usize, col: usize, decay: f64) -> Rgb {
        self.color(Stage::from_decay(decay), row, col)
    }

    pub fn color_at(&self, pos: ColorPosition) -> Rgb {
        self.color(pos.stage, pos.row, pos.col)
    }

    pub fn description(&self, stage: Stage) -> &str {
        &self.descriptions[stage.index()]
    }
}
