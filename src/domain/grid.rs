/// Game 1: the decaying grid.
///
/// 7×13 cells, each with its own continuous stage and a speed multiplier.
/// Every grid update pulls each cell toward the stage the global decay
/// implies for it; clicking a cell snaps it back to stage 1.

use rand::Rng;

use super::palette::{ColorGrid, Rgb, Stage, COLS, ROWS, STAGES};

/// Stage increase per grid update while a cell lags behind its target.
pub const CREEP_PER_UPDATE: f64 = 0.02;
pub const SPEED_MIN: f64 = 0.8;
pub const SPEED_MAX: f64 = 1.2;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GridCell {
    /// Continuous stage in [1, 6].
    pub stage: f64,
    /// How fast this cell decays relative to the global level.
    pub speed: f64,
}

impl GridCell {
    /// Stage this cell is heading for at the given decay level.
    pub fn target_stage(&self, decay: f64) -> f64 {
        let t = 1.0 + (1.0 - decay / 100.0) * (STAGES as f64 - 1.0) * self.speed;
        t.clamp(1.0, STAGES as f64)
    }
}

#[derive(Clone, Debug)]
pub struct GridGame {
    cells: Vec<GridCell>,
    /// Keyboard cursor (row, col).
    pub cursor: (usize, usize),
}

impl GridGame {
    pub fn new<R: Rng>(rng: &mut R) -> Self {
        let cells = (0..ROWS * COLS)
            .map(|_| GridCell {
                stage: 1.0,
                speed: rng.random_range(SPEED_MIN..SPEED_MAX),
            })
            .collect();
        GridGame { cells, cursor: (ROWS / 2, COLS / 2) }
    }

    /// Build with fixed speeds (row-major, ROWS*COLS entries).
    #[cfg(test)]
    pub fn with_speeds(speeds: &[f64]) -> Self {
        let cells = speeds.iter().map(|&speed| GridCell { stage: 1.0, speed }).collect();
        GridGame { cells, cursor: (0, 0) }
    }

    pub fn cell(&self, row: usize, col: usize) -> Option<&GridCell> {
        if row < ROWS && col < COLS {
            self.cells.get(row * COLS + col)
        } else {
            None
        }
    }

    pub fn cell_stage(&self, row: usize, col: usize) -> Stage {
        self.cell(row, col)
            .map(|c| Stage::from_continuous(c.stage))
            .unwrap_or(Stage::FIRST)
    }

    pub fn cell_color(&self, palette: &ColorGrid, row: usize, col: usize) -> Rgb {
        palette.color(self.cell_stage(row, col), row, col)
    }

    /// One grid update: every lagging cell creeps toward its target.
    pub fn update(&mut self, decay: f64) {
        for cell in self.cells.iter_mut() {
            let target = cell.target_stage(decay);
            if cell.stage < target {
                cell.stage = (cell.stage + CREEP_PER_UPDATE).min(target);
            }
        }
    }

    /// Click on a cell: back to stage 1. Returns false when out of bounds.
    pub fn rejuvenate(&mut self, row: usize, col: usize) -> bool {
        if row >= ROWS || col >= COLS {
            return false;
        }
        self.cells[row * COLS + col].stage = 1.0;
        true
    }

    pub fn move_cursor(&mut self, d_row: i32, d_col: i32) {
        let r = (self.cursor.0 as i32 + d_row).clamp(0, ROWS as i32 - 1);
        let c = (self.cursor.1 as i32 + d_col).clamp(0, COLS as i32 - 1);
        self.cursor = (r as usize, c as usize);
    }

    /// Mean stage across all cells, for the HUD.
    pub fn mean_stage(&self) -> f64 {
        if self.cells.is_empty() {
            return 1.0;
        }
        self.cells.iter().map(|c| c.stage).sum::<f64>() / self.cells.len() as f64
    }
}
