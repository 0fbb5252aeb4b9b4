/// Floating objects drifting across the main screen.
///
/// Scene units: x runs from SPAWN_X (right, off-screen) to RETIRE_X
/// (left, off-screen), y in ±HALF_HEIGHT, depth in ±HALF_DEPTH. Each
/// object carries a label with its table coordinates, colour and stage,
/// re-read whenever the decay level moves the colour.

use rand::Rng;

use super::palette::{ColorGrid, Rgb, Stage, COLS};

pub const MODEL_ROWS: usize = 7;

pub const SPAWN_X: f32 = 8.0;
pub const RETIRE_X: f32 = -8.0;
pub const HALF_HEIGHT: f32 = 3.0;
pub const HALF_DEPTH: f32 = 1.0;

/// Drift speed range, scene units per second.
pub const DRIFT_MIN: f32 = 1.2;
pub const DRIFT_MAX: f32 = 3.0;
/// Spin speed range, radians per second (either direction).
pub const SPIN_MAX: f32 = 1.2;

pub const SPAWN_EVERY_MS: u64 = 2000;
pub const FIRST_SPAWN_MS: u64 = 3000;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Placeholder {
    Cube,
    Sphere,
    Cone,
    Cylinder,
}

impl Placeholder {
    /// Stand-in for a missing sprite, picked by 1-based row number.
    pub fn for_row(row_number: usize) -> Placeholder {
        match row_number % 4 {
            0 => Placeholder::Cube,
            1 => Placeholder::Sphere,
            2 => Placeholder::Cone,
            _ => Placeholder::Cylinder,
        }
    }

    pub fn lines(self) -> Vec<String> {
        let art: &[&str] = match self {
            Placeholder::Cube => &["┌──┐", "│  │", "└──┘"],
            Placeholder::Sphere => &[" .-. ", "(   )", " '-' "],
            Placeholder::Cone => &["  /\\  ", " /  \\ ", "/____\\"],
            Placeholder::Cylinder => &[" ___ ", "|   |", "|___|"],
        };
        art.iter().map(|s| s.to_string()).collect()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ModelShape {
    Sprite,
    Placeholder(Placeholder),
}

/// One row's sprite, loaded from the asset directory or a placeholder.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Model {
    /// 0-based table row this model stands for.
    pub row: usize,
    pub shape: ModelShape,
    pub lines: Vec<String>,
}

impl Model {
    pub fn placeholder(row: usize) -> Model {
        let p = Placeholder::for_row(row + 1);
        Model { row, shape: ModelShape::Placeholder(p), lines: p.lines() }
    }

    pub fn width(&self) -> usize {
        self.lines.iter().map(|l| l.chars().count()).max().unwrap_or(0)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Floater {
    pub model: usize,
    pub row: usize,
    pub col: usize,
    pub x: f32,
    pub y: f32,
    pub depth: f32,
    pub drift: f32,
    pub spin: f32,
    pub spin_speed: f32,
    pub color: Rgb,
    pub stage: Stage,
}

impl Floater {
    pub fn label(&self) -> [String; 3] {
        [
            format!("Row: {} Col: {}", self.row + 1, self.col + 1),
            format!("Colour: {}", self.color),
            format!("Decay Stage: {}", self.stage),
        ]
    }

    /// Re-read colour and stage. Returns true if either changed.
    fn refresh(&mut self, palette: &ColorGrid, decay: f64) -> bool {
        let color = palette.color_for_decay(self.row, self.col, decay);
        let stage = Stage::from_decay(decay);
        let changed = color != self.color || stage != self.stage;
        self.color = color;
        self.stage = stage;
        changed
    }
}

#[derive(Clone, Debug, Default)]
pub struct FloatingField {
    pub floaters: Vec<Floater>,
    saved: Option<Vec<Floater>>,
}

impl FloatingField {
    pub fn new() -> Self {
        FloatingField::default()
    }

    /// Spawn at the right edge with a random model and column. Nothing
    /// happens when no models are available.
    pub fn spawn<R: Rng>(
        &mut self,
        models: &[Model],
        palette: &ColorGrid,
        decay: f64,
        rng: &mut R,
    ) -> Option<&Floater> {
        if models.is_empty() {
            return None;
        }
        let model = rng.random_range(0..models.len());
        let row = models[model].row;
        let col = rng.random_range(0..COLS);
        self.floaters.push(Floater {
            model,
            row,
            col,
            x: SPAWN_X,
            y: rng.random_range(-HALF_HEIGHT..HALF_HEIGHT),
            depth: rng.random_range(-HALF_DEPTH..HALF_DEPTH),
            drift: rng.random_range(DRIFT_MIN..DRIFT_MAX),
            spin: rng.random_range(0.0..std::f32::consts::TAU),
            spin_speed: rng.random_range(-SPIN_MAX..SPIN_MAX),
            color: palette.color_for_decay(row, col, decay),
            stage: Stage::from_decay(decay),
        });
        self.floaters.last()
    }

    /// Drift and spin for `dt` seconds. Returns how many left the scene.
    pub fn tick(&mut self, dt: f32, palette: &ColorGrid, decay: f64) -> usize {
        for f in self.floaters.iter_mut() {
            f.x -= f.drift * dt;
            f.spin = (f.spin + f.spin_speed * dt).rem_euclid(std::f32::consts::TAU);
            if f.refresh(palette, decay) {
                log::trace!("floater r{} c{} now {} (stage {})", f.row + 1, f.col + 1, f.color, f.stage);
            }
        }
        let before = self.floaters.len();
        self.floaters.retain(|f| f.x >= RETIRE_X);
        before - self.floaters.len()
    }

    pub fn save(&mut self) {
        self.saved = Some(self.floaters.clone());
    }

    /// Bring back the last saved set, if any. The saved copy is consumed.
    pub fn restore(&mut self) -> bool {
        match self.saved.take() {
            Some(saved) => {
                self.floaters = saved;
                true
            }
            None => false,
        }
    }

    pub fn clear(&mut self) {
        self.floaters.clear();
    }

    pub fn forget_saved(&mut self) {
        self.saved = None;
    }

    #[cfg(test)]
    pub fn has_saved(&self) -> bool {
        self.saved.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_pcg::Pcg32;

    fn models() -> Vec<Model> {
        (0..MODEL_ROWS).map(Model::placeholder).collect()
    }

    #[test]
    fn placeholders_cycle_by_row_number() {
        assert_eq!(Placeholder::for_row(1), Placeholder::Sphere);
        assert_eq!(Placeholder::for_row(2), Placeholder::Cone);
        assert_eq!(Placeholder::for_row(3), Placeholder::Cylinder);
        assert_eq!(Placeholder::for_row(4), Placeholder::Cube);
        let m = Model::placeholder(3);
        assert_eq!(m.shape, ModelShape::Placeholder(Placeholder::Cube));
        assert_eq!(m.width(), 4);
    }

    #[test]
    fn spawn_needs_models() {
        let mut rng = Pcg32::seed_from_u64(1);
        let pal = ColorGrid::procedural();
        let mut field = FloatingField::new();
        assert!(field.spawn(&[], &pal, 100.0, &mut rng).is_none());
        let f = field.spawn(&models(), &pal, 100.0, &mut rng).cloned().unwrap();
        assert_eq!(f.x, SPAWN_X);
        assert!(f.col < COLS);
        assert_eq!(f.stage, Stage::FIRST);
        assert_eq!(f.color, pal.color_for_decay(f.row, f.col, 100.0));
    }

    #[test]
    fn label_lines() {
        let mut rng = Pcg32::seed_from_u64(2);
        let pal = ColorGrid::procedural();
        let mut field = FloatingField::new();
        let f = field.spawn(&models(), &pal, 50.0, &mut rng).cloned().unwrap();
        let label = f.label();
        assert_eq!(label[0], format!("Row: {} Col: {}", f.row + 1, f.col + 1));
        assert!(label[1].starts_with("Colour: #"));
        assert_eq!(label[2], "Decay Stage: 3");
    }

    #[test]
    fn drifts_left_and_retires() {
        let mut rng = Pcg32::seed_from_u64(3);
        let pal = ColorGrid::procedural();
        let mut field = FloatingField::new();
        field.spawn(&models(), &pal, 100.0, &mut rng);
        assert_eq!(field.tick(1.0, &pal, 100.0), 0);
        assert!(field.floaters[0].x < SPAWN_X);
        // 16 units at ≥1.2/s is gone within 14 s
        let mut retired = 0;
        for _ in 0..14 {
            retired += field.tick(1.0, &pal, 100.0);
        }
        assert_eq!(retired, 1);
        assert!(field.floaters.is_empty());
    }

    #[test]
    fn colour_follows_decay() {
        let mut rng = Pcg32::seed_from_u64(4);
        let pal = ColorGrid::procedural();
        let mut field = FloatingField::new();
        field.spawn(&models(), &pal, 100.0, &mut rng);
        field.tick(0.01, &pal, 10.0);
        let f = &field.floaters[0];
        assert_eq!(f.stage, Stage::from_decay(10.0));
        assert_eq!(f.color, pal.color_for_decay(f.row, f.col, 10.0));
    }

    #[test]
    fn save_restore_forget() {
        let mut rng = Pcg32::seed_from_u64(5);
        let pal = ColorGrid::procedural();
        let mut field = FloatingField::new();
        field.spawn(&models(), &pal, 100.0, &mut rng);
        field.spawn(&models(), &pal, 100.0, &mut rng);
        let snapshot = field.floaters.clone();

        field.save();
        field.clear();
        assert!(field.floaters.is_empty());
        assert!(field.restore());
        assert_eq!(field.floaters, snapshot);
        assert!(!field.has_saved());

        field.save();
        field.clear();
        field.forget_saved();
        assert!(!field.restore());
        assert!(field.floaters.is_empty());
    }
}
