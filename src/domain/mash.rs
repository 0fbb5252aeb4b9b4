/// Game 2 (reaction button variant): press fast to push decay back.
///
/// One button in the middle of a FIELD_W × FIELD_H field. Its colour walks
/// the flattened colour table with the decay level. Presses closer than
/// RAPID_WINDOW_MS build up a reverse-speed meter and throw particles.

use rand::Rng;

use super::palette::{ColorGrid, ColorPosition, Rgb, COLS, ROWS};

pub const FIELD_W: f32 = 80.0;
pub const FIELD_H: f32 = 40.0;
pub const BUTTON_W: f32 = 22.0;
pub const BUTTON_H: f32 = 11.0;

pub const RAPID_WINDOW_MS: u64 = 300;
pub const REVERSE_STEP: f32 = 0.35;
pub const MAX_REVERSE_SPEED: f32 = 3.0;
pub const SINGLE_REVERSE_SPEED: f32 = 0.15;
/// Meter relaxation per second.
pub const REVERSE_RELAX: f32 = 1.2;

pub const RAPID_PARTICLES: usize = 25;
pub const SINGLE_PARTICLES: usize = 10;
/// Button colour is re-read from the decay level every this many frames.
pub const COLOR_REFRESH_FRAMES: u64 = 5;

const PARTICLE_SPEED_MIN: f32 = 6.0;
const PARTICLE_SPEED_MAX: f32 = 30.0;
const PARTICLE_LIFE_MIN: f32 = 0.8;
const PARTICLE_LIFE_MAX: f32 = 1.6;
/// Share of particles that take the button's own colour.
const OWN_COLOR_CHANCE: f64 = 0.6;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PressKind {
    Rapid,
    Single,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Particle {
    pub x: f32,
    pub y: f32,
    pub vx: f32,
    pub vy: f32,
    pub size: f32,
    pub life: f32,
    pub color: Rgb,
}

impl Particle {
    /// 1.0 when fresh, falling to 0 as the particle dies.
    pub fn opacity(&self) -> f32 {
        (self.life / PARTICLE_LIFE_MAX).clamp(0.0, 1.0)
    }
}

#[derive(Clone, Debug)]
pub struct MashButton {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl MashButton {
    #[cfg(test)]
    pub fn contains(&self, x: f32, y: f32) -> bool {
        x >= self.x && x <= self.x + self.width && y >= self.y && y <= self.y + self.height
    }
}

#[derive(Clone, Debug)]
pub struct MashGame {
    pub button: MashButton,
    pub position: ColorPosition,
    pub reverse_speed: f32,
    /// Consecutive rapid presses, 1 after a single press.
    pub click_count: u32,
    last_press_ms: Option<u64>,
    pub particles: Vec<Particle>,
    frames: u64,
}

impl MashGame {
    pub fn new(decay: f64) -> Self {
        MashGame {
            button: MashButton {
                x: FIELD_W / 2.0 - BUTTON_W / 2.0,
                y: FIELD_H / 2.0 - BUTTON_H / 2.0,
                width: BUTTON_W,
                height: BUTTON_H,
            },
            position: ColorPosition::from_decay(decay),
            reverse_speed: 0.0,
            click_count: 0,
            last_press_ms: None,
            particles: Vec::new(),
            frames: 0,
        }
    }

    pub fn button_color(&self, palette: &ColorGrid) -> Rgb {
        palette.color_at(self.position)
    }

    /// Register a press at `now_ms`. The caller applies the decay bonus for
    /// the returned kind and then calls `refresh`.
    pub fn press<R: Rng>(&mut self, now_ms: u64, palette: &ColorGrid, rng: &mut R) -> PressKind {
        let rapid = matches!(self.last_press_ms, Some(prev) if now_ms.saturating_sub(prev) < RAPID_WINDOW_MS);
        self.last_press_ms = Some(now_ms);

        if rapid {
            self.click_count += 1;
            self.reverse_speed = (self.reverse_speed + REVERSE_STEP).min(MAX_REVERSE_SPEED);
            self.emit(RAPID_PARTICLES, palette, rng);
            PressKind::Rapid
        } else {
            self.click_count = 1;
            self.reverse_speed = SINGLE_REVERSE_SPEED;
            self.emit(SINGLE_PARTICLES, palette, rng);
            PressKind::Single
        }
    }

    pub fn refresh(&mut self, decay: f64) {
        self.position = ColorPosition::from_decay(decay);
    }

    /// One frame: particles move and fade, the meter relaxes, and every
    /// few frames the button colour follows the decay level.
    pub fn tick(&mut self, dt: f32, decay: f64) {
        self.frames += 1;
        if self.frames % COLOR_REFRESH_FRAMES == 0 {
            self.refresh(decay);
        }

        self.reverse_speed = (self.reverse_speed - REVERSE_RELAX * dt).max(0.0);

        for p in self.particles.iter_mut() {
            p.x += p.vx * dt;
            p.y += p.vy * dt;
            p.life -= dt;
        }
        self.particles.retain(|p| p.life > 0.0);
    }

    fn emit<R: Rng>(&mut self, count: usize, palette: &ColorGrid, rng: &mut R) {
        let own = self.button_color(palette);
        let b = &self.button;
        for _ in 0..count {
            let color = if rng.random_bool(OWN_COLOR_CHANCE) {
                own
            } else {
                palette.color(self.position.stage, rng.random_range(0..ROWS), rng.random_range(0..COLS))
            };

            let angle = rng.random_range(0.0..std::f32::consts::TAU);
            let speed = rng.random_range(PARTICLE_SPEED_MIN..PARTICLE_SPEED_MAX);

            // Start on a random edge of the button
            let (x, y) = match rng.random_range(0..4) {
                0 => (b.x + rng.random::<f32>() * b.width, b.y),
                1 => (b.x + b.width, b.y + rng.random::<f32>() * b.height),
                2 => (b.x + rng.random::<f32>() * b.width, b.y + b.height),
                _ => (b.x, b.y + rng.random::<f32>() * b.height),
            };

            self.particles.push(Particle {
                x,
                y,
                vx: angle.cos() * speed,
                vy: angle.sin() * speed,
                size: rng.random_range(1.0..4.0),
                life: rng.random_range(PARTICLE_LIFE_MIN..PARTICLE_LIFE_MAX),
                color,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_pcg::Pcg32;

    fn setup() -> (MashGame, ColorGrid, Pcg32) {
        (MashGame::new(100.0), ColorGrid::procedural(), Pcg32::seed_from_u64(11))
    }

    #[test]
    fn first_press_is_single() {
        let (mut g, pal, mut rng) = setup();
        assert_eq!(g.press(5_000, &pal, &mut rng), PressKind::Single);
        assert_eq!(g.click_count, 1);
        assert_eq!(g.reverse_speed, SINGLE_REVERSE_SPEED);
        assert_eq!(g.particles.len(), SINGLE_PARTICLES);
    }

    #[test]
    fn quick_presses_are_rapid() {
        let (mut g, pal, mut rng) = setup();
        g.press(1_000, &pal, &mut rng);
        assert_eq!(g.press(1_299, &pal, &mut rng), PressKind::Rapid);
        assert_eq!(g.click_count, 2);
        assert!((g.reverse_speed - (SINGLE_REVERSE_SPEED + REVERSE_STEP)).abs() < 1e-6);
        assert_eq!(g.particles.len(), SINGLE_PARTICLES + RAPID_PARTICLES);
        // Exactly at the window edge counts as slow
        assert_eq!(g.press(1_599, &pal, &mut rng), PressKind::Single);
    }

    #[test]
    fn reverse_speed_caps_at_max() {
        let (mut g, pal, mut rng) = setup();
        for i in 0..30 {
            g.press(i * 100, &pal, &mut rng);
        }
        assert_eq!(g.reverse_speed, MAX_REVERSE_SPEED);
    }

    #[test]
    fn meter_relaxes_and_particles_die() {
        let (mut g, pal, mut rng) = setup();
        g.press(0, &pal, &mut rng);
        for _ in 0..120 {
            g.tick(1.0 / 60.0, 100.0);
        }
        assert_eq!(g.reverse_speed, 0.0);
        assert!(g.particles.is_empty());
    }

    #[test]
    fn particles_start_on_button_edge() {
        let (mut g, pal, mut rng) = setup();
        g.press(0, &pal, &mut rng);
        let b = g.button.clone();
        for p in &g.particles {
            assert!(b.contains(p.x, p.y));
            let on_edge = (p.x - b.x).abs() < 1e-4
                || (p.x - (b.x + b.width)).abs() < 1e-4
                || (p.y - b.y).abs() < 1e-4
                || (p.y - (b.y + b.height)).abs() < 1e-4;
            assert!(on_edge, "particle at ({}, {})", p.x, p.y);
        }
    }

    #[test]
    fn colour_follows_decay_every_fifth_frame() {
        let (mut g, _, _) = setup();
        assert_eq!(g.position.index, 0);
        for _ in 0..4 {
            g.tick(0.016, 50.0);
        }
        assert_eq!(g.position.index, 0);
        g.tick(0.016, 50.0);
        assert_eq!(g.position.index, 273);
    }
}
