/// Screen manager.
///
/// Exactly one screen is current. `show()` runs synchronously:
///   1. leaving Main saves the floating objects
///   2. cancels every timer the old screen owns
///   3. drops the old screen's game state
///   4. switches `world.screen`
///   5. sets up the target screen (state, timers, decorations)
/// No transition is ever queued.

use std::fmt;

use rand::Rng;

use crate::domain::bounce::BounceGame;
use crate::domain::floaters::{FIRST_SPAWN_MS, SPAWN_EVERY_MS};
use crate::domain::grid::GridGame;
use crate::domain::mash::MashGame;
use crate::domain::simon::{SimonGame, INSTRUCTION_MS};
use super::event::GameEvent;
use super::timer::{Owner, TimerKind};
use super::world::{Game2, Game2Kind, WorldState};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Screen {
    Start,
    Main,
    Game1,
    Game2,
    Game3,
    End,
}

impl Screen {
    pub fn is_game(self) -> bool {
        matches!(self, Screen::Game1 | Screen::Game2 | Screen::Game3)
    }
}

impl fmt::Display for Screen {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Screen::Start => "start",
            Screen::Main => "main",
            Screen::Game1 => "game1",
            Screen::Game2 => "game2",
            Screen::Game3 => "game3",
            Screen::End => "end",
        };
        f.write_str(name)
    }
}

// ── Glitch decoration ──

/// A flickering rectangle on the start or end screen, in screen fractions.
#[derive(Clone, Debug, PartialEq)]
pub struct Glitch {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
    /// Flicker period in milliseconds.
    pub period_ms: u64,
    /// Phase offset in milliseconds.
    pub offset_ms: u64,
}

impl Glitch {
    /// Visible during the first half of each period.
    pub fn visible_at(&self, clock_ms: u64) -> bool {
        let t = (clock_ms + self.offset_ms) % self.period_ms.max(1);
        t < self.period_ms / 2
    }
}

#[derive(Clone, Debug, Default)]
pub struct GlitchField {
    pub rects: Vec<Glitch>,
    cap: usize,
    /// End-screen glitches are larger and flicker faster.
    heavy: bool,
}

impl GlitchField {
    pub fn new(cap: usize) -> Self {
        GlitchField { rects: Vec::new(), cap, heavy: false }
    }

    /// Replace the field with `count` fresh rectangles.
    pub fn seed<R: Rng>(&mut self, count: usize, cap: usize, heavy: bool, rng: &mut R) {
        self.rects.clear();
        self.cap = cap;
        self.heavy = heavy;
        for _ in 0..count {
            self.add(rng);
        }
    }

    /// Add one rectangle, dropping the oldest beyond the cap.
    pub fn add<R: Rng>(&mut self, rng: &mut R) {
        let (w, h, period) = if self.heavy {
            (rng.random_range(0.06..0.25), rng.random_range(0.04..0.10), rng.random_range(800..2000))
        } else {
            (rng.random_range(0.04..0.15), rng.random_range(0.03..0.07), rng.random_range(1500..3000))
        };
        self.rects.push(Glitch {
            x: rng.random_range(0.0..1.0 - w),
            y: rng.random_range(0.0..1.0 - h),
            w,
            h,
            period_ms: period,
            offset_ms: rng.random_range(0..period),
        });
        if self.rects.len() > self.cap {
            let excess = self.rects.len() - self.cap;
            self.rects.drain(..excess);
        }
    }

    pub fn clear(&mut self) {
        self.rects.clear();
    }
}

// ── Start-screen rain ──

const RAIN_CHARS: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789@#$%^&*()";

/// A character falling down the start screen.
#[derive(Clone, Debug, PartialEq)]
pub struct MatrixChar {
    pub ch: char,
    /// Column as a screen fraction.
    pub x: f32,
    pub born_ms: u64,
    /// Wait before it starts to fall.
    pub delay_ms: u64,
    /// Time to cross the screen once falling.
    pub fall_ms: u64,
}

impl MatrixChar {
    /// Screen-fraction height at `clock_ms`, None while waiting or gone.
    pub fn y_at(&self, clock_ms: u64) -> Option<f32> {
        let start = self.born_ms + self.delay_ms;
        if clock_ms < start {
            return None;
        }
        let t = (clock_ms - start) as f32 / self.fall_ms.max(1) as f32;
        (t <= 1.0).then_some(t)
    }
}

/// A dot that pulses once in place.
#[derive(Clone, Debug, PartialEq)]
pub struct DotParticle {
    pub x: f32,
    pub y: f32,
    pub born_ms: u64,
    pub delay_ms: u64,
}

impl DotParticle {
    /// Brightness in [0, 1] at `clock_ms`: rises then fades over DOT_PULSE_MS.
    pub fn glow_at(&self, clock_ms: u64) -> f32 {
        let start = self.born_ms + self.delay_ms;
        if clock_ms < start {
            return 0.0;
        }
        let t = (clock_ms - start) as f32 / DOT_PULSE_MS as f32;
        if t >= 1.0 { 0.0 } else { 1.0 - (2.0 * t - 1.0).abs() }
    }
}

pub const MATRIX_EVERY_MS: u64 = 150;
pub const MATRIX_LIFE_MS: u64 = 6000;
pub const DOT_EVERY_MS: u64 = 300;
pub const DOT_LIFE_MS: u64 = 3000;
pub const START_DOTS: usize = 50;
const DOT_PULSE_MS: u64 = 2000;

/// Matrix characters and dot particles behind the start title.
#[derive(Clone, Debug, Default)]
pub struct StartRain {
    pub chars: Vec<MatrixChar>,
    pub dots: Vec<DotParticle>,
}

impl StartRain {
    /// Initial dots, each appearing within the first second.
    pub fn seed<R: Rng>(&mut self, clock_ms: u64, rng: &mut R) {
        self.clear();
        for _ in 0..START_DOTS {
            let born = clock_ms + rng.random_range(0..1000);
            self.push_dot(born, rng);
        }
    }

    pub fn add_char<R: Rng>(&mut self, clock_ms: u64, rng: &mut R) {
        self.expire(clock_ms);
        let i = rng.random_range(0..RAIN_CHARS.len());
        self.chars.push(MatrixChar {
            ch: RAIN_CHARS[i] as char,
            x: rng.random_range(0.0..1.0),
            born_ms: clock_ms,
            delay_ms: rng.random_range(0..4000),
            fall_ms: rng.random_range(3000..5000),
        });
    }

    pub fn add_dot<R: Rng>(&mut self, clock_ms: u64, rng: &mut R) {
        self.expire(clock_ms);
        self.push_dot(clock_ms, rng);
    }

    fn push_dot<R: Rng>(&mut self, born_ms: u64, rng: &mut R) {
        self.dots.push(DotParticle {
            x: rng.random_range(0.0..1.0),
            y: rng.random_range(0.0..1.0),
            born_ms,
            delay_ms: rng.random_range(0..3000),
        });
    }

    /// Drop everything past its lifetime.
    pub fn expire(&mut self, clock_ms: u64) {
        self.chars.retain(|c| clock_ms < c.born_ms + MATRIX_LIFE_MS);
        self.dots.retain(|d| clock_ms < d.born_ms + DOT_LIFE_MS);
    }

    pub fn clear(&mut self) {
        self.chars.clear();
        self.dots.clear();
    }
}

pub const START_GLITCHES: usize = 8;
pub const START_GLITCH_CAP: usize = 12;
pub const START_GLITCH_MS: u64 = 1000;
pub const END_GLITCHES: usize = 20;
pub const END_GLITCH_CAP: usize = 25;
pub const END_GLITCH_MS: u64 = 500;
pub const COUNTDOWN_MS: u64 = 1000;

// ── Transitions ──

pub fn show(world: &mut WorldState, target: Screen, events: &mut Vec<GameEvent>) {
    let from = world.screen;
    log::info!("screen {from} -> {target}");

    if from == Screen::Main && target != Screen::Main {
        world.floaters.save();
    }

    let cancelled = world.timers.cancel_owned_by(from);
    if cancelled > 0 {
        log::debug!("cancelled {cancelled} timer(s) owned by {from}");
    }

    world.grid = None;
    world.game2 = None;
    world.simon = None;
    world.simon_check = None;
    world.countdown = None;
    world.glitches.clear();
    world.rain.clear();
    world.floaters.clear();

    world.screen = target;
    let owner = Owner::Screen(target);

    match target {
        Screen::Start => {
            stop_decay_timer(world);
            world.glitches.seed(START_GLITCHES, START_GLITCH_CAP, false, &mut world.rng);
            world.timers.every(TimerKind::Glitch, owner, START_GLITCH_MS);
            world.rain.seed(world.clock_ms, &mut world.rng);
            world.timers.every(TimerKind::MatrixChar, owner, MATRIX_EVERY_MS);
            world.timers.every(TimerKind::DotParticle, owner, DOT_EVERY_MS);
        }
        Screen::Main => {
            if world.floaters.restore() {
                log::debug!("restored {} floating object(s)", world.floaters.floaters.len());
            }
            world.timers.every_after(TimerKind::FloaterSpawn, owner, FIRST_SPAWN_MS, SPAWN_EVERY_MS);
            if !world.timers.is_scheduled(TimerKind::DecayTick) {
                start_decay_timer(world);
            }
        }
        Screen::Game1 => {
            world.grid = Some(GridGame::new(&mut world.rng));
            world.timers.every(TimerKind::GridUpdate, owner, world.timing.grid_update_ms);
        }
        Screen::Game2 => {
            let game = match world.take_game2_kind() {
                Game2Kind::Mash => Game2::Mash(MashGame::new(world.decay.value())),
                Game2Kind::Bounce => Game2::Bounce(BounceGame::new()),
            };
            world.game2 = Some(game);
        }
        Screen::Game3 => {
            let mut simon = SimonGame::new();
            start_simon_round(world, &mut simon, events);
            world.simon = Some(simon);
        }
        Screen::End => {
            stop_decay_timer(world);
            world.glitches.seed(END_GLITCHES, END_GLITCH_CAP, true, &mut world.rng);
            world.timers.every(TimerKind::Glitch, owner, END_GLITCH_MS);
            world.countdown = Some(world.timing.end_countdown_secs);
            world.timers.every(TimerKind::EndCountdown, owner, COUNTDOWN_MS);
        }
    }

    events.push(GameEvent::ScreenChanged { from, to: target });
}

/// Pick a sequence, show its first instruction and schedule the next.
pub fn start_simon_round(world: &mut WorldState, simon: &mut SimonGame, events: &mut Vec<GameEvent>) {
    simon.start_round(&mut world.rng, world.decay.value());
    if let Some(instr) = simon.advance_instruction() {
        events.push(GameEvent::SimonInstruction(instr));
    }
    world.timers.after(TimerKind::SimonInstruction, Owner::Screen(Screen::Game3), INSTRUCTION_MS);
}

pub fn start_decay_timer(world: &mut WorldState) {
    world.timers.cancel_kind(TimerKind::DecayTick);
    world.timers.every(TimerKind::DecayTick, Owner::Global, world.timing.decay_interval_ms);
    log::info!(
        "decay timer started at {:.1}% (-{:.4} every {} ms)",
        world.decay.value(), world.decay.step(), world.timing.decay_interval_ms
    );
}

pub fn stop_decay_timer(world: &mut WorldState) {
    if world.timers.cancel_kind(TimerKind::DecayTick) > 0 {
        log::info!("decay timer stopped at {:.1}%", world.decay.value());
    }
}

/// Back to a fresh start: full decay, no timers, no saved objects.
pub fn reset_game(world: &mut WorldState, events: &mut Vec<GameEvent>) {
    world.decay.reset();
    stop_decay_timer(world);
    world.timers.clear();
    world.floaters.clear();
    world.countdown = None;
    world.paused = false;
    events.push(GameEvent::GameReset);
    show(world, Screen::Start, events);
    // Leaving Main just saved the floaters again
    world.floaters.forget_saved();
}

pub fn start_random_game(world: &mut WorldState, events: &mut Vec<GameEvent>) {
    let target = match world.rng.random_range(1..=3) {
        1 => Screen::Game1,
        2 => Screen::Game2,
        _ => Screen::Game3,
    };
    show(world, target, events);
}
