/// WorldState: everything the running piece knows.
///
/// ## Decay
///
/// `decay` is the single shared level. Two observers are attached at
/// construction:
///   - a channel sender, drained by `step()` into `StageChanged` events
///   - a logger that reports every stage crossing
///
/// ## Per-screen state
///
/// `grid`, `game2` and `simon` exist only while their screen is current.
/// `screen::show()` is the only place that creates or drops them, so a
/// stale game can never receive input or timer callbacks.

use std::sync::mpsc::{self, Receiver};

use rand::SeedableRng;
use rand_pcg::Pcg32;

use crate::config::{Game2Mode, GameConfig, TimingConfig, TuningConfig};
use crate::domain::bounce::BounceGame;
use crate::domain::decay::{DecayChange, DecayLevel};
use crate::domain::floaters::FloatingField;
use crate::domain::grid::GridGame;
use crate::domain::mash::MashGame;
use crate::domain::palette::{ColorGrid, Stage};
use crate::domain::simon::SimonGame;
use super::assets::AssetStore;
use super::screen::{GlitchField, Screen, StartRain};
use super::timer::{Scheduler, TimerId};

/// Game 2 variant currently on screen.
#[derive(Clone, Debug)]
pub enum Game2 {
    Mash(MashGame),
    Bounce(BounceGame),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Game2Kind {
    Mash,
    Bounce,
}

pub struct WorldState {
    // ── Shared level ──
    pub decay: DecayLevel,
    decay_rx: Receiver<DecayChange>,
    pub palette: ColorGrid,
    pub assets: AssetStore,

    // ── Screen + time ──
    pub screen: Screen,
    pub timers: Scheduler,
    /// Milliseconds of simulated time since startup.
    pub clock_ms: u64,
    pub rng: Pcg32,

    // ── Per-screen state ──
    pub grid: Option<GridGame>,
    pub game2: Option<Game2>,
    pub simon: Option<SimonGame>,
    /// Pending Simon auto-check, cancelled when the player submits first.
    pub simon_check: Option<TimerId>,
    pub floaters: FloatingField,
    pub glitches: GlitchField,
    pub rain: StartRain,
    /// Seconds left on the end screen.
    pub countdown: Option<u32>,
    /// Next game 2 variant when alternating.
    pub next_game2: Game2Kind,

    // ── Settings ──
    pub timing: TimingConfig,
    pub tuning: TuningConfig,

    // ── UI ──
    pub message: String,
    pub message_timer_ms: u64,
    pub paused: bool,
}

impl WorldState {
    pub fn new(config: &GameConfig, palette: ColorGrid, assets: AssetStore) -> Self {
        let rng = match config.seed {
            Some(seed) => Pcg32::seed_from_u64(seed),
            None => Pcg32::from_rng(&mut rand::rng()),
        };
        let step = DecayLevel::step_for(config.timing.decay_interval_ms, config.timing.decay_duration_secs);
        let mut decay = DecayLevel::new(step);

        let (tx, decay_rx) = mpsc::channel();
        decay.subscribe(move |change: &DecayChange| {
            // Receiver lives as long as the world; a send error only means teardown
            let _ = tx.send(*change);
        });
        let mut logged_stage = Stage::from_decay(decay.value());
        decay.subscribe(move |change: &DecayChange| {
            let stage = Stage::from_decay(change.new);
            if stage != logged_stage {
                log::info!(
                    "decay {:.1}% -> {:.1}% ({:?}): stage {} -> {}",
                    change.old, change.new, change.cause, logged_stage, stage
                );
                logged_stage = stage;
            }
        });

        let next_game2 = match config.tuning.game2 {
            Game2Mode::Bounce => Game2Kind::Bounce,
            Game2Mode::Mash | Game2Mode::Alternate => Game2Kind::Mash,
        };

        WorldState {
            decay,
            decay_rx,
            palette,
            assets,
            screen: Screen::Start,
            timers: Scheduler::new(),
            clock_ms: 0,
            rng,
            grid: None,
            game2: None,
            simon: None,
            simon_check: None,
            floaters: FloatingField::new(),
            glitches: GlitchField::new(0),
            rain: StartRain::default(),
            countdown: None,
            next_game2,
            timing: config.timing.clone(),
            tuning: config.tuning.clone(),
            message: String::new(),
            message_timer_ms: 0,
            paused: false,
        }
    }

    /// Deterministic world with the embedded colour table and placeholder
    /// sprites.
    #[cfg(test)]
    pub fn for_test(seed: u64) -> Self {
        let config = GameConfig { seed: Some(seed), ..GameConfig::default() };
        let palette = ColorGrid::embedded().unwrap_or_else(|_| ColorGrid::procedural());
        WorldState::new(&config, palette, AssetStore::placeholders())
    }

    /// Changes written to the decay level since the last call.
    pub fn drain_decay_changes(&self) -> Vec<DecayChange> {
        self.decay_rx.try_iter().collect()
    }

    pub fn stage(&self) -> Stage {
        Stage::from_decay(self.decay.value())
    }

    pub fn set_message(&mut self, msg: &str, duration_ms: u64) {
        self.message = msg.to_string();
        self.message_timer_ms = duration_ms;
    }

    /// Which game 2 variant the next visit gets; alternates when configured.
    pub fn take_game2_kind(&mut self) -> Game2Kind {
        let kind = self.next_game2;
        if self.tuning.game2 == Game2Mode::Alternate {
            self.next_game2 = match kind {
                Game2Kind::Mash => Game2Kind::Bounce,
                Game2Kind::Bounce => Game2Kind::Mash,
            };
        }
        kind
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::decay::DecayCause;

    #[test]
    fn observer_channel_sees_adjustments() {
        let mut w = WorldState::for_test(1);
        w.decay.adjust(-10.0);
        w.decay.tick();
        let changes = w.drain_decay_changes();
        assert_eq!(changes.len(), 2);
        assert_eq!(changes[0].cause, DecayCause::Adjust);
        assert_eq!(changes[1].cause, DecayCause::Tick);
        assert!(w.drain_decay_changes().is_empty());
    }

    #[test]
    fn game2_alternates_from_mash() {
        let mut w = WorldState::for_test(2);
        assert_eq!(w.take_game2_kind(), Game2Kind::Mash);
        assert_eq!(w.take_game2_kind(), Game2Kind::Bounce);
        assert_eq!(w.take_game2_kind(), Game2Kind::Mash);

        w.tuning.game2 = Game2Mode::Bounce;
        w.next_game2 = Game2Kind::Bounce;
        assert_eq!(w.take_game2_kind(), Game2Kind::Bounce);
        assert_eq!(w.take_game2_kind(), Game2Kind::Bounce);
    }

    #[test]
    fn default_timing_drains_in_1050_ticks() {
        let w = WorldState::for_test(3);
        assert_eq!(w.decay.ticks_remaining(), 1050);
    }
}
