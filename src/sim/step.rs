/// The step function: advances the world by elapsed milliseconds.
///
/// Processing order:
///   1. Input for the current screen (clicks, presses, typed keys)
///   2. Timers that came due, in due order, each gated on its owner screen
///   3. Continuous motion (floaters, particles, paddle and blocks)
///   4. Decay observer channel → stage-change events
///
/// Screen transitions triggered here (decay depleted, countdown expired)
/// go through `screen::show()` / `screen::reset_game()` like any other.

use crate::domain::bounce::BounceOutcome;
use crate::domain::mash::PressKind;
use crate::domain::palette::Stage;
use crate::domain::simon::{SimonPhase, SpaceAction, CHECK_DELAY_MS, INSTRUCTION_MS, RESULT_MS};
use super::event::GameEvent;
use super::screen::{self, Screen};
use super::timer::{Fired, Owner, TimerKind};
use super::world::{Game2, WorldState};

/// Something the player clicked, already hit-tested by the renderer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClickTarget {
    Cell { row: usize, col: usize },
    Button,
}

/// Per-step input, already mapped to the current screen's meaning.
#[derive(Clone, Debug, Default)]
pub struct FrameInput {
    /// Paddle direction: -1 left, 0 still, 1 right.
    pub steer: i8,
    /// Grid cursor movement (rows, cols).
    pub cursor: (i32, i32),
    /// Space/Enter/gamepad press: grid cell under cursor, mash button,
    /// or the Simon space key.
    pub select: bool,
    /// Letters typed this step (Simon only).
    pub letters: Vec<char>,
    pub click: Option<ClickTarget>,
}

// ══════════════════════════════════════════════════════════════
// Main entry point
// ══════════════════════════════════════════════════════════════

pub fn step(world: &mut WorldState, input: &FrameInput, elapsed_ms: u64) -> Vec<GameEvent> {
    if world.paused { return vec![]; }

    let mut events: Vec<GameEvent> = Vec::new();
    world.clock_ms += elapsed_ms;

    if world.message_timer_ms > 0 {
        world.message_timer_ms = world.message_timer_ms.saturating_sub(elapsed_ms);
        if world.message_timer_ms == 0 { world.message.clear(); }
    }

    match world.screen {
        Screen::Game1 => resolve_grid_input(world, input, &mut events),
        Screen::Game2 => resolve_button_input(world, input, &mut events),
        Screen::Game3 => resolve_simon_input(world, input, &mut events),
        _ => {}
    }

    for fired in world.timers.advance(elapsed_ms) {
        dispatch(world, fired, &mut events);
    }

    resolve_motion(world, input, elapsed_ms as f32 / 1000.0, &mut events);
    resolve_stage_changes(world, &mut events);

    events
}

// ══════════════════════════════════════════════════════════════
// Timers
// ══════════════════════════════════════════════════════════════

fn dispatch(world: &mut WorldState, fired: Fired, events: &mut Vec<GameEvent>) {
    // A timer owned by a screen that is no longer current is stale
    if let Owner::Screen(owner) = fired.owner {
        if owner != world.screen {
            log::trace!("stale {:?} {:?} from {owner}", fired.kind, fired.id);
            return;
        }
    }

    match fired.kind {
        TimerKind::DecayTick => {
            // Stopped earlier in this same batch
            if !world.timers.is_scheduled(TimerKind::DecayTick) { return; }
            if world.decay.tick() {
                events.push(GameEvent::DecayDepleted);
                if world.screen != Screen::End {
                    log::info!("decay reached 0 on {}", world.screen);
                    screen::show(world, Screen::End, events);
                }
            }
        }
        TimerKind::GridUpdate => {
            let decay = world.decay.value();
            if let Some(grid) = world.grid.as_mut() {
                grid.update(decay);
            }
        }
        TimerKind::FloaterSpawn => {
            let decay = world.decay.value();
            let spawned = world.floaters
                .spawn(&world.assets.models, &world.palette, decay, &mut world.rng)
                .map(|f| (f.row, f.col));
            if let Some((row, col)) = spawned {
                events.push(GameEvent::FloaterSpawned { row, col });
            }
        }
        TimerKind::EndCountdown => {
            let left = world.countdown.unwrap_or(0).saturating_sub(1);
            world.countdown = Some(left);
            events.push(GameEvent::CountdownTick(left));
            if left == 0 {
                screen::reset_game(world, events);
            }
        }
        TimerKind::SimonInstruction => {
            let next = world.simon.as_mut().and_then(|s| s.advance_instruction());
            if let Some(instr) = next {
                events.push(GameEvent::SimonInstruction(instr));
                world.timers.after(TimerKind::SimonInstruction, Owner::Screen(Screen::Game3), INSTRUCTION_MS);
            }
        }
        TimerKind::SimonCheck => resolve_simon_check(world, events),
        TimerKind::SimonResult => {
            if let Some(mut simon) = world.simon.take() {
                screen::start_simon_round(world, &mut simon, events);
                world.simon = Some(simon);
            }
        }
        TimerKind::Glitch => world.glitches.add(&mut world.rng),
        TimerKind::MatrixChar => world.rain.add_char(world.clock_ms, &mut world.rng),
        TimerKind::DotParticle => world.rain.add_dot(world.clock_ms, &mut world.rng),
    }
}

// ══════════════════════════════════════════════════════════════
// Game 1: grid
// ══════════════════════════════════════════════════════════════

fn resolve_grid_input(world: &mut WorldState, input: &FrameInput, events: &mut Vec<GameEvent>) {
    let Some(grid) = world.grid.as_mut() else { return };

    if input.cursor != (0, 0) {
        grid.move_cursor(input.cursor.0, input.cursor.1);
    }

    let mut targets = Vec::new();
    if input.select {
        targets.push(grid.cursor);
    }
    if let Some(ClickTarget::Cell { row, col }) = input.click {
        grid.cursor = (row, col);
        targets.push((row, col));
    }

    for (row, col) in targets {
        if grid.rejuvenate(row, col) {
            world.decay.adjust(world.tuning.grid_click_bonus);
            events.push(GameEvent::CellRejuvenated { row, col });
        }
    }
}

// ══════════════════════════════════════════════════════════════
// Game 2: reaction button (bounce is steered in resolve_motion)
// ══════════════════════════════════════════════════════════════

fn resolve_button_input(world: &mut WorldState, input: &FrameInput, events: &mut Vec<GameEvent>) {
    let Some(Game2::Mash(mash)) = world.game2.as_mut() else { return };

    let presses = input.select as usize + matches!(input.click, Some(ClickTarget::Button)) as usize;
    for _ in 0..presses {
        let kind = mash.press(world.clock_ms, &world.palette, &mut world.rng);
        let bonus = match kind {
            PressKind::Rapid => world.tuning.mash_rapid_bonus,
            PressKind::Single => world.tuning.mash_single_bonus,
        };
        world.decay.adjust(bonus);
        mash.refresh(world.decay.value());
        events.push(GameEvent::ButtonPressed { kind });
    }
}

// ══════════════════════════════════════════════════════════════
// Game 3: Simon
// ══════════════════════════════════════════════════════════════

fn resolve_simon_input(world: &mut WorldState, input: &FrameInput, events: &mut Vec<GameEvent>) {
    let Some(simon) = world.simon.as_mut() else { return };

    if input.select {
        match simon.press_space() {
            SpaceAction::StartInput => events.push(GameEvent::SimonInputOpen),
            SpaceAction::Submit => {
                resolve_simon_check(world, events);
                return;
            }
            SpaceAction::Ignored => {}
        }
    }

    let Some(simon) = world.simon.as_mut() else { return };
    for &key in &input.letters {
        let accepted = simon.phase == SimonPhase::WaitingForPlayer;
        if simon.type_key(key) {
            if let Some(stale) = world.simon_check.take() {
                world.timers.cancel(stale);
            }
            let id = world.timers.after(TimerKind::SimonCheck, Owner::Screen(Screen::Game3), CHECK_DELAY_MS);
            world.simon_check = Some(id);
        }
        if accepted {
            events.push(GameEvent::SimonKey(key.to_ascii_lowercase()));
        }
    }
}

fn resolve_simon_check(world: &mut WorldState, events: &mut Vec<GameEvent>) {
    let Some(verdict) = world.simon.as_mut().and_then(|s| s.check()) else { return };

    world.decay.adjust(verdict.decay_delta(world.tuning.simon_reward));
    if let Some(id) = world.simon_check.take() {
        world.timers.cancel(id);
    }
    world.timers.cancel_kind(TimerKind::SimonInstruction);
    world.timers.after(TimerKind::SimonResult, Owner::Screen(Screen::Game3), RESULT_MS);
    log::info!("simon: {:?}", verdict);
    events.push(GameEvent::SimonVerdict(verdict));
}

// ══════════════════════════════════════════════════════════════
// Continuous motion
// ══════════════════════════════════════════════════════════════

fn resolve_motion(world: &mut WorldState, input: &FrameInput, dt: f32, events: &mut Vec<GameEvent>) {
    let decay = world.decay.value();
    match world.screen {
        Screen::Main => {
            let retired = world.floaters.tick(dt, &world.palette, decay);
            if retired > 0 {
                events.push(GameEvent::FloatersRetired(retired));
            }
        }
        Screen::Game2 => match world.game2.as_mut() {
            Some(Game2::Mash(mash)) => mash.tick(dt, decay),
            Some(Game2::Bounce(bounce)) => {
                for outcome in bounce.tick(dt, input.steer, &mut world.rng) {
                    match outcome {
                        BounceOutcome::Caught { row, col } => {
                            world.decay.adjust(world.tuning.bounce_catch_bonus);
                            events.push(GameEvent::BlockCaught { row, col });
                        }
                        BounceOutcome::Missed { row, col } => {
                            world.decay.adjust(-world.tuning.bounce_miss_penalty);
                            events.push(GameEvent::BlockMissed { row, col });
                        }
                    }
                }
            }
            None => {}
        },
        _ => {}
    }
}

fn resolve_stage_changes(world: &mut WorldState, events: &mut Vec<GameEvent>) {
    for change in world.drain_decay_changes() {
        let from = Stage::from_decay(change.old);
        let to = Stage::from_decay(change.new);
        if from != to {
            events.push(GameEvent::StageChanged { from, to });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::bounce::{FallingBlock, BLOCK_H, BLOCK_W};
    use crate::domain::simon::{Instruction, Verdict};

    fn idle() -> FrameInput {
        FrameInput::default()
    }

    fn go(world: &mut WorldState, target: Screen) {
        let mut events = Vec::new();
        screen::show(world, target, &mut events);
    }

    #[test]
    fn decay_ticks_only_while_timer_runs() {
        let mut w = WorldState::for_test(1);
        step(&mut w, &idle(), 1000);
        assert_eq!(w.decay.value(), 100.0);

        go(&mut w, Screen::Main);
        step(&mut w, &idle(), 1000);
        assert!((w.decay.value() - (100.0 - 10.0 * 100.0 / 1050.0)).abs() < 1e-9);
    }

    #[test]
    fn depletion_shows_end_screen() {
        let mut w = WorldState::for_test(2);
        go(&mut w, Screen::Main);
        w.decay.adjust(-99.95);
        let events = step(&mut w, &idle(), 100);
        assert!(events.contains(&GameEvent::DecayDepleted));
        assert!(events.contains(&GameEvent::ScreenChanged { from: Screen::Main, to: Screen::End }));
        assert_eq!(w.screen, Screen::End);
        assert!(!w.timers.is_scheduled(TimerKind::DecayTick));
    }

    #[test]
    fn depletion_during_a_game_also_ends() {
        let mut w = WorldState::for_test(3);
        go(&mut w, Screen::Main);
        go(&mut w, Screen::Game1);
        w.decay.adjust(-100.0);
        step(&mut w, &idle(), 100);
        assert_eq!(w.screen, Screen::End);
        assert!(w.grid.is_none());
    }

    #[test]
    fn end_countdown_resets_game() {
        let mut w = WorldState::for_test(4);
        go(&mut w, Screen::Main);
        w.decay.adjust(-100.0);
        step(&mut w, &idle(), 100);
        assert_eq!(w.screen, Screen::End);

        for _ in 0..29 {
            step(&mut w, &idle(), 1000);
        }
        assert_eq!(w.countdown, Some(1));
        let events = step(&mut w, &idle(), 1000);
        assert!(events.contains(&GameEvent::GameReset));
        assert_eq!(w.screen, Screen::Start);
        assert_eq!(w.decay.value(), 100.0);
    }

    #[test]
    fn grid_click_rejuvenates_and_rewards() {
        let mut w = WorldState::for_test(5);
        go(&mut w, Screen::Game1);
        w.decay.adjust(-50.0);
        for _ in 0..100 {
            step(&mut w, &idle(), 100);
        }
        let before = w.decay.value();
        let input = FrameInput { click: Some(ClickTarget::Cell { row: 1, col: 2 }), ..idle() };
        let events = step(&mut w, &input, 0);
        assert!(events.contains(&GameEvent::CellRejuvenated { row: 1, col: 2 }));
        assert!((w.decay.value() - (before + 2.0)).abs() < 1e-9);
        assert_eq!(w.grid.as_ref().and_then(|g| g.cell(1, 2)).map(|c| c.stage), Some(1.0));
    }

    #[test]
    fn keyboard_cursor_selects_cell() {
        let mut w = WorldState::for_test(6);
        go(&mut w, Screen::Game1);
        w.decay.adjust(-10.0);
        let input = FrameInput { cursor: (-10, -10), select: true, ..idle() };
        let events = step(&mut w, &input, 0);
        assert_eq!(events, vec![GameEvent::CellRejuvenated { row: 0, col: 0 }]);
        assert_eq!(w.decay.value(), 92.0);
    }

    #[test]
    fn mash_presses_push_decay_back() {
        let mut w = WorldState::for_test(7);
        go(&mut w, Screen::Game2);
        assert!(matches!(w.game2, Some(Game2::Mash(_))));
        w.decay.adjust(-50.0);

        let press = FrameInput { select: true, ..idle() };
        let first = step(&mut w, &press, 1000);
        assert!(first.contains(&GameEvent::ButtonPressed { kind: PressKind::Single }));
        let second = step(&mut w, &press, 100);
        assert!(second.contains(&GameEvent::ButtonPressed { kind: PressKind::Rapid }));
        assert!((w.decay.value() - 50.25).abs() < 1e-9);
    }

    #[test]
    fn clicking_the_button_counts_as_a_press() {
        let mut w = WorldState::for_test(14);
        go(&mut w, Screen::Game2);
        assert!(matches!(w.game2, Some(Game2::Mash(_))));
        w.decay.adjust(-50.0);

        let click = FrameInput { click: Some(ClickTarget::Button), ..idle() };
        let events = step(&mut w, &click, 1000);
        assert!(events.contains(&GameEvent::ButtonPressed { kind: PressKind::Single }));
        assert!((w.decay.value() - 50.05).abs() < 1e-9);

        // A cell click means nothing on this screen
        let stray = FrameInput { click: Some(ClickTarget::Cell { row: 0, col: 0 }), ..idle() };
        let events = step(&mut w, &stray, 0);
        assert!(events.iter().all(|e| !matches!(e, GameEvent::ButtonPressed { .. })));
    }

    #[test]
    fn early_submit_cancels_the_auto_check() {
        let mut w = WorldState::for_test(15);
        go(&mut w, Screen::Game3);
        {
            let simon = w.simon.as_mut().unwrap();
            simon.load_round(vec![Instruction { key: 'q', computer_says: true }], 100.0);
            simon.advance_instruction();
            simon.advance_instruction();
        }
        step(&mut w, &FrameInput { select: true, ..idle() }, 0);
        step(&mut w, &FrameInput { letters: vec!['q'], ..idle() }, 0);
        assert!(w.simon_check.is_some());
        assert!(w.timers.is_scheduled(TimerKind::SimonCheck));

        let events = step(&mut w, &FrameInput { select: true, ..idle() }, 0);
        assert!(events.contains(&GameEvent::SimonVerdict(Verdict::Correct)));
        assert!(w.simon_check.is_none());
        assert!(!w.timers.is_scheduled(TimerKind::SimonCheck));
    }

    #[test]
    fn bounce_catch_and_miss_adjust_decay() {
        let mut w = WorldState::for_test(8);
        go(&mut w, Screen::Game2);
        go(&mut w, Screen::Game2);
        w.decay.adjust(-50.0);
        let Some(Game2::Bounce(b)) = w.game2.as_mut() else { panic!("expected bounce") };
        let (px, py) = (b.paddle.x, b.paddle.y);
        let block = |x: f32, y: f32| FallingBlock {
            x, y, width: BLOCK_W, height: BLOCK_H, row: 0, col: 0, vy: 10.0, bouncing: false,
        };
        b.blocks.push(block(px + 1.0, py - BLOCK_H - 0.1));
        b.blocks.push(block(if px > 40.0 { 0.0 } else { 74.0 }, 39.95));

        let events = step(&mut w, &idle(), 20);
        assert!(events.contains(&GameEvent::BlockCaught { row: 0, col: 0 }));
        assert!(events.contains(&GameEvent::BlockMissed { row: 0, col: 0 }));
        assert!((w.decay.value() - 49.0).abs() < 1e-9);
    }

    #[test]
    fn simon_round_flow() {
        let mut w = WorldState::for_test(9);
        go(&mut w, Screen::Game3);
        w.decay.adjust(-50.0);
        w.drain_decay_changes();
        {
            let simon = w.simon.as_mut().unwrap();
            simon.load_round(
                vec![
                    Instruction { key: 'w', computer_says: true },
                    Instruction { key: 'a', computer_says: false },
                ],
                50.0,
            );
            simon.advance_instruction();
        }

        let events = step(&mut w, &idle(), 1500);
        assert_eq!(events, vec![GameEvent::SimonInstruction(Instruction { key: 'a', computer_says: false })]);
        step(&mut w, &idle(), 1500);
        assert_eq!(w.simon.as_ref().unwrap().phase, SimonPhase::WaitingForSpace);

        let events = step(&mut w, &FrameInput { select: true, ..idle() }, 0);
        assert_eq!(events, vec![GameEvent::SimonInputOpen]);
        step(&mut w, &FrameInput { letters: vec!['W'], ..idle() }, 0);
        assert!(w.timers.is_scheduled(TimerKind::SimonCheck));

        let events = step(&mut w, &idle(), 500);
        assert!(events.contains(&GameEvent::SimonVerdict(Verdict::Correct)));
        assert_eq!(w.decay.value(), 55.0);
        assert_eq!(w.simon.as_ref().unwrap().level, 2);

        let rounds = w.simon.as_ref().unwrap().rounds;
        step(&mut w, &idle(), 2500);
        let simon = w.simon.as_ref().unwrap();
        assert_eq!(simon.rounds, rounds + 1);
        assert_eq!(simon.phase, SimonPhase::ShowingSequence { shown: 1 });
    }

    #[test]
    fn simon_timers_die_with_the_screen() {
        let mut w = WorldState::for_test(10);
        go(&mut w, Screen::Game3);
        go(&mut w, Screen::Main);
        assert!(!w.timers.is_scheduled(TimerKind::SimonInstruction));
        // A stray Game3 timer is ignored while Main is current
        w.timers.after(TimerKind::SimonResult, Owner::Screen(Screen::Game3), 10);
        let events = step(&mut w, &idle(), 10);
        assert!(events.iter().all(|e| !matches!(e, GameEvent::SimonInstruction(_))));
        assert!(w.simon.is_none());
    }

    #[test]
    fn floaters_survive_a_game_round_trip() {
        let mut w = WorldState::for_test(11);
        go(&mut w, Screen::Main);
        let events = step(&mut w, &idle(), 3000);
        assert!(events.iter().any(|e| matches!(e, GameEvent::FloaterSpawned { .. })));
        assert_eq!(w.floaters.floaters.len(), 1);
        let before = w.floaters.floaters.clone();

        go(&mut w, Screen::Game2);
        assert!(w.floaters.floaters.is_empty());
        go(&mut w, Screen::Main);
        assert_eq!(w.floaters.floaters, before);
    }

    #[test]
    fn stage_changes_are_reported() {
        let mut w = WorldState::for_test(12);
        go(&mut w, Screen::Game1);
        w.decay.adjust(-25.0);
        let events = step(&mut w, &idle(), 0);
        assert!(events.contains(&GameEvent::StageChanged { from: Stage::from_number(1), to: Stage::from_number(2) }));
    }

    #[test]
    fn pause_freezes_time() {
        let mut w = WorldState::for_test(13);
        go(&mut w, Screen::Main);
        w.paused = true;
        assert!(step(&mut w, &idle(), 5000).is_empty());
        assert_eq!(w.decay.value(), 100.0);
        assert_eq!(w.clock_ms, 0);
    }
}
