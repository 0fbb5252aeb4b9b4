/// Entry point and game loop.

mod config;
mod domain;
mod sim;
mod ui;

use std::fs::File;
use std::time::{Duration, Instant};

use crossterm::event::KeyCode;

use config::GameConfig;
use domain::mash::PressKind;
use domain::palette::ColorGrid;
use sim::assets::AssetStore;
use sim::event::GameEvent;
use sim::screen::{self, Screen};
use sim::step::{self, FrameInput};
use sim::world::WorldState;
use ui::gamepad::{Dir, GamepadState};
use ui::input::InputState;
use ui::renderer::Renderer;
use ui::sound::SoundEngine;

const FRAME_SLEEP: Duration = Duration::from_millis(5);

fn main() {
    let config = GameConfig::load();
    init_logging(&config);

    let palette = ColorGrid::load(&config.assets_dir);
    let assets = AssetStore::load(&config.assets_dir);
    log::info!(
        "assets from {}: {} of {} sprites loaded",
        assets.dir().display(), assets.sprite_count(), assets.models.len()
    );

    let mut world = WorldState::new(&config, palette, assets);
    let mut events = Vec::new();
    screen::show(&mut world, Screen::Start, &mut events);

    let mut renderer = Renderer::new();

    if let Err(e) = renderer.init() {
        let _ = renderer.cleanup();
        eprintln!("Terminal init failed: {e}");
        return;
    }

    let sound = SoundEngine::new();

    let result = game_loop(&mut world, &mut renderer, sound.as_ref(), &config);

    if let Err(e) = renderer.cleanup() {
        eprintln!("Terminal cleanup failed: {e}");
    }

    if let Err(e) = result {
        log::error!("game loop: {e}");
        eprintln!("Game error: {e}");
    }

    log::info!("exit at {:.1}% decay", world.decay.value());
    println!();
    println!("Decay stopped at {}%.", world.decay.percent());
}

/// env_logger into the configured file; the terminal belongs to the renderer.
/// RUST_LOG overrides the default `info` filter.
fn init_logging(config: &GameConfig) {
    match File::create(&config.log_file) {
        Ok(file) => {
            env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
                .target(env_logger::Target::Pipe(Box::new(file)))
                .init();
            log::info!("decay {} starting", env!("CARGO_PKG_VERSION"));
        }
        Err(e) => {
            eprintln!("cannot open log file {}: {e}; logging disabled", config.log_file.display());
        }
    }
    // Collected before the logger existed
    for warning in &config.warnings {
        log::warn!("{warning}");
    }
}

fn game_loop(
    world: &mut WorldState,
    renderer: &mut Renderer,
    sound: Option<&SoundEngine>,
    config: &GameConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut kb = InputState::new();
    let mut gp = GamepadState::new();
    gp.load_button_config(&config.gamepad);
    if gp.connected {
        log::info!("gamepad detected");
    }
    let mut last_tick = Instant::now();
    let tick_rate = Duration::from_millis(config.timing.tick_rate_ms);

    // Edge-triggered input gathered between steps
    let mut pending = FrameInput::default();

    loop {
        kb.drain_events();
        gp.update();

        if kb.ctrl_c_pressed() {
            break;
        }

        let mut events = Vec::new();
        let before = world.screen;
        if handle_meta(world, &kb, &gp, &mut events) {
            break;
        }
        if world.screen != before {
            pending = FrameInput::default();
        } else if !world.paused {
            collect_input(world.screen, renderer, &kb, &gp, &mut pending);
        }

        if last_tick.elapsed() >= tick_rate {
            let elapsed_ms = last_tick.elapsed().as_millis() as u64;
            last_tick = Instant::now();
            pending.steer = detect_steer(&kb, &gp);
            events.extend(step::step(world, &pending, elapsed_ms));
            pending = FrameInput::default();
        }

        process_events(sound, &events);

        renderer.render(world)?;
        std::thread::sleep(FRAME_SLEEP);
    }

    Ok(())
}

fn process_events(sound: Option<&SoundEngine>, events: &[GameEvent]) {
    for event in events {
        log::debug!("{event:?}");
    }
    let sfx = match sound {
        Some(s) => s,
        None => return,
    };
    for event in events {
        match event {
            GameEvent::CellRejuvenated { .. } => sfx.play_rejuvenate(),
            GameEvent::BlockCaught { .. } => sfx.play_catch(),
            GameEvent::BlockMissed { .. } => sfx.play_miss(),
            GameEvent::ButtonPressed { kind: PressKind::Rapid } => sfx.play_rapid(),
            GameEvent::ButtonPressed { kind: PressKind::Single } => sfx.play_single(),
            GameEvent::SimonInstruction(instr) => sfx.play_key(instr.key),
            GameEvent::SimonVerdict(v) if v.is_correct() => sfx.play_correct(),
            GameEvent::SimonVerdict(_) => sfx.play_wrong(),
            GameEvent::StageChanged { .. } => sfx.play_stage(),
            GameEvent::DecayDepleted => sfx.play_depleted(),
            GameEvent::CountdownTick(_) => sfx.play_tick(),
            _ => {}
        }
    }
}

// ── Key Constants ──

const KEYS_LEFT: &[KeyCode] = &[KeyCode::Left, KeyCode::Char('a'), KeyCode::Char('A')];
const KEYS_RIGHT: &[KeyCode] = &[KeyCode::Right, KeyCode::Char('d'), KeyCode::Char('D')];
const KEYS_UP: &[KeyCode] = &[KeyCode::Up, KeyCode::Char('w'), KeyCode::Char('W')];
const KEYS_DOWN: &[KeyCode] = &[KeyCode::Down, KeyCode::Char('s'), KeyCode::Char('S')];
const KEYS_SELECT: &[KeyCode] = &[KeyCode::Char(' '), KeyCode::Enter];
const KEYS_CONFIRM: &[KeyCode] = &[KeyCode::Enter];
const KEYS_BACK: &[KeyCode] = &[KeyCode::Esc, KeyCode::Backspace];
const KEYS_QUIT: &[KeyCode] = &[KeyCode::Char('q'), KeyCode::Char('Q')];
const KEYS_PAUSE: &[KeyCode] = &[KeyCode::F(1)];

fn detect_steer(kb: &InputState, gp: &GamepadState) -> i8 {
    let left = kb.any_held(KEYS_LEFT) || kb.any_pressed(KEYS_LEFT) || gp.held(Dir::Left);
    let right = kb.any_held(KEYS_RIGHT) || kb.any_pressed(KEYS_RIGHT) || gp.held(Dir::Right);
    right as i8 - left as i8
}

/// Fold this frame's presses into the pending step input, by screen.
fn collect_input(screen: Screen, renderer: &Renderer, kb: &InputState, gp: &GamepadState, pending: &mut FrameInput) {
    match screen {
        Screen::Game1 => {
            let tapped = |keys: &[KeyCode], dir: Dir| kb.any_pressed(keys) || gp.tapped(dir);
            if tapped(KEYS_UP, Dir::Up) { pending.cursor.0 -= 1; }
            if tapped(KEYS_DOWN, Dir::Down) { pending.cursor.0 += 1; }
            if tapped(KEYS_LEFT, Dir::Left) { pending.cursor.1 -= 1; }
            if tapped(KEYS_RIGHT, Dir::Right) { pending.cursor.1 += 1; }
            pending.select |= kb.any_pressed(KEYS_SELECT) || gp.press_pressed();
        }
        Screen::Game2 => {
            pending.select |= kb.any_pressed(KEYS_SELECT) || gp.press_pressed();
        }
        Screen::Game3 => {
            pending.letters.extend(kb.letters());
            pending.select |= kb.any_pressed(KEYS_SELECT) || gp.press_pressed();
        }
        Screen::Start | Screen::Main | Screen::End => return,
    }

    if pending.click.is_none() {
        pending.click = kb.clicks.iter().find_map(|&(col, row)| renderer.hit_test(col, row));
    }
}

/// Screen navigation, pause and quit. Returns true to quit.
fn handle_meta(world: &mut WorldState, kb: &InputState, gp: &GamepadState, events: &mut Vec<GameEvent>) -> bool {
    let back = kb.any_pressed(KEYS_BACK) || gp.cancel_pressed();

    // F1: Pause / Resume
    if kb.any_pressed(KEYS_PAUSE) || gp.pause_pressed() {
        world.paused = !world.paused;
        log::info!("{} on {}", if world.paused { "paused" } else { "resumed" }, world.screen);
        return false;
    }

    // While paused only ESC gets through, and it also resumes
    if world.paused {
        if !back {
            return false;
        }
        world.paused = false;
        if world.screen == Screen::Start {
            return false;
        }
    }

    if world.screen.is_game() {
        if back {
            screen::show(world, Screen::Main, events);
            world.set_message(&format!("Decay at {}%", world.decay.percent()), 2000);
        }
        return false;
    }

    // Clicks anywhere advance the non-game screens
    let confirm = kb.any_pressed(KEYS_CONFIRM)
        || gp.confirm_pressed()
        || gp.press_pressed()
        || !kb.clicks.is_empty();

    match world.screen {
        Screen::Start => {
            if back || kb.any_pressed(KEYS_QUIT) {
                return true;
            }
            if confirm {
                screen::show(world, Screen::Main, events);
            }
        }
        Screen::Main => {
            if back {
                screen::reset_game(world, events);
            } else if confirm {
                screen::start_random_game(world, events);
            }
        }
        Screen::End => {
            if confirm {
                screen::reset_game(world, events);
            }
        }
        Screen::Game1 | Screen::Game2 | Screen::Game3 => {}
    }
    false
}
