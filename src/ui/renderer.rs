/// Presentation layer: double-buffered, diff-based terminal renderer.
///
/// How it works:
///   1. Build the next frame into `front` buffer (array of Cell)
///   2. Compare each cell with `back` buffer (previous frame)
///   3. Only emit terminal commands for cells that changed
///   4. All commands are batched with `queue!`, flushed once at the end
///   5. Swap front/back
///
/// Composing also records where the grid and the game field landed, so
/// mouse clicks can be hit-tested against the frame the player saw.

use std::io::{self, BufWriter, Write};

use crossterm::{
    cursor::{self, MoveTo},
    event::{DisableMouseCapture, EnableMouseCapture},
    execute, queue,
    style::{Color, Print, ResetColor, SetBackgroundColor, SetForegroundColor},
    terminal::{self, Clear, ClearType},
};

use crate::domain::bounce::{self, BounceGame};
use crate::domain::floaters::{HALF_DEPTH, HALF_HEIGHT, RETIRE_X, SPAWN_X};
use crate::domain::mash::{self, MashGame, MAX_REVERSE_SPEED};
use crate::domain::palette::{bar_color, Rgb, Stage, COLS, ROWS};
use crate::domain::simon::{SimonGame, SimonPhase};
use crate::sim::screen::{GlitchField, Screen};
use crate::sim::step::ClickTarget;
use crate::sim::world::{Game2, WorldState};

// ── Cell: the unit of the back-buffer ──

#[derive(Clone, Copy, PartialEq, Eq)]
struct Cell {
    ch: char,
    fg: Color,
    bg: Color,
}

impl Cell {
    /// Explicit dark background for all "empty" terminal cells.
    ///
    /// Using the same RGB for `Clear(ClearType::All)` and every cell's
    /// background keeps the inter-row gap pixels of VTE terminals from
    /// showing as horizontal lines.
    const BASE_BG: Color = Color::Rgb { r: 22, g: 22, b: 35 };

    const BLANK: Cell = Cell { ch: ' ', fg: Color::White, bg: Cell::BASE_BG };

    /// Sentinel cell used to invalidate the back buffer.
    /// Different from any real cell, so every position will be diff'd.
    const INVALID: Cell = Cell { ch: '?', fg: Color::Magenta, bg: Color::Magenta };

    /// Normalize bg: Color::Reset → BASE_BG so that every cell gets an
    /// explicit background color (never terminal-default).
    #[inline]
    fn norm_bg(bg: Color) -> Color {
        match bg {
            Color::Reset => Self::BASE_BG,
            other => other,
        }
    }

    fn from_char(ch: char, fg: Color, bg: Color) -> Self {
        Cell { ch, fg, bg: Self::norm_bg(bg) }
    }
}

fn rgb(c: Rgb) -> Color {
    Color::Rgb { r: c.r, g: c.g, b: c.b }
}

// ── FrameBuffer: a 2D grid of Cells ──

struct FrameBuffer {
    width: usize,
    height: usize,
    cells: Vec<Cell>,
}

impl FrameBuffer {
    fn new(w: usize, h: usize) -> Self {
        FrameBuffer {
            width: w,
            height: h,
            cells: vec![Cell::BLANK; w * h],
        }
    }

    fn resize(&mut self, w: usize, h: usize) {
        if self.width != w || self.height != h {
            self.width = w;
            self.height = h;
            self.cells = vec![Cell::BLANK; w * h];
        }
    }

    fn clear(&mut self) {
        self.cells.fill(Cell::BLANK);
    }

    fn set(&mut self, x: usize, y: usize, cell: Cell) {
        if x < self.width && y < self.height {
            self.cells[y * self.width + x] = cell;
        }
    }

    fn get(&self, x: usize, y: usize) -> Cell {
        if x < self.width && y < self.height {
            self.cells[y * self.width + x]
        } else {
            Cell::BLANK
        }
    }

    /// Write a string at (x, y) with given colors. Each char occupies 1 column.
    fn put_str(&mut self, x: usize, y: usize, s: &str, fg: Color, bg: Color) {
        for (i, ch) in s.chars().enumerate() {
            if x + i >= self.width { break; }
            self.set(x + i, y, Cell::from_char(ch, fg, bg));
        }
    }

    /// Write a string centered on row y.
    fn put_centered(&mut self, y: usize, s: &str, fg: Color, bg: Color) {
        let x = self.width.saturating_sub(s.chars().count()) / 2;
        self.put_str(x, y, s, fg, bg);
    }

    fn fill_rect(&mut self, x: usize, y: usize, w: usize, h: usize, ch: char, fg: Color, bg: Color) {
        for yy in y..y + h {
            for xx in x..x + w {
                self.set(xx, yy, Cell::from_char(ch, fg, bg));
            }
        }
    }

    fn fill_row(&mut self, y: usize, bg: Color) {
        let w = self.width;
        self.fill_rect(0, y, w, 1, ' ', Color::White, bg);
    }
}

// ── Layout ──

const HUD_ROW: usize = 0;
/// First row of the play area.
const PLAY_ROW: usize = 2;
/// Rows below the play area: message bar, gap, help bar.
const FOOTER_ROWS: usize = 3;

/// Grid game cell: 4 colour columns plus a 1-column gap, 2 rows tall.
const GRID_CELL_W: usize = 5;
const GRID_CELL_H: usize = 2;

const HUD_BG: Color = Color::Rgb { r: 20, g: 20, b: 60 };
const MSG_BG: Color = Color::Rgb { r: 200, g: 180, b: 50 };
const DIM: Color = Color::Rgb { r: 90, g: 90, b: 110 };
const FRAME_FG: Color = Color::Rgb { r: 60, g: 60, b: 85 };

const TITLE: [&str; 5] = [
    r" ____  _____ ____    _ __   __",
    r"|  _ \| ____/ ___|  / \\ \ / /",
    r"| | | |  _|| |     / _ \\ V / ",
    r"| |_| | |__| |___ / ___ \| |  ",
    r"|____/|_____\____/_/   \_\_|  ",
];

/// A rectangle of terminal cells that a game field is scaled into.
#[derive(Clone, Copy, Debug, PartialEq)]
struct Viewport {
    x: usize,
    y: usize,
    w: usize,
    h: usize,
    /// Field size in field units.
    field_w: f32,
    field_h: f32,
}

impl Viewport {
    /// Largest 2:1 (in field units) viewport centered in the play area.
    /// Terminal cells are about twice as tall as wide, hence 4 columns per row.
    fn fit(term_w: usize, play_y: usize, play_h: usize, field_w: f32, field_h: f32) -> Viewport {
        let h = play_h.max(1);
        let w = (h * 4).min(term_w.saturating_sub(2)).max(1);
        Viewport { x: term_w.saturating_sub(w) / 2, y: play_y, w, h, field_w, field_h }
    }

    fn col(&self, fx: f32) -> usize {
        self.x + ((fx / self.field_w) * self.w as f32).max(0.0) as usize
    }

    fn row(&self, fy: f32) -> usize {
        self.y + ((fy / self.field_h) * self.h as f32).max(0.0) as usize
    }

    /// Field rectangle → terminal (x, y, w, h), at least one cell each way.
    fn rect(&self, fx: f32, fy: f32, fw: f32, fh: f32) -> (usize, usize, usize, usize) {
        let w = ((fw / self.field_w) * self.w as f32).round().max(1.0) as usize;
        let h = ((fh / self.field_h) * self.h as f32).round().max(1.0) as usize;
        (self.col(fx), self.row(fy), w, h)
    }

    fn contains(&self, col: usize, row: usize) -> bool {
        col < self.x + self.w && row < self.y + self.h
    }
}

/// Where clickable things were drawn in the last composed frame.
#[derive(Clone, Copy, Debug, Default)]
struct Layout {
    /// Top-left terminal cell of the grid game.
    grid: Option<(usize, usize)>,
    /// Button of the reaction game, terminal (x, y, w, h).
    button: Option<(usize, usize, usize, usize)>,
}

/// Horizontal mirror for sprites spun past 90°.
fn mirror_line(line: &str, width: usize) -> String {
    let padded = format!("{line:<width$}");
    padded
        .chars()
        .rev()
        .map(|c| match c {
            '/' => '\\',
            '\\' => '/',
            '(' => ')',
            ')' => '(',
            '<' => '>',
            '>' => '<',
            '[' => ']',
            ']' => '[',
            '{' => '}',
            '}' => '{',
            '┌' => '┐',
            '┐' => '┌',
            '└' => '┘',
            '┘' => '└',
            other => other,
        })
        .collect()
}

// ── Renderer ──

pub struct Renderer {
    writer: BufWriter<io::Stdout>,
    front: FrameBuffer,
    back: FrameBuffer,
    term_w: usize,
    term_h: usize,
    last_screen: Option<Screen>,
    layout: Layout,
}

impl Renderer {
    pub fn new() -> Self {
        Renderer {
            writer: BufWriter::with_capacity(16384, io::stdout()),
            front: FrameBuffer::new(0, 0),
            back: FrameBuffer::new(0, 0),
            term_w: 0,
            term_h: 0,
            last_screen: None,
            layout: Layout::default(),
        }
    }

    pub fn init(&mut self) -> io::Result<()> {
        terminal::enable_raw_mode()?;
        execute!(
            self.writer,
            terminal::EnterAlternateScreen,
            EnableMouseCapture,
            cursor::Hide,
            SetBackgroundColor(Cell::BASE_BG),
            Clear(ClearType::All)
        )?;

        let (tw, th) = terminal::size().unwrap_or((80, 24));
        self.resize(tw as usize, th as usize);
        log::info!("terminal {}x{}", tw, th);

        Ok(())
    }

    pub fn cleanup(&mut self) -> io::Result<()> {
        execute!(
            self.writer,
            ResetColor,
            DisableMouseCapture,
            cursor::Show,
            terminal::LeaveAlternateScreen
        )?;
        terminal::disable_raw_mode()
    }

    fn resize(&mut self, w: usize, h: usize) {
        self.term_w = w;
        self.term_h = h;
        self.front.resize(w, h);
        self.back.resize(w, h);
        // Force full repaint: back ≠ front for every cell.
        self.back.cells.fill(Cell::INVALID);
    }

    pub fn render(&mut self, world: &mut WorldState) -> io::Result<()> {
        // Detect terminal resize
        let (tw, th) = terminal::size().unwrap_or((80, 24));
        if tw as usize != self.term_w || th as usize != self.term_h {
            self.resize(tw as usize, th as usize);
            queue!(self.writer, SetBackgroundColor(Cell::BASE_BG), Clear(ClearType::All))?;
        }

        // Screen change → clear for clean transition
        if self.last_screen != Some(world.screen) {
            self.back.cells.fill(Cell::INVALID);
            queue!(self.writer, SetBackgroundColor(Cell::BASE_BG), Clear(ClearType::All))?;
            self.last_screen = Some(world.screen);
        }

        self.compose(world);

        // Diff and emit
        self.flush_diff()?;

        // Swap: current front becomes next back
        std::mem::swap(&mut self.front, &mut self.back);

        Ok(())
    }

    /// What sits under terminal cell (col, row) in the last composed frame.
    pub fn hit_test(&self, col: u16, row: u16) -> Option<ClickTarget> {
        let (col, row) = (col as usize, row as usize);
        if let Some((gx, gy)) = self.layout.grid {
            if col >= gx && row >= gy {
                let (dx, dy) = (col - gx, row - gy);
                let (c, r) = (dx / GRID_CELL_W, dy / GRID_CELL_H);
                // The gap column between cells is not part of either
                if c < COLS && r < ROWS && dx % GRID_CELL_W < GRID_CELL_W - 1 {
                    return Some(ClickTarget::Cell { row: r, col: c });
                }
            }
        }
        if let Some((bx, by, bw, bh)) = self.layout.button {
            if col >= bx && col < bx + bw && row >= by && row < by + bh {
                return Some(ClickTarget::Button);
            }
        }
        None
    }

    /// Rows available to the play area.
    fn play_h(&self) -> usize {
        self.front.height.saturating_sub(PLAY_ROW + FOOTER_ROWS)
    }

    // ── Diff flush: only write changed cells ──

    fn flush_diff(&mut self) -> io::Result<()> {
        let mut last_fg = Color::White;
        let mut last_bg = Cell::BASE_BG;
        let mut need_move = true;
        let mut last_x: usize = 0;
        let mut last_y: usize = 0;

        // Explicit base colors at start of frame. ResetColor would fall back
        // to the terminal's own default, which may differ from BASE_BG.
        queue!(self.writer,
            SetForegroundColor(Color::White),
            SetBackgroundColor(Cell::BASE_BG),
        )?;

        for y in 0..self.front.height {
            for x in 0..self.front.width {
                let cell = self.front.get(x, y);
                if cell == self.back.get(x, y) {
                    need_move = true;
                    continue;
                }

                if need_move || x != last_x + 1 || y != last_y {
                    queue!(self.writer, MoveTo(x as u16, y as u16))?;
                    need_move = false;
                }
                if cell.fg != last_fg {
                    queue!(self.writer, SetForegroundColor(cell.fg))?;
                    last_fg = cell.fg;
                }
                if cell.bg != last_bg {
                    queue!(self.writer, SetBackgroundColor(cell.bg))?;
                    last_bg = cell.bg;
                }

                queue!(self.writer, Print(cell.ch))?;
                last_x = x;
                last_y = y;
            }
        }

        self.writer.flush()
    }

    // ── Compose: build front buffer content ──

    fn compose(&mut self, w: &mut WorldState) {
        self.front.clear();
        self.layout = Layout::default();

        // The Simon frame is read through the asset cache, which needs &mut.
        let frame: Option<Vec<String>> = match &w.simon {
            Some(simon) if w.screen == Screen::Game3 => {
                let index = simon.animation_frame;
                w.assets.frame(index).map(<[String]>::to_vec)
            }
            _ => None,
        };
        let w: &WorldState = w;

        self.compose_hud(w);
        match w.screen {
            Screen::Start => self.compose_start(w),
            Screen::Main => self.compose_main(w),
            Screen::Game1 => self.compose_grid(w),
            Screen::Game2 => match &w.game2 {
                Some(Game2::Mash(game)) => self.compose_mash(w, game),
                Some(Game2::Bounce(game)) => self.compose_bounce(w, game),
                None => {}
            },
            Screen::Game3 => {
                if let Some(simon) = &w.simon {
                    self.compose_simon(w, simon, frame.as_deref());
                }
            }
            Screen::End => self.compose_end(w),
        }
        self.compose_footer(w);

        // Pause overlay (drawn on top of everything)
        if w.paused {
            self.compose_pause_overlay(w);
        }
    }

    fn compose_hud(&mut self, w: &WorldState) {
        self.front.fill_row(HUD_ROW, HUD_BG);
        let secs_left = w.decay.ticks_remaining() as u64 * w.timing.decay_interval_ms / 1000;
        let hud = format!(
            " DECAY  ◈ {:<6}  Decay:{:>4}%  Stage {}  ~{}s left",
            w.screen.to_string(), w.decay.percent(), w.stage(), secs_left,
        );
        self.front.put_str(0, HUD_ROW, &hud, Color::White, HUD_BG);

        // Mini decay bar at the right edge
        let bar_w = 20;
        if self.front.width > hud.chars().count() + bar_w + 4 {
            let x = self.front.width - bar_w - 2;
            self.compose_decay_bar(w, x, HUD_ROW, bar_w, HUD_BG);
        }
    }

    fn compose_decay_bar(&mut self, w: &WorldState, x: usize, y: usize, width: usize, bg: Color) {
        let decay = w.decay.value();
        let filled = ((decay / 100.0) * width as f64).round() as usize;
        let fg = rgb(bar_color(decay));
        for i in 0..width {
            let (ch, c) = if i < filled { ('█', fg) } else { ('░', DIM) };
            self.front.set(x + i, y, Cell::from_char(ch, c, bg));
        }
    }

    fn compose_footer(&mut self, w: &WorldState) {
        let h = self.front.height;
        if h < PLAY_ROW + FOOTER_ROWS {
            return;
        }

        // ── Message bar ──
        let msg_row = h - FOOTER_ROWS;
        if !w.message.is_empty() {
            self.front.fill_row(msg_row, MSG_BG);
            let msg = format!(" ◈ {} ", w.message);
            self.front.put_str(0, msg_row, &msg, Color::Black, MSG_BG);
        }

        // ── Help bar ──
        let help = match w.screen {
            Screen::Start => " ENTER/Click: Begin   F1: Pause   Q/ESC: Quit",
            Screen::Main => " ENTER/Click: Random game   ESC: Reset   F1: Pause",
            Screen::Game1 => " ←→↑↓: Move  SPACE/Click: Restore cell  ESC: Back  F1: Pause",
            Screen::Game2 => match w.game2 {
                Some(Game2::Bounce(_)) => " ←→ / A D: Paddle   ESC: Back   F1: Pause",
                _ => " SPACE/Click: Press   ESC: Back   F1: Pause",
            },
            Screen::Game3 => " Letters: Type   SPACE: Start / Submit   ESC: Back   F1: Pause",
            Screen::End => " ENTER/Click: Restart now",
        };
        self.front.put_str(0, h - 1, help, Color::DarkGrey, Color::Reset);
    }

    // ── Start / End ──

    fn compose_glitches(&mut self, w: &WorldState, field: &GlitchField, stage: Stage) {
        let play_h = self.play_h();
        let width = self.front.width;
        for (i, g) in field.rects.iter().enumerate() {
            if !g.visible_at(w.clock_ms) {
                continue;
            }
            let color = rgb(w.palette.color(stage, i % ROWS, (i * 5) % COLS));
            let x = (g.x * width as f32) as usize;
            let y = PLAY_ROW + (g.y * play_h as f32) as usize;
            let gw = ((g.w * width as f32) as usize).max(1);
            let gh = ((g.h * play_h as f32) as usize).max(1);
            let ch = if i % 3 == 0 { '▓' } else { '░' };
            self.front.fill_rect(x, y, gw, gh.min(play_h), ch, color, Color::Reset);
        }
    }

    fn compose_title(&mut self, y: usize, color: Color) {
        for (i, line) in TITLE.iter().enumerate() {
            self.front.put_centered(y + i, line, color, Color::Reset);
        }
    }

    fn compose_rain(&mut self, w: &WorldState) {
        let play_h = self.play_h();
        let width = self.front.width;
        if play_h == 0 || width == 0 {
            return;
        }
        let stage = w.stage();
        for (i, c) in w.rain.chars.iter().enumerate() {
            let Some(t) = c.y_at(w.clock_ms) else { continue };
            let x = ((c.x * width as f32) as usize).min(width - 1);
            let y = PLAY_ROW + ((t * play_h as f32) as usize).min(play_h - 1);
            let color = rgb(w.palette.color(stage, i % ROWS, i % COLS).scaled(1.0 - 0.6 * t));
            self.front.set(x, y, Cell::from_char(c.ch, color, Color::Reset));
        }
        for d in &w.rain.dots {
            let glow = d.glow_at(w.clock_ms);
            if glow <= 0.05 {
                continue;
            }
            let x = ((d.x * width as f32) as usize).min(width - 1);
            let y = PLAY_ROW + ((d.y * play_h as f32) as usize).min(play_h - 1);
            let ch = if glow > 0.6 { '•' } else { '·' };
            let color = rgb(Rgb::new(200, 200, 210).scaled(glow));
            self.front.set(x, y, Cell::from_char(ch, color, Color::Reset));
        }
    }

    fn compose_start(&mut self, w: &WorldState) {
        self.compose_rain(w);
        self.compose_glitches(w, &w.glitches, Stage::FIRST);

        // Title colour walks along the first palette row
        let col = ((w.clock_ms / 200) as usize) % COLS;
        let title_c = rgb(w.palette.color(w.stage(), 0, col));
        let top = PLAY_ROW + self.play_h().saturating_sub(TITLE.len() + 6) / 2;
        self.compose_title(top, title_c);

        let y = top + TITLE.len() + 2;
        self.front.put_centered(y, "Everything you see is slowly decaying.", Color::White, Color::Reset);
        let blink = (w.clock_ms / 500) % 2 == 0;
        if blink {
            self.front.put_centered(y + 2, "▸ Click or press ENTER to begin ◂", Color::Rgb { r: 80, g: 255, b: 80 }, Color::Reset);
        }
    }

    fn compose_end(&mut self, w: &WorldState) {
        self.compose_glitches(w, &w.glitches, Stage::LAST);

        let title_c = rgb(w.palette.color(Stage::LAST, 0, 0));
        let top = PLAY_ROW + self.play_h().saturating_sub(TITLE.len() + 6) / 2;
        self.compose_title(top, title_c);

        let y = top + TITLE.len() + 2;
        self.front.put_centered(y, "Everything has decayed.", Color::White, Color::Reset);
        if let Some(secs) = w.countdown {
            let text = format!("Restarting in {secs} s");
            self.front.put_centered(y + 2, &text, Color::Rgb { r: 255, g: 200, b: 50 }, Color::Reset);
        }
        self.front.put_centered(y + 3, "Click or press ENTER to restart now", DIM, Color::Reset);
    }

    // ── Main: floating objects + decay meter ──

    fn compose_main(&mut self, w: &WorldState) {
        let play_h = self.play_h();
        let width = self.front.width;

        // Meter block at the top of the play area
        let bar_w = 40.min(width.saturating_sub(12));
        let bar_x = width.saturating_sub(bar_w + 6) / 2;
        self.compose_decay_bar(w, bar_x, PLAY_ROW, bar_w, Color::Reset);
        let pct = format!("{:>3}%", w.decay.percent());
        self.front.put_str(bar_x + bar_w + 2, PLAY_ROW, &pct, rgb(bar_color(w.decay.value())), Color::Reset);
        let desc = w.palette.description(w.stage());
        if !desc.is_empty() {
            self.front.put_centered(PLAY_ROW + 1, desc, DIM, Color::Reset);
        }

        // Floaters live below the meter; farthest first
        let top = PLAY_ROW + 3;
        let field_h = play_h.saturating_sub(4);
        let mut order: Vec<usize> = (0..w.floaters.floaters.len()).collect();
        order.sort_by(|&a, &b| w.floaters.floaters[a].depth.total_cmp(&w.floaters.floaters[b].depth));

        for i in order {
            let f = &w.floaters.floaters[i];
            let Some(model) = w.assets.models.get(f.model) else { continue };
            let mw = model.width();
            let mh = model.lines.len();

            let tx = (f.x - RETIRE_X) / (SPAWN_X - RETIRE_X);
            let ty = (HALF_HEIGHT - f.y) / (2.0 * HALF_HEIGHT);
            let sx = (tx * width as f32) as i32 - mw as i32 / 2;
            let sy = top + (ty.clamp(0.0, 1.0) * field_h.saturating_sub(mh) as f32) as usize;

            let nearness = (f.depth + HALF_DEPTH) / (2.0 * HALF_DEPTH);
            let color = rgb(f.color.scaled(0.55 + 0.45 * nearness));
            let mirrored = f.spin.cos() < 0.0;

            for (ly, line) in model.lines.iter().enumerate() {
                let text = if mirrored { mirror_line(line, mw) } else { line.clone() };
                for (lx, ch) in text.chars().enumerate() {
                    let x = sx + lx as i32;
                    if ch == ' ' || x < 0 { continue; }
                    self.front.set(x as usize, sy + ly, Cell::from_char(ch, color, Color::Reset));
                }
            }

            // Label up and to the right, joined by a dashed leader
            let lx = sx + mw as i32 + 2;
            if lx < 1 || sy < top + 3 {
                continue;
            }
            let (lx, ly) = (lx as usize, sy - 3);
            self.front.set(lx - 1, ly + 3, Cell::from_char('╱', DIM, Color::Reset));
            self.front.set(lx, ly + 2, Cell::from_char('╌', DIM, Color::Reset));
            for (k, text) in f.label().iter().enumerate() {
                self.front.put_str(lx + 1, ly + k, text, Color::Rgb { r: 200, g: 200, b: 210 }, Color::Reset);
            }
        }

        let prompt_row = PLAY_ROW + play_h.saturating_sub(1);
        self.front.put_centered(prompt_row, "Click or press ENTER to play a game", Color::White, Color::Reset);
    }

    // ── Game 1: grid ──

    fn compose_grid(&mut self, w: &WorldState) {
        let Some(grid) = &w.grid else { return };
        let grid_w = COLS * GRID_CELL_W - 1;
        let gx = self.front.width.saturating_sub(grid_w) / 2;
        let gy = PLAY_ROW + 1;
        self.layout.grid = Some((gx, gy));

        let header = format!("Restore the cells before they decay   mean stage {:.2}", grid.mean_stage());
        self.front.put_centered(PLAY_ROW, &header, Color::White, Color::Reset);

        for r in 0..ROWS {
            for c in 0..COLS {
                let color = rgb(grid.cell_color(&w.palette, r, c));
                let x = gx + c * GRID_CELL_W;
                let y = gy + r * GRID_CELL_H;
                self.front.fill_rect(x, y, GRID_CELL_W - 1, GRID_CELL_H, ' ', Color::White, color);
                if grid.cursor == (r, c) {
                    self.front.set(x, y, Cell::from_char('▛', Color::White, color));
                    self.front.set(x + GRID_CELL_W - 2, y + GRID_CELL_H - 1, Cell::from_char('▟', Color::White, color));
                }
            }
        }
    }

    // ── Game 2: reaction button / bounce ──

    fn compose_field_frame(&mut self, vp: &Viewport) {
        for y in vp.y..vp.y + vp.h {
            self.front.set(vp.x.saturating_sub(1), y, Cell::from_char('│', FRAME_FG, Color::Reset));
            self.front.set(vp.x + vp.w, y, Cell::from_char('│', FRAME_FG, Color::Reset));
        }
    }

    fn compose_mash(&mut self, w: &WorldState, game: &MashGame) {
        let vp = Viewport::fit(self.front.width, PLAY_ROW, self.play_h().saturating_sub(1), mash::FIELD_W, mash::FIELD_H);
        self.compose_field_frame(&vp);

        // Button
        let b = &game.button;
        let (bx, by, bw, bh) = vp.rect(b.x, b.y, b.width, b.height);
        self.layout.button = Some((bx, by, bw, bh));
        let color = rgb(game.button_color(&w.palette));
        self.front.fill_rect(bx, by, bw, bh, ' ', Color::White, color);
        let label = "PRESS";
        let lx = bx + bw.saturating_sub(label.len()) / 2;
        self.front.put_str(lx, by + bh / 2, label, Color::Black, color);

        // Particles
        for p in &game.particles {
            if !vp.contains(vp.col(p.x), vp.row(p.y)) {
                continue;
            }
            let ch = if p.size >= 2.0 { '●' } else if p.size >= 1.0 { '•' } else { '·' };
            let c = rgb(p.color.scaled(p.opacity()));
            self.front.set(vp.col(p.x), vp.row(p.y), Cell::from_char(ch, c, Color::Reset));
        }

        // Reverse-speed meter under the field
        let y = vp.y + vp.h;
        let meter_w = 24;
        let filled = ((game.reverse_speed / MAX_REVERSE_SPEED) * meter_w as f32).round() as usize;
        let text = format!("Reverse {:.2}/{:.1}  Presses {}", game.reverse_speed, MAX_REVERSE_SPEED, game.click_count);
        self.front.put_str(vp.x, y, &text, Color::White, Color::Reset);
        let mx = vp.x + text.chars().count() + 2;
        for i in 0..meter_w {
            let (ch, c) = if i < filled { ('█', color) } else { ('░', DIM) };
            self.front.set(mx + i, y, Cell::from_char(ch, c, Color::Reset));
        }
    }

    fn compose_bounce(&mut self, w: &WorldState, game: &BounceGame) {
        let vp = Viewport::fit(self.front.width, PLAY_ROW, self.play_h().saturating_sub(1), bounce::FIELD_W, bounce::FIELD_H);
        self.compose_field_frame(&vp);

        for block in &game.blocks {
            let (x, y, bw, bh) = vp.rect(block.x, block.y, block.width, block.height);
            if !vp.contains(x, y) {
                continue;
            }
            let color = rgb(w.palette.color_for_decay(block.row, block.col, w.decay.value()));
            let ch = if block.bouncing { '▒' } else { '█' };
            for yy in y..(y + bh).min(vp.y + vp.h) {
                for xx in x..(x + bw).min(vp.x + vp.w) {
                    self.front.set(xx, yy, Cell::from_char(ch, color, Color::Reset));
                }
            }
        }

        let p = &game.paddle;
        let (px, py, pw, _) = vp.rect(p.x, p.y, p.width, p.height);
        let paddle_w = pw.min((vp.x + vp.w).saturating_sub(px));
        self.front.fill_rect(px, py.min(vp.y + vp.h - 1), paddle_w, 1, '▀', Color::White, Color::Reset);

        let text = format!("Caught {}   Missed {}", game.caught, game.missed);
        self.front.put_str(vp.x, vp.y + vp.h, &text, Color::White, Color::Reset);
    }

    // ── Game 3: Simon says ──

    fn compose_simon(&mut self, w: &WorldState, simon: &SimonGame, frame: Option<&[String]>) {
        let play_h = self.play_h();
        let stage_c = rgb(w.palette.color_for_decay(3, 6, w.decay.value()));

        // Dissolve animation as a dim backdrop
        if let Some(lines) = frame {
            let fh = lines.len().min(play_h);
            let top = PLAY_ROW + play_h.saturating_sub(fh) / 2;
            let backdrop = rgb(w.palette.color_for_decay(3, 6, w.decay.value()).scaled(0.45));
            for (i, line) in lines.iter().take(fh).enumerate() {
                self.front.put_centered(top + i, line, backdrop, Color::Reset);
            }
        }

        let info = format!("Level {}   Round {}", simon.level, simon.rounds);
        self.front.put_centered(PLAY_ROW, &info, Color::White, Color::Reset);

        let mid = PLAY_ROW + play_h / 2;
        match simon.phase {
            SimonPhase::ShowingSequence { shown } => {
                if let Some(instr) = simon.current_instruction() {
                    let text = format!("  {}  ", instr.text());
                    self.front.put_centered(mid, &text, Color::Black, stage_c);
                }
                let progress = format!("{} / {}", shown, simon.instructions.len());
                self.front.put_centered(mid + 2, &progress, DIM, Color::Reset);
            }
            SimonPhase::ShowingResult { verdict } => {
                let c = if verdict.is_correct() { Color::Rgb { r: 80, g: 255, b: 80 } } else { Color::Rgb { r: 255, g: 80, b: 80 } };
                self.front.put_centered(mid, verdict.message(), c, Color::Reset);
                self.front.put_centered(mid + 2, verdict.follow_up(), DIM, Color::Reset);
            }
            SimonPhase::WaitingForSpace | SimonPhase::WaitingForPlayer => {
                let status = simon.status_line();
                self.front.put_centered(mid, &status, Color::White, Color::Reset);
            }
        }
    }

    fn compose_pause_overlay(&mut self, w: &WorldState) {
        let bg = Color::Rgb { r: 40, g: 40, b: 40 };
        let hdr = Color::Rgb { r: 255, g: 220, b: 50 };
        let key_c = Color::Rgb { r: 100, g: 200, b: 255 };
        let blink = (w.clock_ms / 500) % 2 == 0;

        let box_w = 34.min(self.front.width);
        let box_h = 9.min(self.play_h());
        let box_x = self.front.width.saturating_sub(box_w) / 2;
        let box_y = PLAY_ROW + self.play_h().saturating_sub(box_h) / 2;
        self.front.fill_rect(box_x, box_y, box_w, box_h, ' ', Color::White, bg);

        let label = if blink { "▶  PAUSED  ◀" } else { "   PAUSED   " };
        self.front.put_str(box_x + (box_w.saturating_sub(12)) / 2, box_y + 1, label, hdr, bg);
        self.front.put_str(box_x + 3, box_y + 3, "F1     Resume", key_c, bg);
        self.front.put_str(box_x + 3, box_y + 4, "ESC    Back / Reset", key_c, bg);
        self.front.put_str(box_x + 3, box_y + 5, "Ctrl+C Quit", key_c, bg);
        let decay = format!("Decay held at {}%", w.decay.percent());
        self.front.put_str(box_x + 3, box_y + 7, &decay, DIM, bg);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::screen;

    fn sized(w: usize, h: usize) -> Renderer {
        let mut r = Renderer::new();
        r.front.resize(w, h);
        r.back.resize(w, h);
        r
    }

    fn row_text(r: &Renderer, y: usize) -> String {
        (0..r.front.width).map(|x| r.front.get(x, y).ch).collect()
    }

    #[test]
    fn viewport_scales_field_into_play_area() {
        let vp = Viewport::fit(120, 2, 20, 80.0, 40.0);
        assert_eq!((vp.w, vp.h), (80, 20));
        assert_eq!(vp.x, 20);
        assert_eq!(vp.col(0.0), 20);
        assert_eq!(vp.row(40.0), 22);
        assert_eq!(vp.rect(40.0, 20.0, 0.1, 10.0), (60, 12, 1, 5));
        assert!(vp.contains(99, 21));
        assert!(!vp.contains(100, 21));
    }

    #[test]
    fn grid_clicks_hit_cells_but_not_gaps() {
        let mut w = WorldState::for_test(1);
        let mut events = Vec::new();
        screen::show(&mut w, Screen::Game1, &mut events);

        let mut r = sized(100, 30);
        r.compose(&mut w);
        let (gx, gy) = r.layout.grid.unwrap();

        assert_eq!(r.hit_test(gx as u16, gy as u16), Some(ClickTarget::Cell { row: 0, col: 0 }));
        let x = gx + 2 * GRID_CELL_W + 1;
        let y = gy + 3 * GRID_CELL_H + 1;
        assert_eq!(r.hit_test(x as u16, y as u16), Some(ClickTarget::Cell { row: 3, col: 2 }));
        let gap = gx + GRID_CELL_W - 1;
        assert_eq!(r.hit_test(gap as u16, gy as u16), None);
        assert_eq!(r.hit_test(0, 0), None);
    }

    #[test]
    fn clicks_reach_the_button_only_inside_it() {
        let mut w = WorldState::for_test(2);
        w.tuning.game2 = crate::config::Game2Mode::Mash;
        let mut events = Vec::new();
        screen::show(&mut w, Screen::Game2, &mut events);

        let mut r = sized(120, 30);
        r.compose(&mut w);
        let (bx, by, bw, bh) = r.layout.button.unwrap();
        assert_eq!(r.hit_test((bx + bw / 2) as u16, (by + bh / 2) as u16), Some(ClickTarget::Button));
        assert_eq!(r.hit_test((bx + bw) as u16, by as u16), None);
        assert_eq!(r.hit_test(0, 1), None);
    }

    #[test]
    fn start_screen_shows_title_and_prompt() {
        let mut w = WorldState::for_test(3);
        let mut events = Vec::new();
        screen::show(&mut w, Screen::Start, &mut events);

        let mut r = sized(100, 30);
        r.compose(&mut w);
        assert!(row_text(&r, HUD_ROW).contains("DECAY"));
        assert!((0..30).any(|y| row_text(&r, y).contains("|____/")));
        assert!(r.layout.grid.is_none() && r.layout.button.is_none());
    }

    #[test]
    fn start_rain_is_drawn_behind_the_title() {
        let mut w = WorldState::for_test(4);
        let mut events = Vec::new();
        screen::show(&mut w, Screen::Start, &mut events);
        w.rain.clear();
        w.glitches.clear();
        w.rain.chars.push(screen::MatrixChar { ch: 'Z', x: 0.0, born_ms: 0, delay_ms: 0, fall_ms: 4000 });

        let mut r = sized(100, 30);
        r.compose(&mut w);
        assert_eq!(r.front.get(0, PLAY_ROW).ch, 'Z');

        // Still waiting out its delay: not drawn
        w.rain.chars[0].delay_ms = 1000;
        r.compose(&mut w);
        assert_ne!(r.front.get(0, PLAY_ROW).ch, 'Z');
    }

    #[test]
    fn mirrored_sprites_swap_slants() {
        assert_eq!(mirror_line("/_", 3), " _\\");
        assert_eq!(mirror_line("(", 2), " )");
    }
}
