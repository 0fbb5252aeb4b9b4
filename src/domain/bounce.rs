/// Game 2 (bounce variant): catch falling colour blocks with a paddle.
///
/// Coordinates are in field units (FIELD_W × FIELD_H, y grows downward);
/// the renderer scales them to whatever terminal area it has. Blocks carry
/// a (row, col) into the colour table, so their colour follows the global
/// decay while they fall.

use rand::Rng;

use super::palette::{COLS, ROWS};

pub const FIELD_W: f32 = 80.0;
pub const FIELD_H: f32 = 40.0;

pub const PADDLE_W: f32 = 12.0;
pub const PADDLE_H: f32 = 1.0;
/// Paddle speed in units per second.
pub const PADDLE_SPEED: f32 = 48.0;
/// Paddle top sits this far above the bottom edge.
pub const PADDLE_LIFT: f32 = 3.0;

pub const BLOCK_W: f32 = 5.0;
pub const BLOCK_H: f32 = 2.0;
/// Fall (and bounce) speed range in units per second.
pub const BLOCK_SPEED_MIN: f32 = 9.0;
pub const BLOCK_SPEED_MAX: f32 = 18.0;
/// Seconds between block spawns.
pub const SPAWN_EVERY: f32 = 1.0;
/// Longest physics slice in seconds. A falling block moves at most
/// BLOCK_SPEED_MAX * MAX_SUBSTEP per slice, well under the catch window.
pub const MAX_SUBSTEP: f32 = 0.02;

#[derive(Clone, Debug, PartialEq)]
pub struct Paddle {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Paddle {
    fn centered() -> Self {
        Paddle {
            x: FIELD_W / 2.0 - PADDLE_W / 2.0,
            y: FIELD_H - PADDLE_LIFT,
            width: PADDLE_W,
            height: PADDLE_H,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct FallingBlock {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub row: usize,
    pub col: usize,
    /// Vertical velocity; positive falls, negative rises after a bounce.
    pub vy: f32,
    pub bouncing: bool,
}

impl FallingBlock {
    fn overlaps(&self, p: &Paddle) -> bool {
        self.y + self.height >= p.y
            && self.x + self.width >= p.x
            && self.x <= p.x + p.width
            && self.y <= p.y + p.height
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BounceOutcome {
    /// A falling block hit the paddle and now rises.
    Caught { row: usize, col: usize },
    /// A falling block dropped past the bottom edge.
    Missed { row: usize, col: usize },
}

#[derive(Clone, Debug)]
pub struct BounceGame {
    pub paddle: Paddle,
    pub blocks: Vec<FallingBlock>,
    spawn_timer: f32,
    pub caught: u32,
    pub missed: u32,
}

impl BounceGame {
    pub fn new() -> Self {
        BounceGame {
            paddle: Paddle::centered(),
            blocks: Vec::new(),
            spawn_timer: 0.0,
            caught: 0,
            missed: 0,
        }
    }

    /// Move the paddle by `steer` (-1 left, 0 still, 1 right) for `dt` seconds.
    pub fn steer(&mut self, steer: i8, dt: f32) {
        let dx = steer.signum() as f32 * PADDLE_SPEED * dt;
        self.paddle.x = (self.paddle.x + dx).clamp(0.0, FIELD_W - self.paddle.width);
    }

    pub fn spawn<R: Rng>(&mut self, rng: &mut R) {
        self.blocks.push(FallingBlock {
            x: rng.random_range(0.0..FIELD_W - BLOCK_W),
            y: -BLOCK_H,
            width: BLOCK_W,
            height: BLOCK_H,
            row: rng.random_range(0..ROWS),
            col: rng.random_range(0..COLS),
            vy: rng.random_range(BLOCK_SPEED_MIN..BLOCK_SPEED_MAX),
            bouncing: false,
        });
    }

    /// Advance by `dt` seconds in slices of at most MAX_SUBSTEP, so a long
    /// frame cannot carry a block through the paddle. Outcomes are returned
    /// in the order they happened.
    pub fn tick<R: Rng>(&mut self, dt: f32, steer: i8, rng: &mut R) -> Vec<BounceOutcome> {
        let mut outcomes = Vec::new();
        let dt = dt.max(0.0);
        if dt == 0.0 {
            return outcomes;
        }
        let slices = (dt / MAX_SUBSTEP).ceil().max(1.0) as u32;
        let h = dt / slices as f32;
        for _ in 0..slices {
            self.substep(h, steer, rng, &mut outcomes);
        }
        outcomes
    }

    /// One slice: paddle, spawning, block motion and paddle/edge resolution.
    fn substep<R: Rng>(&mut self, dt: f32, steer: i8, rng: &mut R, outcomes: &mut Vec<BounceOutcome>) {
        self.steer(steer, dt);

        self.spawn_timer += dt;
        while self.spawn_timer >= SPAWN_EVERY {
            self.spawn_timer -= SPAWN_EVERY;
            self.spawn(rng);
        }

        let first_new = outcomes.len();
        let paddle = self.paddle.clone();
        let mut kept = Vec::with_capacity(self.blocks.len());

        for mut block in self.blocks.drain(..) {
            block.y += block.vy * dt;

            if !block.bouncing && block.vy > 0.0 && block.overlaps(&paddle) {
                block.bouncing = true;
                block.vy = -rng.random_range(BLOCK_SPEED_MIN..BLOCK_SPEED_MAX);
                outcomes.push(BounceOutcome::Caught { row: block.row, col: block.col });
                kept.push(block);
                continue;
            }

            if block.bouncing && block.y < -block.height {
                continue;
            }

            if !block.bouncing && block.y > FIELD_H {
                outcomes.push(BounceOutcome::Missed { row: block.row, col: block.col });
                continue;
            }

            kept.push(block);
        }
        self.blocks = kept;

        for outcome in &outcomes[first_new..] {
            match outcome {
                BounceOutcome::Caught { .. } => self.caught += 1,
                BounceOutcome::Missed { .. } => self.missed += 1,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_pcg::Pcg32;

    fn block_at(x: f32, y: f32, vy: f32) -> FallingBlock {
        FallingBlock {
            x, y,
            width: BLOCK_W,
            height: BLOCK_H,
            row: 2,
            col: 9,
            vy,
            bouncing: false,
        }
    }

    #[test]
    fn paddle_clamps_to_field() {
        let mut g = BounceGame::new();
        g.steer(-1, 10.0);
        assert_eq!(g.paddle.x, 0.0);
        g.steer(1, 10.0);
        assert_eq!(g.paddle.x, FIELD_W - PADDLE_W);
    }

    #[test]
    fn spawns_one_block_per_second() {
        let mut rng = Pcg32::seed_from_u64(1);
        let mut g = BounceGame::new();
        g.tick(0.5, 0, &mut rng);
        assert!(g.blocks.is_empty());
        g.tick(0.51, 0, &mut rng);
        assert_eq!(g.blocks.len(), 1);
        let b = &g.blocks[0];
        assert!(b.row < ROWS && b.col < COLS);
        assert!(b.x >= 0.0 && b.x + b.width <= FIELD_W);
    }

    #[test]
    fn caught_block_bounces_up() {
        let mut rng = Pcg32::seed_from_u64(2);
        let mut g = BounceGame::new();
        let px = g.paddle.x;
        g.blocks.push(block_at(px + 2.0, g.paddle.y - BLOCK_H - 0.1, 10.0));

        let out = g.tick(0.05, 0, &mut rng);
        assert_eq!(out, vec![BounceOutcome::Caught { row: 2, col: 9 }]);
        assert!(g.blocks[0].bouncing);
        assert!(g.blocks[0].vy < 0.0);
        assert_eq!(g.caught, 1);

        // A rising block is not caught again
        let out = g.tick(0.05, 0, &mut rng);
        assert!(out.is_empty());
    }

    #[test]
    fn missed_block_reports_and_disappears() {
        let mut rng = Pcg32::seed_from_u64(3);
        let mut g = BounceGame::new();
        // Far from the paddle, about to leave the bottom
        g.paddle.x = 0.0;
        g.blocks.push(block_at(70.0, FIELD_H - 0.1, 10.0));
        let out = g.tick(0.05, 0, &mut rng);
        assert_eq!(out, vec![BounceOutcome::Missed { row: 2, col: 9 }]);
        assert!(g.blocks.is_empty());
        assert_eq!(g.missed, 1);
    }

    #[test]
    fn long_frame_still_catches_block_over_paddle() {
        let mut rng = Pcg32::seed_from_u64(5);
        let mut g = BounceGame::new();
        let px = g.paddle.x;
        g.blocks.push(block_at(px + 3.0, 20.0, 15.0));

        let out = g.tick(2.0, 0, &mut rng);
        assert!(out.contains(&BounceOutcome::Caught { row: 2, col: 9 }), "outcomes {out:?}");
        assert!(!out.contains(&BounceOutcome::Missed { row: 2, col: 9 }));
        assert_eq!(g.missed, 0);
    }

    #[test]
    fn blocks_spawned_during_a_stall_keep_falling() {
        let mut rng = Pcg32::seed_from_u64(6);
        let mut g = BounceGame::new();
        let out = g.tick(3.1, 0, &mut rng);
        // Spawned at 1, 2 and 3 s; the oldest has fallen for 2.1 s at most
        assert_eq!(g.blocks.len(), 3);
        assert!(out.iter().all(|o| !matches!(o, BounceOutcome::Missed { .. })));
    }

    #[test]
    fn bounced_block_leaves_through_top() {
        let mut rng = Pcg32::seed_from_u64(4);
        let mut g = BounceGame::new();
        let mut b = block_at(10.0, -BLOCK_H + 0.1, -10.0);
        b.bouncing = true;
        g.blocks.push(b);
        let out = g.tick(0.05, 0, &mut rng);
        assert!(out.is_empty());
        assert!(g.blocks.is_empty());
    }
}
