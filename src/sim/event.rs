/// Events emitted during a simulation step.
/// The presentation layer consumes these for sound; main logs them.

use crate::domain::mash::PressKind;
use crate::domain::palette::Stage;
use crate::domain::simon::{Instruction, Verdict};
use super::screen::Screen;

#[derive(Clone, Debug, PartialEq)]
pub enum GameEvent {
    ScreenChanged { from: Screen, to: Screen },
    StageChanged { from: Stage, to: Stage },
    DecayDepleted,
    CellRejuvenated { row: usize, col: usize },
    BlockCaught { row: usize, col: usize },
    BlockMissed { row: usize, col: usize },
    ButtonPressed { kind: PressKind },
    SimonInstruction(Instruction),
    SimonInputOpen,
    SimonKey(char),
    SimonVerdict(Verdict),
    FloaterSpawned { row: usize, col: usize },
    FloatersRetired(usize),
    CountdownTick(u32),
    GameReset,
}
