/// Game 3: "Computer says".
///
/// A round shows a short key sequence one instruction at a time. Only the
/// instructions prefixed with "Computer says" should be typed back, in
/// order. Timing (1.5 s per instruction, 0.5 s auto-check delay, 2.5 s
/// result display) is driven by the scheduler; this module only holds the
/// state machine and the judgement.

use rand::seq::IndexedRandom;
use rand::Rng;

pub const SEQUENCES: [&str; 6] = ["was", "qer", "asdf", "zxc", "wwss", "adad"];
pub const COMPUTER_SAYS_CHANCE: f64 = 0.7;

pub const INSTRUCTION_MS: u64 = 1500;
pub const CHECK_DELAY_MS: u64 = 500;
pub const RESULT_MS: u64 = 2500;

/// Animation frames run DISSOLVE0001_10000 .. DISSOLVE0001_11381.
pub const FIRST_FRAME: u32 = 10000;
pub const FRAME_SPAN: f64 = 1381.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Instruction {
    pub key: char,
    pub computer_says: bool,
}

impl Instruction {
    pub fn text(&self) -> String {
        let key = self.key.to_ascii_uppercase();
        if self.computer_says {
            format!("Computer says press \"{key}\"")
        } else {
            format!("Press \"{key}\"")
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Verdict {
    Correct,
    /// Keys typed although nothing was asked for.
    WrongUnprompted,
    WrongMissed,
    WrongTooMany,
    WrongSequence,
}

impl Verdict {
    pub fn is_correct(self) -> bool {
        self == Verdict::Correct
    }

    /// Signed decay adjustment for this verdict.
    pub fn decay_delta(self, reward: f64) -> f64 {
        if self.is_correct() { reward } else { -reward }
    }

    pub fn message(self) -> &'static str {
        match self {
            Verdict::Correct => "Correct! Well done!",
            Verdict::WrongUnprompted => "Wrong! Computer didn't say to do that!",
            Verdict::WrongMissed => "Wrong! You missed some keys.",
            Verdict::WrongTooMany => "Wrong! You pressed too many keys.",
            Verdict::WrongSequence => "Wrong sequence! Try again!",
        }
    }

    pub fn follow_up(self) -> &'static str {
        if self.is_correct() {
            "Level complete! Next level starting soon..."
        } else {
            "Incorrect. Try again with a new sequence..."
        }
    }
}

/// Compare what was typed against the expected computer-says keys.
pub fn judge(expected: &[char], typed: &[char]) -> Verdict {
    if expected.is_empty() {
        return if typed.is_empty() { Verdict::Correct } else { Verdict::WrongUnprompted };
    }
    if typed.len() < expected.len() {
        Verdict::WrongMissed
    } else if typed.len() > expected.len() {
        Verdict::WrongTooMany
    } else if typed != expected {
        Verdict::WrongSequence
    } else {
        Verdict::Correct
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SimonPhase {
    /// `shown` instructions have been displayed so far.
    ShowingSequence { shown: usize },
    WaitingForSpace,
    WaitingForPlayer,
    ShowingResult { verdict: Verdict },
}

/// What a Space press did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SpaceAction {
    StartInput,
    Submit,
    Ignored,
}

#[derive(Clone, Debug)]
pub struct SimonGame {
    pub phase: SimonPhase,
    pub instructions: Vec<Instruction>,
    pub expected: Vec<char>,
    pub typed: Vec<char>,
    pub level: u32,
    pub rounds: u32,
    /// Fixed for the whole round.
    pub animation_frame: u32,
}

impl SimonGame {
    pub fn new() -> Self {
        SimonGame {
            phase: SimonPhase::ShowingSequence { shown: 0 },
            instructions: Vec::new(),
            expected: Vec::new(),
            typed: Vec::new(),
            level: 1,
            rounds: 0,
            animation_frame: FIRST_FRAME,
        }
    }

    pub fn frame_for_decay(decay: f64) -> u32 {
        let offset = ((1.0 - decay / 100.0) * FRAME_SPAN).floor();
        if offset.is_nan() {
            return FIRST_FRAME;
        }
        FIRST_FRAME + offset.clamp(0.0, FRAME_SPAN) as u32
    }

    /// Pick a sequence and mark each key computer-says with p = 0.7.
    pub fn start_round<R: Rng>(&mut self, rng: &mut R, decay: f64) {
        let seq = SEQUENCES.choose(rng).copied().unwrap_or(SEQUENCES[0]);
        let instructions = seq
            .chars()
            .map(|key| Instruction { key, computer_says: rng.random_bool(COMPUTER_SAYS_CHANCE) })
            .collect();
        self.load_round(instructions, decay);
    }

    /// Start a round from a fixed instruction list.
    pub fn load_round(&mut self, mut instructions: Vec<Instruction>, decay: f64) {
        if !instructions.iter().any(|i| i.computer_says) {
            if let Some(first) = instructions.first_mut() {
                first.computer_says = true;
            }
        }
        self.expected = instructions.iter().filter(|i| i.computer_says).map(|i| i.key).collect();
        self.instructions = instructions;
        self.typed.clear();
        self.phase = SimonPhase::ShowingSequence { shown: 0 };
        self.animation_frame = SimonGame::frame_for_decay(decay);
        self.rounds += 1;
        log::debug!(
            "simon round {}: {:?}, expecting {:?}",
            self.rounds,
            self.instructions.iter().map(|i| i.key).collect::<String>(),
            self.expected
        );
    }

    /// Show the next instruction. Returns it, or None once the whole
    /// sequence has been shown and the game waits for Space.
    pub fn advance_instruction(&mut self) -> Option<Instruction> {
        let SimonPhase::ShowingSequence { shown } = self.phase else {
            return None;
        };
        match self.instructions.get(shown).copied() {
            Some(instr) => {
                self.phase = SimonPhase::ShowingSequence { shown: shown + 1 };
                Some(instr)
            }
            None => {
                self.phase = SimonPhase::WaitingForSpace;
                None
            }
        }
    }

    /// Instruction currently on screen, if any.
    pub fn current_instruction(&self) -> Option<Instruction> {
        match self.phase {
            SimonPhase::ShowingSequence { shown } if shown > 0 => self.instructions.get(shown - 1).copied(),
            _ => None,
        }
    }

    pub fn press_space(&mut self) -> SpaceAction {
        match self.phase {
            SimonPhase::WaitingForSpace => {
                self.typed.clear();
                self.phase = SimonPhase::WaitingForPlayer;
                SpaceAction::StartInput
            }
            SimonPhase::WaitingForPlayer => SpaceAction::Submit,
            _ => SpaceAction::Ignored,
        }
    }

    /// Record a typed letter. Returns true when an automatic check should
    /// be scheduled.
    pub fn type_key(&mut self, key: char) -> bool {
        if self.phase != SimonPhase::WaitingForPlayer || !key.is_ascii_alphabetic() {
            return false;
        }
        self.typed.push(key.to_ascii_lowercase());
        self.expected.is_empty() || self.typed.len() == self.expected.len()
    }

    /// Judge the typed keys. Ignored (None) unless waiting for the player,
    /// so a late auto-check never judges twice.
    pub fn check(&mut self) -> Option<Verdict> {
        if self.phase != SimonPhase::WaitingForPlayer {
            return None;
        }
        let verdict = judge(&self.expected, &self.typed);
        if verdict.is_correct() {
            self.level += 1;
        } else {
            self.level = 1;
        }
        self.phase = SimonPhase::ShowingResult { verdict };
        Some(verdict)
    }

    pub fn status_line(&self) -> String {
        match self.phase {
            SimonPhase::ShowingSequence { .. } => String::new(),
            SimonPhase::WaitingForSpace => "Press SPACE when you have remembered the sequence".into(),
            SimonPhase::WaitingForPlayer if self.typed.is_empty() => {
                if self.expected.is_empty() {
                    "Waiting for your input... (Hint: Were there any 'Computer says' instructions?)".into()
                } else {
                    "Waiting for your input... Press SPACE when done.".into()
                }
            }
            SimonPhase::WaitingForPlayer => {
                let keys: Vec<String> = self.typed.iter().map(|k| k.to_ascii_uppercase().to_string()).collect();
                format!("You typed: {}", keys.join(" "))
            }
            SimonPhase::ShowingResult { verdict } => verdict.message().into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_pcg::Pcg32;

    fn says(key: char) -> Instruction {
        Instruction { key, computer_says: true }
    }

    fn plain(key: char) -> Instruction {
        Instruction { key, computer_says: false }
    }

    fn ready(instructions: Vec<Instruction>) -> SimonGame {
        let mut g = SimonGame::new();
        g.load_round(instructions, 100.0);
        while g.advance_instruction().is_some() {}
        assert_eq!(g.press_space(), SpaceAction::StartInput);
        g
    }

    #[test]
    fn judge_cases() {
        assert_eq!(judge(&[], &[]), Verdict::Correct);
        assert_eq!(judge(&[], &['a']), Verdict::WrongUnprompted);
        assert_eq!(judge(&['w', 's'], &['w']), Verdict::WrongMissed);
        assert_eq!(judge(&['w', 's'], &['w', 's', 's']), Verdict::WrongTooMany);
        assert_eq!(judge(&['w', 's'], &['s', 'w']), Verdict::WrongSequence);
        assert_eq!(judge(&['w', 's'], &['w', 's']), Verdict::Correct);
    }

    #[test]
    fn at_least_one_key_is_expected() {
        let mut g = SimonGame::new();
        g.load_round(vec![plain('z'), plain('x'), plain('c')], 100.0);
        assert_eq!(g.expected, vec!['z']);
        assert!(g.instructions[0].computer_says);
    }

    #[test]
    fn random_rounds_use_known_sequences() {
        let mut rng = Pcg32::seed_from_u64(5);
        let mut g = SimonGame::new();
        for _ in 0..20 {
            g.start_round(&mut rng, 60.0);
            let keys: String = g.instructions.iter().map(|i| i.key).collect();
            assert!(SEQUENCES.contains(&keys.as_str()));
            assert!(!g.expected.is_empty());
        }
        assert_eq!(g.rounds, 20);
    }

    #[test]
    fn sequence_then_space_then_input() {
        let mut g = SimonGame::new();
        g.load_round(vec![says('a'), plain('d')], 100.0);
        assert_eq!(g.press_space(), SpaceAction::Ignored);
        assert_eq!(g.advance_instruction(), Some(says('a')));
        assert_eq!(g.current_instruction(), Some(says('a')));
        assert_eq!(g.advance_instruction(), Some(plain('d')));
        assert_eq!(g.advance_instruction(), None);
        assert_eq!(g.phase, SimonPhase::WaitingForSpace);
        // Typing before Space does nothing
        assert!(!g.type_key('a'));
        assert_eq!(g.press_space(), SpaceAction::StartInput);
        assert_eq!(g.phase, SimonPhase::WaitingForPlayer);
    }

    #[test]
    fn auto_check_when_count_reached() {
        let mut g = ready(vec![says('w'), plain('a'), says('s')]);
        assert!(!g.type_key('w'));
        assert!(g.type_key('S'));
        assert_eq!(g.typed, vec!['w', 's']);
        assert_eq!(g.check(), Some(Verdict::Correct));
        assert_eq!(g.level, 2);
    }

    #[test]
    fn wrong_answer_resets_level() {
        let mut g = ready(vec![says('q')]);
        g.level = 4;
        g.type_key('e');
        assert_eq!(g.check(), Some(Verdict::WrongSequence));
        assert_eq!(g.level, 1);
        assert_eq!(g.status_line(), Verdict::WrongSequence.message());
    }

    #[test]
    fn check_outside_input_phase_is_ignored() {
        let mut g = ready(vec![says('q')]);
        g.type_key('q');
        assert!(g.check().is_some());
        // A second pending check fires after the result is already shown
        assert_eq!(g.check(), None);
        assert_eq!(g.level, 2);
    }

    #[test]
    fn space_submits_early() {
        let mut g = ready(vec![says('a'), says('s')]);
        g.type_key('a');
        assert_eq!(g.press_space(), SpaceAction::Submit);
        assert_eq!(g.check(), Some(Verdict::WrongMissed));
    }

    #[test]
    fn reward_sign_follows_verdict() {
        assert_eq!(Verdict::Correct.decay_delta(5.0), 5.0);
        assert_eq!(Verdict::WrongTooMany.decay_delta(5.0), -5.0);
    }

    #[test]
    fn frame_tracks_decay() {
        assert_eq!(SimonGame::frame_for_decay(100.0), 10000);
        assert_eq!(SimonGame::frame_for_decay(0.0), 11381);
        assert_eq!(SimonGame::frame_for_decay(50.0), 10690);
    }
}
