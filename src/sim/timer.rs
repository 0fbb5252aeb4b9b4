/// Timer scheduler: interval and one-shot timers advanced by elapsed time.
///
/// Every timer has an owner. Screen-owned timers are cancelled when that
/// screen is torn down; the decay tick is owned globally and is started and
/// stopped explicitly. `advance()` never calls back into the world: it
/// returns what fired, and the step function dispatches.

use super::screen::Screen;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TimerKind {
    DecayTick,
    GridUpdate,
    FloaterSpawn,
    EndCountdown,
    SimonInstruction,
    SimonCheck,
    SimonResult,
    Glitch,
    MatrixChar,
    DotParticle,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Owner {
    Global,
    Screen(Screen),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimerId(u64);

#[derive(Clone, Debug)]
struct Entry {
    id: TimerId,
    kind: TimerKind,
    owner: Owner,
    /// Some(period) repeats, None fires once.
    period_ms: Option<u64>,
    /// Time left until the next firing.
    remaining_ms: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Fired {
    pub id: TimerId,
    pub kind: TimerKind,
    pub owner: Owner,
}

#[derive(Clone, Debug, Default)]
pub struct Scheduler {
    entries: Vec<Entry>,
    next_id: u64,
}

impl Scheduler {
    pub fn new() -> Self {
        Scheduler::default()
    }

    /// Repeating timer; first fires one period from now.
    pub fn every(&mut self, kind: TimerKind, owner: Owner, period_ms: u64) -> TimerId {
        let period = period_ms.max(1);
        self.push(kind, owner, Some(period), period)
    }

    /// Repeating timer whose first firing comes after `first_ms`.
    pub fn every_after(&mut self, kind: TimerKind, owner: Owner, first_ms: u64, period_ms: u64) -> TimerId {
        self.push(kind, owner, Some(period_ms.max(1)), first_ms)
    }

    pub fn after(&mut self, kind: TimerKind, owner: Owner, delay_ms: u64) -> TimerId {
        self.push(kind, owner, None, delay_ms)
    }

    fn push(&mut self, kind: TimerKind, owner: Owner, period_ms: Option<u64>, first_ms: u64) -> TimerId {
        self.next_id += 1;
        let id = TimerId(self.next_id);
        self.entries.push(Entry { id, kind, owner, period_ms, remaining_ms: first_ms });
        id
    }

    pub fn cancel(&mut self, id: TimerId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| e.id != id);
        self.entries.len() != before
    }

    pub fn cancel_kind(&mut self, kind: TimerKind) -> usize {
        let before = self.entries.len();
        self.entries.retain(|e| e.kind != kind);
        before - self.entries.len()
    }

    pub fn cancel_owned_by(&mut self, screen: Screen) -> usize {
        let before = self.entries.len();
        self.entries.retain(|e| e.owner != Owner::Screen(screen));
        before - self.entries.len()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn is_scheduled(&self, kind: TimerKind) -> bool {
        self.entries.iter().any(|e| e.kind == kind)
    }

    #[cfg(test)]
    pub fn is_live(&self, id: TimerId) -> bool {
        self.entries.iter().any(|e| e.id == id)
    }

    #[cfg(test)]
    pub fn count_owned_by(&self, screen: Screen) -> usize {
        self.entries.iter().filter(|e| e.owner == Owner::Screen(screen)).count()
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Milliseconds until `kind` next fires, if scheduled.
    #[cfg(test)]
    pub fn remaining(&self, kind: TimerKind) -> Option<u64> {
        self.entries.iter().filter(|e| e.kind == kind).map(|e| e.remaining_ms).min()
    }

    /// Move time forward. Returns everything that came due, ordered by due
    /// time and then by creation order. Intervals fire once per elapsed
    /// period; one-shots are removed.
    pub fn advance(&mut self, elapsed_ms: u64) -> Vec<Fired> {
        let mut due: Vec<(u64, TimerId, Fired)> = Vec::new();

        for entry in self.entries.iter_mut() {
            let fired = Fired { id: entry.id, kind: entry.kind, owner: entry.owner };
            let mut at = entry.remaining_ms;
            match entry.period_ms {
                Some(period) => {
                    while at <= elapsed_ms {
                        due.push((at, entry.id, fired));
                        at += period;
                    }
                    entry.remaining_ms = at - elapsed_ms;
                }
                None => {
                    if at <= elapsed_ms {
                        due.push((at, entry.id, fired));
                        entry.remaining_ms = 0;
                    } else {
                        entry.remaining_ms = at - elapsed_ms;
                    }
                }
            }
        }

        // Drop one-shots that fired
        let fired_once: Vec<TimerId> = due.iter().map(|(_, id, _)| *id).collect();
        self.entries
            .retain(|e| e.period_ms.is_some() || !fired_once.contains(&e.id));

        due.sort_by_key(|(at, id, _)| (*at, *id));
        due.into_iter().map(|(_, _, f)| f).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interval_fires_each_period() {
        let mut s = Scheduler::new();
        s.every(TimerKind::DecayTick, Owner::Global, 100);
        assert!(s.advance(99).is_empty());
        assert_eq!(s.advance(1).len(), 1);
        // Several periods in one step
        let fired = s.advance(350);
        assert_eq!(fired.len(), 3);
        assert_eq!(s.remaining(TimerKind::DecayTick), Some(50));
        assert!(s.is_scheduled(TimerKind::DecayTick));
    }

    #[test]
    fn one_shot_fires_once() {
        let mut s = Scheduler::new();
        let id = s.after(TimerKind::SimonCheck, Owner::Screen(Screen::Game3), 500);
        assert!(s.advance(499).is_empty());
        let fired = s.advance(10);
        assert_eq!(fired, vec![Fired { id, kind: TimerKind::SimonCheck, owner: Owner::Screen(Screen::Game3) }]);
        assert!(!s.is_live(id));
        assert!(s.advance(10_000).is_empty());
    }

    #[test]
    fn fires_in_due_order() {
        let mut s = Scheduler::new();
        s.after(TimerKind::SimonResult, Owner::Screen(Screen::Game3), 300);
        s.every(TimerKind::GridUpdate, Owner::Screen(Screen::Game1), 100);
        s.after(TimerKind::SimonCheck, Owner::Screen(Screen::Game3), 150);
        let kinds: Vec<TimerKind> = s.advance(300).into_iter().map(|f| f.kind).collect();
        assert_eq!(
            kinds,
            vec![
                TimerKind::GridUpdate,  // 100
                TimerKind::SimonCheck,  // 150
                TimerKind::GridUpdate,  // 200
                TimerKind::SimonResult, // 300, created first
                TimerKind::GridUpdate,  // 300
            ]
        );
    }

    #[test]
    fn delayed_interval() {
        let mut s = Scheduler::new();
        s.every_after(TimerKind::FloaterSpawn, Owner::Screen(Screen::Main), 3000, 2000);
        assert!(s.advance(2999).is_empty());
        assert_eq!(s.advance(1).len(), 1);
        assert!(s.advance(1999).is_empty());
        assert_eq!(s.advance(1).len(), 1);
    }

    #[test]
    fn cancel_by_owner_and_kind() {
        let mut s = Scheduler::new();
        s.every(TimerKind::DecayTick, Owner::Global, 100);
        s.every(TimerKind::GridUpdate, Owner::Screen(Screen::Game1), 100);
        s.after(TimerKind::SimonInstruction, Owner::Screen(Screen::Game3), 1500);
        s.after(TimerKind::SimonResult, Owner::Screen(Screen::Game3), 2500);

        assert_eq!(s.count_owned_by(Screen::Game3), 2);
        assert_eq!(s.cancel_owned_by(Screen::Game3), 2);
        assert_eq!(s.count_owned_by(Screen::Game3), 0);
        assert_eq!(s.cancel_kind(TimerKind::DecayTick), 1);
        assert_eq!(s.len(), 1);
        assert!(s.is_scheduled(TimerKind::GridUpdate));
    }

    #[test]
    fn zero_period_does_not_spin() {
        let mut s = Scheduler::new();
        s.every(TimerKind::Glitch, Owner::Global, 0);
        assert_eq!(s.advance(5).len(), 5);
    }
}
