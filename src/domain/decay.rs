/// Decay level: the one shared percentage of the whole piece.
///
/// Everything on screen is coloured from it, the decay timer drains it and
/// every mini-game pushes it up or down. All writes go through `adjust()`,
/// `tick()` or `reset()`, which clamp into [0, 100] and then notify the
/// registered observers in registration order.

use std::fmt;

pub const FULL: f64 = 100.0;
pub const EMPTY: f64 = 0.0;

/// Default decrement per decay tick: 100 % over 1050 ticks of 100 ms.
pub const DEFAULT_STEP: f64 = 100.0 / 1050.0;

/// Levels this close to zero are treated as fully decayed. Repeatedly
/// subtracting 100/1050 leaves float residue instead of an exact 0.
const SNAP_EPSILON: f64 = 1e-9;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DecayCause {
    Tick,
    Adjust,
    Reset,
}

/// One observed write: level before and after, and who wrote it.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DecayChange {
    pub old: f64,
    pub new: f64,
    pub cause: DecayCause,
}

type Observer = Box<dyn FnMut(&DecayChange)>;

pub struct DecayLevel {
    value: f64,
    step: f64,
    observers: Vec<Observer>,
}

impl fmt::Debug for DecayLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecayLevel")
            .field("value", &self.value)
            .field("step", &self.step)
            .field("observers", &self.observers.len())
            .finish()
    }
}

impl DecayLevel {
    pub fn new(step: f64) -> Self {
        let step = if step.is_finite() && step > 0.0 { step } else { DEFAULT_STEP };
        DecayLevel { value: FULL, step, observers: Vec::new() }
    }

    /// Per-tick decrement so that a full bar drains in `duration_secs`
    /// when ticked every `interval_ms`.
    pub fn step_for(interval_ms: u64, duration_secs: f64) -> f64 {
        if interval_ms == 0 || !(duration_secs > 0.0) {
            return DEFAULT_STEP;
        }
        let ticks = duration_secs * 1000.0 / interval_ms as f64;
        FULL / ticks
    }

    #[inline]
    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn step(&self) -> f64 {
        self.step
    }

    /// Rounded percentage for display.
    pub fn percent(&self) -> u32 {
        self.value.round() as u32
    }

    pub fn is_depleted(&self) -> bool {
        self.value <= EMPTY
    }

    /// Register an observer; it sees every subsequent change.
    pub fn subscribe<F>(&mut self, observer: F)
    where
        F: FnMut(&DecayChange) + 'static,
    {
        self.observers.push(Box::new(observer));
    }

    /// Add `amount` (negative drains) and clamp into [0, 100].
    /// NaN is ignored, infinities saturate.
    pub fn adjust(&mut self, amount: f64) -> DecayChange {
        if amount.is_nan() {
            return DecayChange { old: self.value, new: self.value, cause: DecayCause::Adjust };
        }
        self.write(self.value + amount, DecayCause::Adjust)
    }

    /// One decay-timer tick. Returns true once the level has hit 0.
    pub fn tick(&mut self) -> bool {
        self.write(self.value - self.step, DecayCause::Tick);
        self.is_depleted()
    }

    pub fn reset(&mut self) {
        self.write(FULL, DecayCause::Reset);
    }

    /// Number of ticks left until the level reaches 0 with no adjustments.
    pub fn ticks_remaining(&self) -> u32 {
        ((self.value - SNAP_EPSILON) / self.step).ceil().max(0.0) as u32
    }

    fn write(&mut self, raw: f64, cause: DecayCause) -> DecayChange {
        let mut new = raw.clamp(EMPTY, FULL);
        if new < SNAP_EPSILON {
            new = EMPTY;
        }
        let change = DecayChange { old: self.value, new, cause };
        self.value = new;
        for observer in self.observers.iter_mut() {
            observer(&change);
        }
        change
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn starts_full() {
        let d = DecayLevel::new(DEFAULT_STEP);
        assert_eq!(d.value(), FULL);
        assert_eq!(d.percent(), 100);
        assert!(!d.is_depleted());
    }

    #[test]
    fn drains_to_zero_in_1050_ticks() {
        let mut d = DecayLevel::new(DEFAULT_STEP);
        assert_eq!(d.ticks_remaining(), 1050);
        for i in 0..1049 {
            assert!(!d.tick(), "depleted early at tick {}", i + 1);
        }
        assert!(d.tick());
        assert_eq!(d.value(), 0.0);
    }

    #[test]
    fn step_for_default_timing() {
        let step = DecayLevel::step_for(100, 105.0);
        assert!((step - DEFAULT_STEP).abs() < 1e-12);
        // Bad input falls back instead of dividing by zero
        assert_eq!(DecayLevel::step_for(0, 105.0), DEFAULT_STEP);
        assert_eq!(DecayLevel::step_for(100, 0.0), DEFAULT_STEP);
    }

    #[test]
    fn adjust_clamps_both_ends() {
        let mut d = DecayLevel::new(DEFAULT_STEP);
        d.adjust(25.0);
        assert_eq!(d.value(), 100.0);
        d.adjust(-250.0);
        assert_eq!(d.value(), 0.0);
        d.adjust(2.0);
        assert_eq!(d.value(), 2.0);
    }

    #[test]
    fn nan_adjust_is_ignored() {
        let mut d = DecayLevel::new(DEFAULT_STEP);
        d.adjust(-40.0);
        d.adjust(f64::NAN);
        assert_eq!(d.value(), 60.0);
    }

    #[test]
    fn tick_at_zero_stays_zero() {
        let mut d = DecayLevel::new(DEFAULT_STEP);
        d.adjust(-100.0);
        assert!(d.tick());
        assert_eq!(d.value(), 0.0);
    }

    #[test]
    fn reset_refills() {
        let mut d = DecayLevel::new(DEFAULT_STEP);
        d.adjust(-70.0);
        d.reset();
        assert_eq!(d.value(), FULL);
    }

    #[test]
    fn observers_see_every_write() {
        let seen: Rc<RefCell<Vec<DecayChange>>> = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        let mut d = DecayLevel::new(DEFAULT_STEP);
        d.subscribe(move |c| sink.borrow_mut().push(*c));

        d.adjust(-10.0);
        d.tick();
        d.reset();

        let seen = seen.borrow();
        assert_eq!(seen.len(), 3);
        assert_eq!(seen[0].cause, DecayCause::Adjust);
        assert_eq!(seen[0].old, 100.0);
        assert_eq!(seen[0].new, 90.0);
        assert_eq!(seen[1].cause, DecayCause::Tick);
        assert_eq!(seen[2].cause, DecayCause::Reset);
        assert_eq!(seen[2].new, 100.0);
    }

    proptest! {
        #[test]
        fn any_adjustment_stays_in_range(amounts in proptest::collection::vec(proptest::num::f64::ANY, 0..64)) {
            let mut d = DecayLevel::new(DEFAULT_STEP);
            for a in amounts {
                d.adjust(a);
                prop_assert!(d.value() >= EMPTY && d.value() <= FULL);
            }
        }

        #[test]
        fn ticks_and_adjusts_stay_in_range(ops in proptest::collection::vec((any::<bool>(), -200.0f64..200.0), 0..200)) {
            let mut d = DecayLevel::new(DEFAULT_STEP);
            for (is_tick, amount) in ops {
                if is_tick { d.tick(); } else { d.adjust(amount); }
                prop_assert!(d.value() >= EMPTY && d.value() <= FULL);
            }
        }
    }
}
