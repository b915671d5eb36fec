use chrono::{NaiveDateTime, TimeDelta};

/// A simulation clock stepping through `[start, end)` at a fixed increment.
///
/// The clock never skips or repeats a tick; once a tick reaches or passes
/// `end` it is exhausted.
///
/// # Examples
///
/// ```
/// use chrono::{NaiveDate, TimeDelta};
/// use p2p_energy_sim::sim::clock::Clock;
///
/// let start = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap().and_hms_opt(0, 0, 0).unwrap();
/// let mut clock = Clock::new(start, start + TimeDelta::minutes(3), TimeDelta::minutes(1));
/// let mut ticks = Vec::new();
///
/// clock.run(|t| ticks.push(t.format("%H:%M").to_string()));
/// assert_eq!(ticks, vec!["00:00", "00:01", "00:02"]);
/// ```
#[derive(Debug, Clone)]
pub struct Clock {
    /// Next tick to hand out
    current: NaiveDateTime,
    /// Exclusive end of the run
    end: NaiveDateTime,
    increment: TimeDelta,
}

impl Clock {
    /// Creates a new clock.
    ///
    /// # Arguments
    ///
    /// * `start` - First tick
    /// * `end` - Exclusive end
    /// * `increment` - Tick length; a non-positive increment yields no ticks
    pub fn new(start: NaiveDateTime, end: NaiveDateTime, increment: TimeDelta) -> Self {
        Self {
            current: start,
            end,
            increment,
        }
    }

    /// Advances the clock by one tick.
    ///
    /// # Returns
    ///
    /// * `Some(t)` - The tick timestamp before advancing
    /// * `None` - If the clock has reached its end
    pub fn tick(&mut self) -> Option<NaiveDateTime> {
        if self.current >= self.end || self.increment <= TimeDelta::zero() {
            return None;
        }
        let t = self.current;
        self.current = t.checked_add_signed(self.increment).unwrap_or(self.end);
        Some(t)
    }

    /// Whether every tick has been handed out.
    pub fn is_finished(&self) -> bool {
        self.current >= self.end || self.increment <= TimeDelta::zero()
    }

    /// Runs a function for each remaining tick.
    pub fn run(&mut self, mut f: impl FnMut(NaiveDateTime)) {
        while let Some(t) = self.tick() {
            f(t);
        }
    }
}
