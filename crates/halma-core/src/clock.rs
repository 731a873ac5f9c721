//! Per-player elapsed-time bookkeeping.

use std::time::{Duration, Instant};

use crate::board::Player;

/// Attributes wall-clock time to whichever side has just moved.
///
/// The controller calls [`GameClock::charge`] once per applied move; the
/// interval since the previous charge is booked to the mover.
#[derive(Debug, Clone)]
pub struct GameClock {
    mark: Instant,
    totals: [Duration; 2],
}

impl GameClock {
    pub fn new() -> Self {
        Self {
            mark: Instant::now(),
            totals: [Duration::ZERO; 2],
        }
    }

    /// Book the time since the previous mark to `player` and return this
    /// move's duration.
    pub fn charge(&mut self, player: Player) -> Duration {
        let spent = self.mark.elapsed();
        self.totals[player.index()] += spent;
        self.mark = Instant::now();
        spent
    }

    /// Total time booked to `player` so far.
    pub fn total(&self, player: Player) -> Duration {
        self.totals[player.index()]
    }
}

impl Default for GameClock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_charge_attributes_to_mover() {
        let mut clock = GameClock::new();
        thread::sleep(Duration::from_millis(10));
        let spent = clock.charge(Player::White);
        assert!(spent >= Duration::from_millis(10));
        assert_eq!(clock.total(Player::White), spent);
        assert_eq!(clock.total(Player::Black), Duration::ZERO);
    }

    #[test]
    fn test_charge_resets_the_mark() {
        let mut clock = GameClock::new();
        thread::sleep(Duration::from_millis(5));
        clock.charge(Player::White);
        let next = clock.charge(Player::Black);
        // The second charge only covers the interval after the first.
        assert!(next < Duration::from_millis(5));
    }
}
